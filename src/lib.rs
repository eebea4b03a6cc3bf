pub mod bidding;
pub mod config;
pub mod database;
pub mod dead_letter;
pub mod error;
pub mod handlers;
pub mod message;
pub mod message_broker;
pub mod outcome;
pub mod stock;
