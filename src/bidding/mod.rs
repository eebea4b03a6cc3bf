pub mod handler;
pub mod model;

pub use handler::BidIngestHandler;
pub use model::{BidEvent, PersistedBid};
