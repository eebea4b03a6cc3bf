pub mod handler;
pub mod model;

pub use handler::StockIngestHandler;
pub use model::{AuctionType, PersistedStockItem, StockItemEvent, AUCTION_TYPE_ATTRIBUTE};
