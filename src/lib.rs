pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod kafka;
pub mod publisher;
pub mod retry;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use publisher::{DeliveryReceipt, EventPublisher, PublishStatsSnapshot};
pub use server::Server;
