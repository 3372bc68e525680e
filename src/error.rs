//! Error types and result handling for cat-events.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use cat_events::{Error, Result};
//!
//! fn publish() -> Result<()> {
//!     Err(Error::delivery("Broker: Not enough in-sync replicas"))
//! }
//!
//! match publish() {
//!     Ok(()) => println!("Published"),
//!     Err(Error::Delivery { message }) => eprintln!("Delivery failed: {}", message),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// Message returned to clients for any request body that cannot be decoded.
pub const CANNOT_PARSE_JSON: &str = "Cannot parse JSON";

/// The main error type for cat-events operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from the config file, environment or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The inbound request could not be turned into an intent.
    ///
    /// Raised before any broker interaction takes place.
    #[error("Validation error: {message}")]
    Validation {
        /// Client-facing description; never carries decoder internals
        message: String,
    },

    /// Canonical payload serialization failed.
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The broker did not acknowledge the event.
    ///
    /// Covers an unreachable broker, an acknowledgment timeout and
    /// broker-reported write failures.
    #[error("Delivery error: {message}")]
    Delivery {
        /// Broker error text
        message: String,
    },

    /// Kafka client construction or admin operation error.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// I/O error, typically from binding the HTTP listener.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn delivery(message: impl Into<String>) -> Self {
        Error::Delivery {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that another publish attempt could fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Delivery { .. })
    }
}

/// A convenient Result type alias for cat-events operations.
///
/// This is equivalent to `std::result::Result<T, cat_events::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
