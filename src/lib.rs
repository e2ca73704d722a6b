#![forbid(unsafe_code)]

//! Live-location fact courier.
//!
//! While a user shares a moving position, a per-user session scheduler
//! delivers nearby-place facts on a paced cadence, watches the update
//! stream for silent abandonment, and tears the session down on expiry
//! or an explicit stop. Content generation and message delivery are
//! external collaborators behind the [`generator`] and [`channel`] seams.

pub mod channel;
pub mod config;
pub mod content;
pub mod errors;
pub mod generator;
pub mod models;
pub mod signals;
pub mod tracker;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
