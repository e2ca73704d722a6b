//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Task cancellation is deliberately absent: it is the normal termination
/// signal for background tasks, carried by a `CancellationToken`, never an
/// error value.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Fact generation failure or timeout.
    Generation(String),
    /// Outbound delivery-channel failure.
    Delivery(String),
    /// Background task could not be spawned.
    Spawn(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Generation(msg) => write!(f, "generation: {msg}"),
            Self::Delivery(msg) => write!(f, "delivery: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
