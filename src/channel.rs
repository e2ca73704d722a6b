//! Outbound message-delivery collaborator boundary.
//!
//! Deliveries are best-effort: the scheduler logs and swallows channel
//! failures so a missed message never terminates a session.

use std::future::Future;
use std::pin::Pin;

use crate::models::{ChatId, Position};
use crate::Result;

/// Terminal session notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session reached its requested lifetime.
    Expired,
    /// Position updates stopped; tracking appears manually ended.
    SilentStop,
    /// The user explicitly stopped sharing; confirmation message.
    Stopped,
}

/// Interface to the user-facing delivery channel.
pub trait DeliveryChannel: Send + Sync {
    /// Deliver a formatted fact message with optional illustrations.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Delivery`](crate::AppError::Delivery) on channel
    /// failure; callers log and continue.
    fn send_fact(
        &self,
        chat: ChatId,
        text: String,
        images: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Deliver a navigation waypoint for a described place.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Delivery`](crate::AppError::Delivery) on channel
    /// failure; callers log and continue.
    fn send_waypoint(
        &self,
        chat: ChatId,
        place: String,
        position: Position,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Deliver a terminal session notification.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Delivery`](crate::AppError::Delivery) on channel
    /// failure; callers log and continue.
    fn notify(
        &self,
        chat: ChatId,
        event: SessionEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}
