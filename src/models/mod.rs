//! Domain data model: positions, identifiers, and session state.

pub mod position;
pub mod session;

pub use position::{ChatId, Position, UserId};
pub use session::{SessionSnapshot, SessionState};
