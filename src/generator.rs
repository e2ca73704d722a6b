//! Fact-generation collaborator boundary.
//!
//! The generator turns a coordinate pair and an exclusion list into a
//! fact draft. Calls may take seconds and may fail; the delivery loop
//! bounds each call with a timeout and recovers locally from errors.

use std::future::Future;
use std::pin::Pin;

use crate::models::Position;
use crate::Result;

/// Raw output of one generation call.
#[derive(Debug, Clone)]
pub struct FactDraft {
    /// Generated text; may carry `Place:` / `Fact:` labelled lines.
    pub text: String,
    /// Coordinate of the described place, for a navigation waypoint.
    pub companion: Option<Position>,
    /// Illustration URLs to attach to the delivery.
    pub images: Vec<String>,
}

impl FactDraft {
    /// Draft carrying only text.
    #[must_use]
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            companion: None,
            images: Vec::new(),
        }
    }
}

/// Interface to the content-generation service.
pub trait FactGenerator: Send + Sync {
    /// Generate a fact about the surroundings of `position`.
    ///
    /// `exclusions` lists recently delivered facts, oldest first, which the
    /// generator should avoid repeating.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Generation`](crate::AppError::Generation) when
    /// the service cannot produce content; the caller recovers locally.
    fn nearby_fact(
        &self,
        position: Position,
        exclusions: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<FactDraft>> + Send + '_>>;
}
