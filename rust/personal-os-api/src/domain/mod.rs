//! Core domain models.
//!
//! Entry types and kinds, the content codec, document templates and the
//! dashboard aggregates.

pub mod content;
pub mod entries;
pub mod stats;
pub mod templates;

pub use content::{ContentError, ContentPayload, GoalContent, InterviewContent, ReviewContent};
pub use entries::*;
