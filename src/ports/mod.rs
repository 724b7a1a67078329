//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and the fitted model and its artifact files.

mod artifacts;
mod classifier;

pub use artifacts::{ArtifactStore, ModelArtifacts};
pub use classifier::{Classifier, ModelError};
