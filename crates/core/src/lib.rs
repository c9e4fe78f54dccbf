//! # OpenChart Core
//!
//! Core types, traits, and error handling for OpenChart.
//!
//! This crate provides the foundational building blocks used by the
//! diagram model and the command-line tools, including:
//!
//! - **Types**: Instance identifiers, positions, object kinds and semantic roles
//! - **Traits**: Common behaviors like `Validatable`, `Persistable` and `Positioned`
//! - **Errors**: Unified error handling with `ChartError` and `ChartResult`
//!

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{ChartError, ChartResult, ResultExt};
pub use traits::{Persistable, Positioned, Validatable};
pub use types::{DiagramObjectType, InstanceId, Position, SemanticRole};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
