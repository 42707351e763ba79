//! scenebake Core Library
//!
//! This crate provides the read-only scene-graph model consumed by the
//! exporter, the small math types it is expressed in, and the error type
//! shared across all scenebake components.

pub mod error;
pub mod material;
pub mod scene;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use material::*;
pub use scene::*;
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::material::*;
    pub use crate::scene::*;
    pub use crate::types::*;
}
