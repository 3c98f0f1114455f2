//! Primitives and the structured error taxonomy shared by every crate in this workspace.

pub mod error;
pub mod primitives;

pub use error::{Error, Result};
pub use primitives::*;
