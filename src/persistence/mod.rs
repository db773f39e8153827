//! Persistence layer modules.

pub mod store;
pub mod writer;

pub use store::{ensure_layout, ProjectStore};
