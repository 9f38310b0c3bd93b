//! Coordination registry implementations.
pub mod memory;

use thiserror::Error;

pub use crate::core::{Lock, Registry};
pub use memory::MemoryRegistry;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("registry is read-only, cannot write {0}")]
    ReadOnly(String),

    #[error("registry is not connected")]
    Disconnected,
}
