//! Shared kernel - types used by both the call and the bearer contexts

pub mod arena;
pub mod error;
pub mod value_objects;

pub use arena::{Arena, Handle};
pub use error::{DomainError, Result};
pub use value_objects::*;
