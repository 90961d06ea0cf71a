//! Modemlink - telephony control layer of a modem interface bridge
//!
//! Translates baseband call and packet data events into completions and
//! notifications for a radio-interface client, and client commands into
//! baseband requests.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use application::Bridge;
pub use domain::shared::error::{DomainError, Result};
