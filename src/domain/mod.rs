//! Domain layer - Core telephony and packet data logic
//!
//! This layer contains:
//! - Stores: fixed-capacity pools of call and bearer contexts
//! - State machines: per-context lifecycles driven by commands and events
//! - Correlation: client tokens waiting on the baseband
//! - Effects: what a dispatch produces
//! - Ports: traits for the client, the baseband and network interfaces

pub mod bearer;
pub mod call;
pub mod correlation;
pub mod effects;
pub mod ports;
pub mod shared;

// Re-export commonly used types
pub use shared::{DomainError, Result};
