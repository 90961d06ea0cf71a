//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - The channel the client and baseband ports write to
//! - The virtual network interface registry

pub mod interfaces;
pub mod outbound;

pub use interfaces::VirtualInterfaces;
pub use outbound::{Outbound, OutboundChannel};
