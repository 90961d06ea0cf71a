//! Application layer - dispatching inbound records to the state machines
//!
//! This layer owns the domain machines and the ports they talk through.
//! It's responsible for:
//! - Decoding inbound commands and events
//! - Turning command errors into failed completions
//! - Flushing effects to the ports in order
//! - Recording metrics

pub mod bridge;
pub mod command;
pub mod metrics;

pub use bridge::Bridge;
pub use command::{BasebandEvent, ClientRequest, Command, Inbound};
