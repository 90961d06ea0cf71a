//! Interface layer - External interfaces
//!
//! This layer handles:
//! - Decoding input lines into commands and events
//! - Writing completions, notifications and baseband requests

pub mod stdio;
