//! Ports to the collaborators around the core
//!
//! Defined here as traits and implemented in the infrastructure and
//! interface layers.

use crate::domain::effects::{BasebandRequest, Completion, Unsolicited};
use crate::domain::shared::error::Result;

/// The radio-interface client: receives completions and broadcasts
#[cfg_attr(test, mockall::automock)]
pub trait RadioClient {
    /// Resolve a client token
    fn complete(&mut self, completion: Completion);

    /// Broadcast a notification that answers no token
    fn unsolicited(&mut self, event: Unsolicited);
}

/// Outbound half of the baseband transport
#[cfg_attr(test, mockall::automock)]
pub trait BasebandLink {
    fn send(&mut self, request: BasebandRequest);
}

/// Creates and destroys the virtual network interface behind each bearer
#[cfg_attr(test, mockall::automock)]
pub trait InterfaceProvider {
    /// Open the interface; failures map to `DomainError::TransportUnavailable`
    fn open(&mut self, ifname: &str) -> Result<()>;

    fn close(&mut self, ifname: &str);
}
