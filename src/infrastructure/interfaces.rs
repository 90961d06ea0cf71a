//! In-process registry of virtual network interfaces
//!
//! Tracks which interface names are open so that a bearer never reuses an
//! interface that was not closed. Creating the kernel device is left to
//! whatever watches the log or the outbound stream.

use crate::domain::ports::InterfaceProvider;
use crate::domain::shared::error::{DomainError, Result};
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct VirtualInterfaces {
    open: HashSet<String>,
    unavailable: HashSet<String>,
}

impl VirtualInterfaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `open` of `ifname` fail
    pub fn mark_unavailable(&mut self, ifname: &str) {
        self.unavailable.insert(ifname.to_string());
    }

    pub fn is_open(&self, ifname: &str) -> bool {
        self.open.contains(ifname)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

impl InterfaceProvider for VirtualInterfaces {
    fn open(&mut self, ifname: &str) -> Result<()> {
        if self.unavailable.contains(ifname) {
            return Err(DomainError::TransportUnavailable(format!("{} is unavailable", ifname)));
        }
        if !self.open.insert(ifname.to_string()) {
            return Err(DomainError::TransportUnavailable(format!("{} is already open", ifname)));
        }
        info!("Opened interface {}", ifname);
        Ok(())
    }

    fn close(&mut self, ifname: &str) {
        if self.open.remove(ifname) {
            info!("Closed interface {}", ifname);
        } else {
            warn!("Close of interface {} that was not open", ifname);
        }
    }
}
