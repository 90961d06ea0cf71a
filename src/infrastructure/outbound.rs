//! Channel-backed client and baseband ports
//!
//! Completions, notifications and baseband requests all end up on one
//! unbounded channel, drained by whatever writes them out.

use crate::domain::effects::{BasebandRequest, Completion, Unsolicited};
use crate::domain::ports::{BasebandLink, RadioClient};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One outgoing record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outbound {
    Completion(Completion),
    Unsolicited(Unsolicited),
    Request(BasebandRequest),
}

#[derive(Debug, Clone)]
pub struct OutboundChannel {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl OutboundChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn push(&self, record: Outbound) {
        if let Err(e) = self.tx.send(record) {
            warn!("Outbound channel closed, dropping {:?}", e.0);
        }
    }
}

impl RadioClient for OutboundChannel {
    fn complete(&mut self, completion: Completion) {
        debug!("Completing token {} with {:?}", completion.token, completion.status);
        self.push(Outbound::Completion(completion));
    }

    fn unsolicited(&mut self, event: Unsolicited) {
        debug!("Broadcasting {}", event.notification.name());
        self.push(Outbound::Unsolicited(event));
    }
}

impl BasebandLink for OutboundChannel {
    fn send(&mut self, request: BasebandRequest) {
        debug!("Sending {} to baseband", request.name());
        self.push(Outbound::Request(request));
    }
}
