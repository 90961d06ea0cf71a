//! Correlation token registry
//!
//! A fixed set of named slots, one per class of operation that can be in
//! flight at the baseband. Hangup tokens are parked on the call they hang up
//! and data-setup tokens on the bearer being negotiated, so only the
//! call-global operations live here.

use crate::domain::shared::error::{DomainError, Result};
use crate::domain::shared::value_objects::ClientToken;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation classes with a single outstanding request each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingSlot {
    Dial,
    DtmfStart,
    DtmfStop,
}

impl PendingSlot {
    pub const ALL: [PendingSlot; 3] = [PendingSlot::Dial, PendingSlot::DtmfStart, PendingSlot::DtmfStop];

    pub fn name(&self) -> &'static str {
        match self {
            PendingSlot::Dial => "dial",
            PendingSlot::DtmfStart => "dtmf_start",
            PendingSlot::DtmfStop => "dtmf_stop",
        }
    }
}

impl fmt::Display for PendingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A client token waiting for a baseband confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingToken {
    token: ClientToken,
    parked_at: DateTime<Utc>,
}

impl PendingToken {
    pub fn new(token: ClientToken, parked_at: DateTime<Utc>) -> Self {
        Self { token, parked_at }
    }

    pub fn token(&self) -> ClientToken {
        self.token
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.parked_at >= timeout
    }
}

#[derive(Debug, Default)]
pub struct TokenRegistry {
    dial: Option<PendingToken>,
    dtmf_start: Option<PendingToken>,
    dtmf_stop: Option<PendingToken>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, slot: PendingSlot) -> &Option<PendingToken> {
        match slot {
            PendingSlot::Dial => &self.dial,
            PendingSlot::DtmfStart => &self.dtmf_start,
            PendingSlot::DtmfStop => &self.dtmf_stop,
        }
    }

    fn slot_mut(&mut self, slot: PendingSlot) -> &mut Option<PendingToken> {
        match slot {
            PendingSlot::Dial => &mut self.dial,
            PendingSlot::DtmfStart => &mut self.dtmf_start,
            PendingSlot::DtmfStop => &mut self.dtmf_stop,
        }
    }

    pub fn is_parked(&self, slot: PendingSlot) -> bool {
        self.slot(slot).is_some()
    }

    /// Fails with `Conflict` while an earlier request of this class is outstanding
    pub fn ensure_free(&self, slot: PendingSlot) -> Result<()> {
        match self.slot(slot) {
            Some(pending) => Err(DomainError::Conflict(format!(
                "{} already pending for token {}",
                slot,
                pending.token()
            ))),
            None => Ok(()),
        }
    }

    /// Parks `token`; an occupied slot is left untouched and reported as `Conflict`
    pub fn park(&mut self, slot: PendingSlot, token: ClientToken, now: DateTime<Utc>) -> Result<()> {
        self.ensure_free(slot)?;
        *self.slot_mut(slot) = Some(PendingToken::new(token, now));
        Ok(())
    }

    pub fn take(&mut self, slot: PendingSlot) -> Option<PendingToken> {
        self.slot_mut(slot).take()
    }

    /// Removes and returns every token parked for at least `timeout`
    pub fn take_expired(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<(PendingSlot, PendingToken)> {
        let mut expired = Vec::new();
        for slot in PendingSlot::ALL {
            let entry = self.slot_mut(slot);
            if entry.as_ref().is_some_and(|p| p.is_expired(now, timeout)) {
                if let Some(pending) = entry.take() {
                    expired.push((slot, pending));
                }
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_park_and_take() {
        let mut registry = TokenRegistry::new();
        let now = Utc::now();
        registry.park(PendingSlot::Dial, ClientToken::new(1), now).unwrap();
        assert!(registry.is_parked(PendingSlot::Dial));
        assert!(!registry.is_parked(PendingSlot::DtmfStart));

        let pending = registry.take(PendingSlot::Dial).unwrap();
        assert_eq!(pending.token(), ClientToken::new(1));
        assert!(registry.take(PendingSlot::Dial).is_none());
    }

    #[test]
    fn test_occupied_slot_keeps_first_token() {
        let mut registry = TokenRegistry::new();
        let now = Utc::now();
        registry.park(PendingSlot::DtmfStart, ClientToken::new(1), now).unwrap();

        let err = registry
            .park(PendingSlot::DtmfStart, ClientToken::new(2), now)
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(
            registry.take(PendingSlot::DtmfStart).unwrap().token(),
            ClientToken::new(1)
        );
    }

    #[test]
    fn test_take_expired_only_returns_old_tokens() {
        let mut registry = TokenRegistry::new();
        let start = Utc::now();
        registry.park(PendingSlot::Dial, ClientToken::new(1), start).unwrap();
        registry
            .park(PendingSlot::DtmfStop, ClientToken::new(2), start + Duration::seconds(20))
            .unwrap();

        let expired = registry.take_expired(start + Duration::seconds(30), Duration::seconds(30));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, PendingSlot::Dial);
        assert!(registry.is_parked(PendingSlot::DtmfStop));
    }
}
