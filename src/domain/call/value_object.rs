//! Call value objects

use crate::domain::shared::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest remote party address a call context will hold
pub const MAX_NUMBER_LEN: usize = 82;

/// Last-call fail cause for a normally cleared call
pub const CALL_FAIL_NORMAL: i32 = 16;

/// Call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    /// Outgoing call requested, not yet connected
    Dialing,
    /// Incoming call alerting the user
    Incoming,
    /// Call is connected
    Active,
    /// Call is held
    Holding,
    /// Incoming call waiting behind another call
    Waiting,
}

impl CallState {
    /// State code reported in the current-calls listing
    pub fn client_code(&self) -> u8 {
        match self {
            CallState::Active => 0,
            CallState::Holding => 1,
            CallState::Dialing => 2,
            CallState::Incoming => 4,
            CallState::Waiting => 5,
        }
    }

    /// Calls released by "hang up waiting or background"
    pub fn is_background(&self) -> bool {
        matches!(self, CallState::Waiting | CallState::Holding)
    }
}

/// Call type as reported by the baseband or requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    Voice,
    Other(u8),
}

impl CallType {
    pub fn is_voice(&self) -> bool {
        matches!(self, CallType::Voice)
    }
}

impl Default for CallType {
    fn default() -> Self {
        CallType::Voice
    }
}

/// Type-of-address classification of a remote number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeOfAddress {
    International,
    National,
}

impl TypeOfAddress {
    /// Only the leading `+` is inspected
    pub fn classify(number: &str) -> Self {
        if number.starts_with('+') {
            TypeOfAddress::International
        } else {
            TypeOfAddress::National
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            TypeOfAddress::International => 145,
            TypeOfAddress::National => 129,
        }
    }
}

/// Number / name presentation indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presentation {
    Allowed,
    Restricted,
    Unavailable,
}

impl Presentation {
    pub fn for_number(number: &str) -> Self {
        if number.is_empty() {
            Presentation::Unavailable
        } else {
            Presentation::Allowed
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Presentation::Allowed => 0,
            Presentation::Restricted => 1,
            Presentation::Unavailable => 2,
        }
    }
}

/// A single DTMF tone character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub struct DtmfTone(char);

impl DtmfTone {
    pub fn parse(c: char) -> Result<Self> {
        match c {
            '0'..='9' | '*' | '#' | 'A'..='D' => Ok(Self(c)),
            _ => Err(DomainError::MalformedInput(format!("invalid DTMF tone {:?}", c))),
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl TryFrom<char> for DtmfTone {
    type Error = DomainError;

    fn try_from(c: char) -> Result<Self> {
        Self::parse(c)
    }
}

impl From<DtmfTone> for char {
    fn from(tone: DtmfTone) -> char {
        tone.0
    }
}

impl fmt::Display for DtmfTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates a dial string
pub fn validate_number(number: &str) -> Result<()> {
    if number.is_empty() {
        return Err(DomainError::MalformedInput("empty address".to_string()));
    }
    if number.len() > MAX_NUMBER_LEN {
        return Err(DomainError::MalformedInput(format!(
            "address is {} bytes, limit is {}",
            number.len(),
            MAX_NUMBER_LEN
        )));
    }
    Ok(())
}

/// Longest prefix of a caller number that fits the number field
pub fn bounded_number(number: &str) -> &str {
    if number.len() <= MAX_NUMBER_LEN {
        return number;
    }
    let mut end = MAX_NUMBER_LEN;
    while !number.is_char_boundary(end) {
        end -= 1;
    }
    &number[..end]
}
