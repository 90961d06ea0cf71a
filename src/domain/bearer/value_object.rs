//! Bearer value objects

use crate::domain::shared::error::{DomainError, Result};
use crate::domain::shared::value_objects::LocalId;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;

pub const APN_MAX_LEN: usize = 100;
pub const USERNAME_MAX_LEN: usize = 32;
pub const PASSWORD_MAX_LEN: usize = 32;

/// Prefix length reported for the local address; the baseband subnet is not trusted
pub const HOST_PREFIX_LEN: u8 = 32;

/// `active` value of a descriptor whose link is up
pub const DATA_CALL_ACTIVE_UP: u8 = 2;

/// Packet session type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BearerType {
    Ip,
    Ppp,
}

impl BearerType {
    /// Accepts the client's protocol strings; anything else is rejected
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "IP" | "IPV6" | "IPV4V6" => Ok(BearerType::Ip),
            "PPP" => Ok(BearerType::Ppp),
            other => Err(DomainError::MalformedInput(format!(
                "unsupported data connection type {:?}",
                other
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BearerType::Ip => "IP",
            BearerType::Ppp => "PPP",
        }
    }
}

impl fmt::Display for BearerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Packet data fail causes reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PdpFailCause {
    None,
    ErrorUnspecified,
}

impl PdpFailCause {
    pub fn code(&self) -> i32 {
        match self {
            PdpFailCause::None => 0,
            PdpFailCause::ErrorUnspecified => 0xFFFF,
        }
    }
}

/// Text copied into a fixed-size baseband field
///
/// Construction fails instead of truncating when the input does not fit.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedText<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> FixedText<N> {
    pub fn new(field: &str, value: &str) -> Result<Self> {
        if value.len() > N {
            return Err(DomainError::MalformedInput(format!(
                "{} is {} bytes, field holds {}",
                field,
                value.len(),
                N
            )));
        }
        let mut bytes = [0u8; N];
        bytes[..value.len()].copy_from_slice(value.as_bytes());
        Ok(Self {
            bytes,
            len: value.len(),
        })
    }

    pub fn empty() -> Self {
        Self {
            bytes: [0u8; N],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    /// The whole zero-padded field as sent on the wire
    pub fn as_field(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> fmt::Debug for FixedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> Serialize for FixedText<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Fixed parameters of every network start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkStartOptions {
    pub op_mode: u8,
    pub proto_type: u8,
    pub preferred_account_handle: u8,
    pub local_addr: u32,
    pub dns_addr1: u32,
    pub dns_addr2: u32,
}

impl Default for NetworkStartOptions {
    fn default() -> Self {
        Self {
            op_mode: 1,
            proto_type: 1,
            preferred_account_handle: 0x21,
            local_addr: 0xFFFF_FFFF,
            dns_addr1: 0xFFFF_FFFF,
            dns_addr2: 0xFFFF_FFFF,
        }
    }
}

/// Baseband request that opens a packet session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkStartRequest {
    pub apn: FixedText<APN_MAX_LEN>,
    pub username: FixedText<USERNAME_MAX_LEN>,
    pub password: FixedText<PASSWORD_MAX_LEN>,
    pub options: NetworkStartOptions,
}

impl NetworkStartRequest {
    /// Builds the request, rejecting any field that does not fit
    pub fn new(apn: &str, username: Option<&str>, password: Option<&str>) -> Result<Self> {
        Ok(Self {
            apn: FixedText::new("apn", apn)?,
            username: username
                .map(|u| FixedText::new("username", u))
                .transpose()?
                .unwrap_or_else(FixedText::empty),
            password: password
                .map(|p| FixedText::new("password", p))
                .transpose()?
                .unwrap_or_else(FixedText::empty),
            options: NetworkStartOptions::default(),
        })
    }
}

/// Raw addresses from a network start confirmation, host byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub local_addr: u32,
    pub dns1: u32,
    pub dns2: u32,
}

/// Connection descriptor handed to the client once a bearer is up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataCallDescriptor {
    pub status: i32,
    pub cid: u32,
    pub active: u8,
    #[serde(rename = "type")]
    pub bearer_type: String,
    pub ifname: String,
    pub addresses: String,
    pub gateways: String,
    pub dnses: String,
}

impl DataCallDescriptor {
    /// The baseband reports no gateway, so the local address stands in for it
    pub fn derive(local_id: LocalId, bearer_type: BearerType, ifname: &str, params: &NetworkParams) -> Self {
        let local = Ipv4Addr::from(params.local_addr);
        Self {
            status: PdpFailCause::None.code(),
            cid: local_id.value(),
            active: DATA_CALL_ACTIVE_UP,
            bearer_type: bearer_type.label().to_string(),
            ifname: ifname.to_string(),
            addresses: format!("{}/{}", local, HOST_PREFIX_LEN),
            gateways: local.to_string(),
            dnses: format!("{} {}", Ipv4Addr::from(params.dns1), Ipv4Addr::from(params.dns2)),
        }
    }
}
