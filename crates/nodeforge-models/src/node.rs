use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A caller-supplied, globally unique worker identity.
///
/// Character class `[A-Za-z0-9_-]`, length 3-64, validated once at
/// construction so every later use can assume the invariant holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let len_ok = (3..=64).contains(&raw.len());
        let chars_ok = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if len_ok && chars_ok && !raw.is_empty() {
            Ok(Self(raw.to_string()))
        } else {
            Err(ModelError::InvalidNodeId(raw.to_string()))
        }
    }
}

impl TryFrom<String> for NodeId {
    type Error = ModelError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A worker node registered with the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub ip_address: IpAddr,
    pub hardware_fingerprint: String,
    pub is_available: bool,
    pub last_heartbeat: DateTime<Utc>,
    /// Free-form capability labels used for scheduling/filtering.
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn validate_hardware_fingerprint(raw: &str) -> Result<(), ModelError> {
    if raw.is_empty() || raw.len() > 128 {
        Err(ModelError::InvalidHardwareFingerprint)
    } else {
        Ok(())
    }
}

pub fn validate_ip_address(raw: &str) -> Result<IpAddr, ModelError> {
    raw.parse()
        .map_err(|_| ModelError::InvalidIpAddress(raw.to_string()))
}

/// Kinds of node-level change the event bus fans out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeChangeKind {
    Registered,
    HeartbeatLost,
    HeartbeatRestored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_ids() {
        assert!("n1".parse::<NodeId>().is_err()); // too short
        assert!("abc".parse::<NodeId>().is_ok());
        assert!("a".repeat(64).parse::<NodeId>().is_ok());
        assert!("a".repeat(65).parse::<NodeId>().is_err());
    }

    #[test]
    fn rejects_bad_characters() {
        assert!("test@node#123!".parse::<NodeId>().is_err());
        assert!("".parse::<NodeId>().is_err());
    }

    #[test]
    fn validates_ip_literals() {
        assert!(validate_ip_address("192.168.1.10").is_ok());
        assert!(validate_ip_address("::1").is_ok());
        assert!(validate_ip_address("999.999.999.999").is_err());
    }
}
