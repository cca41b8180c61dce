//! Keccak-256 hashing, namehash nodes and function selectors

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Keccak-256 digest of `data`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// First four bytes of the Keccak-256 hash of a canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Namehash identity of a name (EIP-137)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Node(pub [u8; 32]);

impl Node {
    /// Node of the root name
    pub const ROOT: Node = Node([0u8; 32]);

    /// Node of `label` directly under `self`
    pub fn child(&self, label: &str) -> Node {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&self.0);
        buf[32..].copy_from_slice(&keccak256(label.as_bytes()));
        Node(keccak256(&buf))
    }

    /// Namehash of a dotted name, without normalization
    pub fn namehash(name: &str) -> Node {
        if name.is_empty() {
            return Node::ROOT;
        }
        name.rsplit('.').fold(Node::ROOT, |node, label| node.child(label))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self)
    }
}

impl FromStr for Node {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let bytes = crate::parse_hex_bytes(s)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| crate::Error::Abi(format!("node must be 32 bytes: {}", s)))?;
        Ok(Node(array))
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
