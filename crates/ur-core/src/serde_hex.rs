//! `0x`-prefixed hex (de)serialization for byte fields
//!
//! Use with `#[serde(with = "ur_core::serde_hex")]`.

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize bytes as a `0x`-prefixed lowercase hex string
pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

/// Deserialize bytes from a hex string, prefix optional
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    crate::parse_hex_bytes(&s).map_err(serde::de::Error::custom)
}
