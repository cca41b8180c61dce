//! JSON shapes returned to callers

use crate::engine::Resolution;
use crate::reverse::{PrimaryName, PrimaryNameStatus};
use serde::{Deserialize, Serialize};
use ur_core::{Address, Node, RecordResult};

/// One record in a [`ResolveResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResponse {
    /// Request failed
    pub error: bool,
    /// Needed an off-chain round trip
    pub offchain: bool,
    /// Served through a batch gateway
    pub batched: bool,
    /// Answer or diagnostic payload
    #[serde(with = "ur_core::serde_hex")]
    pub data: Vec<u8>,
}

impl From<&RecordResult> for RecordResponse {
    fn from(result: &RecordResult) -> Self {
        Self {
            error: result.bits.error(),
            offchain: result.bits.offchain(),
            batched: result.bits.batched(),
            data: result.data.clone(),
        }
    }
}

/// Answer of `resolve`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// Normalized name
    pub name: String,
    /// Suffix the authority was found on
    pub basename: String,
    /// Node of the name
    pub node: Node,
    /// Node of the basename
    pub basenode: Node,
    /// Authority address
    pub authority: Address,
    /// Whether the authority is extended
    pub extended: bool,
    /// Whether an authority was found
    pub found: bool,
    /// Records in query order
    pub records: Vec<RecordResponse>,
}

impl From<&Resolution> for ResolveResponse {
    fn from(resolution: &Resolution) -> Self {
        Self {
            name: resolution.name.name().to_string(),
            basename: resolution.basename().to_string(),
            node: resolution.binding.node,
            basenode: resolution.binding.basenode,
            authority: resolution.binding.authority,
            extended: resolution.binding.extended(),
            found: resolution.binding.found,
            records: resolution.records.iter().map(RecordResponse::from).collect(),
        }
    }
}

/// Answer of `reverse`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReverseResponse {
    /// Reverse leg
    pub reverse_leg: ResolveResponse,
    /// Forward leg, empty root lookup when no name was claimed
    pub forward_leg: ResolveResponse,
    /// Verified primary name
    pub verified_name: Option<String>,
    /// Verdict
    pub status: PrimaryNameStatus,
}

impl From<&PrimaryName> for ReverseResponse {
    fn from(primary: &PrimaryName) -> Self {
        Self {
            reverse_leg: ResolveResponse::from(&primary.reverse_leg),
            forward_leg: ResolveResponse::from(&primary.forward_leg),
            verified_name: primary.verified_name.clone(),
            status: primary.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::AuthorityBinding;
    use ur_core::{EncodedName, Error};

    #[test]
    fn test_resolve_response_json() {
        let name = EncodedName::parse("nobody.eth").unwrap();
        let resolution = Resolution {
            binding: AuthorityBinding::unwalked(&name),
            records: vec![RecordResult::failed(
                &Error::NoAuthorityFound("nobody.eth".to_string()),
                false,
                false,
            )],
            name,
        };
        let json = serde_json::to_value(ResolveResponse::from(&resolution)).unwrap();
        assert_eq!(json["name"], "nobody.eth");
        assert_eq!(json["basename"], "nobody.eth");
        assert_eq!(json["found"], false);
        assert_eq!(json["authority"], "0x0000000000000000000000000000000000000000");
        assert_eq!(json["records"][0]["error"], true);
        assert!(json["records"][0]["data"].as_str().unwrap().starts_with("0x08c379a0"));
    }
}
