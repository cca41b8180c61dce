//! Record queries, typed answers and per-record results

use crate::abi::{self, ParamType, Token, TokenExt};
use crate::offchain::{decode_batched_errors, encode_batched_errors, ERROR_STRING_SIGNATURE};
use crate::{selector, Error, GatewayError, Node, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A typed profile query, addressed by node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordQuery {
    /// `addr(bytes32)` when `coin_type` is `None`, else `addr(bytes32,uint256)`
    Addr {
        /// Coin type of the requested address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coin_type: Option<u64>,
    },
    /// `text(bytes32,string)`
    Text {
        /// Text record key
        key: String,
    },
    /// `contenthash(bytes32)`
    #[serde(rename = "contenthash")]
    ContentHash,
    /// `name(bytes32)`
    Name,
    /// `pubkey(bytes32)`
    #[serde(rename = "pubkey")]
    PubKey,
    /// Arbitrary `fn(bytes32)` profile
    Unknown {
        /// Canonical signature, e.g. `dne(bytes32)`
        signature: String,
    },
    /// Caller-encoded calldata, forwarded unchanged
    Call {
        /// Selector and arguments
        #[serde(with = "crate::serde_hex")]
        data: Vec<u8>,
    },
}

/// Signature of the multicall wrapper accepted by [`unpack_multicall`]
pub const MULTICALL_SIGNATURE: &str = "multicall(bytes[])";

/// Encode `multicall(bytes[])` calldata
pub fn pack_multicall(calls: &[Vec<u8>]) -> Vec<u8> {
    abi::encode_call(
        selector(MULTICALL_SIGNATURE),
        &[Token::Array(calls.iter().cloned().map(Token::Bytes).collect())],
    )
}

/// Split `multicall(bytes[])` calldata into its calls, `None` for any other call
pub fn unpack_multicall(data: &[u8]) -> Option<Result<Vec<Vec<u8>>>> {
    let (sel, args) = abi::split_selector(data)?;
    if sel != selector(MULTICALL_SIGNATURE) {
        return None;
    }
    Some(
        abi::decode_single(ParamType::Array(Box::new(ParamType::Bytes)), args)
            .and_then(TokenExt::take_items)
            .and_then(|items| items.into_iter().map(TokenExt::take_bytes).collect()),
    )
}

/// ABI `bytes[]` of the per-call answers, the return value of a multicall
pub fn encode_multicall_answers(answers: &[Vec<u8>]) -> Vec<u8> {
    abi::encode(&[Token::Array(answers.iter().cloned().map(Token::Bytes).collect())])
}

impl RecordQuery {
    /// Address query for a coin type
    pub fn addr(coin_type: u64) -> Self {
        RecordQuery::Addr {
            coin_type: Some(coin_type),
        }
    }

    /// Text query for a key
    pub fn text(key: impl Into<String>) -> Self {
        RecordQuery::Text { key: key.into() }
    }

    /// Raw calldata query
    pub fn call(data: impl Into<Vec<u8>>) -> Self {
        RecordQuery::Call { data: data.into() }
    }

    /// Canonical signature of the profile function, `call` for raw calldata
    pub fn signature(&self) -> &str {
        match self {
            RecordQuery::Addr { coin_type: None } => "addr(bytes32)",
            RecordQuery::Addr { coin_type: Some(_) } => "addr(bytes32,uint256)",
            RecordQuery::Text { .. } => "text(bytes32,string)",
            RecordQuery::ContentHash => "contenthash(bytes32)",
            RecordQuery::Name => "name(bytes32)",
            RecordQuery::PubKey => "pubkey(bytes32)",
            RecordQuery::Unknown { signature } => signature,
            RecordQuery::Call { .. } => "call",
        }
    }

    /// Encode calldata for `node`. Raw calldata is returned as given and
    /// must carry at least a selector.
    pub fn encode_call(&self, node: &Node) -> Result<Vec<u8>> {
        let node = Token::FixedBytes(node.as_bytes().to_vec());
        let args = match self {
            RecordQuery::Call { data } => {
                if data.len() < 4 {
                    return Err(Error::UnsupportedRecordKind(format!(
                        "calldata of {} bytes has no selector",
                        data.len()
                    )));
                }
                return Ok(data.clone());
            }
            RecordQuery::Addr { coin_type: Some(ct) } => vec![node, abi::uint(*ct)],
            RecordQuery::Text { key } => vec![node, Token::String(key.clone())],
            RecordQuery::Unknown { signature } => {
                if !is_node_only_signature(signature) {
                    return Err(Error::UnsupportedRecordKind(signature.clone()));
                }
                vec![node]
            }
            _ => vec![node],
        };
        Ok(abi::encode_call(selector(self.signature()), &args))
    }

    /// Decode a successful answer
    pub fn decode(&self, data: &[u8]) -> Result<RecordValue> {
        match self {
            RecordQuery::Addr { coin_type: None } => {
                let addr = abi::decode_single(ParamType::Address, data)?.take_address()?;
                if addr.is_zero() {
                    Ok(RecordValue::Address(Vec::new()))
                } else {
                    Ok(RecordValue::Address(addr.as_bytes().to_vec()))
                }
            }
            RecordQuery::Addr { coin_type: Some(_) } => Ok(RecordValue::Address(
                abi::decode_single(ParamType::Bytes, data)?.take_bytes()?,
            )),
            RecordQuery::Text { .. } => Ok(RecordValue::Text(
                abi::decode_single(ParamType::String, data)?.take_string()?,
            )),
            RecordQuery::ContentHash => Ok(RecordValue::ContentHash(
                abi::decode_single(ParamType::Bytes, data)?.take_bytes()?,
            )),
            RecordQuery::Name => Ok(RecordValue::Name(
                abi::decode_single(ParamType::String, data)?.take_string()?,
            )),
            RecordQuery::PubKey => {
                let mut tokens = abi::decode(
                    &[ParamType::FixedBytes(32), ParamType::FixedBytes(32)],
                    data,
                )?
                .into_iter();
                let (Some(x), Some(y)) = (tokens.next(), tokens.next()) else {
                    return Err(Error::Abi("pubkey needs x and y".to_string()));
                };
                Ok(RecordValue::PubKey {
                    x: x.take_bytes()?,
                    y: y.take_bytes()?,
                })
            }
            RecordQuery::Unknown { .. } | RecordQuery::Call { .. } => {
                Ok(RecordValue::Raw(data.to_vec()))
            }
        }
    }
}

fn is_node_only_signature(signature: &str) -> bool {
    signature
        .strip_suffix("(bytes32)")
        .map(|ident| {
            !ident.is_empty()
                && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !ident.starts_with(|c: char| c.is_ascii_digit())
        })
        .unwrap_or(false)
}

impl fmt::Display for RecordQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordQuery::Addr { coin_type: None } => write!(f, "addr"),
            RecordQuery::Addr { coin_type: Some(ct) } => write!(f, "addr:{}", ct),
            RecordQuery::Text { key } => write!(f, "text:{}", key),
            RecordQuery::ContentHash => write!(f, "contenthash"),
            RecordQuery::Name => write!(f, "name"),
            RecordQuery::PubKey => write!(f, "pubkey"),
            RecordQuery::Unknown { signature } => write!(f, "{}", signature),
            RecordQuery::Call { data } => write!(f, "call:0x{}", hex::encode(data)),
        }
    }
}

impl FromStr for RecordQuery {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(arg) = s.strip_prefix("addr:") {
            let coin_type = match arg.strip_prefix("0x") {
                Some(digits) => u64::from_str_radix(digits, 16),
                None => arg.parse(),
            }
            .map_err(|e| Error::UnsupportedRecordKind(format!("{}: {}", s, e)))?;
            return Ok(RecordQuery::addr(coin_type));
        }
        if let Some(key) = s.strip_prefix("text:") {
            return Ok(RecordQuery::text(key));
        }
        if let Some(data) = s.strip_prefix("call:") {
            let data = crate::parse_hex_bytes(data)
                .map_err(|e| Error::UnsupportedRecordKind(format!("{}: {}", s, e)))?;
            return Ok(RecordQuery::call(data));
        }
        match s {
            "addr" => Ok(RecordQuery::Addr { coin_type: None }),
            "contenthash" => Ok(RecordQuery::ContentHash),
            "name" => Ok(RecordQuery::Name),
            "pubkey" => Ok(RecordQuery::PubKey),
            other if other.contains('(') => Ok(RecordQuery::Unknown {
                signature: other.to_string(),
            }),
            other => Err(Error::UnsupportedRecordKind(other.to_string())),
        }
    }
}

/// Typed record answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RecordValue {
    /// Address bytes, empty when unset
    Address(#[serde(with = "crate::serde_hex")] Vec<u8>),
    /// Text value
    Text(String),
    /// Content hash bytes
    ContentHash(#[serde(with = "crate::serde_hex")] Vec<u8>),
    /// Reverse name
    Name(String),
    /// Public key coordinates
    PubKey {
        /// x coordinate
        #[serde(with = "crate::serde_hex")]
        x: Vec<u8>,
        /// y coordinate
        #[serde(with = "crate::serde_hex")]
        y: Vec<u8>,
    },
    /// Undecoded answer of an unknown profile
    Raw(#[serde(with = "crate::serde_hex")] Vec<u8>),
}

impl RecordValue {
    /// True for an unset record
    pub fn is_empty(&self) -> bool {
        match self {
            RecordValue::Address(b) | RecordValue::ContentHash(b) | RecordValue::Raw(b) => {
                b.is_empty()
            }
            RecordValue::Text(s) | RecordValue::Name(s) => s.is_empty(),
            RecordValue::PubKey { x, y } => {
                x.iter().all(|b| *b == 0) && y.iter().all(|b| *b == 0)
            }
        }
    }
}

/// Status flags of a record result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusBits(pub u8);

impl StatusBits {
    /// The request for this record failed
    pub const ERROR: u8 = 1;
    /// The answer needed at least one off-chain round trip
    pub const OFFCHAIN: u8 = 2;
    /// The answer came through the batch gateway
    pub const BATCHED: u8 = 4;

    /// Build from the three flags
    pub fn new(error: bool, offchain: bool, batched: bool) -> Self {
        let mut bits = 0;
        if error {
            bits |= Self::ERROR;
        }
        if offchain {
            bits |= Self::OFFCHAIN;
        }
        if batched {
            bits |= Self::BATCHED;
        }
        StatusBits(bits)
    }

    /// Error flag
    pub fn error(&self) -> bool {
        self.0 & Self::ERROR != 0
    }

    /// Offchain flag
    pub fn offchain(&self) -> bool {
        self.0 & Self::OFFCHAIN != 0
    }

    /// Batched flag
    pub fn batched(&self) -> bool {
        self.0 & Self::BATCHED != 0
    }
}

/// Outcome of one record query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResult {
    /// Status flags
    pub bits: StatusBits,
    /// ABI-encoded answer, or diagnostic payload when `bits.error()`
    #[serde(with = "crate::serde_hex")]
    pub data: Vec<u8>,
}

/// Decoded diagnostic payload of a failed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFailure {
    /// `Error(string)` message
    Message(String),
    /// Per-sub-request gateway errors
    Batch(Vec<GatewayError>),
    /// Raw revert data from the authority
    Revert(Vec<u8>),
}

impl RecordResult {
    /// Successful answer
    pub fn ok(data: Vec<u8>, offchain: bool, batched: bool) -> Self {
        Self {
            bits: StatusBits::new(false, offchain, batched),
            data,
        }
    }

    /// Failed record. Batched failures carry `HttpError((uint16,string)[])`,
    /// reverts their raw data and anything else `Error(string)`.
    pub fn failed(err: &Error, offchain: bool, batched: bool) -> Self {
        let data = if batched {
            encode_batched_errors(&err.gateway_errors())
        } else {
            match err {
                Error::ProfileReverted(data) | Error::ResumptionReverted(data) => data.clone(),
                other => abi::encode_call(
                    selector(ERROR_STRING_SIGNATURE),
                    &[Token::String(other.to_string())],
                ),
            }
        };
        Self {
            bits: StatusBits::new(true, offchain, batched),
            data,
        }
    }

    /// Whether the record failed
    pub fn is_error(&self) -> bool {
        self.bits.error()
    }

    /// Decode the diagnostic payload of a failed record
    pub fn failure(&self) -> Option<RecordFailure> {
        if !self.bits.error() {
            return None;
        }
        if self.bits.batched() {
            if let Some(errors) = decode_batched_errors(&self.data) {
                return Some(RecordFailure::Batch(errors));
            }
        }
        if let Some((sel, args)) = abi::split_selector(&self.data) {
            if sel == selector(ERROR_STRING_SIGNATURE) {
                if let Ok(message) =
                    abi::decode_single(ParamType::String, args).and_then(TokenExt::take_string)
                {
                    return Some(RecordFailure::Message(message));
                }
            }
        }
        Some(RecordFailure::Revert(self.data.clone()))
    }

    /// Decode a successful answer for `query`
    pub fn value(&self, query: &RecordQuery) -> Option<RecordValue> {
        if self.bits.error() {
            return None;
        }
        query.decode(&self.data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Address;

    #[test]
    fn test_parse_query_strings() {
        assert_eq!("addr".parse::<RecordQuery>().unwrap(), RecordQuery::Addr { coin_type: None });
        assert_eq!("addr:60".parse::<RecordQuery>().unwrap(), RecordQuery::addr(60));
        assert_eq!(
            "addr:0x80000000".parse::<RecordQuery>().unwrap(),
            RecordQuery::addr(0x8000_0000)
        );
        assert_eq!(
            "text:com.github".parse::<RecordQuery>().unwrap(),
            RecordQuery::text("com.github")
        );
        assert_eq!(
            "dne(bytes32)".parse::<RecordQuery>().unwrap(),
            RecordQuery::Unknown {
                signature: "dne(bytes32)".to_string()
            }
        );
        assert!("avatar".parse::<RecordQuery>().is_err());
        assert!("addr:sixty".parse::<RecordQuery>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for s in ["addr", "addr:60", "text:avatar", "contenthash", "name", "pubkey", "dne(bytes32)"] {
            let query: RecordQuery = s.parse().unwrap();
            assert_eq!(query.to_string(), s);
        }
    }

    #[test]
    fn test_encode_addr_calls() {
        let node = Node::namehash("nick.eth");
        let legacy = RecordQuery::Addr { coin_type: None }.encode_call(&node).unwrap();
        assert_eq!(&legacy[..4], &[0x3b, 0x3b, 0x57, 0xde]);
        assert_eq!(legacy.len(), 36);

        let multi = RecordQuery::addr(60).encode_call(&node).unwrap();
        assert_eq!(&multi[..4], &[0xf1, 0xcb, 0x7e, 0x06]);
        assert_eq!(&multi[4..36], node.as_bytes());
        assert_eq!(multi[67], 60);
    }

    #[test]
    fn test_unknown_kind_must_take_node_only() {
        let node = Node::ROOT;
        assert!(RecordQuery::Unknown {
            signature: "dne(bytes32)".to_string()
        }
        .encode_call(&node)
        .is_ok());
        for bad in ["dne(bytes32,string)", "(bytes32)", "1x(bytes32)", "a b(bytes32)"] {
            let err = RecordQuery::Unknown {
                signature: bad.to_string(),
            }
            .encode_call(&node)
            .unwrap_err();
            assert!(matches!(err, Error::UnsupportedRecordKind(_)));
        }
    }

    #[test]
    fn test_decode_values() {
        let addr = Address([0x51; 20]);
        let data = abi::encode(&[abi::address(addr)]);
        assert_eq!(
            RecordQuery::Addr { coin_type: None }.decode(&data).unwrap(),
            RecordValue::Address(vec![0x51; 20])
        );
        let zero = abi::encode(&[abi::address(Address::ZERO)]);
        assert!(RecordQuery::Addr { coin_type: None }.decode(&zero).unwrap().is_empty());

        let text = abi::encode(&[Token::String("nick".to_string())]);
        assert_eq!(
            RecordQuery::text("com.github").decode(&text).unwrap(),
            RecordValue::Text("nick".to_string())
        );

        let pubkey = abi::encode(&[
            Token::FixedBytes(vec![1; 32]),
            Token::FixedBytes(vec![2; 32]),
        ]);
        assert_eq!(
            RecordQuery::PubKey.decode(&pubkey).unwrap(),
            RecordValue::PubKey {
                x: vec![1; 32],
                y: vec![2; 32]
            }
        );
    }

    #[test]
    fn test_status_bits() {
        let bits = StatusBits::new(true, true, false);
        assert_eq!(bits.0, 3);
        assert!(bits.error() && bits.offchain() && !bits.batched());
        assert_eq!(StatusBits::new(false, true, true).0, 6);
    }

    #[test]
    fn test_failed_message_payload() {
        let result = RecordResult::failed(&Error::NoAuthorityFound("x.eth".to_string()), false, false);
        assert!(result.is_error());
        match result.failure().unwrap() {
            RecordFailure::Message(msg) => assert!(msg.contains("x.eth")),
            other => panic!("unexpected failure {:?}", other),
        }
        assert!(result.value(&RecordQuery::Name).is_none());
    }

    #[test]
    fn test_failed_revert_payload() {
        let result = RecordResult::failed(&Error::ProfileReverted(vec![0xab, 0xcd]), false, false);
        assert_eq!(result.data, vec![0xab, 0xcd]);
        assert_eq!(result.failure(), Some(RecordFailure::Revert(vec![0xab, 0xcd])));
    }

    #[test]
    fn test_failed_batched_payload() {
        let err = Error::BatchPartialFailure(vec![GatewayError::new(404, "unsupported")]);
        let result = RecordResult::failed(&err, true, true);
        assert_eq!(result.bits.0, 7);
        assert_eq!(
            result.failure(),
            Some(RecordFailure::Batch(vec![GatewayError::new(404, "unsupported")]))
        );
    }

    #[test]
    fn test_query_serde() {
        let json = serde_json::to_string(&RecordQuery::addr(60)).unwrap();
        assert_eq!(json, r#"{"kind":"addr","coin_type":60}"#);
        let back: RecordQuery = serde_json::from_str(r#"{"kind":"text","key":"avatar"}"#).unwrap();
        assert_eq!(back, RecordQuery::text("avatar"));
        let legacy: RecordQuery = serde_json::from_str(r#"{"kind":"addr"}"#).unwrap();
        assert_eq!(legacy, RecordQuery::Addr { coin_type: None });
    }

    #[test]
    fn test_call_query_forwards_calldata() {
        let node = Node::namehash("nick.eth");
        let calldata = RecordQuery::text("avatar").encode_call(&node).unwrap();
        let query = RecordQuery::call(calldata.clone());
        assert_eq!(query.encode_call(&Node::ROOT).unwrap(), calldata);

        let answer = abi::encode(&[Token::String("ipfs://x".to_string())]);
        assert_eq!(query.decode(&answer).unwrap(), RecordValue::Raw(answer.clone()));

        let err = RecordQuery::call(vec![0x01, 0x02]).encode_call(&node).unwrap_err();
        assert!(matches!(err, Error::UnsupportedRecordKind(_)));
    }

    #[test]
    fn test_call_query_strings() {
        let query: RecordQuery = "call:0x3b3b57de".parse().unwrap();
        assert_eq!(query, RecordQuery::call(vec![0x3b, 0x3b, 0x57, 0xde]));
        assert_eq!(query.to_string(), "call:0x3b3b57de");
        assert!("call:zz".parse::<RecordQuery>().is_err());

        let json = serde_json::to_string(&query).unwrap();
        assert_eq!(json, r#"{"kind":"call","data":"0x3b3b57de"}"#);
        assert_eq!(serde_json::from_str::<RecordQuery>(&json).unwrap(), query);
    }

    #[test]
    fn test_multicall_packing() {
        let calls = vec![vec![0x3b, 0x3b, 0x57, 0xde, 1], vec![0x59, 0xd1, 0xd4, 0x3c]];
        let packed = pack_multicall(&calls);
        assert_eq!(&packed[..4], &selector(MULTICALL_SIGNATURE));
        assert_eq!(unpack_multicall(&packed).unwrap().unwrap(), calls);

        assert!(unpack_multicall(&calls[0]).is_none());
        assert!(unpack_multicall(&[0x01]).is_none());

        let truncated = &packed[..packed.len() - 40];
        assert!(unpack_multicall(truncated).unwrap().is_err());

        let answers = encode_multicall_answers(&[vec![1], vec![]]);
        let decoded = abi::decode_single(ParamType::Array(Box::new(ParamType::Bytes)), &answers)
            .unwrap();
        assert_eq!(decoded, Token::Array(vec![Token::Bytes(vec![1]), Token::Bytes(vec![])]));
    }
}
