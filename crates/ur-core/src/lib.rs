//! Universal resolver core types
//!
//! Name encoding and namehash, addresses, the ABI subset spoken by profile
//! authorities and gateways, record queries/results and the error taxonomy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod abi;
pub mod address;
pub mod error;
pub mod hash;
pub mod name;
pub mod offchain;
pub mod record;
pub mod serde_hex;

pub use address::{parse_hex_bytes, Address};
pub use error::{Error, ErrorCategory, Result};
pub use hash::{keccak256, selector, Node};
pub use name::EncodedName;
pub use offchain::{
    BatchQuery, BatchReply, DeferredAnswer, GatewayError, SubResponse, OFFCHAIN_LOOKUP_SIGNATURE,
};
pub use record::{
    encode_multicall_answers, pack_multicall, unpack_multicall, RecordFailure, RecordQuery,
    RecordResult, RecordValue, StatusBits, MULTICALL_SIGNATURE,
};
