//! Solidity ABI helpers over `ethers-core`
//!
//! Encoding and decoding are done by `ethers_core::abi`. Data from
//! authorities and gateways is untrusted, so [`decode`] first measures how
//! much the encoding would expand to and rejects payloads whose dynamic
//! offsets alias each other into more output than input.

use crate::{Address, Error, Result};
use ethers_core::types::{H160, U256};

pub use ethers_core::abi::{ParamType, Token};

const WORD: usize = 32;

/// `address` token
pub fn address(addr: Address) -> Token {
    Token::Address(H160::from(addr))
}

/// `uint256` token
pub fn uint(value: u64) -> Token {
    Token::Uint(U256::from(value))
}

/// `uint256` parameter
pub fn uint_type() -> ParamType {
    ParamType::Uint(256)
}

/// Typed extraction from decoded tokens
pub trait TokenExt: Sized {
    /// Take `bytes` or `bytesN` contents
    fn take_bytes(self) -> Result<Vec<u8>>;
    /// Take `string` contents
    fn take_string(self) -> Result<String>;
    /// Take an `address`
    fn take_address(self) -> Result<Address>;
    /// Take a `uint` that fits in 64 bits
    fn take_uint(self) -> Result<u64>;
    /// Take a `bool`
    fn take_bool(self) -> Result<bool>;
    /// Take array or tuple elements
    fn take_items(self) -> Result<Vec<Token>>;
}

fn unexpected(expected: &str, token: &Token) -> Error {
    Error::Abi(format!("expected {}, got {:?}", expected, token))
}

impl TokenExt for Token {
    fn take_bytes(self) -> Result<Vec<u8>> {
        match self {
            Token::Bytes(b) | Token::FixedBytes(b) => Ok(b),
            other => Err(unexpected("bytes", &other)),
        }
    }

    fn take_string(self) -> Result<String> {
        match self {
            Token::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }

    fn take_address(self) -> Result<Address> {
        match self {
            Token::Address(a) => Ok(Address::from(a)),
            other => Err(unexpected("address", &other)),
        }
    }

    fn take_uint(self) -> Result<u64> {
        match self {
            Token::Uint(v) if v <= U256::from(u64::MAX) => Ok(v.low_u64()),
            Token::Uint(v) => Err(Error::Abi(format!("integer {} exceeds 64 bits", v))),
            other => Err(unexpected("uint", &other)),
        }
    }

    fn take_bool(self) -> Result<bool> {
        match self {
            Token::Bool(v) => Ok(v),
            other => Err(unexpected("bool", &other)),
        }
    }

    fn take_items(self) -> Result<Vec<Token>> {
        match self {
            Token::Array(items) | Token::FixedArray(items) | Token::Tuple(items) => Ok(items),
            other => Err(unexpected("array or tuple", &other)),
        }
    }
}

/// Encode tokens as a tuple (function arguments or return values)
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    ethers_core::abi::encode(tokens)
}

/// Encode a call: selector followed by the encoded arguments
pub fn encode_call(selector: [u8; 4], args: &[Token]) -> Vec<u8> {
    let mut out = selector.to_vec();
    out.extend(encode(args));
    out
}

/// Decode a tuple of `types` from untrusted `data`
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>> {
    let mut budget = Budget {
        remaining: data.len(),
    };
    measure_seq(types.iter(), data, 0, &mut budget)?;
    ethers_core::abi::decode(types, data).map_err(|e| Error::Abi(e.to_string()))
}

/// Decode exactly one value
pub fn decode_single(ty: ParamType, data: &[u8]) -> Result<Token> {
    decode(&[ty], data)?
        .pop()
        .ok_or_else(|| Error::Abi("missing value".to_string()))
}

/// Split calldata or revert data into selector and arguments
pub fn split_selector(data: &[u8]) -> Option<([u8; 4], &[u8])> {
    if data.len() < 4 {
        return None;
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    Some((selector, &data[4..]))
}

/// Bytes the decoded value may still occupy.
///
/// A canonical encoding never materializes more than its own length: every
/// word and every byte string is stored once. Aliased offsets reuse the
/// same region and run the budget dry.
struct Budget {
    remaining: usize,
}

impl Budget {
    fn spend(&mut self, n: usize) -> Result<()> {
        self.remaining = self.remaining.checked_sub(n).ok_or_else(|| {
            Error::Abi("decoded size exceeds input size (aliased offsets)".to_string())
        })?;
        Ok(())
    }
}

fn is_dynamic(ty: &ParamType) -> bool {
    match ty {
        ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
        ParamType::FixedArray(inner, _) => is_dynamic(inner),
        ParamType::Tuple(types) => types.iter().any(is_dynamic),
        _ => false,
    }
}

fn head_size(ty: &ParamType) -> usize {
    match ty {
        ParamType::FixedArray(inner, n) if !is_dynamic(ty) => head_size(inner).saturating_mul(*n),
        ParamType::Tuple(types) if !is_dynamic(ty) => types.iter().map(head_size).sum(),
        _ => WORD,
    }
}

/// Read a length or offset word; neither can exceed the data
fn read_len(data: &[u8], at: usize) -> Result<usize> {
    let word = at
        .checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| Error::Abi(format!("data too short at offset {}", at)))?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(Error::Abi("length exceeds 64 bits".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    let value = usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| Error::Abi("length exceeds usize".to_string()))?;
    if value > data.len() {
        return Err(Error::Abi(format!("length {} out of range", value)));
    }
    Ok(value)
}

fn measure(ty: &ParamType, data: &[u8], at: usize, budget: &mut Budget) -> Result<()> {
    match ty {
        ParamType::Bytes | ParamType::String => {
            let len = read_len(data, at)?;
            budget.spend(WORD.saturating_add(len))
        }
        ParamType::Array(inner) => {
            let len = read_len(data, at)?;
            budget.spend(WORD)?;
            if len > data.len() / WORD {
                return Err(Error::Abi(format!("array length {} out of range", len)));
            }
            measure_seq(std::iter::repeat(inner.as_ref()).take(len), data, at + WORD, budget)
        }
        ParamType::FixedArray(inner, n) => {
            measure_seq(std::iter::repeat(inner.as_ref()).take(*n), data, at, budget)
        }
        ParamType::Tuple(types) => measure_seq(types.iter(), data, at, budget),
        _ => budget.spend(WORD),
    }
}

fn measure_seq<'a>(
    types: impl Iterator<Item = &'a ParamType>,
    data: &[u8],
    base: usize,
    budget: &mut Budget,
) -> Result<()> {
    let mut cursor = base;
    for ty in types {
        if is_dynamic(ty) {
            let at = base
                .checked_add(read_len(data, cursor)?)
                .ok_or_else(|| Error::Abi("offset overflow".to_string()))?;
            measure(ty, data, at, budget)?;
            cursor = cursor.saturating_add(WORD);
        } else {
            measure(ty, data, cursor, budget)?;
            cursor = cursor.saturating_add(head_size(ty));
        }
    }
    Ok(())
}
