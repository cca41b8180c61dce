//! Hierarchical names: normalization, DNS wire encoding and suffix nodes

use crate::{Error, Node, Result};

/// Longest DNS-encoded name accepted
pub const MAX_ENCODED_LEN: usize = 255;

/// A normalized name with its DNS encoding and per-suffix namehash nodes.
///
/// Byte offsets are shared between the dotted form and the DNS form: a label
/// starting at byte `offset` of the dotted name has its length prefix at byte
/// `offset` of [`EncodedName::dns_encoded`], so `name[offset..]` is the suffix.
/// The root suffix points at the terminating zero byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedName {
    name: String,
    dns: Vec<u8>,
    /// `(offset, node)` for every suffix, most specific first, root last
    suffixes: Vec<(usize, Node)>,
}

impl EncodedName {
    /// The root name
    pub fn root() -> Self {
        Self {
            name: String::new(),
            dns: vec![0],
            suffixes: vec![(0, Node::ROOT)],
        }
    }

    /// Normalize and encode a dotted name. The empty string is the root.
    pub fn parse(input: &str) -> Result<Self> {
        let name = input.trim().trim_end_matches('.').to_lowercase();
        if name.is_empty() {
            return Ok(Self::root());
        }

        let labels: Vec<&str> = name.split('.').collect();
        let mut dns = Vec::with_capacity(name.len() + 2);
        for label in &labels {
            if label.is_empty() {
                return Err(Error::InvalidName(format!("empty label in {:?}", input)));
            }
            let len = u8::try_from(label.len())
                .map_err(|_| Error::InvalidName(format!("label too long: {}", label)))?;
            dns.push(len);
            dns.extend_from_slice(label.as_bytes());
        }
        dns.push(0);
        if dns.len() > MAX_ENCODED_LEN {
            return Err(Error::InvalidName(format!(
                "encoded name is {} bytes (max {})",
                dns.len(),
                MAX_ENCODED_LEN
            )));
        }

        // hash from the root upwards, then lay out most specific first;
        // the root sits on the terminating zero byte
        let mut suffixes = Vec::with_capacity(labels.len() + 1);
        suffixes.push((dns.len() - 1, Node::ROOT));
        let mut node = Node::ROOT;
        let mut end = name.len();
        for label in labels.iter().rev() {
            node = node.child(label);
            let start = end - label.len();
            suffixes.push((start, node));
            end = start.saturating_sub(1);
        }
        suffixes.reverse();

        Ok(Self { name, dns, suffixes })
    }

    /// Normalized dotted name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// DNS wire encoding
    pub fn dns_encoded(&self) -> &[u8] {
        &self.dns
    }

    /// Namehash of the full name
    pub fn node(&self) -> Node {
        self.suffixes[0].1
    }

    /// Number of labels
    pub fn label_count(&self) -> usize {
        self.suffixes.len() - 1
    }

    /// Iterate labels left to right
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.name.split('.').filter(|label| !label.is_empty())
    }

    /// `(offset, node)` of every suffix, full name first, root last
    pub fn suffixes(&self) -> &[(usize, Node)] {
        &self.suffixes
    }

    /// Dotted suffix starting at a byte offset
    pub fn suffix(&self, offset: usize) -> &str {
        self.name.get(offset..).unwrap_or("")
    }
}

impl std::fmt::Display for EncodedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
