//! Name walker: finds the most specific suffix with an authority

use crate::backend::{Registry, ResolverKind};
use serde::Serialize;
use tracing::debug;
use ur_core::{Address, EncodedName, Node, Result};

/// Result of walking a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorityBinding {
    /// Byte offset of the authoritative suffix
    pub basename_offset: usize,
    /// Node of the full name
    pub node: Node,
    /// Node of the authoritative suffix
    pub basenode: Node,
    /// Authority address, zero when none was found
    pub authority: Address,
    /// Authority capability
    pub kind: ResolverKind,
    /// Whether any suffix has an authority
    pub found: bool,
}

impl AuthorityBinding {
    /// Binding for a name that was not walked (or had no authority)
    pub fn unwalked(name: &EncodedName) -> Self {
        Self {
            basename_offset: 0,
            node: name.node(),
            basenode: name.node(),
            authority: Address::ZERO,
            kind: ResolverKind::ExactMatch,
            found: false,
        }
    }

    /// Whether the authority accepts wildcard queries
    pub fn extended(&self) -> bool {
        self.kind.is_extended()
    }

    /// Whether the authority was found on a strict suffix of the name
    pub fn is_wildcard(&self) -> bool {
        self.basename_offset > 0
    }
}

/// Walk `name` from the full name down to the root; the first non-zero
/// authority wins.
pub async fn walk(registry: &dyn Registry, name: &EncodedName) -> Result<AuthorityBinding> {
    for (offset, basenode) in name.suffixes() {
        let authority = match registry.lookup(basenode).await? {
            Some(addr) if !addr.is_zero() => addr,
            _ => continue,
        };
        let kind = registry.capabilities(&authority).await?;
        debug!(
            "Authority for {} found at {:?} ({}): {:?}",
            name,
            name.suffix(*offset),
            authority,
            kind
        );
        return Ok(AuthorityBinding {
            basename_offset: *offset,
            node: name.node(),
            basenode: *basenode,
            authority,
            kind,
            found: true,
        });
    }

    debug!("No authority for {}", name);
    Ok(AuthorityBinding::unwalked(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRegistry;

    #[tokio::test]
    async fn test_most_specific_suffix_wins() {
        let registry = MemoryRegistry::new();
        registry.set_authority("eth", Address([1; 20]), ResolverKind::ExactMatch);
        registry.set_authority("base.eth", Address([2; 20]), ResolverKind::Extended);

        let name = EncodedName::parse("raffy.base.eth").unwrap();
        let binding = walk(&registry, &name).await.unwrap();
        assert!(binding.found);
        assert_eq!(binding.authority, Address([2; 20]));
        assert_eq!(binding.basename_offset, 6);
        assert_eq!(binding.basenode, Node::namehash("base.eth"));
        assert_eq!(binding.node, Node::namehash("raffy.base.eth"));
        assert!(binding.extended());
        assert!(binding.is_wildcard());
    }

    #[tokio::test]
    async fn test_exact_name_has_offset_zero() {
        let registry = MemoryRegistry::new();
        registry.set_authority("nick.eth", Address([3; 20]), ResolverKind::ExactMatch);
        registry.set_authority("eth", Address([1; 20]), ResolverKind::ExactMatch);

        let name = EncodedName::parse("nick.eth").unwrap();
        let binding = walk(&registry, &name).await.unwrap();
        assert_eq!(binding.basename_offset, 0);
        assert_eq!(binding.authority, Address([3; 20]));
        assert!(!binding.is_wildcard());
    }

    #[tokio::test]
    async fn test_zero_authority_is_skipped() {
        let registry = MemoryRegistry::new();
        registry.set_authority("a.eth", Address::ZERO, ResolverKind::ExactMatch);
        registry.set_authority("eth", Address([1; 20]), ResolverKind::ExactMatch);

        let name = EncodedName::parse("a.eth").unwrap();
        let binding = walk(&registry, &name).await.unwrap();
        assert_eq!(binding.authority, Address([1; 20]));
        assert_eq!(binding.basename_offset, 2);
    }

    #[tokio::test]
    async fn test_root_authority_counts() {
        let registry = MemoryRegistry::new();
        registry.set_authority("", Address([9; 20]), ResolverKind::Extended);

        let name = EncodedName::parse("x.y").unwrap();
        let binding = walk(&registry, &name).await.unwrap();
        assert!(binding.found);
        assert_eq!(binding.basenode, Node::ROOT);
        assert_eq!(binding.basename_offset, 4);
    }

    #[tokio::test]
    async fn test_not_found() {
        let registry = MemoryRegistry::new();
        let name = EncodedName::parse("nobody.eth").unwrap();
        let binding = walk(&registry, &name).await.unwrap();
        assert!(!binding.found);
        assert!(binding.authority.is_zero());
        assert_eq!(registry.lookup_count(), 3);
    }
}
