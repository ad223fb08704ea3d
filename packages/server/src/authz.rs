//! Access control for document requests.
//!
//! The server does not authenticate. An upstream proxy asserts the
//! requester's identity (see the `identityHeader` setting) and the
//! [`Authorizer`] decides whether that identity may perform the method on
//! the addressed document.

use crate::request::Method;
use crate::store::DocumentKey;
use std::collections::HashSet;
use xcap_uri::Context;

pub trait Authorizer: Send + Sync {
    fn authorize(&self, identity: Option<&str>, key: &DocumentKey, method: Method) -> bool;
}

/// Per-user documents are accessible to their owner only. Global documents
/// are readable by any identified requester and never writable. Usages
/// listed as public can be read without an identity.
#[derive(Debug, Clone, Default)]
pub struct OwnerPolicy {
    public_get_auids: HashSet<String>,
}

impl OwnerPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public_get(mut self, auid: impl Into<String>) -> Self {
        self.public_get_auids.insert(auid.into());
        self
    }
}

impl Authorizer for OwnerPolicy {
    fn authorize(&self, identity: Option<&str>, key: &DocumentKey, method: Method) -> bool {
        if method == Method::Get && self.public_get_auids.contains(&key.auid) {
            return true;
        }
        let Some(identity) = identity else {
            return false;
        };

        match &key.context {
            Context::Users(owner) => owner == identity,
            Context::Global => method == Method::Get,
        }
    }
}

/// Grants everything; for tests and trusted deployments
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _identity: Option<&str>, _key: &DocumentKey, _method: Method) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOB: &str = "sip:bob@example.com";

    fn bob_lists() -> DocumentKey {
        DocumentKey::new("resource-lists", Context::Users(BOB.into()), "index")
    }

    fn caps() -> DocumentKey {
        DocumentKey::new("xcap-caps", Context::Global, "index")
    }

    #[test]
    fn test_owner_only() {
        let policy = OwnerPolicy::new();

        for method in [Method::Get, Method::Put, Method::Delete] {
            assert!(policy.authorize(Some(BOB), &bob_lists(), method));
            assert!(!policy.authorize(Some("sip:alice@example.com"), &bob_lists(), method));
            assert!(!policy.authorize(None, &bob_lists(), method));
        }
    }

    #[test]
    fn test_global_documents_are_read_only() {
        let policy = OwnerPolicy::new();

        assert!(policy.authorize(Some(BOB), &caps(), Method::Get));
        assert!(!policy.authorize(Some(BOB), &caps(), Method::Put));
        assert!(!policy.authorize(None, &caps(), Method::Get));
    }

    #[test]
    fn test_public_reads() {
        let policy = OwnerPolicy::new().with_public_get("xcap-caps");

        assert!(policy.authorize(None, &caps(), Method::Get));
        assert!(!policy.authorize(None, &caps(), Method::Delete));
        assert!(!policy.authorize(None, &bob_lists(), Method::Get));
    }

    #[test]
    fn test_allow_all() {
        assert!(AllowAll.authorize(None, &bob_lists(), Method::Delete));
    }
}
