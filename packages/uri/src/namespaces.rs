//! Namespace prefix bindings supplied alongside a request URI, and the
//! lookup the parser uses to find an application usage's default namespace.

use crate::error::{UriError, UriResult};
use std::collections::BTreeMap;

/// Prefix → namespace URI bindings for resolving prefixed selector names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceBindings {
    bindings: BTreeMap<String, String>,
}

impl NamespaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.insert(prefix, uri);
        self
    }

    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Parse the query component form `xmlns(p=urn:x)xmlns(q=urn:y)`.
    ///
    /// The query must already be percent-decoded.
    pub fn from_query(query: &str) -> UriResult<Self> {
        let mut bindings = Self::new();
        let mut rest = query.trim();

        while !rest.is_empty() {
            let body = rest
                .strip_prefix("xmlns(")
                .ok_or_else(|| UriError::InvalidNamespaceQuery(rest.to_string()))?;
            let close = body
                .find(')')
                .ok_or_else(|| UriError::InvalidNamespaceQuery(rest.to_string()))?;
            let (prefix, uri) = body[..close]
                .split_once('=')
                .ok_or_else(|| UriError::InvalidNamespaceQuery(body[..close].to_string()))?;

            let prefix = prefix.trim();
            let uri = uri.trim();
            if prefix.is_empty() || uri.is_empty() {
                return Err(UriError::InvalidNamespaceQuery(body[..close].to_string()));
            }

            bindings.insert(prefix, uri);
            rest = body[close + 1..].trim_start_matches('&').trim_start();
        }

        Ok(bindings)
    }

    /// Render back to the `xmlns()` query form
    pub fn to_query(&self) -> String {
        self.iter()
            .map(|(prefix, uri)| format!("xmlns({}={})", prefix, uri))
            .collect()
    }
}

/// Knows which application usages exist and their default namespaces
pub trait UsageResolver {
    /// Default element namespace of `auid`, or `None` if the usage is unknown
    fn default_namespace(&self, auid: &str) -> Option<&str>;
}

impl UsageResolver for [(&str, &str)] {
    fn default_namespace(&self, auid: &str) -> Option<&str> {
        self.iter()
            .find(|(id, _)| *id == auid)
            .map(|(_, namespace)| *namespace)
    }
}

impl<const N: usize> UsageResolver for [(&str, &str); N] {
    fn default_namespace(&self, auid: &str) -> Option<&str> {
        self.as_slice().default_namespace(auid)
    }
}
