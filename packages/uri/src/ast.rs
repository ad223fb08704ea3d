//! Parsed XCAP URI structures.
//!
//! An [`XcapUri`] is immutable once produced by the parser. Names inside a
//! node selector are stored both as written (prefix) and resolved
//! ([`ExpandedName`]) so they can be matched against a document and
//! serialized back to the same text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace-qualified name, independent of the prefix used to write it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExpandedName {
    pub namespace: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.into(),
        }
    }

    /// Name in the given namespace
    pub fn ns(namespace: &str, local: impl Into<String>) -> Self {
        Self::new(Some(namespace), local)
    }

    /// Name without a namespace (typical for attributes)
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local)
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local == local
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// A name as written in a selector: optional prefix plus its resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    pub prefix: Option<String>,
    pub name: ExpandedName,
}

impl QName {
    pub fn new(prefix: Option<&str>, name: ExpandedName) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            name,
        }
    }

    /// `prefix:local` or `local`
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name.local),
            None => self.name.local.clone(),
        }
    }
}

/// Which document tree a document lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Context {
    /// Per-user tree, keyed by the owner's XUI
    Users(String),
    /// Global tree shared by all users
    Global,
}

impl Context {
    pub fn segment(&self) -> &'static str {
        match self {
            Context::Users(_) => "users",
            Context::Global => "global",
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            Context::Users(owner) => Some(owner),
            Context::Global => None,
        }
    }
}

/// Identifies a single document: app usage, context and document name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentSelector {
    pub auid: String,
    pub context: Context,
    /// Document name, possibly containing `/` for nested documents
    pub document: String,
}

impl DocumentSelector {
    pub fn new(auid: impl Into<String>, context: Context, document: impl Into<String>) -> Self {
        Self {
            auid: auid.into(),
            context,
            document: document.into(),
        }
    }

    /// Ordered path segments of the selector
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = vec![self.auid.as_str(), self.context.segment()];
        if let Context::Users(owner) = &self.context {
            segments.push(owner);
        }
        segments.extend(self.document.split('/'));
        segments
    }
}

/// Element name test: a qualified name or the `*` wildcard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameTest {
    Any,
    Name(QName),
}

impl NameTest {
    pub fn matches(&self, name: &ExpandedName) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Name(qname) => &qname.name == name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// `[n]`, 1-based
    Position(usize),
    /// `[@attr="value"]`
    AttributeEquals { name: QName, value: String },
}

/// One `/`-separated element step of a node selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementStep {
    pub name: NameTest,
    pub predicates: Vec<Predicate>,
}

impl ElementStep {
    pub fn named(name: QName) -> Self {
        Self {
            name: NameTest::Name(name),
            predicates: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// Non-element selection that may only appear as the last step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalSelector {
    /// `@name`
    Attribute(QName),
    /// `namespace::*`
    NamespaceBindings,
}

/// Node selector: at least one element step, optionally ending in an
/// attribute or namespace selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelector {
    pub steps: Vec<ElementStep>,
    pub terminal: Option<TerminalSelector>,
}

impl NodeSelector {
    /// The step whose result the selector addresses, when it is an element step
    pub fn terminal_element(&self) -> Option<&ElementStep> {
        match self.terminal {
            Some(_) => None,
            None => self.steps.last(),
        }
    }

    pub fn selects_attribute(&self) -> bool {
        matches!(self.terminal, Some(TerminalSelector::Attribute(_)))
    }

    pub fn selects_namespaces(&self) -> bool {
        matches!(self.terminal, Some(TerminalSelector::NamespaceBindings))
    }
}

/// A fully parsed XCAP URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XcapUri {
    pub document: DocumentSelector,
    pub node_selector: Option<NodeSelector>,
}

impl XcapUri {
    pub fn auid(&self) -> &str {
        &self.document.auid
    }

    pub fn context(&self) -> &Context {
        &self.document.context
    }
}
