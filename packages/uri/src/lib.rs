//! # XCAP URI
//!
//! Parses XCAP URIs (RFC 4825) into a document selector and an optional
//! node selector:
//!
//! ```text
//! resource-lists/users/sip:bob@example.com/index/~~/resource-lists/list[@name="friends"]/entry[2]
//! └─ auid ─────┘ └ ctx ┘└ owner ──────────────┘└doc┘    └─ node selector ──────────────────────────┘
//! ```
//!
//! Parsing is a pure function of the path, the namespace bindings sent with
//! the request, and the set of known application usages.

pub mod ast;
pub mod error;
pub mod namespaces;
pub mod parser;
pub mod serializer;
pub mod tokenizer;

pub use ast::{
    Context, DocumentSelector, ElementStep, ExpandedName, NameTest, NodeSelector, Predicate, QName,
    TerminalSelector, XcapUri,
};
pub use error::{UriError, UriResult};
pub use namespaces::{NamespaceBindings, UsageResolver};
pub use parser::{parse, parse_node_selector, NODE_SELECTOR_SEPARATOR};
