//! # XCAP Document
//!
//! XML document model for XCAP: a tagged tree with resolved names, a
//! `quick-xml` based reader and writer, the node selector evaluator and
//! the splice mutations applied to working copies.
//!
//! ## Architecture
//!
//! ```text
//! bytes ──reader──▶ XmlTree ──evaluator(NodeSelector)──▶ Resolution
//!                     │                                       │
//!                     └──────────── Mutation::apply ◀─────────┘
//!                                        │
//!                                     writer ──▶ bytes
//! ```

pub mod errors;
pub mod evaluator;
pub mod mutations;
pub mod reader;
pub mod tree;
pub mod writer;

pub use errors::{EvalError, MutationError, XmlError, XmlResult};
pub use evaluator::{evaluate, InsertionPoint, Resolution};
pub use mutations::Mutation;
pub use reader::{parse_attribute_value, parse_document, parse_document_bytes, parse_fragment};
pub use tree::{Attribute, Element, NamespaceDecl, Node, NodePath, XmlTree, XML_NAMESPACE};
pub use writer::{escape_attribute_value, write_document, write_element, write_namespace_bindings};
