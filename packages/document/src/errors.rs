//! Error types for the document crate

use thiserror::Error;

pub type XmlResult<T> = Result<T, XmlError>;

/// The input is not a well-formed, namespace-valid XML document or fragment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("Content is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Unbound namespace prefix '{0}'")]
    UnboundPrefix(String),

    #[error("Document has no root element")]
    NoRootElement,

    #[error("Document has more than one root element")]
    MultipleRoots,

    #[error("Character data outside the root element")]
    ContentOutsideRoot,

    #[error("Element <{0}> is not closed")]
    UnclosedElement(String),

    #[error("Unexpected closing tag")]
    UnexpectedClose,

    #[error("Failed to write XML: {0}")]
    Write(String),
}

/// The node selector does not address a single node or insertion point
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("No node matches step {step} of the selector")]
    NotFound { step: usize },

    #[error("Selector is ambiguous: step {step} matches {count} nodes")]
    Ambiguous { step: usize, count: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("Insert position {position} out of range for parent {parent}")]
    PositionOutOfRange { parent: String, position: usize },

    #[error("The root element cannot be removed")]
    RootRemoval,

    #[error("Namespace prefix '{prefix}' is already bound to '{bound}'")]
    PrefixConflict { prefix: String, bound: String },

    #[error("Namespaced attribute {0} needs a prefix")]
    MissingPrefix(String),
}
