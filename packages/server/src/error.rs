//! Error taxonomy of the request pipeline.
//!
//! Every crate below the dispatcher has its own error enum; they convert
//! into [`XcapError`], which maps onto exactly one response status.

use crate::request::Status;
use crate::store::StoreError;
use thiserror::Error;
use xcap_appusage::Violation;
use xcap_document::{EvalError, MutationError, XmlError};
use xcap_uri::UriError;

/// Why a request conflicts with the document's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The selector matches more than one node
    Ambiguous,
    /// After the write the selector would not address the written node
    CannotInsert,
    /// After the delete the selector would still address a node
    CannotDelete,
    /// The body of an element PUT is not a single well-formed element
    NotXmlFragment,
    /// The body of an attribute PUT is not a valid attribute value
    NotXmlAttValue,
    /// The store changed underneath a locked mutation
    StorageRace,
}

impl ConflictReason {
    /// Element name used in `application/xcap-error+xml` bodies
    pub fn element_name(&self) -> &'static str {
        match self {
            ConflictReason::CannotInsert => "cannot-insert",
            ConflictReason::CannotDelete => "cannot-delete",
            ConflictReason::NotXmlFragment => "not-xml-frag",
            ConflictReason::NotXmlAttValue => "not-xml-att-value",
            ConflictReason::Ambiguous | ConflictReason::StorageRace => "constraint-failure",
        }
    }
}

#[derive(Error, Debug)]
pub enum XcapError {
    #[error("Malformed XCAP URI: {0}")]
    MalformedUri(#[from] UriError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict {
        reason: ConflictReason,
        message: String,
    },

    #[error("Precondition failed")]
    PreconditionFailed,

    #[error("Document failed validation ({} violation(s))", .0.len())]
    Validation(Vec<Violation>),

    #[error("Forbidden")]
    Forbidden,

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl XcapError {
    pub fn conflict(reason: ConflictReason, message: impl Into<String>) -> Self {
        Self::Conflict {
            reason,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            XcapError::MalformedUri(_) | XcapError::BadRequest(_) => Status::BadRequest,
            XcapError::NotFound(_) => Status::NotFound,
            XcapError::Conflict { .. } | XcapError::Validation(_) => Status::Conflict,
            XcapError::PreconditionFailed => Status::PreconditionFailed,
            XcapError::Forbidden => Status::Forbidden,
            XcapError::MethodNotAllowed(_) => Status::MethodNotAllowed,
            XcapError::StoreUnavailable(_) => Status::ServiceUnavailable,
        }
    }
}

impl From<StoreError> for XcapError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(key) => XcapError::conflict(
                ConflictReason::StorageRace,
                format!("{} was modified concurrently", key),
            ),
            StoreError::NotFound(key) => XcapError::NotFound(key.to_string()),
            StoreError::InvalidKey(key) => XcapError::NotFound(format!("no document can be named {}", key)),
            other => XcapError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<EvalError> for XcapError {
    fn from(error: EvalError) -> Self {
        match error {
            EvalError::NotFound { .. } => XcapError::NotFound(error.to_string()),
            EvalError::Ambiguous { .. } => {
                XcapError::conflict(ConflictReason::Ambiguous, error.to_string())
            }
        }
    }
}

impl From<MutationError> for XcapError {
    fn from(error: MutationError) -> Self {
        match error {
            MutationError::RootRemoval => {
                XcapError::conflict(ConflictReason::CannotDelete, error.to_string())
            }
            other => XcapError::conflict(ConflictReason::CannotInsert, other.to_string()),
        }
    }
}

/// Stored documents always serialize; a failure means the store handed
/// back something unusable
impl From<XmlError> for XcapError {
    fn from(error: XmlError) -> Self {
        XcapError::StoreUnavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            XcapError::from(UriError::MissingDocumentSelector).status(),
            Status::BadRequest
        );
        assert_eq!(
            XcapError::from(EvalError::NotFound { step: 2 }).status(),
            Status::NotFound
        );
        assert_eq!(
            XcapError::from(EvalError::Ambiguous { step: 2, count: 3 }).status(),
            Status::Conflict
        );
        assert_eq!(XcapError::Validation(vec![]).status(), Status::Conflict);
        assert_eq!(XcapError::PreconditionFailed.status(), Status::PreconditionFailed);
        assert_eq!(
            XcapError::from(StoreError::Corrupt("bad".into())).status(),
            Status::ServiceUnavailable
        );
        assert_eq!(
            XcapError::from(StoreError::InvalidKey("a.json/b".into())).status(),
            Status::NotFound
        );
    }

    #[test]
    fn test_root_removal_cannot_delete() {
        match XcapError::from(MutationError::RootRemoval) {
            XcapError::Conflict { reason, .. } => assert_eq!(reason, ConflictReason::CannotDelete),
            other => panic!("unexpected {:?}", other),
        }
    }
}
