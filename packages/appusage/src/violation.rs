use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of validation failure, named after the RFC 4825 error elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationCode {
    NotWellFormed,
    SchemaValidation,
    Uniqueness,
    ConstraintFailure,
}

impl ViolationCode {
    /// Element name used in `application/xcap-error+xml` bodies
    pub fn element_name(&self) -> &'static str {
        match self {
            ViolationCode::NotWellFormed => "not-well-formed",
            ViolationCode::SchemaValidation => "schema-validation-error",
            ViolationCode::Uniqueness => "uniqueness-failure",
            ViolationCode::ConstraintFailure => "constraint-failure",
        }
    }
}

/// A single reason a document was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub code: ViolationCode,

    /// Location of the offending node, e.g. `/resource-lists/list[2]/@name`
    pub path: String,

    pub message: String,
}

impl Violation {
    pub fn new(code: ViolationCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_well_formed(message: impl Into<String>) -> Self {
        Self::new(ViolationCode::NotWellFormed, "/", message)
    }

    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationCode::SchemaValidation, path, message)
    }

    pub fn uniqueness(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationCode::Uniqueness, path, message)
    }

    pub fn constraint(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ViolationCode::ConstraintFailure, path, message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.code.element_name(), self.path, self.message)
    }
}
