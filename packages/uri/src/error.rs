use thiserror::Error;

pub type UriResult<T> = Result<T, UriError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("Missing document selector")]
    MissingDocumentSelector,

    #[error("Unknown application usage: {0}")]
    UnknownApplicationUsage(String),

    #[error("Unknown document context '{0}', expected 'users' or 'global'")]
    UnknownContext(String),

    #[error("Missing owner for per-user document")]
    MissingOwner,

    #[error("Missing document name")]
    MissingDocumentName,

    #[error("Empty path segment in document selector")]
    EmptySegment,

    #[error("Invalid node selector at {pos}: {message}")]
    InvalidSelector { pos: usize, message: String },

    #[error("Unresolved namespace prefix '{0}'")]
    UnresolvedPrefix(String),

    #[error("Invalid namespace binding query: {0}")]
    InvalidNamespaceQuery(String),
}

impl UriError {
    pub fn invalid_selector(pos: usize, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            pos,
            message: message.into(),
        }
    }
}
