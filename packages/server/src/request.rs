//! Transport-neutral request and response types

use crate::preconditions::Preconditions;
use crate::store::EntityTag;
use serde::{Deserialize, Serialize};
use std::fmt;
use xcap_uri::NamespaceBindings;

pub const ELEMENT_MIME: &str = "application/xcap-el+xml";
pub const ATTRIBUTE_MIME: &str = "application/xcap-att+xml";
pub const NAMESPACES_MIME: &str = "application/xcap-ns+xml";
pub const ERROR_MIME: &str = "application/xcap-error+xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Put,
    Delete,
}

impl Method {
    pub fn is_write(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Ok,
    Created,
    NotModified,
    BadRequest,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    PreconditionFailed,
    ServiceUnavailable,
}

impl Status {
    /// HTTP status code
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::NotModified => 304,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::Conflict => 409,
            Status::PreconditionFailed => 412,
            Status::ServiceUnavailable => 503,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Ok | Status::Created)
    }
}

#[derive(Debug, Clone)]
pub struct XcapRequest {
    pub method: Method,
    /// Percent-decoded path relative to the XCAP root
    pub path: String,
    pub bindings: NamespaceBindings,
    pub body: Option<Vec<u8>>,
    pub preconditions: Preconditions,
    /// Identity asserted by the authenticating front end
    pub identity: Option<String>,
}

impl XcapRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            bindings: NamespaceBindings::new(),
            body: None,
            preconditions: Preconditions::default(),
            identity: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn put(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_bindings(mut self, bindings: NamespaceBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcapResponse {
    pub status: Status,
    pub body: Option<Vec<u8>>,
    pub entity_tag: Option<EntityTag>,
    pub mime_type: Option<String>,
}

impl XcapResponse {
    pub fn status(status: Status) -> Self {
        Self {
            status,
            body: None,
            entity_tag: None,
            mime_type: None,
        }
    }

    pub fn content(body: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            body: Some(body.into()),
            entity_tag: None,
            mime_type: Some(mime_type.into()),
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_tag(mut self, tag: Option<EntityTag>) -> Self {
        self.entity_tag = tag;
        self
    }

    /// Body as text, for logging and tests
    pub fn text(&self) -> Option<&str> {
        self.body.as_deref().and_then(|body| std::str::from_utf8(body).ok())
    }
}
