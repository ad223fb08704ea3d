//! # XCAP Server
//!
//! Request handling for the XML Configuration Access Protocol (RFC 4825).
//!
//! ## Architecture
//!
//! ```text
//! http (axum) -> Dispatcher -> Coordinator -> Store
//!                    |              |
//!                    |              +-- ApplicationUsage::validate
//!                    +-- xcap_uri::parse, Authorizer, evaluator
//! ```
//!
//! - [`Dispatcher`] turns an [`XcapRequest`] into an [`XcapResponse`].
//! - [`Coordinator`] serializes mutations per document and enforces
//!   `If-Match` / `If-None-Match`.
//! - [`Store`] persists documents with compare-and-swap on entity tags.
//! - [`Authorizer`] decides whether an identity may use a document.

pub mod authz;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod preconditions;
pub mod request;
pub mod store;

pub use authz::{AllowAll, Authorizer, OwnerPolicy};
pub use config::{Config, DEFAULT_CONFIG_NAME};
pub use coordinator::{Change, Committed, Coordinator};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{ConflictReason, XcapError};
pub use preconditions::{PreconditionOutcome, Preconditions, TagSet};
pub use request::{Method, Status, XcapRequest, XcapResponse};
pub use store::{DocumentKey, EntityTag, FileStore, MemoryStore, Store, StoreError, StoredDocument};
