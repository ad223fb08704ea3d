//! # XCAP Application Usages
//!
//! An application usage describes one kind of XCAP document. Validation
//! runs in three stages, stopping at the first that fails:
//!
//! 1. well-formedness (raw bytes only, [`ApplicationUsage::validate_bytes`])
//! 2. schema conformance ([`Schema`])
//! 3. usage-specific semantic rules ([`SemanticRule`])
//!
//! The [`Registry`] maps application usage ids to usages and is passed to
//! the request dispatcher at startup.

pub mod builtin;
pub mod namespaces;
mod registry;
mod rules;
mod schema;
mod usage;
mod violation;

pub use registry::Registry;
pub use rules::{CommonPolicyRule, EntryRefRule, PidfRule, SemanticRule};
pub use schema::{child_location, walk, ChildRule, Content, ElementRule, Schema, UniqueKey};
pub use usage::{ApplicationUsage, ContextKind};
pub use violation::{Violation, ViolationCode};
