mod common_policy;
mod entry_ref;
mod pidf;

pub use common_policy::CommonPolicyRule;
pub use entry_ref::EntryRefRule;
pub use pidf::PidfRule;

use crate::violation::Violation;
use xcap_document::XmlTree;
use xcap_uri::DocumentSelector;

/// Usage-specific constraint checked after the schema passes
pub trait SemanticRule: Send + Sync {
    /// Unique identifier for this rule
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Check a schema-valid document. `document` identifies where it is
    /// stored, when known, so references into it can be resolved.
    fn check(&self, tree: &XmlTree, document: Option<&DocumentSelector>) -> Vec<Violation>;
}

/// Whether `value` looks like a URI in one of the given schemes
pub(crate) fn has_scheme(value: &str, schemes: &[&str]) -> bool {
    match value.split_once(':') {
        Some((scheme, rest)) => {
            !rest.is_empty() && schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme))
        }
        None => false,
    }
}
