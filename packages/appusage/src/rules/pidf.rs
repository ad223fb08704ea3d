use crate::namespaces::PIDF;
use crate::rules::{has_scheme, SemanticRule};
use crate::schema::walk;
use crate::violation::Violation;
use xcap_document::XmlTree;
use xcap_uri::DocumentSelector;

/// Presence documents must describe a presentity URI, and contact
/// priorities must be decimals between 0 and 1.
pub struct PidfRule;

impl SemanticRule for PidfRule {
    fn name(&self) -> &'static str {
        "pidf-presentity"
    }

    fn description(&self) -> &'static str {
        "presence/@entity is a pres, sip or sips URI and contact priorities lie in [0, 1]"
    }

    fn check(&self, tree: &XmlTree, _document: Option<&DocumentSelector>) -> Vec<Violation> {
        let mut violations = Vec::new();

        walk(tree, &mut |element, location| {
            if element.name.is(PIDF, "presence") {
                if let Some(entity) = element.attr("entity") {
                    if !has_scheme(entity, &["pres", "sip", "sips"]) {
                        violations.push(Violation::constraint(
                            format!("{}/@entity", location),
                            format!("'{}' is not a presentity URI", entity),
                        ));
                    }
                }
            }

            if element.name.is(PIDF, "contact") {
                if let Some(priority) = element.attr("priority") {
                    let valid = priority
                        .trim()
                        .parse::<f64>()
                        .is_ok_and(|p| (0.0..=1.0).contains(&p));
                    if !valid {
                        violations.push(Violation::constraint(
                            format!("{}/@priority", location),
                            format!("priority '{}' must be between 0 and 1", priority),
                        ));
                    }
                }
            }
        });

        violations
    }
}
