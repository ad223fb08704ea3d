use crate::namespaces::COMMON_POLICY;
use crate::rules::{has_scheme, SemanticRule};
use crate::schema::walk;
use crate::violation::Violation;
use xcap_document::XmlTree;
use xcap_uri::DocumentSelector;

const IDENTITY_SCHEMES: [&str; 4] = ["sip", "sips", "tel", "mailto"];

/// Identity conditions of authorization rules must name real identities:
/// `one/@id` and `except/@id` are sip, sips, tel or mailto URIs, domains
/// given in `many` or `except` are not empty, an `identity` holds at least
/// one `one` or `many`, and an `except` names an id or a domain.
pub struct CommonPolicyRule;

impl SemanticRule for CommonPolicyRule {
    fn name(&self) -> &'static str {
        "common-policy-identity"
    }

    fn description(&self) -> &'static str {
        "Identity conditions must name at least one identity using sip, sips, tel or mailto URIs"
    }

    fn check(&self, tree: &XmlTree, _document: Option<&DocumentSelector>) -> Vec<Violation> {
        let mut violations = Vec::new();

        walk(tree, &mut |element, location| {
            if element.name.namespace.as_deref() != Some(COMMON_POLICY) {
                return;
            }

            match element.name.local.as_str() {
                "one" | "except" => {
                    if let Some(id) = element.attr("id") {
                        if !has_scheme(id, &IDENTITY_SCHEMES) {
                            violations.push(Violation::constraint(
                                format!("{}/@id", location),
                                format!("'{}' is not a sip, sips, tel or mailto URI", id),
                            ));
                        }
                    }
                }
                "identity" => {
                    let names_identity = element.child_elements().any(|(_, child)| {
                        child.name.namespace.as_deref() == Some(COMMON_POLICY)
                            && matches!(child.name.local.as_str(), "one" | "many")
                    });
                    if !names_identity {
                        violations.push(Violation::constraint(
                            location,
                            "identity condition names no identity",
                        ));
                    }
                }
                _ => {}
            }

            if element.name.local == "except"
                && element.attr("id").is_none()
                && element.attr("domain").is_none()
            {
                violations.push(Violation::constraint(location, "except names neither an id nor a domain"));
            }

            if matches!(element.name.local.as_str(), "many" | "except") {
                if let Some(domain) = element.attr("domain") {
                    if domain.trim().is_empty() {
                        violations.push(Violation::constraint(
                            format!("{}/@domain", location),
                            "domain must not be empty",
                        ));
                    }
                }
            }
        });

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xcap_document::parse_document;

    fn check(conditions: &str) -> Vec<Violation> {
        let tree = parse_document(&format!(
            r#"<ruleset xmlns="{COMMON_POLICY}"><rule id="r"><conditions><identity>{conditions}</identity></conditions></rule></ruleset>"#
        ))
        .unwrap();
        CommonPolicyRule.check(&tree, None)
    }

    #[test]
    fn test_accepts_identity_uris() {
        assert!(check(r#"<one id="sip:alice@example.com"/><one id="tel:+15551234"/><one id="mailto:bob@example.com"/>"#).is_empty());
        assert!(check(r#"<many domain="example.com"><except id="sips:eve@example.com"/></many>"#).is_empty());
    }

    #[test]
    fn test_rejects_bad_identities() {
        let violations = check(r#"<one id="alice"/><many domain=" "><except id="http://x"/></many>"#);

        assert_eq!(violations.len(), 3);
        assert_eq!(violations[0].path, "/ruleset/rule[1]/conditions[1]/identity[1]/one[1]/@id");
        assert_eq!(violations[1].path, "/ruleset/rule[1]/conditions[1]/identity[1]/many[1]/@domain");
        assert!(violations[2].path.ends_with("except[1]/@id"));
    }

    #[test]
    fn test_rejects_conditions_naming_nobody() {
        let violations = check("");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "/ruleset/rule[1]/conditions[1]/identity[1]");

        let violations = check(r#"<many><except/></many>"#);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].path.ends_with("many[1]/except[1]"));
    }
}
