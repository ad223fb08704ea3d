use crate::namespaces::RESOURCE_LISTS;
use crate::rules::SemanticRule;
use crate::schema::walk;
use crate::violation::Violation;
use xcap_document::{evaluate, Resolution, XmlTree};
use xcap_uri::{parse, DocumentSelector, NamespaceBindings};

/// `entry-ref/@ref` is an XCAP URI, relative to the root, naming an
/// `entry` of a resource-lists document of the same user. References into
/// the document being written must resolve to an existing entry.
pub struct EntryRefRule;

impl SemanticRule for EntryRefRule {
    fn name(&self) -> &'static str {
        "entry-ref"
    }

    fn description(&self) -> &'static str {
        "entry-ref must reference an entry of the same user's resource lists"
    }

    fn check(&self, tree: &XmlTree, document: Option<&DocumentSelector>) -> Vec<Violation> {
        let mut violations = Vec::new();

        walk(tree, &mut |element, location| {
            if !element.name.is(RESOURCE_LISTS, "entry-ref") {
                return;
            }
            let Some(reference) = element.attr("ref") else {
                return;
            };
            let location = format!("{}/@ref", location);

            if let Err(message) = check_reference(tree, reference, document) {
                violations.push(Violation::constraint(location, message));
            }
        });

        violations
    }
}

fn check_reference(
    tree: &XmlTree,
    reference: &str,
    document: Option<&DocumentSelector>,
) -> Result<(), String> {
    let decoded = urlencoding::decode(reference)
        .map(|decoded| decoded.to_string())
        .map_err(|e| format!("'{}' is not a valid URI: {}", reference, e))?;

    let resolver = [("resource-lists", RESOURCE_LISTS)];
    let target = parse(&decoded, &NamespaceBindings::new(), &resolver)
        .map_err(|e| format!("'{}' is not a resource-lists XCAP URI: {}", reference, e))?;

    let Some(current) = document else {
        return Ok(());
    };

    if target.document != *current {
        if target.document.context != current.context {
            return Err(format!("'{}' references another user's document", reference));
        }
        return Ok(());
    }

    let selector = target
        .node_selector
        .ok_or_else(|| format!("'{}' must reference an entry, not a document", reference))?;

    match evaluate(&selector, tree) {
        Ok(Resolution::Element(path))
            if tree
                .element(&path)
                .is_some_and(|e| e.name.is(RESOURCE_LISTS, "entry")) =>
        {
            Ok(())
        }
        _ => Err(format!("'{}' does not resolve to an entry of this document", reference)),
    }
}
