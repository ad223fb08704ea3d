//! Built-in application usages: resource lists (RFC 4826), presence
//! authorization rules (RFC 5025 over RFC 4745), PIDF manipulation
//! (RFC 4827) and server capabilities (RFC 4825).

use crate::namespaces::{COMMON_POLICY, PIDF, PRES_RULES, RESOURCE_LISTS, XCAP_CAPS};
use crate::rules::{CommonPolicyRule, EntryRefRule, PidfRule};
use crate::schema::{ElementRule, Schema};
use crate::usage::{ApplicationUsage, ContextKind};
use xcap_document::{Element, XmlTree};
use xcap_uri::ExpandedName;

pub const RESOURCE_LISTS_AUID: &str = "resource-lists";
pub const PRES_RULES_AUID: &str = "pres-rules";
pub const PIDF_MANIPULATION_AUID: &str = "pidf-manipulation";
pub const XCAP_CAPS_AUID: &str = "xcap-caps";

/// Document name of the capabilities document in the global tree
pub const XCAP_CAPS_DOCUMENT: &str = "index";

pub fn resource_lists() -> ApplicationUsage {
    const RL: &str = RESOURCE_LISTS;

    let schema = Schema::new(RL, "resource-lists")
        .element(
            ElementRule::new(RL, "resource-lists")
                .many(RL, "list")
                .unique(RL, "list", "name"),
        )
        .element(
            ElementRule::new(RL, "list")
                .sequence()
                .optional(RL, "display-name")
                .many(RL, "list")
                .or_many(RL, "external")
                .or_many(RL, "entry")
                .or_many(RL, "entry-ref")
                .unique(RL, "list", "name")
                .unique(RL, "entry", "uri")
                .unique(RL, "external", "anchor")
                .unique(RL, "entry-ref", "ref"),
        )
        .element(ElementRule::new(RL, "entry").required("uri").optional(RL, "display-name"))
        .element(ElementRule::new(RL, "entry-ref").required("ref").optional(RL, "display-name"))
        .element(ElementRule::new(RL, "external").required("anchor").optional(RL, "display-name"))
        .element(ElementRule::new(RL, "display-name").text());

    let template = XmlTree::new(
        Element::new(ExpandedName::ns(RL, "resource-lists")).with_namespace(None, RL),
    );

    ApplicationUsage::new(RESOURCE_LISTS_AUID, RL, "application/resource-lists+xml", schema)
        .with_rule(Box::new(EntryRefRule))
        .with_template(template)
}

const PROVIDE_ELEMENTS: [&str; 17] = [
    "provide-services",
    "provide-persons",
    "provide-devices",
    "provide-activities",
    "provide-class",
    "provide-deviceID",
    "provide-mood",
    "provide-place-is",
    "provide-place-type",
    "provide-privacy",
    "provide-relationship",
    "provide-status-icon",
    "provide-sphere",
    "provide-time-offset",
    "provide-user-input",
    "provide-note",
    "provide-all-attributes",
];

pub fn pres_rules() -> ApplicationUsage {
    const CP: &str = COMMON_POLICY;
    const PR: &str = PRES_RULES;

    let mut transformations = ElementRule::new(CP, "transformations").many(PR, "provide-unknown-attribute");
    for name in PROVIDE_ELEMENTS {
        transformations = transformations.optional(PR, name);
    }

    let mut schema = Schema::new(CP, "ruleset")
        .governs(PR)
        .element(ElementRule::new(CP, "ruleset").many(CP, "rule").unique(CP, "rule", "id"))
        .element(
            ElementRule::new(CP, "rule")
                .required("id")
                .sequence()
                .optional(CP, "conditions")
                .optional(CP, "actions")
                .optional(CP, "transformations"),
        )
        .element(
            ElementRule::new(CP, "conditions")
                .optional(CP, "identity")
                .optional(CP, "sphere")
                .optional(CP, "validity"),
        )
        .element(ElementRule::new(CP, "identity").many(CP, "one").many(CP, "many"))
        .element(ElementRule::new(CP, "one").required("id").any())
        .element(ElementRule::new(CP, "many").many(CP, "except"))
        .element(ElementRule::new(CP, "except"))
        .element(ElementRule::new(CP, "sphere").required("value"))
        .element(
            ElementRule::new(CP, "validity")
                .child(CP, "from", 1, None)
                .child(CP, "until", 1, None),
        )
        .element(ElementRule::new(CP, "from").text())
        .element(ElementRule::new(CP, "until").text())
        .element(ElementRule::new(CP, "actions").optional(PR, "sub-handling"))
        .element(transformations)
        .element(ElementRule::new(PR, "sub-handling").one_of(&["block", "confirm", "polite-block", "allow"]))
        .element(ElementRule::new(PR, "provide-unknown-attribute").any());
    for name in PROVIDE_ELEMENTS {
        schema = schema.element(ElementRule::new(PR, name).any());
    }

    let template = XmlTree::new(
        Element::new(ExpandedName::ns(CP, "ruleset"))
            .with_namespace(None, CP)
            .with_namespace(Some("pr"), PR),
    );

    ApplicationUsage::new(PRES_RULES_AUID, CP, "application/auth-policy+xml", schema)
        .with_rule(Box::new(CommonPolicyRule))
        .with_template(template)
}

pub fn pidf_manipulation() -> ApplicationUsage {
    let schema = Schema::new(PIDF, "presence")
        .element(
            ElementRule::new(PIDF, "presence")
                .required("entity")
                .sequence()
                .many(PIDF, "tuple")
                .many(PIDF, "note")
                .unique(PIDF, "tuple", "id"),
        )
        .element(
            ElementRule::new(PIDF, "tuple")
                .required("id")
                .sequence()
                .child(PIDF, "status", 1, Some(1))
                .optional(PIDF, "contact")
                .many(PIDF, "note")
                .optional(PIDF, "timestamp"),
        )
        .element(ElementRule::new(PIDF, "status").optional(PIDF, "basic"))
        .element(ElementRule::new(PIDF, "basic").one_of(&["open", "closed"]))
        .element(ElementRule::new(PIDF, "contact").text())
        .element(ElementRule::new(PIDF, "note").text())
        .element(ElementRule::new(PIDF, "timestamp").text());

    ApplicationUsage::new(PIDF_MANIPULATION_AUID, PIDF, "application/pidf+xml", schema)
        .with_rule(Box::new(PidfRule))
}

/// The capabilities usage; its template is filled in by the registry
pub fn xcap_caps() -> ApplicationUsage {
    let schema = Schema::new(XCAP_CAPS, "xcap-caps")
        .element(
            ElementRule::new(XCAP_CAPS, "xcap-caps")
                .sequence()
                .child(XCAP_CAPS, "auids", 1, Some(1))
                .optional(XCAP_CAPS, "extensions")
                .child(XCAP_CAPS, "namespaces", 1, Some(1)),
        )
        .element(ElementRule::new(XCAP_CAPS, "auids").many(XCAP_CAPS, "auid"))
        .element(ElementRule::new(XCAP_CAPS, "extensions").many(XCAP_CAPS, "extension"))
        .element(ElementRule::new(XCAP_CAPS, "namespaces").many(XCAP_CAPS, "namespace"))
        .element(ElementRule::new(XCAP_CAPS, "auid").text())
        .element(ElementRule::new(XCAP_CAPS, "extension").text())
        .element(ElementRule::new(XCAP_CAPS, "namespace").text());

    ApplicationUsage::new(XCAP_CAPS_AUID, XCAP_CAPS, "application/xcap-caps+xml", schema)
        .with_contexts(&[ContextKind::Global])
        .with_auto_create(true)
        .read_only()
}

/// Capabilities document listing the given usages and namespaces
pub fn capabilities<'a>(usages: impl IntoIterator<Item = &'a ApplicationUsage>) -> XmlTree {
    let name = |local: &str| ExpandedName::ns(XCAP_CAPS, local);

    let mut auids = Element::new(name("auids"));
    let mut namespaces = Element::new(name("namespaces"));
    let mut seen: Vec<String> = Vec::new();

    for usage in usages {
        auids = auids.with_child(Element::new(name("auid")).with_text(usage.id()));
        for namespace in &usage.schema().namespaces {
            if seen.contains(namespace) {
                continue;
            }
            seen.push(namespace.clone());
            namespaces = namespaces.with_child(Element::new(name("namespace")).with_text(namespace.as_str()));
        }
    }

    XmlTree::new(
        Element::new(name("xcap-caps"))
            .with_namespace(None, XCAP_CAPS)
            .with_child(auids)
            .with_child(namespaces),
    )
}
