//! # Declarative Schemas
//!
//! A small structural schema language covering what XCAP application
//! usages need: the root element, allowed children with cardinalities and
//! optionally their order, required attributes, text content (free or
//! enumerated) and uniqueness of an attribute among same-named siblings.
//!
//! Only namespaces the schema governs are checked. Elements from any other
//! namespace are extension points and are skipped together with their
//! subtrees.

use crate::violation::Violation;
use std::collections::HashSet;
use xcap_document::{Element, Node, XmlTree};
use xcap_uri::ExpandedName;

/// What an element may contain besides its listed children
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Child elements only (whitespace allowed)
    Elements,
    /// Character data only
    Text,
    /// Character data restricted to one of the listed values (trimmed)
    Enumerated(Vec<&'static str>),
    /// Anything; children are not checked
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRule {
    pub name: ExpandedName,
    pub min: usize,
    pub max: Option<usize>,
    /// Place in the content sequence; children sharing a place interleave
    pub position: usize,
}

/// Attribute value that must be unique among children with the given name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub child: ExpandedName,
    pub attribute: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRule {
    pub name: ExpandedName,
    pub content: Content,
    pub children: Vec<ChildRule>,
    pub required: Vec<&'static str>,
    pub unique: Vec<UniqueKey>,
    /// Whether governed children must follow the declared order
    pub ordered: bool,
}

impl ElementRule {
    pub fn new(namespace: &str, local: &str) -> Self {
        Self {
            name: ExpandedName::ns(namespace, local),
            content: Content::Elements,
            children: Vec::new(),
            required: Vec::new(),
            unique: Vec::new(),
            ordered: false,
        }
    }

    pub fn text(mut self) -> Self {
        self.content = Content::Text;
        self
    }

    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.content = Content::Enumerated(values.to_vec());
        self
    }

    pub fn any(mut self) -> Self {
        self.content = Content::Any;
        self
    }

    /// Require governed children to appear in the order they are declared
    pub fn sequence(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Allow a child element `min..=max` times (`None` for unbounded)
    pub fn child(mut self, namespace: &str, local: &str, min: usize, max: Option<usize>) -> Self {
        let position = self.children.last().map_or(0, |last| last.position + 1);
        self.children.push(ChildRule {
            name: ExpandedName::ns(namespace, local),
            min,
            max,
            position,
        });
        self
    }

    /// Allow any number of a child that shares the previous child's place
    /// in the sequence, so the two may interleave
    pub fn or_many(mut self, namespace: &str, local: &str) -> Self {
        let position = self.children.last().map_or(0, |last| last.position);
        self.children.push(ChildRule {
            name: ExpandedName::ns(namespace, local),
            min: 0,
            max: None,
            position,
        });
        self
    }

    pub fn optional(self, namespace: &str, local: &str) -> Self {
        self.child(namespace, local, 0, Some(1))
    }

    pub fn many(self, namespace: &str, local: &str) -> Self {
        self.child(namespace, local, 0, None)
    }

    pub fn required(mut self, attribute: &'static str) -> Self {
        self.required.push(attribute);
        self
    }

    pub fn unique(mut self, namespace: &str, child: &str, attribute: &'static str) -> Self {
        self.unique.push(UniqueKey {
            child: ExpandedName::ns(namespace, child),
            attribute,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub root: ExpandedName,
    pub namespaces: Vec<String>,
    pub elements: Vec<ElementRule>,
}

impl Schema {
    pub fn new(namespace: &str, root: &str) -> Self {
        Self {
            root: ExpandedName::ns(namespace, root),
            namespaces: vec![namespace.to_string()],
            elements: Vec::new(),
        }
    }

    /// Also govern elements of another namespace
    pub fn governs(mut self, namespace: &str) -> Self {
        self.namespaces.push(namespace.to_string());
        self
    }

    pub fn element(mut self, rule: ElementRule) -> Self {
        self.elements.push(rule);
        self
    }

    pub fn rule(&self, name: &ExpandedName) -> Option<&ElementRule> {
        self.elements.iter().find(|rule| &rule.name == name)
    }

    fn is_governed(&self, name: &ExpandedName) -> bool {
        name.namespace
            .as_deref()
            .is_some_and(|ns| self.namespaces.iter().any(|governed| governed == ns))
    }

    /// Check a whole document, returning violations in document order
    pub fn check(&self, tree: &XmlTree) -> Vec<Violation> {
        let location = format!("/{}", tree.root.qualified_name());
        if tree.root.name != self.root {
            return vec![Violation::schema(
                location,
                format!("root element must be {}, found {}", self.root, tree.root.name),
            )];
        }

        let mut violations = Vec::new();
        self.check_element(&tree.root, &location, &mut violations);
        violations
    }

    fn check_element(&self, element: &Element, location: &str, violations: &mut Vec<Violation>) {
        let Some(rule) = self.rule(&element.name) else {
            violations.push(Violation::schema(
                location,
                format!("element {} is not defined", element.name),
            ));
            return;
        };

        for attribute in &rule.required {
            if element.attr(attribute).is_none() {
                violations.push(Violation::schema(
                    location,
                    format!("missing required attribute '{}'", attribute),
                ));
            }
        }

        match &rule.content {
            Content::Any => return,
            Content::Text => {}
            Content::Enumerated(values) => {
                let text = element.text();
                if !values.iter().any(|value| *value == text.trim()) {
                    violations.push(Violation::schema(
                        location,
                        format!("'{}' is not one of {}", text.trim(), values.join(", ")),
                    ));
                }
            }
            Content::Elements => {
                if element.children.iter().any(|child| match child {
                    Node::Text(text) => !text.trim().is_empty(),
                    Node::Element(_) => false,
                }) {
                    violations.push(Violation::schema(location, "unexpected character data"));
                }
            }
        }

        for child_rule in &rule.children {
            let count = element.children_named(&child_rule.name).count();
            if count < child_rule.min {
                violations.push(Violation::schema(
                    location,
                    format!("expected at least {} {} element(s)", child_rule.min, child_rule.name.local),
                ));
            }
            if child_rule.max.is_some_and(|max| count > max) {
                violations.push(Violation::schema(
                    location,
                    format!("too many {} elements", child_rule.name.local),
                ));
            }
        }

        for key in &rule.unique {
            let mut seen = HashSet::new();
            for (index, child) in element.child_elements() {
                if child.name != key.child {
                    continue;
                }
                if let Some(value) = child.attr(key.attribute) {
                    if !seen.insert(value) {
                        violations.push(Violation::uniqueness(
                            format!("{}/@{}", child_location(location, element, index), key.attribute),
                            format!("duplicate {} '{}'", key.attribute, value),
                        ));
                    }
                }
            }
        }

        let mut reached = 0;
        for (index, child) in element.child_elements() {
            if !self.is_governed(&child.name) {
                continue;
            }
            let child_path = child_location(location, element, index);
            let Some(allowed) = rule.children.iter().find(|allowed| allowed.name == child.name) else {
                violations.push(Violation::schema(
                    &child_path,
                    format!("{} is not allowed inside {}", child.name.local, element.name.local),
                ));
                continue;
            };
            if rule.ordered {
                if allowed.position < reached {
                    violations.push(Violation::schema(
                        &child_path,
                        format!("{} is out of order inside {}", child.name.local, element.name.local),
                    ));
                }
                reached = reached.max(allowed.position);
            }
            self.check_element(child, &child_path, violations);
        }
    }
}

/// Location of the child at `index`, positioned among same-named siblings
pub fn child_location(parent_location: &str, parent: &Element, index: usize) -> String {
    let Some(Node::Element(child)) = parent.children.get(index) else {
        return parent_location.to_string();
    };
    let position = parent
        .child_elements()
        .take_while(|(i, _)| *i < index)
        .filter(|(_, sibling)| sibling.name == child.name)
        .count()
        + 1;
    format!("{}/{}[{}]", parent_location, child.qualified_name(), position)
}

/// Visit every element with its location, in document order
pub fn walk<'a>(tree: &'a XmlTree, visit: &mut dyn FnMut(&'a Element, &str)) {
    fn descend<'a>(element: &'a Element, location: &str, visit: &mut dyn FnMut(&'a Element, &str)) {
        visit(element, location);
        for (index, child) in element.child_elements() {
            descend(child, &child_location(location, element, index), visit);
        }
    }
    descend(&tree.root, &format!("/{}", tree.root.qualified_name()), visit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::ViolationCode;
    use xcap_document::parse_document;

    const NS: &str = "urn:test";

    fn schema() -> Schema {
        Schema::new(NS, "root")
            .element(ElementRule::new(NS, "root").many(NS, "item").unique(NS, "item", "id"))
            .element(
                ElementRule::new(NS, "item")
                    .required("id")
                    .optional(NS, "state"),
            )
            .element(ElementRule::new(NS, "state").one_of(&["on", "off"]))
    }

    fn check(source: &str) -> Vec<Violation> {
        schema().check(&parse_document(source).unwrap())
    }

    #[test]
    fn test_valid_document() {
        assert!(check(r#"<root xmlns="urn:test"><item id="a"><state>on</state></item><item id="b"/></root>"#).is_empty());
    }

    #[test]
    fn test_wrong_root() {
        let violations = check(r#"<item xmlns="urn:test" id="a"/>"#);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::SchemaValidation);
    }

    #[test]
    fn test_structure_violations() {
        let violations = check(
            r#"<root xmlns="urn:test"><item><state>dim</state><state>on</state></item><state/></root>"#,
        );
        let messages: Vec<&str> = violations.iter().map(|v| v.message.as_str()).collect();

        assert_eq!(violations.len(), 4, "{:?}", messages);
        assert!(messages.iter().any(|m| m.contains("state is not allowed inside root")));
        assert!(messages.iter().any(|m| m.contains("missing required attribute 'id'")));
        assert!(messages.iter().any(|m| m.contains("too many state")));
        assert!(messages.iter().any(|m| m.contains("'dim' is not one of on, off")));
    }

    #[test]
    fn test_uniqueness_path() {
        let violations = check(r#"<root xmlns="urn:test"><item id="a"/><item id="b"/><item id="a"/></root>"#);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::Uniqueness);
        assert_eq!(violations[0].path, "/root/item[3]/@id");
    }

    #[test]
    fn test_foreign_namespaces_are_extension_points() {
        assert!(check(r#"<root xmlns="urn:test" xmlns:x="urn:x"><x:anything><item/></x:anything></root>"#).is_empty());
    }

    #[test]
    fn test_sequence_order() {
        let schema = Schema::new(NS, "root").element(
            ElementRule::new(NS, "root")
                .sequence()
                .optional(NS, "title")
                .many(NS, "item")
                .or_many(NS, "group")
                .optional(NS, "footer"),
        )
        .element(ElementRule::new(NS, "title").text())
        .element(ElementRule::new(NS, "item").any())
        .element(ElementRule::new(NS, "group").any())
        .element(ElementRule::new(NS, "footer").text());
        let check = |source: &str| schema.check(&parse_document(source).unwrap());

        // items and groups share a place and may interleave
        assert!(check(r#"<root xmlns="urn:test"><title/><item/><group/><item/><footer/></root>"#).is_empty());

        let violations = check(r#"<root xmlns="urn:test"><item/><title/><footer/><group/></root>"#);
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["/root/title[1]", "/root/group[1]"]);
        assert!(violations[0].message.contains("out of order"));
    }
}
