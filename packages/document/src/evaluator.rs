//! # Node Selector Evaluator
//!
//! Resolves a parsed [`NodeSelector`] against an [`XmlTree`].
//!
//! Evaluation starts from the virtual document node, whose only child is
//! the root element. Each element step selects the matching children of
//! every current candidate, then applies its predicates per parent in the
//! order written. The outcome is a single element, attribute or namespace
//! scope, or the one place where a PUT would create the addressed node.
//!
//! The evaluator never mutates the tree; see [`crate::mutations`].

use crate::errors::EvalError;
use crate::tree::{Element, NodePath, XmlTree};
use serde::{Deserialize, Serialize};
use tracing::debug;
use xcap_uri::{ElementStep, NodeSelector, Predicate, QName, TerminalSelector};

/// Where a node that does not exist yet would be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertionPoint {
    /// New child of `parent`, inserted at `position` in its child list
    Element { parent: NodePath, position: usize },
    /// New attribute on an existing element
    Attribute { element: NodePath, name: QName },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Element(NodePath),
    Attribute { element: NodePath, name: QName },
    /// In-scope namespace bindings of the element
    Namespaces(NodePath),
    Insertion(InsertionPoint),
}

impl Resolution {
    /// Whether the selector addresses an existing node
    pub fn exists(&self) -> bool {
        !matches!(self, Resolution::Insertion(_))
    }
}

/// Evaluation context: the virtual document node or an element
#[derive(Debug, Clone)]
enum Scope {
    Document,
    Element(NodePath),
}

pub fn evaluate(selector: &NodeSelector, tree: &XmlTree) -> Result<Resolution, EvalError> {
    let mut candidates = vec![Scope::Document];
    let last = selector.steps.len().saturating_sub(1);

    for (index, step) in selector.steps.iter().enumerate() {
        let step_number = index + 1;
        let mut selected = Vec::new();

        for scope in &candidates {
            for path in select_children(tree, scope, step) {
                selected.push(Scope::Element(path));
            }
        }

        debug!(
            step = step_number,
            parents = candidates.len(),
            selected = selected.len(),
            "evaluated selector step"
        );

        if selected.is_empty() {
            if index == last && selector.terminal.is_none() {
                return insertion_point(tree, &candidates, step, step_number);
            }
            return Err(EvalError::NotFound { step: step_number });
        }

        candidates = selected;
    }

    let element = match candidates.as_slice() {
        [Scope::Element(path)] => path.clone(),
        _ => {
            return Err(EvalError::Ambiguous {
                step: selector.steps.len(),
                count: candidates.len(),
            })
        }
    };

    match &selector.terminal {
        None => Ok(Resolution::Element(element)),
        Some(TerminalSelector::NamespaceBindings) => Ok(Resolution::Namespaces(element)),
        Some(TerminalSelector::Attribute(name)) => {
            let present = tree
                .element(&element)
                .and_then(|e| e.attribute(&name.name))
                .is_some();
            if present {
                Ok(Resolution::Attribute {
                    element,
                    name: name.clone(),
                })
            } else {
                Ok(Resolution::Insertion(InsertionPoint::Attribute {
                    element,
                    name: name.clone(),
                }))
            }
        }
    }
}

/// Children of `scope` selected by `step`, in document order
fn select_children(tree: &XmlTree, scope: &Scope, step: &ElementStep) -> Vec<NodePath> {
    let mut matched = name_matches(tree, scope, step);
    for predicate in &step.predicates {
        matched = apply_predicate(tree, matched, predicate);
    }
    matched
}

fn name_matches(tree: &XmlTree, scope: &Scope, step: &ElementStep) -> Vec<NodePath> {
    match scope {
        Scope::Document => {
            if step.name.matches(&tree.root.name) {
                vec![NodePath::root()]
            } else {
                Vec::new()
            }
        }
        Scope::Element(path) => match tree.element(path) {
            Some(parent) => parent
                .child_elements()
                .filter(|(_, child)| step.name.matches(&child.name))
                .map(|(i, _)| path.child(i))
                .collect(),
            None => Vec::new(),
        },
    }
}

fn apply_predicate(tree: &XmlTree, matched: Vec<NodePath>, predicate: &Predicate) -> Vec<NodePath> {
    match predicate {
        Predicate::Position(n) => matched.into_iter().nth(n.saturating_sub(1)).into_iter().collect(),
        Predicate::AttributeEquals { name, value } => matched
            .into_iter()
            .filter(|path| {
                tree.element(path)
                    .and_then(|e| e.attribute(&name.name))
                    .is_some_and(|v| v == value)
            })
            .collect(),
    }
}

/// The terminal element step matched nothing. It names an insertion point
/// when there is a single parent element and the step's position (1 when
/// it has no positional predicate) is one past the existing matches.
fn insertion_point(
    tree: &XmlTree,
    parents: &[Scope],
    step: &ElementStep,
    step_number: usize,
) -> Result<Resolution, EvalError> {
    let parent = match parents {
        [Scope::Element(path)] => path.clone(),
        [Scope::Document] => return Err(EvalError::NotFound { step: step_number }),
        _ => {
            return Err(EvalError::Ambiguous {
                step: step_number - 1,
                count: parents.len(),
            })
        }
    };
    let scope = Scope::Element(parent.clone());
    let named = name_matches(tree, &scope, step);

    let (position_predicate, preceding) = match step.predicates.split_last() {
        Some((Predicate::Position(n), rest)) => (Some(*n), rest),
        _ => (None, step.predicates.as_slice()),
    };
    if position_predicate.is_none() && step.predicates.iter().any(|p| matches!(p, Predicate::Position(_))) {
        return Err(EvalError::NotFound { step: step_number });
    }

    let mut siblings = named.clone();
    for predicate in preceding {
        siblings = apply_predicate(tree, siblings, predicate);
    }

    let wanted = position_predicate.unwrap_or(1);
    let existing = match position_predicate {
        Some(_) => siblings.len(),
        None => 0,
    };
    if wanted != existing + 1 {
        return Err(EvalError::NotFound { step: step_number });
    }

    let anchor = siblings.last().or(named.last());
    let position = match anchor.and_then(NodePath::split_last) {
        Some((_, index)) => index + 1,
        None => tree
            .element(&parent)
            .map(|e: &Element| e.children.len())
            .unwrap_or(0),
    };

    debug!(%parent, position, "selector names an insertion point");
    Ok(Resolution::Insertion(InsertionPoint::Element { parent, position }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_document;
    use xcap_uri::{parse_node_selector, NamespaceBindings};

    const RL: &str = "urn:ietf:params:xml:ns:resource-lists";

    fn tree() -> XmlTree {
        parse_document(&format!(
            r#"<resource-lists xmlns="{RL}">
  <list name="a"><entry uri="sip:1"/><entry uri="sip:2"/></list>
  <list name="b"><entry uri="sip:3"/></list>
</resource-lists>"#
        ))
        .unwrap()
    }

    fn eval(selector: &str) -> Result<Resolution, EvalError> {
        let selector = parse_node_selector(selector, &NamespaceBindings::new(), RL).unwrap();
        evaluate(&selector, &tree())
    }

    #[test]
    fn test_root_selection() {
        assert_eq!(eval("resource-lists").unwrap(), Resolution::Element(NodePath::root()));
        assert_eq!(eval("*").unwrap(), Resolution::Element(NodePath::root()));
        assert_eq!(eval("list"), Err(EvalError::NotFound { step: 1 }));
    }

    #[test]
    fn test_predicates() {
        assert_eq!(
            eval("resource-lists/list[@name=\"b\"]/entry").unwrap(),
            Resolution::Element(NodePath::from_indices(vec![1, 0]))
        );
        assert_eq!(
            eval("resource-lists/list[1]/entry[2]").unwrap(),
            Resolution::Element(NodePath::from_indices(vec![0, 1]))
        );
    }

    #[test]
    fn test_ambiguity() {
        assert_eq!(
            eval("resource-lists/list"),
            Err(EvalError::Ambiguous { step: 2, count: 2 })
        );
        // the first entry of every list
        assert_eq!(
            eval("resource-lists/list/entry[1]"),
            Err(EvalError::Ambiguous { step: 3, count: 2 })
        );
    }

    #[test]
    fn test_insertion_points() {
        assert_eq!(
            eval("resource-lists/list[1]/entry[3]").unwrap(),
            Resolution::Insertion(InsertionPoint::Element {
                parent: NodePath::from_indices(vec![0]),
                position: 2,
            })
        );
        assert_eq!(eval("resource-lists/list[1]/entry[4]"), Err(EvalError::NotFound { step: 3 }));
        assert_eq!(
            eval("resource-lists/list[@name=\"c\"]").unwrap(),
            Resolution::Insertion(InsertionPoint::Element {
                parent: NodePath::root(),
                position: 2,
            })
        );
        assert_eq!(
            eval("resource-lists/list/entry[@uri=\"sip:9\"]"),
            Err(EvalError::Ambiguous { step: 2, count: 2 })
        );
    }

    #[test]
    fn test_attribute_terminal() {
        assert_eq!(
            eval("resource-lists/list[2]/@name").unwrap(),
            Resolution::Attribute {
                element: NodePath::from_indices(vec![1]),
                name: QName::new(None, xcap_uri::ExpandedName::local("name")),
            }
        );
        assert!(matches!(
            eval("resource-lists/list[2]/@missing").unwrap(),
            Resolution::Insertion(InsertionPoint::Attribute { .. })
        ));
        assert_eq!(
            eval("resource-lists/list[3]/@name"),
            Err(EvalError::NotFound { step: 2 })
        );
    }

    #[test]
    fn test_namespace_terminal() {
        assert_eq!(
            eval("resource-lists/list[1]/namespace::*").unwrap(),
            Resolution::Namespaces(NodePath::from_indices(vec![0]))
        );
    }
}
