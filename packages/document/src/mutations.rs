//! # Tree Mutations
//!
//! Splice operations applied to a working copy of a document. Every
//! mutation is validated against the tree before anything changes, so a
//! failed mutation leaves the tree untouched.
//!
//! ## Semantics
//!
//! - `ReplaceElement` swaps the element at a path, including the root.
//! - `InsertElement` places a new child at a position in the parent's child
//!   list (text nodes included).
//! - `RemoveElement` removes an element and its descendants; the root
//!   element cannot be removed.
//! - `SetAttribute` creates or overwrites an attribute. A prefixed name
//!   not yet bound on the element gets a namespace declaration added.

use crate::errors::MutationError;
use crate::tree::{Element, NamespaceDecl, Node, NodePath, XmlTree, XML_NAMESPACE};
use serde::{Deserialize, Serialize};
use xcap_uri::{ExpandedName, QName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    ReplaceElement {
        path: NodePath,
        element: Element,
    },

    InsertElement {
        parent: NodePath,
        position: usize,
        element: Element,
    },

    RemoveElement {
        path: NodePath,
    },

    SetAttribute {
        element: NodePath,
        name: QName,
        value: String,
    },

    RemoveAttribute {
        element: NodePath,
        name: ExpandedName,
    },
}

impl Mutation {
    /// Apply the mutation, validating it first
    pub fn apply(&self, tree: &mut XmlTree) -> Result<(), MutationError> {
        self.validate(tree)?;

        match self {
            Mutation::ReplaceElement { path, element } => {
                let target = tree
                    .element_mut(path)
                    .ok_or_else(|| MutationError::NodeNotFound(path.to_string()))?;
                *target = element.clone();
            }

            Mutation::InsertElement { parent, position, element } => {
                let target = tree
                    .element_mut(parent)
                    .ok_or_else(|| MutationError::ParentNotFound(parent.to_string()))?;
                target.children.insert(*position, Node::Element(element.clone()));
            }

            Mutation::RemoveElement { path } => {
                let (parent, index) = path.split_last().ok_or(MutationError::RootRemoval)?;
                let target = tree
                    .element_mut(&parent)
                    .ok_or_else(|| MutationError::ParentNotFound(parent.to_string()))?;
                target.children.remove(index);
            }

            Mutation::SetAttribute { element, name, value } => {
                let declare = Self::missing_declaration(tree, element, name)?;
                let target = tree
                    .element_mut(element)
                    .ok_or_else(|| MutationError::NodeNotFound(element.to_string()))?;
                if let Some(decl) = declare {
                    target.namespaces.push(decl);
                }
                target.set_attribute(name.prefix.as_deref(), name.name.clone(), value.clone());
            }

            Mutation::RemoveAttribute { element, name } => {
                let target = tree
                    .element_mut(element)
                    .ok_or_else(|| MutationError::NodeNotFound(element.to_string()))?;
                target.remove_attribute(name);
            }
        }

        Ok(())
    }

    /// Check the mutation can be applied without changing the tree
    pub fn validate(&self, tree: &XmlTree) -> Result<(), MutationError> {
        match self {
            Mutation::ReplaceElement { path, .. } => {
                tree.element(path)
                    .ok_or_else(|| MutationError::NodeNotFound(path.to_string()))?;
            }

            Mutation::InsertElement { parent, position, .. } => {
                let target = tree
                    .element(parent)
                    .ok_or_else(|| MutationError::ParentNotFound(parent.to_string()))?;
                if *position > target.children.len() {
                    return Err(MutationError::PositionOutOfRange {
                        parent: parent.to_string(),
                        position: *position,
                    });
                }
            }

            Mutation::RemoveElement { path } => {
                if path.is_root() {
                    return Err(MutationError::RootRemoval);
                }
                tree.element(path)
                    .ok_or_else(|| MutationError::NodeNotFound(path.to_string()))?;
            }

            Mutation::SetAttribute { element, name, .. } => {
                tree.element(element)
                    .ok_or_else(|| MutationError::NodeNotFound(element.to_string()))?;
                Self::missing_declaration(tree, element, name)?;
            }

            Mutation::RemoveAttribute { element, name } => {
                let target = tree
                    .element(element)
                    .ok_or_else(|| MutationError::NodeNotFound(element.to_string()))?;
                if target.attribute(name).is_none() {
                    return Err(MutationError::NodeNotFound(format!("{}/@{}", element, name)));
                }
            }
        }

        Ok(())
    }

    /// Path of the element the mutation writes to
    pub fn target(&self) -> &NodePath {
        match self {
            Mutation::ReplaceElement { path, .. } | Mutation::RemoveElement { path } => path,
            Mutation::InsertElement { parent, .. } => parent,
            Mutation::SetAttribute { element, .. } | Mutation::RemoveAttribute { element, .. } => {
                element
            }
        }
    }

    /// Declaration needed for a namespaced attribute's prefix, if any
    fn missing_declaration(
        tree: &XmlTree,
        element: &NodePath,
        name: &QName,
    ) -> Result<Option<NamespaceDecl>, MutationError> {
        let Some(namespace) = name.name.namespace.as_deref() else {
            return Ok(None);
        };
        let Some(prefix) = name.prefix.as_deref() else {
            return Err(MutationError::MissingPrefix(name.name.to_string()));
        };
        if prefix == "xml" && namespace == XML_NAMESPACE {
            return Ok(None);
        }

        let scope = tree
            .in_scope_namespaces(element)
            .ok_or_else(|| MutationError::NodeNotFound(element.to_string()))?;

        match scope.iter().find(|decl| decl.prefix.as_deref() == Some(prefix)) {
            Some(decl) if decl.uri == namespace => Ok(None),
            Some(decl) => Err(MutationError::PrefixConflict {
                prefix: prefix.to_string(),
                bound: decl.uri.clone(),
            }),
            None => Ok(Some(NamespaceDecl::new(Some(prefix), namespace))),
        }
    }
}
