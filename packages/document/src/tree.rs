//! # Document Tree
//!
//! Explicit tagged XML tree used as the live representation of every XCAP
//! document.
//!
//! Element names and attribute names are stored resolved
//! ([`ExpandedName`]) together with the prefix they were written with, so
//! a document serializes back to the same text it was parsed from. Nodes
//! are addressed by [`NodePath`]: the child indices leading from the root
//! element down to the node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use xcap_uri::ExpandedName;

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Position of an element inside a tree (child indices from the root)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Path of the root element
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Parent path and this node's index within it; `None` for the root
    pub fn split_last(&self) -> Option<(NodePath, usize)> {
        let (last, rest) = self.0.split_last()?;
        Some((NodePath(rest.to_vec()), *last))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        f.write_str(&parts.join("/"))
    }
}

/// `xmlns` / `xmlns:prefix` declaration carried by an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    /// Empty for `xmlns=""` (undeclaring the default namespace)
    pub uri: String,
}

impl NamespaceDecl {
    pub fn new(prefix: Option<&str>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            uri: uri.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub name: ExpandedName,
    pub value: String,
}

impl Attribute {
    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name.local)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub prefix: Option<String>,
    pub name: ExpandedName,
    pub namespaces: Vec<NamespaceDecl>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: ExpandedName) -> Self {
        Self {
            prefix: None,
            name,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn qualified_name(&self) -> String {
        qualify(self.prefix.as_deref(), &self.name.local)
    }

    pub fn attribute(&self, name: &ExpandedName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Shorthand for attributes without a namespace
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing the value in place if it already exists
    pub fn set_attribute(&mut self, prefix: Option<&str>, name: ExpandedName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                prefix: prefix.map(str::to_string),
                name,
                value,
            }),
        }
    }

    pub fn remove_attribute(&mut self, name: &ExpandedName) -> Option<Attribute> {
        let idx = self.attributes.iter().position(|a| &a.name == name)?;
        Some(self.attributes.remove(idx))
    }

    /// Element children with their index in `children`
    pub fn child_elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_element().map(|e| (i, e)))
    }

    /// Element children with the given name
    pub fn children_named<'a>(&'a self, name: &'a ExpandedName) -> impl Iterator<Item = &'a Element> {
        self.child_elements()
            .map(|(_, e)| e)
            .filter(move |e| &e.name == name)
    }

    /// Concatenated text content of direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn with_attribute(mut self, local: &str, value: impl Into<String>) -> Self {
        self.set_attribute(None, ExpandedName::local(local), value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_namespace(mut self, prefix: Option<&str>, uri: impl Into<String>) -> Self {
        self.namespaces.push(NamespaceDecl::new(prefix, uri));
        self
    }
}

/// A complete XML document: exactly one root element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlTree {
    pub root: Element,
}

impl XmlTree {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn element(&self, path: &NodePath) -> Option<&Element> {
        let mut current = &self.root;
        for &index in path.indices() {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    pub fn element_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        let mut current = &mut self.root;
        for &index in path.indices() {
            current = current.children.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Namespace bindings in scope at the element addressed by `path`,
    /// innermost declaration winning. An undeclared default namespace
    /// (`xmlns=""`) is omitted.
    pub fn in_scope_namespaces(&self, path: &NodePath) -> Option<Vec<NamespaceDecl>> {
        let mut scope: BTreeMap<Option<String>, String> = BTreeMap::new();
        let mut current = &self.root;
        collect_decls(current, &mut scope);

        for &index in path.indices() {
            current = current.children.get(index)?.as_element()?;
            collect_decls(current, &mut scope);
        }

        Some(
            scope
                .into_iter()
                .filter(|(_, uri)| !uri.is_empty())
                .map(|(prefix, uri)| NamespaceDecl { prefix, uri })
                .collect(),
        )
    }
}

fn collect_decls(element: &Element, scope: &mut BTreeMap<Option<String>, String>) {
    for decl in &element.namespaces {
        scope.insert(decl.prefix.clone(), decl.uri.clone());
    }
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:test";

    fn sample() -> XmlTree {
        XmlTree::new(
            Element::new(ExpandedName::ns(NS, "root"))
                .with_namespace(None, NS)
                .with_text("lead")
                .with_child(Element::new(ExpandedName::ns(NS, "a")).with_attribute("id", "1"))
                .with_child(
                    Element::new(ExpandedName::ns(NS, "b"))
                        .with_namespace(Some("x"), "urn:x")
                        .with_child(Element::new(ExpandedName::ns(NS, "c"))),
                ),
        )
    }

    #[test]
    fn test_paths_skip_text_nodes() {
        let tree = sample();

        assert_eq!(tree.element(&NodePath::root()).unwrap().name.local, "root");
        assert_eq!(tree.element(&NodePath::from_indices(vec![1])).unwrap().attr("id"), Some("1"));
        assert!(tree.element(&NodePath::from_indices(vec![0])).is_none());
        assert_eq!(
            tree.element(&NodePath::from_indices(vec![2, 0])).unwrap().name.local,
            "c"
        );
    }

    #[test]
    fn test_in_scope_namespaces() {
        let tree = sample();
        let decls = tree
            .in_scope_namespaces(&NodePath::from_indices(vec![2, 0]))
            .unwrap();

        assert_eq!(
            decls,
            vec![NamespaceDecl::new(None, NS), NamespaceDecl::new(Some("x"), "urn:x")]
        );
    }

    #[test]
    fn test_set_attribute_replaces_in_place() {
        let mut element = Element::new(ExpandedName::local("e"))
            .with_attribute("a", "1")
            .with_attribute("b", "2");
        element.set_attribute(None, ExpandedName::local("a"), "3");

        assert_eq!(element.attributes.len(), 2);
        assert_eq!(element.attributes[0].value, "3");
    }

    #[test]
    fn test_path_display() {
        assert_eq!(NodePath::root().to_string(), "/");
        assert_eq!(NodePath::from_indices(vec![1, 4]).to_string(), "/1/4");
    }
}
