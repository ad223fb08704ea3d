//! # XML Reader
//!
//! Builds [`XmlTree`]s from text using `quick-xml`'s pull parser and
//! resolves every element and attribute name against the namespace
//! declarations in scope.
//!
//! Comments, processing instructions and the doctype are not retained.
//! Whitespace-only text between elements is dropped; any other text is
//! kept verbatim (entities expanded, CDATA sections merged into text).

use crate::errors::{XmlError, XmlResult};
use crate::tree::{Attribute, Element, NamespaceDecl, Node, XmlTree, XML_NAMESPACE};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use xcap_uri::ExpandedName;

/// Parse a complete document: exactly one root element, nothing but
/// whitespace, comments and processing instructions around it
pub fn parse_document(source: &str) -> XmlResult<XmlTree> {
    let root = TreeBuilder::new(&[]).run(source)?;
    Ok(XmlTree::new(root))
}

/// Parse raw request bytes, which must be UTF-8
pub fn parse_document_bytes(bytes: &[u8]) -> XmlResult<XmlTree> {
    let source = std::str::from_utf8(bytes).map_err(|e| XmlError::Encoding(e.to_string()))?;
    parse_document(source)
}

/// Parse a single element whose unprefixed and prefixed names resolve
/// against `context`, the bindings in scope where it will be placed.
///
/// The returned element only carries the declarations written in the
/// fragment itself.
pub fn parse_fragment(source: &str, context: &[NamespaceDecl]) -> XmlResult<Element> {
    TreeBuilder::new(context).run(source)
}

/// Decode an attribute value sent as a request body (predefined and
/// character entities are expanded)
pub fn parse_attribute_value(source: &str) -> XmlResult<String> {
    quick_xml::escape::unescape(source)
        .map(|value| value.into_owned())
        .map_err(|e| XmlError::Syntax {
            position: 0,
            message: e.to_string(),
        })
}

struct TreeBuilder {
    /// One frame of declarations per open element, outermost first
    scopes: Vec<Vec<NamespaceDecl>>,
    open: Vec<Element>,
    root: Option<Element>,
}

impl TreeBuilder {
    fn new(context: &[NamespaceDecl]) -> Self {
        Self {
            scopes: vec![context.to_vec()],
            open: Vec::new(),
            root: None,
        }
    }

    fn run(mut self, source: &str) -> XmlResult<Element> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let mut reader = Reader::from_str(source);

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|e| XmlError::Syntax {
                position,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(start) => {
                    let element = self.open_element(&start)?;
                    self.open.push(element);
                }
                Event::Empty(start) => {
                    let element = self.open_element(&start)?;
                    self.close_element(element)?;
                }
                Event::End(_) => {
                    let element = self.open.pop().ok_or(XmlError::UnexpectedClose)?;
                    self.close_element(element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| XmlError::Syntax {
                        position,
                        message: e.to_string(),
                    })?;
                    self.push_text(&text)?;
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(&data)
                        .map_err(|e| XmlError::Encoding(e.to_string()))?
                        .to_string();
                    self.push_text(&text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = self.open.last() {
            return Err(XmlError::UnclosedElement(unclosed.qualified_name()));
        }
        self.root.ok_or(XmlError::NoRootElement)
    }

    fn open_element(&mut self, start: &BytesStart<'_>) -> XmlResult<Element> {
        if self.open.is_empty() && self.root.is_some() {
            return Err(XmlError::MultipleRoots);
        }

        let mut declarations = Vec::new();
        let mut raw_attributes = Vec::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::Syntax {
                position: 0,
                message: e.to_string(),
            })?;
            let key = utf8(attr.key.as_ref())?;
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::Syntax {
                    position: 0,
                    message: e.to_string(),
                })?
                .into_owned();

            if key == "xmlns" {
                declarations.push(NamespaceDecl::new(None, value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.push(NamespaceDecl::new(Some(prefix), value));
            } else {
                raw_attributes.push((key, value));
            }
        }

        self.scopes.push(declarations.clone());

        let (prefix, local) = split_qname(&utf8(start.name().as_ref())?);
        let namespace = self.lookup(prefix.as_deref(), true)?;

        let mut attributes: Vec<Attribute> = Vec::with_capacity(raw_attributes.len());
        for (key, value) in raw_attributes {
            let (attr_prefix, attr_local) = split_qname(&key);
            let attr_namespace = match attr_prefix {
                Some(_) => self.lookup(attr_prefix.as_deref(), false)?,
                None => None,
            };
            let name = ExpandedName::new(attr_namespace.as_deref(), attr_local);
            if attributes.iter().any(|a| a.name == name) {
                return Err(XmlError::Syntax {
                    position: 0,
                    message: format!("duplicate attribute {}", name),
                });
            }
            attributes.push(Attribute {
                prefix: attr_prefix,
                name,
                value,
            });
        }

        Ok(Element {
            prefix,
            name: ExpandedName::new(namespace.as_deref(), local),
            namespaces: declarations,
            attributes,
            children: Vec::new(),
        })
    }

    fn close_element(&mut self, element: Element) -> XmlResult<()> {
        self.scopes.pop();
        match self.open.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None => {
                if self.root.is_some() {
                    return Err(XmlError::MultipleRoots);
                }
                self.root = Some(element);
            }
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str) -> XmlResult<()> {
        let Some(parent) = self.open.last_mut() else {
            return if text.trim().is_empty() {
                Ok(())
            } else {
                Err(XmlError::ContentOutsideRoot)
            };
        };

        if let Some(Node::Text(existing)) = parent.children.last_mut() {
            existing.push_str(text);
            return Ok(());
        }
        if !text.trim().is_empty() {
            parent.children.push(Node::Text(text.to_string()));
        }
        Ok(())
    }

    /// Resolve a prefix against the open scopes. Unprefixed element names
    /// take the default namespace; unprefixed attributes never reach here.
    fn lookup(&self, prefix: Option<&str>, is_element: bool) -> XmlResult<Option<String>> {
        if prefix == Some("xml") {
            return Ok(Some(XML_NAMESPACE.to_string()));
        }

        let bound = self
            .scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|decl| decl.prefix.as_deref() == prefix)
            .map(|decl| decl.uri.clone());

        match (prefix, bound) {
            (None, Some(uri)) if uri.is_empty() => Ok(None),
            (None, bound) if is_element => Ok(bound),
            (None, _) => Ok(None),
            (Some(_), Some(uri)) if !uri.is_empty() => Ok(Some(uri)),
            (Some(prefix), _) => Err(XmlError::UnboundPrefix(prefix.to_string())),
        }
    }
}

fn split_qname(qname: &str) -> (Option<String>, String) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, qname.to_string()),
    }
}

fn utf8(bytes: &[u8]) -> XmlResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| XmlError::Encoding(e.to_string()))
}
