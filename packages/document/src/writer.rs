//! Serializes trees and fragments back to XML text with `quick-xml`.

use crate::errors::{XmlError, XmlResult};
use crate::tree::{Element, NamespaceDecl, Node, XmlTree};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Whole document, preceded by an XML declaration
pub fn write_document(tree: &XmlTree) -> XmlResult<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;
    write_node(&mut writer, &tree.root)?;
    finish(writer)
}

/// A single element as it appears in the document (no declaration)
pub fn write_element(element: &Element) -> XmlResult<String> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, element)?;
    finish(writer)
}

/// Namespace bindings in scope at `element`, rendered as an empty element
/// of the same name carrying one declaration per binding
pub fn write_namespace_bindings(element: &Element, bindings: &[NamespaceDecl]) -> XmlResult<String> {
    let name = element.qualified_name();
    let mut start = BytesStart::new(name.as_str());
    for decl in bindings {
        let key = declaration_key(decl);
        start.push_attribute((key.as_str(), decl.uri.as_str()));
    }

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Empty(start)).map_err(write_error)?;
    finish(writer)
}

/// Escape an attribute value for an `application/xcap-att+xml` body
pub fn escape_attribute_value(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}

fn write_node(writer: &mut Writer<Vec<u8>>, element: &Element) -> XmlResult<()> {
    let name = element.qualified_name();
    let mut start = BytesStart::new(name.as_str());

    for decl in &element.namespaces {
        let key = declaration_key(decl);
        start.push_attribute((key.as_str(), decl.uri.as_str()));
    }
    for attr in &element.attributes {
        let key = attr.qualified_name();
        start.push_attribute((key.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        match child {
            Node::Element(child) => write_node(writer, child)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name.as_str())))
        .map_err(write_error)
}

fn declaration_key(decl: &NamespaceDecl) -> String {
    match &decl.prefix {
        Some(prefix) => format!("xmlns:{}", prefix),
        None => "xmlns".to_string(),
    }
}

fn finish(writer: Writer<Vec<u8>>) -> XmlResult<String> {
    String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Write(e.to_string()))
}

fn write_error(error: impl std::fmt::Display) -> XmlError {
    XmlError::Write(error.to_string())
}
