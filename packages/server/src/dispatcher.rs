//! # Request Dispatcher
//!
//! Maps one [`XcapRequest`] onto the document model:
//!
//! 1. parse the path into an [`XcapUri`]
//! 2. check the application usage serves the document's context
//! 3. authorize the requester, before touching storage
//! 4. branch on method and on the presence of a node selector
//!
//! Every error becomes a response here, so [`Dispatcher::dispatch`] never
//! fails. Conflicts and validation failures carry an
//! `application/xcap-error+xml` body.

use crate::authz::Authorizer;
use crate::coordinator::{Change, Coordinator};
use crate::error::{ConflictReason, XcapError};
use crate::preconditions::PreconditionOutcome;
use crate::request::{
    Method, Status, XcapRequest, XcapResponse, ATTRIBUTE_MIME, ELEMENT_MIME, ERROR_MIME,
    NAMESPACES_MIME,
};
use crate::store::{DocumentKey, Store};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use xcap_appusage::namespaces::XCAP_ERROR;
use xcap_appusage::{ApplicationUsage, Registry, ViolationCode};
use xcap_document::{
    escape_attribute_value, evaluate, parse_attribute_value, parse_fragment, write_document,
    write_element, write_namespace_bindings, Element, InsertionPoint, Mutation, NodePath,
    Resolution, XmlTree,
};
use xcap_uri::{ExpandedName, NodeSelector, XcapUri};

/// Everything the dispatcher needs, built once at startup
#[derive(Clone)]
pub struct DispatcherConfig {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn Store>,
    pub authorizer: Arc<dyn Authorizer>,
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    authorizer: Arc<dyn Authorizer>,
    coordinator: Coordinator,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            registry: config.registry,
            authorizer: config.authorizer,
            coordinator: Coordinator::new(config.store),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn dispatch(&self, request: XcapRequest) -> XcapResponse {
        match self.handle(&request).await {
            Ok(response) => {
                debug!(status = response.status.code(), "request served");
                response
            }
            Err(error) => {
                warn!(status = error.status().code(), %error, "request failed");
                error_response(&error)
            }
        }
    }

    async fn handle(&self, request: &XcapRequest) -> Result<XcapResponse, XcapError> {
        let uri = xcap_uri::parse(&request.path, &request.bindings, self.registry.as_ref())?;
        let usage = self
            .registry
            .get(uri.auid())
            .ok_or_else(|| XcapError::not_found(format!("no application usage {}", uri.auid())))?;
        if !usage.supports(uri.context()) {
            return Err(XcapError::not_found(format!(
                "{} has no {} documents",
                usage.id(),
                uri.context().segment()
            )));
        }

        let key = DocumentKey::from(&uri.document);
        if !self
            .authorizer
            .authorize(request.identity.as_deref(), &key, request.method)
        {
            return Err(XcapError::Forbidden);
        }

        if request.method.is_write() {
            if usage.is_read_only() {
                return Err(XcapError::MethodNotAllowed(format!("{} is read-only", usage.id())));
            }
            if uri.node_selector.as_ref().is_some_and(NodeSelector::selects_namespaces) {
                return Err(XcapError::MethodNotAllowed(
                    "namespace bindings cannot be modified".to_string(),
                ));
            }
        }

        match (request.method, &uri.node_selector) {
            (Method::Get, _) => self.get(&uri, usage, request).await,
            (Method::Put, None) => self.put_document(&uri, usage, request).await,
            (Method::Put, Some(selector)) => self.put_node(&uri, selector, usage, request).await,
            (Method::Delete, None) => self.delete_document(&uri, usage, request).await,
            (Method::Delete, Some(selector)) => {
                self.delete_node(&uri, selector, usage, request).await
            }
        }
    }

    async fn get(
        &self,
        uri: &XcapUri,
        usage: &ApplicationUsage,
        request: &XcapRequest,
    ) -> Result<XcapResponse, XcapError> {
        let key = DocumentKey::from(&uri.document);
        let (content, tag) = match self.coordinator.read(&key).await? {
            Some(stored) => (stored.content, Some(stored.tag)),
            None => match usage.default_template() {
                Some(template) if usage.auto_create() => {
                    debug!(%key, "serving default template");
                    (Arc::new(template.clone()), None)
                }
                _ => return Err(XcapError::not_found(format!("document {} does not exist", key))),
            },
        };

        match request.preconditions.evaluate(tag.as_ref()) {
            PreconditionOutcome::Pass => {}
            PreconditionOutcome::MatchFailed => return Err(XcapError::PreconditionFailed),
            PreconditionOutcome::NoneMatchHit => {
                return Ok(XcapResponse::status(Status::NotModified).with_tag(tag))
            }
        }

        let Some(selector) = &uri.node_selector else {
            let body = write_document(&content)?;
            return Ok(XcapResponse::content(body, usage.mime_type()).with_tag(tag));
        };

        let (body, mime_type) = match evaluate(selector, &content)? {
            Resolution::Element(path) => (write_element(element_at(&content, &path)?)?, ELEMENT_MIME),
            Resolution::Attribute { element, name } => {
                let value = element_at(&content, &element)?
                    .attribute(&name.name)
                    .ok_or_else(|| XcapError::not_found(format!("attribute {}", name.qualified())))?;
                (escape_attribute_value(value), ATTRIBUTE_MIME)
            }
            Resolution::Namespaces(path) => {
                let bindings = content
                    .in_scope_namespaces(&path)
                    .ok_or_else(|| XcapError::not_found(path.to_string()))?;
                (
                    write_namespace_bindings(element_at(&content, &path)?, &bindings)?,
                    NAMESPACES_MIME,
                )
            }
            Resolution::Insertion(_) => {
                return Err(XcapError::not_found("node selector does not select a node"))
            }
        };

        Ok(XcapResponse::content(body, mime_type).with_tag(tag))
    }

    async fn put_document(
        &self,
        uri: &XcapUri,
        usage: &ApplicationUsage,
        request: &XcapRequest,
    ) -> Result<XcapResponse, XcapError> {
        let body = request.body.as_deref().unwrap_or_default();
        let tree = usage
            .validate_bytes(body, Some(&uri.document))
            .map_err(XcapError::Validation)?;
        let tree = Arc::new(tree);

        let committed = self
            .coordinator
            .mutate(&uri.document, usage, &request.preconditions, move |_| {
                Ok(Change::Write(tree))
            })
            .await?;

        Ok(written(committed.created).with_tag(committed.tag))
    }

    async fn put_node(
        &self,
        uri: &XcapUri,
        selector: &NodeSelector,
        usage: &ApplicationUsage,
        request: &XcapRequest,
    ) -> Result<XcapResponse, XcapError> {
        let body = request.body.clone().unwrap_or_default();
        let selector = selector.clone();
        // a missing document starts from the usage's template when it auto-creates
        let template = usage
            .default_template()
            .filter(|_| usage.auto_create())
            .cloned();

        let committed = self
            .coordinator
            .mutate(&uri.document, usage, &request.preconditions, move |current| {
                let mut working = match (current, template) {
                    (Some(current), _) => current,
                    (None, Some(template)) => Arc::new(template),
                    (None, None) => return Err(XcapError::not_found("document does not exist")),
                };
                let tree = Arc::make_mut(&mut working);

                let (mutation, expected) = node_put(&selector, tree, &body)?;
                let inserts = matches!(mutation, Mutation::InsertElement { .. })
                    || matches!(&expected, Resolution::Attribute { element, name }
                        if tree.element(element).and_then(|e| e.attribute(&name.name)).is_none());
                mutation.apply(tree)?;

                match evaluate(&selector, tree) {
                    Ok(found) if found == expected => {}
                    _ => {
                        return Err(XcapError::conflict(
                            ConflictReason::CannotInsert,
                            "the node selector would not select the new content",
                        ))
                    }
                }

                Ok(if inserts {
                    Change::Insert(working)
                } else {
                    Change::Write(working)
                })
            })
            .await?;

        Ok(written(committed.created).with_tag(committed.tag))
    }

    async fn delete_node(
        &self,
        uri: &XcapUri,
        selector: &NodeSelector,
        usage: &ApplicationUsage,
        request: &XcapRequest,
    ) -> Result<XcapResponse, XcapError> {
        let selector = selector.clone();

        let committed = self
            .coordinator
            .mutate(&uri.document, usage, &request.preconditions, move |current| {
                let mut working = current.ok_or_else(|| XcapError::not_found("document does not exist"))?;
                let tree = Arc::make_mut(&mut working);

                let mutation = match evaluate(&selector, tree)? {
                    Resolution::Element(path) if path.is_root() => {
                        return Err(XcapError::conflict(
                            ConflictReason::CannotDelete,
                            "the root element cannot be deleted",
                        ))
                    }
                    Resolution::Element(path) => Mutation::RemoveElement { path },
                    Resolution::Attribute { element, name } => Mutation::RemoveAttribute {
                        element,
                        name: name.name,
                    },
                    Resolution::Namespaces(_) => {
                        return Err(XcapError::MethodNotAllowed(
                            "namespace bindings cannot be modified".to_string(),
                        ))
                    }
                    Resolution::Insertion(_) => {
                        return Err(XcapError::not_found("node selector does not select a node"))
                    }
                };
                mutation.apply(tree)?;

                if evaluate(&selector, tree).is_ok_and(|found| found.exists()) {
                    return Err(XcapError::conflict(
                        ConflictReason::CannotDelete,
                        "the node selector would still select a node",
                    ));
                }
                Ok(Change::Write(working))
            })
            .await?;

        Ok(XcapResponse::status(Status::Ok).with_tag(committed.tag))
    }

    async fn delete_document(
        &self,
        uri: &XcapUri,
        usage: &ApplicationUsage,
        request: &XcapRequest,
    ) -> Result<XcapResponse, XcapError> {
        let key = DocumentKey::from(&uri.document);
        self.coordinator
            .mutate(&uri.document, usage, &request.preconditions, move |current| {
                match current {
                    Some(_) => Ok(Change::Remove),
                    None => Err(XcapError::not_found(format!("document {} does not exist", key))),
                }
            })
            .await?;

        Ok(XcapResponse::status(Status::Ok))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

fn written(created: bool) -> XcapResponse {
    XcapResponse::status(if created { Status::Created } else { Status::Ok })
}

fn element_at<'a>(tree: &'a XmlTree, path: &NodePath) -> Result<&'a Element, XcapError> {
    tree.element(path)
        .ok_or_else(|| XcapError::not_found(format!("element {}", path)))
}

/// The mutation a node PUT performs, and the resolution the selector must
/// have once it is applied
fn node_put(
    selector: &NodeSelector,
    tree: &XmlTree,
    body: &[u8],
) -> Result<(Mutation, Resolution), XcapError> {
    match evaluate(selector, tree)? {
        Resolution::Element(path) => {
            let context = match path.split_last() {
                Some((parent, _)) => tree.in_scope_namespaces(&parent).unwrap_or_default(),
                None => Vec::new(),
            };
            let element = element_body(body, &context)?;
            let expected = Resolution::Element(path.clone());
            Ok((Mutation::ReplaceElement { path, element }, expected))
        }

        Resolution::Insertion(InsertionPoint::Element { parent, position }) => {
            let context = tree.in_scope_namespaces(&parent).unwrap_or_default();
            let element = element_body(body, &context)?;
            let expected = Resolution::Element(parent.child(position));
            Ok((
                Mutation::InsertElement {
                    parent,
                    position,
                    element,
                },
                expected,
            ))
        }

        Resolution::Attribute { element, name }
        | Resolution::Insertion(InsertionPoint::Attribute { element, name }) => {
            let value = attribute_body(body)?;
            let expected = Resolution::Attribute {
                element: element.clone(),
                name: name.clone(),
            };
            Ok((Mutation::SetAttribute { element, name, value }, expected))
        }

        Resolution::Namespaces(_) => Err(XcapError::MethodNotAllowed(
            "namespace bindings cannot be modified".to_string(),
        )),
    }
}

fn element_body(body: &[u8], context: &[xcap_document::NamespaceDecl]) -> Result<Element, XcapError> {
    let source = std::str::from_utf8(body)
        .map_err(|e| XcapError::conflict(ConflictReason::NotXmlFragment, e.to_string()))?;
    parse_fragment(source, context)
        .map_err(|e| XcapError::conflict(ConflictReason::NotXmlFragment, e.to_string()))
}

fn attribute_body(body: &[u8]) -> Result<String, XcapError> {
    let source = std::str::from_utf8(body)
        .map_err(|e| XcapError::conflict(ConflictReason::NotXmlAttValue, e.to_string()))?;
    if source.contains(&['<', '"'][..]) {
        return Err(XcapError::conflict(
            ConflictReason::NotXmlAttValue,
            "attribute values cannot contain '<' or '\"'",
        ));
    }
    parse_attribute_value(source)
        .map_err(|e| XcapError::conflict(ConflictReason::NotXmlAttValue, e.to_string()))
}

/// Response for a failed request, with an `xcap-error` body when the
/// failure has an RFC 4825 error element
pub fn error_response(error: &XcapError) -> XcapResponse {
    let response = XcapResponse::status(error.status());
    match error_document(error).and_then(|tree| write_document(&tree).ok()) {
        Some(body) => XcapResponse {
            body: Some(body.into_bytes()),
            mime_type: Some(ERROR_MIME.to_string()),
            ..response
        },
        None => response,
    }
}

fn error_document(error: &XcapError) -> Option<XmlTree> {
    let name = |local: &str| ExpandedName::ns(XCAP_ERROR, local);

    let detail = match error {
        XcapError::Conflict { reason, message } => {
            Element::new(name(reason.element_name())).with_attribute("phrase", message.as_str())
        }
        XcapError::Validation(violations) => {
            let first = violations.first()?;
            let detail = Element::new(name(first.code.element_name()));
            match first.code {
                ViolationCode::Uniqueness => detail.with_child(
                    Element::new(name("exists")).with_attribute("field", first.path.as_str()),
                ),
                _ => detail.with_attribute("phrase", first.message.as_str()),
            }
        }
        _ => return None,
    };

    Some(XmlTree::new(
        Element::new(name("xcap-error"))
            .with_namespace(None, XCAP_ERROR)
            .with_child(detail),
    ))
}
