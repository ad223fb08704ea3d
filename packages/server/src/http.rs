//! # HTTP Binding
//!
//! Serves the dispatcher over HTTP with `axum`. Every request below the
//! configured XCAP root is translated into an [`XcapRequest`]:
//!
//! - the path after the root is percent-decoded
//! - `xmlns(prefix=uri)` bindings are read from the query
//! - `If-Match` / `If-None-Match` become [`Preconditions`]
//! - the requester identity comes from a header set by the
//!   authenticating proxy in front of the server

use crate::dispatcher::Dispatcher;
use crate::preconditions::{Preconditions, TagSet};
use crate::request::{Method, Status, XcapRequest, XcapResponse};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;
use tracing::{debug, warn};
use xcap_uri::NamespaceBindings;

const ALLOWED_METHODS: &str = "GET, PUT, DELETE";

#[derive(Debug)]
pub struct HttpState {
    dispatcher: Arc<Dispatcher>,
    root: String,
    identity_header: HeaderName,
}

impl HttpState {
    pub fn new(dispatcher: Arc<Dispatcher>, root: &str, identity_header: &str) -> anyhow::Result<Self> {
        let root = format!("/{}", root.trim_matches('/'));
        let identity_header = HeaderName::from_bytes(identity_header.to_ascii_lowercase().as_bytes())?;
        Ok(Self {
            dispatcher,
            root,
            identity_header,
        })
    }

    /// Path below the XCAP root, still percent-encoded
    fn relative_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.root == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.root.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

pub fn router(state: Arc<HttpState>) -> Router {
    Router::new().fallback(handle).with_state(state)
}

async fn handle(
    State(state): State<Arc<HttpState>>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let method = match method {
        axum::http::Method::GET => Method::Get,
        axum::http::Method::PUT => Method::Put,
        axum::http::Method::DELETE => Method::Delete,
        other => {
            warn!(method = %other, "unsupported method");
            return (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, ALLOWED_METHODS)],
            )
                .into_response();
        }
    };

    let Some(path) = state.relative_path(uri.path()) else {
        debug!(path = uri.path(), "outside the XCAP root");
        return StatusCode::NOT_FOUND.into_response();
    };

    let request = match build_request(&state, method, path, uri.query(), &headers, body) {
        Ok(request) => request,
        Err(message) => {
            warn!(path = uri.path(), %message, "malformed request");
            return (StatusCode::BAD_REQUEST, message).into_response();
        }
    };

    let response = state.dispatcher.dispatch(request).await;
    into_http(response)
}

fn build_request(
    state: &HttpState,
    method: Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<XcapRequest, String> {
    let path = urlencoding::decode(path).map_err(|e| format!("Invalid path encoding: {}", e))?;

    let bindings = match query {
        Some(query) => {
            let query = urlencoding::decode(query).map_err(|e| format!("Invalid query encoding: {}", e))?;
            NamespaceBindings::from_query(&query).map_err(|e| e.to_string())?
        }
        None => NamespaceBindings::new(),
    };

    let preconditions = Preconditions {
        if_match: tag_set(headers, header::IF_MATCH)?,
        if_none_match: tag_set(headers, header::IF_NONE_MATCH)?,
    };

    let identity = headers
        .get(&state.identity_header)
        .map(|value| value.to_str().map(str::to_string))
        .transpose()
        .map_err(|_| format!("Invalid {} header", state.identity_header))?;

    let mut request = XcapRequest::new(method, path)
        .with_bindings(bindings)
        .with_preconditions(preconditions);
    request.identity = identity;
    if method == Method::Put {
        request.body = Some(body.to_vec());
    }
    Ok(request)
}

fn tag_set(headers: &HeaderMap, name: HeaderName) -> Result<Option<TagSet>, String> {
    let values: Vec<&str> = headers
        .get_all(&name)
        .iter()
        .map(|value| value.to_str().map_err(|_| format!("Invalid {} header", name)))
        .collect::<Result<_, _>>()?;

    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(TagSet::parse(&values.join(","))))
}

fn into_http(response: XcapResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    if let Some(mime_type) = response.mime_type.as_deref() {
        if let Ok(value) = HeaderValue::from_str(mime_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    if let Some(tag) = &response.entity_tag {
        if let Ok(value) = HeaderValue::from_str(&tag.quoted()) {
            headers.insert(header::ETAG, value);
        }
    }
    if response.status == Status::MethodNotAllowed {
        headers.insert(header::ALLOW, HeaderValue::from_static("GET"));
    }

    (status, headers, response.body.unwrap_or_default()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AllowAll;
    use crate::dispatcher::DispatcherConfig;
    use crate::store::MemoryStore;
    use xcap_appusage::Registry;

    fn state(root: &str) -> HttpState {
        let dispatcher = Dispatcher::new(DispatcherConfig {
            registry: Arc::new(Registry::builtin()),
            store: Arc::new(MemoryStore::new()),
            authorizer: Arc::new(AllowAll),
        });
        HttpState::new(Arc::new(dispatcher), root, "X-XCAP-Asserted-Identity").unwrap()
    }

    #[test]
    fn test_relative_path() {
        let state = state("/xcap-root/");
        assert_eq!(state.relative_path("/xcap-root/pres-rules"), Some("/pres-rules"));
        assert_eq!(state.relative_path("/xcap-root"), Some(""));
        assert_eq!(state.relative_path("/xcap-rootless/a"), None);
        assert_eq!(state.relative_path("/other"), None);

        assert_eq!(state_at_root().relative_path("/a/b"), Some("/a/b"));
    }

    fn state_at_root() -> HttpState {
        state("/")
    }

    #[test]
    fn test_build_request() {
        let state = state("/xcap-root");
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, HeaderValue::from_static("\"a-1\""));
        headers.insert("x-xcap-asserted-identity", HeaderValue::from_static("sip:bob@example.com"));

        let request = build_request(
            &state,
            Method::Get,
            "/resource-lists/users/sip:bob@example.com/index/~~/resource-lists/list%5B@name=%22a%22%5D",
            Some("xmlns(rl=urn:ietf:params:xml:ns:resource-lists)"),
            &headers,
            Bytes::new(),
        )
        .unwrap();

        assert!(request.path.ends_with(r#"list[@name="a"]"#));
        assert_eq!(request.bindings.get("rl"), Some("urn:ietf:params:xml:ns:resource-lists"));
        assert_eq!(request.identity.as_deref(), Some("sip:bob@example.com"));
        assert_eq!(
            request.preconditions.if_match,
            Some(TagSet::Tags(vec![crate::store::EntityTag::new("a-1")]))
        );
        assert!(request.body.is_none());
    }

    #[test]
    fn test_bad_query_is_rejected() {
        let state = state("/xcap-root");
        let result = build_request(&state, Method::Get, "/x", Some("p=q"), &HeaderMap::new(), Bytes::new());
        assert!(result.is_err());
    }
}
