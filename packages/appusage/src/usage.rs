//! # Application Usage
//!
//! Everything the server needs to know about one kind of XCAP document:
//! its default namespace and MIME type, the schema and semantic rules a
//! document must satisfy, which contexts it lives in, and the template
//! served when a missing document is auto-created.

use crate::rules::SemanticRule;
use crate::schema::Schema;
use crate::violation::Violation;
use tracing::debug;
use xcap_document::{parse_document_bytes, XmlTree};
use xcap_uri::{Context, DocumentSelector};

/// Document trees a usage may appear in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Users,
    Global,
}

impl ContextKind {
    pub fn of(context: &Context) -> Self {
        match context {
            Context::Users(_) => ContextKind::Users,
            Context::Global => ContextKind::Global,
        }
    }
}

pub struct ApplicationUsage {
    id: String,
    namespace: String,
    mime_type: String,
    schema: Schema,
    rules: Vec<Box<dyn SemanticRule>>,
    template: Option<XmlTree>,
    auto_create: bool,
    contexts: Vec<ContextKind>,
    read_only: bool,
}

impl ApplicationUsage {
    /// A writable per-user usage without template or semantic rules
    pub fn new(
        id: impl Into<String>,
        namespace: impl Into<String>,
        mime_type: impl Into<String>,
        schema: Schema,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            mime_type: mime_type.into(),
            schema,
            rules: Vec::new(),
            template: None,
            auto_create: false,
            contexts: vec![ContextKind::Users],
            read_only: false,
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn SemanticRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_template(mut self, template: XmlTree) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_contexts(mut self, contexts: &[ContextKind]) -> Self {
        self.contexts = contexts.to_vec();
        self
    }

    pub fn with_auto_create(mut self, auto_create: bool) -> Self {
        self.auto_create = auto_create;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub(crate) fn set_auto_create(&mut self, auto_create: bool) {
        self.auto_create = auto_create;
    }

    pub(crate) fn set_template(&mut self, template: XmlTree) {
        self.template = Some(template);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn default_namespace(&self) -> &str {
        &self.namespace
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rules(&self) -> &[Box<dyn SemanticRule>] {
        &self.rules
    }

    /// Document materialized on GET when none is stored
    pub fn default_template(&self) -> Option<&XmlTree> {
        self.template.as_ref()
    }

    /// Whether a GET of a missing document serves the template.
    /// Never true without a template.
    pub fn auto_create(&self) -> bool {
        self.auto_create && self.template.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn supports(&self, context: &Context) -> bool {
        self.contexts.contains(&ContextKind::of(context))
    }

    /// Schema check followed by the semantic rules. Semantic rules only
    /// run on schema-valid documents.
    pub fn validate(&self, tree: &XmlTree, document: Option<&DocumentSelector>) -> Vec<Violation> {
        let violations = self.schema.check(tree);
        if !violations.is_empty() {
            debug!(usage = %self.id, count = violations.len(), "schema validation failed");
            return violations;
        }

        let violations: Vec<Violation> = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(tree, document))
            .collect();
        if !violations.is_empty() {
            debug!(usage = %self.id, count = violations.len(), "semantic validation failed");
        }
        violations
    }

    /// Well-formedness check of raw content, then [`validate`](Self::validate)
    pub fn validate_bytes(
        &self,
        bytes: &[u8],
        document: Option<&DocumentSelector>,
    ) -> Result<XmlTree, Vec<Violation>> {
        let tree = parse_document_bytes(bytes)
            .map_err(|e| vec![Violation::not_well_formed(e.to_string())])?;

        let violations = self.validate(&tree, document);
        if violations.is_empty() {
            Ok(tree)
        } else {
            Err(violations)
        }
    }
}

impl std::fmt::Debug for ApplicationUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationUsage")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("mime_type", &self.mime_type)
            .field("rules", &format!("{} rules", self.rules.len()))
            .field("auto_create", &self.auto_create)
            .field("contexts", &self.contexts)
            .field("read_only", &self.read_only)
            .finish()
    }
}
