//! # Usage Registry
//!
//! Immutable table of application usages, built once at startup and shared
//! by every request. Implements [`UsageResolver`] so the URI parser can
//! resolve unprefixed names to a usage's default namespace.

use crate::builtin::{self, XCAP_CAPS_AUID};
use crate::usage::ApplicationUsage;
use xcap_uri::UsageResolver;

pub struct Registry {
    usages: Vec<ApplicationUsage>,
}

impl Registry {
    /// Registry with every built-in usage
    pub fn builtin() -> Self {
        Self::empty()
            .with_usage(builtin::resource_lists())
            .with_usage(builtin::pres_rules())
            .with_usage(builtin::pidf_manipulation())
            .with_usage(builtin::xcap_caps())
    }

    pub fn empty() -> Self {
        Self { usages: Vec::new() }
    }

    /// Register a usage, replacing any usage with the same id
    pub fn with_usage(mut self, usage: ApplicationUsage) -> Self {
        match self.usages.iter().position(|u| u.id() == usage.id()) {
            Some(index) => self.usages[index] = usage,
            None => self.usages.push(usage),
        }
        self.refresh_capabilities();
        self
    }

    /// Override whether a missing document is served from the template.
    /// Returns `false` when the usage is not registered.
    pub fn set_auto_create(&mut self, auid: &str, auto_create: bool) -> bool {
        match self.usages.iter_mut().find(|u| u.id() == auid) {
            Some(usage) => {
                usage.set_auto_create(auto_create);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, auid: &str) -> Option<&ApplicationUsage> {
        self.usages.iter().find(|u| u.id() == auid)
    }

    pub fn usages(&self) -> &[ApplicationUsage] {
        &self.usages
    }

    pub fn auids(&self) -> impl Iterator<Item = &str> {
        self.usages.iter().map(ApplicationUsage::id)
    }

    /// Keep the capabilities template in step with the registered usages
    fn refresh_capabilities(&mut self) {
        if let Some(index) = self.usages.iter().position(|u| u.id() == XCAP_CAPS_AUID) {
            let template = builtin::capabilities(&self.usages);
            self.usages[index].set_template(template);
        }
    }
}

impl UsageResolver for Registry {
    fn default_namespace(&self, auid: &str) -> Option<&str> {
        self.get(auid).map(ApplicationUsage::default_namespace)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("usages", &self.auids().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::{PRES_RULES, XCAP_CAPS};
    use xcap_uri::Context;

    #[test]
    fn test_builtin_usages() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.auids().collect::<Vec<_>>(),
            vec!["resource-lists", "pres-rules", "pidf-manipulation", "xcap-caps"]
        );
        assert_eq!(
            registry.default_namespace("pres-rules"),
            Some("urn:ietf:params:xml:ns:common-policy")
        );
        assert_eq!(registry.default_namespace("unknown"), None);
    }

    #[test]
    fn test_contexts_and_flags() {
        let registry = Registry::builtin();
        let caps = registry.get("xcap-caps").unwrap();
        let lists = registry.get("resource-lists").unwrap();

        assert!(caps.supports(&Context::Global));
        assert!(!caps.supports(&Context::Users("bob".into())));
        assert!(caps.is_read_only() && caps.auto_create());
        assert!(lists.supports(&Context::Users("bob".into())));
        assert!(!lists.auto_create());
    }

    #[test]
    fn test_capabilities_template_lists_usages() {
        let registry = Registry::builtin();
        let template = registry.get("xcap-caps").unwrap().default_template().unwrap();

        let auids: Vec<String> = template.root.child_elements().next().unwrap().1
            .child_elements()
            .map(|(_, e)| e.text())
            .collect();
        assert_eq!(auids, vec!["resource-lists", "pres-rules", "pidf-manipulation", "xcap-caps"]);

        let namespaces: Vec<String> = template.root.child_elements().nth(1).unwrap().1
            .child_elements()
            .map(|(_, e)| e.text())
            .collect();
        assert!(namespaces.iter().any(|ns| ns == PRES_RULES));
        assert!(namespaces.iter().any(|ns| ns == XCAP_CAPS));

        // the generated document satisfies its own schema
        assert!(registry.get("xcap-caps").unwrap().validate(template, None).is_empty());
    }

    #[test]
    fn test_auto_create_override() {
        let mut registry = Registry::builtin();

        assert!(registry.set_auto_create("pres-rules", true));
        assert!(registry.get("pres-rules").unwrap().auto_create());
        // without a template there is nothing to materialize
        assert!(registry.set_auto_create("pidf-manipulation", true));
        assert!(!registry.get("pidf-manipulation").unwrap().auto_create());
        assert!(!registry.set_auto_create("nope", true));
    }
}
