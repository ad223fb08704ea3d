//! Namespace URIs of the built-in application usages

pub const RESOURCE_LISTS: &str = "urn:ietf:params:xml:ns:resource-lists";
pub const COMMON_POLICY: &str = "urn:ietf:params:xml:ns:common-policy";
pub const PRES_RULES: &str = "urn:ietf:params:xml:ns:pres-rules";
pub const PIDF: &str = "urn:ietf:params:xml:ns:pidf";
pub const XCAP_CAPS: &str = "urn:ietf:params:xml:ns:xcap-caps";
pub const XCAP_ERROR: &str = "urn:ietf:params:xml:ns:xcap-error";
