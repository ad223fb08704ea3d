//! Canonical text form of parsed URIs.
//!
//! Re-parsing the output with the same namespace bindings yields a value
//! equal to the one serialized.

use crate::ast::*;
use crate::parser::NODE_SELECTOR_SEPARATOR;
use std::fmt;

impl fmt::Display for DocumentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Context::Users(owner) => write!(f, "{}/users/{}/{}", self.auid, owner, self.document),
            Context::Global => write!(f, "{}/global/{}", self.auid, self.document),
        }
    }
}

impl fmt::Display for NameTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTest::Any => f.write_str("*"),
            NameTest::Name(qname) => f.write_str(&qname.qualified()),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Position(n) => write!(f, "[{}]", n),
            Predicate::AttributeEquals { name, value } => {
                write!(f, "[@{}=\"{}\"]", name.qualified(), escape_value(value))
            }
        }
    }
}

impl fmt::Display for ElementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for predicate in &self.predicates {
            write!(f, "{}", predicate)?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", step)?;
        }
        match &self.terminal {
            Some(TerminalSelector::Attribute(name)) => write!(f, "/@{}", name.qualified()),
            Some(TerminalSelector::NamespaceBindings) => f.write_str("/namespace::*"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for XcapUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document)?;
        if let Some(selector) = &self.node_selector {
            write!(f, "{}{}", NODE_SELECTOR_SEPARATOR, selector)?;
        }
        Ok(())
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::{parse, NamespaceBindings};

    const USAGES: [(&str, &str); 1] = [("resource-lists", "urn:ietf:params:xml:ns:resource-lists")];

    #[test]
    fn test_canonical_form() {
        let uri = parse(
            "/resource-lists/users/bob/index/~~/resource-lists/list[@name='x']/entry[1]",
            &NamespaceBindings::new(),
            &USAGES,
        )
        .unwrap();

        assert_eq!(
            uri.to_string(),
            r#"resource-lists/users/bob/index/~~/resource-lists/list[@name="x"]/entry[1]"#
        );
    }

    #[test]
    fn test_value_escaping() {
        let uri = parse(
            r#"resource-lists/global/index/~~/resource-lists/list[@name='say "hi" & go']"#,
            &NamespaceBindings::new(),
            &USAGES,
        )
        .unwrap();

        assert!(uri.to_string().ends_with(r#"list[@name="say &quot;hi&quot; &amp; go"]"#));
    }
}
