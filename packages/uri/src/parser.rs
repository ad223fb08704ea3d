use crate::ast::*;
use crate::error::{UriError, UriResult};
use crate::namespaces::{NamespaceBindings, UsageResolver};
use crate::tokenizer::{tokenize, Token};

/// Separator between the document selector and the node selector
pub const NODE_SELECTOR_SEPARATOR: &str = "/~~/";

/// Parse a decoded XCAP URI path (relative to the XCAP root).
///
/// Unprefixed element names in the node selector resolve to the default
/// namespace of the addressed application usage; prefixed names resolve
/// through `bindings`.
pub fn parse<R>(path: &str, bindings: &NamespaceBindings, resolver: &R) -> UriResult<XcapUri>
where
    R: UsageResolver + ?Sized,
{
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return Err(UriError::MissingDocumentSelector);
    }

    let (document_part, selector_part) = match path.find(NODE_SELECTOR_SEPARATOR) {
        Some(idx) => (&path[..idx], Some(&path[idx + NODE_SELECTOR_SEPARATOR.len()..])),
        None => match path.strip_suffix("/~~") {
            Some(document_part) => (document_part, Some("")),
            None => (path, None),
        },
    };

    let document = parse_document_selector(document_part)?;
    let default_namespace = resolver
        .default_namespace(&document.auid)
        .ok_or_else(|| UriError::UnknownApplicationUsage(document.auid.clone()))?;

    let node_selector = match selector_part {
        Some(source) => {
            Some(SelectorParser::new(source, bindings, default_namespace)?.parse_node_selector()?)
        }
        None => None,
    };

    Ok(XcapUri {
        document,
        node_selector,
    })
}

/// Parse only a node selector (the part after `/~~/`)
pub fn parse_node_selector(
    source: &str,
    bindings: &NamespaceBindings,
    default_namespace: &str,
) -> UriResult<NodeSelector> {
    SelectorParser::new(source, bindings, default_namespace)?.parse_node_selector()
}

fn parse_document_selector(source: &str) -> UriResult<DocumentSelector> {
    let mut segments = source.split('/');

    let auid = match segments.next() {
        Some(auid) if !auid.is_empty() => auid,
        _ => return Err(UriError::MissingDocumentSelector),
    };

    let context = match segments.next() {
        Some("users") => match segments.next() {
            Some(owner) if !owner.is_empty() => Context::Users(owner.to_string()),
            _ => return Err(UriError::MissingOwner),
        },
        Some("global") => Context::Global,
        Some(other) if !other.is_empty() => return Err(UriError::UnknownContext(other.to_string())),
        _ => return Err(UriError::MissingDocumentSelector),
    };

    let rest: Vec<&str> = segments.collect();
    if rest.is_empty() || rest.iter().all(|s| s.is_empty()) {
        return Err(UriError::MissingDocumentName);
    }
    if rest.iter().any(|s| s.is_empty()) {
        return Err(UriError::EmptySegment);
    }

    Ok(DocumentSelector::new(auid, context, rest.join("/")))
}

/// Recursive descent over node selector tokens
struct SelectorParser<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, std::ops::Range<usize>)>,
    pos: usize,
    bindings: &'src NamespaceBindings,
    default_namespace: &'src str,
}

impl<'src> SelectorParser<'src> {
    fn new(
        source: &'src str,
        bindings: &'src NamespaceBindings,
        default_namespace: &'src str,
    ) -> UriResult<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            pos: 0,
            bindings,
            default_namespace,
        })
    }

    fn parse_node_selector(&mut self) -> UriResult<NodeSelector> {
        if self.is_at_end() {
            return Err(UriError::invalid_selector(0, "empty node selector"));
        }

        let mut steps = Vec::new();
        let mut terminal = None;

        loop {
            match self.peek() {
                Some(Token::At) => {
                    self.advance();
                    let name = self.parse_attribute_name()?;
                    terminal = Some(TerminalSelector::Attribute(name));
                }
                Some(Token::Name("namespace")) if self.peek_at(1) == Some(&Token::ColonColon) => {
                    self.advance();
                    self.advance();
                    self.expect(Token::Star, "'*' after 'namespace::'")?;
                    terminal = Some(TerminalSelector::NamespaceBindings);
                }
                _ => steps.push(self.parse_element_step()?),
            }

            if terminal.is_some() {
                if !self.is_at_end() {
                    return Err(UriError::invalid_selector(
                        self.current_pos(),
                        "attribute and namespace selectors must be the last step",
                    ));
                }
                break;
            }

            if self.is_at_end() {
                break;
            }
            self.expect(Token::Slash, "'/' between steps")?;
        }

        if steps.is_empty() {
            return Err(UriError::invalid_selector(0, "selector must start with an element step"));
        }

        Ok(NodeSelector { steps, terminal })
    }

    fn parse_element_step(&mut self) -> UriResult<ElementStep> {
        let name = if self.match_token(Token::Star) {
            NameTest::Any
        } else {
            NameTest::Name(self.parse_element_name()?)
        };

        let mut predicates = Vec::new();
        while self.match_token(Token::LBracket) {
            predicates.push(self.parse_predicate()?);
            self.expect(Token::RBracket, "']'")?;
        }

        Ok(ElementStep { name, predicates })
    }

    fn parse_predicate(&mut self) -> UriResult<Predicate> {
        let pos = self.current_pos();
        match self.advance() {
            Some(Token::Number(n)) => {
                let index: usize = n
                    .parse()
                    .map_err(|_| UriError::invalid_selector(pos, "position out of range"))?;
                if index == 0 {
                    return Err(UriError::invalid_selector(pos, "positions start at 1"));
                }
                Ok(Predicate::Position(index))
            }
            Some(Token::At) => {
                let name = self.parse_attribute_name()?;
                self.expect(Token::Eq, "'=' in attribute predicate")?;
                let value_pos = self.current_pos();
                let value = match self.advance() {
                    Some(Token::DoubleQuoted(v)) | Some(Token::SingleQuoted(v)) => {
                        unescape_value(v).ok_or_else(|| {
                            UriError::invalid_selector(value_pos, "invalid entity reference")
                        })?
                    }
                    _ => return Err(UriError::invalid_selector(value_pos, "expected quoted value")),
                };
                Ok(Predicate::AttributeEquals { name, value })
            }
            _ => Err(UriError::invalid_selector(pos, "expected position or attribute test")),
        }
    }

    /// `prefix:local` or `local`, returned as (prefix, local)
    fn parse_raw_qname(&mut self) -> UriResult<(Option<&'src str>, &'src str)> {
        let pos = self.current_pos();
        let first = match self.advance() {
            Some(Token::Name(name)) => name,
            _ => return Err(UriError::invalid_selector(pos, "expected name")),
        };

        if self.match_token(Token::Colon) {
            let pos = self.current_pos();
            match self.advance() {
                Some(Token::Name(local)) => Ok((Some(first), local)),
                _ => Err(UriError::invalid_selector(pos, "expected local name after prefix")),
            }
        } else {
            Ok((None, first))
        }
    }

    fn parse_element_name(&mut self) -> UriResult<QName> {
        let (prefix, local) = self.parse_raw_qname()?;
        let namespace = match prefix {
            Some(prefix) => self.resolve_prefix(prefix)?,
            None => self.default_namespace,
        };
        Ok(QName::new(prefix, ExpandedName::ns(namespace, local)))
    }

    fn parse_attribute_name(&mut self) -> UriResult<QName> {
        let (prefix, local) = self.parse_raw_qname()?;
        let name = match prefix {
            Some(prefix) => ExpandedName::ns(self.resolve_prefix(prefix)?, local),
            None => ExpandedName::local(local),
        };
        Ok(QName::new(prefix, name))
    }

    fn resolve_prefix(&self, prefix: &str) -> UriResult<&'src str> {
        self.bindings
            .get(prefix)
            .ok_or_else(|| UriError::UnresolvedPrefix(prefix.to_string()))
    }

    // Token helpers

    fn peek(&self) -> Option<&Token<'src>> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token<'src>> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token<'src>> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn match_token(&mut self, expected: Token<'src>) -> bool {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token<'src>, what: &str) -> UriResult<()> {
        if self.match_token(expected) {
            Ok(())
        } else {
            Err(UriError::invalid_selector(self.current_pos(), format!("expected {}", what)))
        }
    }

    fn current_pos(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source.len())
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

/// Decode the predefined XML entities in a predicate value
fn unescape_value(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let semi = after.find(';')?;
        let replacement = match &after[..=semi] {
            "&quot;" => '"',
            "&apos;" => '\'',
            "&amp;" => '&',
            "&lt;" => '<',
            "&gt;" => '>',
            _ => return None,
        };
        out.push(replacement);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RL: &str = "urn:ietf:params:xml:ns:resource-lists";
    const USAGES: [(&str, &str); 1] = [("resource-lists", RL)];

    fn parse_ok(path: &str) -> XcapUri {
        parse(path, &NamespaceBindings::new(), &USAGES).unwrap()
    }

    #[test]
    fn test_parse_document_only() {
        let uri = parse_ok("/resource-lists/users/sip:alice@example.com/index");

        assert_eq!(uri.auid(), "resource-lists");
        assert_eq!(uri.context(), &Context::Users("sip:alice@example.com".to_string()));
        assert_eq!(uri.document.document, "index");
        assert!(uri.node_selector.is_none());
    }

    #[test]
    fn test_parse_global_nested_document() {
        let uri = parse_ok("resource-lists/global/dir/sub/index");

        assert_eq!(uri.context(), &Context::Global);
        assert_eq!(uri.document.document, "dir/sub/index");
        assert_eq!(
            uri.document.segments(),
            vec!["resource-lists", "global", "dir", "sub", "index"]
        );
    }

    #[test]
    fn test_parse_positional_and_attribute_predicates() {
        let uri = parse_ok(
            r#"resource-lists/users/bob/index/~~/resource-lists/list[@name="friends"]/entry[2]"#,
        );
        let selector = uri.node_selector.unwrap();

        assert_eq!(selector.steps.len(), 3);
        assert_eq!(
            selector.steps[0],
            ElementStep::named(QName::new(None, ExpandedName::ns(RL, "resource-lists")))
        );
        assert_eq!(
            selector.steps[1].predicates,
            vec![Predicate::AttributeEquals {
                name: QName::new(None, ExpandedName::local("name")),
                value: "friends".to_string(),
            }]
        );
        assert_eq!(selector.steps[2].predicates, vec![Predicate::Position(2)]);
        assert!(selector.terminal.is_none());
    }

    #[test]
    fn test_parse_attribute_terminal() {
        let uri = parse_ok("resource-lists/users/bob/index/~~/resource-lists/list/@name");
        let selector = uri.node_selector.unwrap();

        assert_eq!(selector.steps.len(), 2);
        assert_eq!(
            selector.terminal,
            Some(TerminalSelector::Attribute(QName::new(None, ExpandedName::local("name"))))
        );
    }

    #[test]
    fn test_parse_namespace_terminal() {
        let uri = parse_ok("resource-lists/users/bob/index/~~/resource-lists/namespace::*");
        assert!(uri.node_selector.unwrap().selects_namespaces());
    }

    #[test]
    fn test_prefixed_names_resolve_through_bindings() {
        let bindings = NamespaceBindings::new().with("x", "urn:example:ext");
        let uri = parse(
            "resource-lists/users/bob/index/~~/resource-lists/x:extra/@x:flag",
            &bindings,
            &USAGES,
        )
        .unwrap();
        let selector = uri.node_selector.unwrap();

        assert_eq!(
            selector.steps[1].name,
            NameTest::Name(QName::new(Some("x"), ExpandedName::ns("urn:example:ext", "extra")))
        );
        assert_eq!(
            selector.terminal,
            Some(TerminalSelector::Attribute(QName::new(
                Some("x"),
                ExpandedName::ns("urn:example:ext", "flag")
            )))
        );
    }

    #[test]
    fn test_wildcard_step() {
        let uri = parse_ok("resource-lists/users/bob/index/~~/*/*[1]");
        let selector = uri.node_selector.unwrap();
        assert_eq!(selector.steps[0].name, NameTest::Any);
        assert_eq!(selector.steps[1].predicates, vec![Predicate::Position(1)]);
    }

    #[test]
    fn test_predicate_entities_are_decoded() {
        let uri = parse_ok(
            r#"resource-lists/users/bob/index/~~/resource-lists/list[@name='a &quot;b&quot; &amp; c']"#,
        );
        let selector = uri.node_selector.unwrap();
        assert_eq!(
            selector.steps[1].predicates[0],
            Predicate::AttributeEquals {
                name: QName::new(None, ExpandedName::local("name")),
                value: r#"a "b" & c"#.to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_usage() {
        let err = parse("pres-rules/users/bob/index", &NamespaceBindings::new(), &USAGES).unwrap_err();
        assert_eq!(err, UriError::UnknownApplicationUsage("pres-rules".to_string()));
    }

    #[test]
    fn test_missing_document_parts() {
        let bindings = NamespaceBindings::new();
        assert_eq!(parse("", &bindings, &USAGES), Err(UriError::MissingDocumentSelector));
        assert_eq!(parse("resource-lists", &bindings, &USAGES), Err(UriError::MissingDocumentSelector));
        assert_eq!(parse("resource-lists/users", &bindings, &USAGES), Err(UriError::MissingOwner));
        assert_eq!(parse("resource-lists/users/bob", &bindings, &USAGES), Err(UriError::MissingDocumentName));
        assert_eq!(parse("resource-lists/users/bob/", &bindings, &USAGES), Err(UriError::MissingDocumentName));
        assert_eq!(parse("resource-lists/users/bob/a//b", &bindings, &USAGES), Err(UriError::EmptySegment));
        assert_eq!(
            parse("resource-lists/people/bob/index", &bindings, &USAGES),
            Err(UriError::UnknownContext("people".to_string()))
        );
    }

    #[test]
    fn test_unresolved_prefix() {
        let err = parse_node_selector("resource-lists/q:list", &NamespaceBindings::new(), RL).unwrap_err();
        assert_eq!(err, UriError::UnresolvedPrefix("q".to_string()));
    }

    #[test]
    fn test_bad_selector_grammar() {
        let bindings = NamespaceBindings::new();
        for bad in [
            "",
            "resource-lists/",
            "resource-lists/list[0]",
            "resource-lists/list[@name]",
            "resource-lists/list[@name=friends]",
            "resource-lists/list[2",
            "@name/resource-lists",
            "resource-lists/@name/list",
            "resource-lists/namespace::*/list",
            "resource-lists//list",
        ] {
            assert!(
                parse_node_selector(bad, &bindings, RL).is_err(),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_empty_selector_after_separator() {
        let err = parse("resource-lists/users/bob/index/~~", &NamespaceBindings::new(), &USAGES).unwrap_err();
        assert!(matches!(err, UriError::InvalidSelector { .. }));
    }
}
