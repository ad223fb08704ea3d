//! Node selector lexer using logos

use crate::error::{UriError, UriResult};
use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
pub enum Token<'src> {
    #[token("/")]
    Slash,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("@")]
    At,
    #[token("=")]
    Eq,
    #[token(":")]
    Colon,
    #[token("::")]
    ColonColon,
    #[token("*")]
    Star,

    #[regex(r"[0-9]+", |lex| lex.slice())]
    Number(&'src str),

    // NCName
    #[regex(r"[_\p{L}][_\p{L}\p{N}.\-]*", |lex| lex.slice())]
    Name(&'src str),

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len()-1]
    })]
    DoubleQuoted(&'src str),

    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        &s[1..s.len()-1]
    })]
    SingleQuoted(&'src str),
}

/// Tokenize a node selector. Offsets are relative to `source`.
pub fn tokenize(source: &str) -> UriResult<Vec<(Token<'_>, std::ops::Range<usize>)>> {
    Token::lexer(source)
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok((token, span)),
            Err(_) => Err(UriError::invalid_selector(
                span.start,
                format!("unexpected character '{}'", &source[span.clone()]),
            )),
        })
        .collect()
}
