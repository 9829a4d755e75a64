//! Lexer for the host language
//!
//! [`tokenize`] produces the significant token stream consumed by the parser;
//! [`classify`] looks only at the first significant token of a quoted
//! fragment to decide which parse routine it belongs to.

mod classify;
mod error;
mod token;

pub use classify::{Classification, DeclarationKind, ExpressionKind, classify, declaration_kind};
pub use error::LexError;
pub use token::{Token, TokenKind};

use logos::Logos;
use rk_span::Span;

/// Tokenizes `source`, dropping trivia.
///
/// The returned stream always ends with a [`TokenKind::Eof`] token whose
/// `newline_before` records a trailing line break.
///
/// # Errors
///
/// Returns [`LexError::UnexpectedCharacter`] for text that starts no token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    let mut newline_before = false;

    while let Some(next) = lexer.next() {
        let span = Span::from_range(lexer.span());
        match next {
            Ok(TokenKind::Newline) => newline_before = true,
            Ok(TokenKind::BlockComment) => {
                newline_before |= lexer.slice().contains('\n');
            }
            Ok(TokenKind::LineComment) => {}
            Ok(kind) => {
                tokens.push(Token {
                    kind,
                    span,
                    newline_before,
                });
                newline_before = false;
            }
            Err(()) => {
                return Err(LexError::UnexpectedCharacter {
                    text: lexer.slice().to_string(),
                    span,
                });
            }
        }
    }

    let end = u32::try_from(source.len()).unwrap_or(u32::MAX);
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span::point(end),
        newline_before,
    });
    Ok(tokens)
}

/// Decodes the body of a string or character literal token.
///
/// `literal` is the full token text including its quotes.
///
/// # Errors
///
/// Returns [`LexError::InvalidEscape`] for an unknown escape sequence.
pub fn unescape(literal: &str, span: Span) -> Result<String, LexError> {
    let inner = literal
        .get(1..literal.len().saturating_sub(1))
        .unwrap_or_default();
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '"' | '\'' | '$')) => out.push(c),
            Some(escape) => return Err(LexError::InvalidEscape { escape, span }),
            None => out.push('\\'),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("lexes")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_function_header() {
        assert_eq!(
            kinds("fun product(): List<Pair<String, *>>"),
            vec![
                TokenKind::Fun,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Colon,
                TokenKind::Ident,
                TokenKind::Lt,
                TokenKind::Ident,
                TokenKind::Lt,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Star,
                TokenKind::Gt,
                TokenKind::Gt,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn range_after_int_is_not_a_double() {
        assert_eq!(
            kinds("1..5 2.5 3.toString()"),
            vec![
                TokenKind::Int,
                TokenKind::DotDot,
                TokenKind::Int,
                TokenKind::Double,
                TokenKind::Int,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn null_safety_operators() {
        assert_eq!(
            kinds("a?.b ?: c!!"),
            vec![
                TokenKind::Ident,
                TokenKind::SafeDot,
                TokenKind::Ident,
                TokenKind::Elvis,
                TokenKind::Ident,
                TokenKind::BangBang,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn records_line_breaks() {
        let tokens = tokenize("val a = 1\n// note\nval b = /* x\n */ 2").expect("lexes");
        let flagged: Vec<bool> = tokens.iter().map(|t| t.newline_before).collect();
        assert_eq!(
            flagged,
            vec![false, false, false, false, true, false, false, true, false]
        );
    }

    #[test]
    fn block_and_doc_comments_are_trivia() {
        assert_eq!(
            kinds("/** doc */ fun /***/ f() /* a * b ** / */ = 1 /**/"),
            vec![
                TokenKind::Fun,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eq,
                TokenKind::Int,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let err = tokenize("val x = 1 /* open").unwrap_err();
        assert!(matches!(err, LexError::UnexpectedCharacter { .. }));
    }

    #[test]
    fn token_text_matches_span() {
        let source = "\"he\\\"llo\" 'c'";
        let tokens = tokenize(source).expect("lexes");
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text(source), "\"he\\\"llo\"");
        assert_eq!(
            unescape(tokens[0].text(source), tokens[0].span).expect("valid"),
            "he\"llo"
        );
        assert_eq!(tokens[1].kind, TokenKind::Char);
    }

    #[test]
    fn rejects_stray_characters() {
        let err = tokenize("val x = #").unwrap_err();
        assert!(matches!(err, LexError::UnexpectedCharacter { ref text, .. } if text == "#"));
        assert_eq!(err.span(), Span::new(8, 9));
    }

    #[test]
    fn rejects_unknown_escape() {
        let err = unescape("\"\\q\"", Span::new(0, 4)).unwrap_err();
        assert_eq!(
            err,
            LexError::InvalidEscape {
                escape: 'q',
                span: Span::new(0, 4)
            }
        );
    }
}
