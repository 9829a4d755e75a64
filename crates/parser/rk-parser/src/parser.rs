//! Token cursor shared by the declaration and expression parsers

use crate::error::{ParseError, source_span};
use miette::NamedSource;
use rk_intern::{Interner, Symbol};
use rk_lexer::{Token, TokenKind};
use rk_span::{FileId, FileSpan, Span};

pub(crate) type PResult<T> = Result<T, ParseError>;

pub(crate) struct Parser<'src> {
    pub(crate) source: &'src str,
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) file: FileId,
    pub(crate) interner: &'src Interner,
    /// `true` while directly inside braces, `false` inside parentheses or
    /// brackets where line breaks are insignificant
    newline_scopes: Vec<bool>,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(
        source: &'src str,
        file: FileId,
        interner: &'src Interner,
    ) -> PResult<Self> {
        let tokens = rk_lexer::tokenize(source).map_err(|error| {
            let span = error.span();
            ParseError::Lex {
                error,
                span: source_span(span),
                src: named_source(file, source),
            }
        })?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
            file,
            interner,
            newline_scopes: vec![true],
        })
    }

    // === Cursor ===

    pub(crate) fn peek(&self) -> Token {
        self.nth(0)
    }

    pub(crate) fn nth(&self, n: usize) -> Token {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + n).min(last)]
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn nth_at(&self, n: usize, kind: TokenKind) -> bool {
        self.nth(n).kind == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    pub(crate) fn bump(&mut self) -> Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    pub(crate) fn text(&self, token: Token) -> &'src str {
        token.text(self.source)
    }

    /// Whether the current token is the identifier `word`
    pub(crate) fn at_word(&self, word: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Ident && self.text(token) == word
    }

    pub(crate) fn expect_ident(&mut self) -> PResult<Symbol> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(self.interner.intern(self.text(token)))
    }

    pub(crate) fn intern(&self, text: &str) -> Symbol {
        self.interner.intern(text)
    }

    // === Line breaks ===

    /// Whether a significant line break precedes the current token
    pub(crate) fn line_break(&self) -> bool {
        self.peek().newline_before && self.newline_scopes.last().copied().unwrap_or(true)
    }

    /// Whether the current token is `kind` on the same logical line
    pub(crate) fn at_same_line(&self, kind: TokenKind) -> bool {
        self.at(kind) && !self.line_break()
    }

    pub(crate) fn enter(&mut self, newline_sensitive: bool) {
        self.newline_scopes.push(newline_sensitive);
    }

    pub(crate) fn exit(&mut self) {
        self.newline_scopes.pop();
    }

    /// Skips `;` separators
    pub(crate) fn skip_semis(&mut self) {
        while self.eat(TokenKind::Semi) {}
    }

    // === Spans ===

    pub(crate) fn start(&self) -> u32 {
        self.peek().span.start
    }

    /// Span from `start` to the end of the last consumed token
    pub(crate) fn span_from(&self, start: u32) -> FileSpan {
        let end = if self.pos == 0 {
            start
        } else {
            self.tokens[self.pos - 1].span.end
        };
        FileSpan::new(self.file, Span::new(start, end.max(start)))
    }

    // === Errors ===

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("`{}`", self.text(token))
        };
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found,
            span: source_span(token.span),
            src: named_source(self.file, self.source),
        }
    }

    pub(crate) fn invalid(
        &self,
        construct: &str,
        suggestion: Option<&str>,
        span: Span,
    ) -> ParseError {
        ParseError::InvalidSyntax {
            construct: construct.to_string(),
            suggestion: suggestion.map(str::to_string),
            span: source_span(span),
            src: named_source(self.file, self.source),
        }
    }

    pub(crate) fn source_name(&self) -> NamedSource<String> {
        named_source(self.file, self.source)
    }
}

fn named_source(file: FileId, source: &str) -> NamedSource<String> {
    let name = if file.is_synthetic() {
        "<quoted>".to_string()
    } else {
        file.to_string()
    };
    NamedSource::new(name, source.to_string())
}
