//! Leading-token classification of quoted fragments
//!
//! A fragment's role is decided by its first significant token alone. The
//! classifier never looks further, so `fun` always means a function and
//! `@Foo class X` (leading annotation) is not a declaration.

use crate::TokenKind;
use logos::Logos;
use std::fmt;

/// Declaration kind of a quoted fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// `class`, `object`, `interface` and class-only soft keywords
    Class,
    /// `fun`
    Function,
    /// `val` / `var`
    Property,
    /// `typealias`
    TypeAlias,
    /// Not a declaration
    None,
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Class => "class",
            Self::Function => "function",
            Self::Property => "property",
            Self::TypeAlias => "type alias",
            Self::None => "none",
        })
    }
}

/// Leading control-flow keyword of an expression fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    /// `return`
    Return,
    /// `if`
    If,
    /// `when`
    When,
    /// `throw`
    Throw,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `try`
    Try,
    /// `for`
    For,
    /// `while`
    While,
    /// `do`
    Do,
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Return => "return",
            Self::If => "if",
            Self::When => "when",
            Self::Throw => "throw",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Try => "try",
            Self::For => "for",
            Self::While => "while",
            Self::Do => "do",
        })
    }
}

/// Result of [`classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// A declaration; the kind is never [`DeclarationKind::None`]
    Declaration(DeclarationKind),
    /// An expression introduced by a control-flow keyword
    Expression(ExpressionKind),
    /// Neither; the fragment is not resolvable
    None,
}

impl Classification {
    /// The declaration kind, or [`DeclarationKind::None`] for expressions
    /// and unclassified fragments
    #[must_use]
    pub fn declaration_kind(self) -> DeclarationKind {
        match self {
            Self::Declaration(kind) => kind,
            Self::Expression(_) | Self::None => DeclarationKind::None,
        }
    }

    /// Whether the fragment is an expression
    #[must_use]
    pub fn is_expression(self) -> bool {
        matches!(self, Self::Expression(_))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declaration(kind) => write!(f, "{kind} declaration"),
            Self::Expression(kind) => write!(f, "`{kind}` expression"),
            Self::None => f.write_str("plain expression"),
        }
    }
}

/// Soft keywords that can only start a class declaration
const CLASS_SOFT_KEYWORDS: &[&str] = &["sealed", "enum", "annotation", "companion", "data", "inner"];

/// Classifies `fragment` by its first significant token
#[must_use]
pub fn classify(fragment: &str) -> Classification {
    let mut lexer = TokenKind::lexer(fragment);
    while let Some(next) = lexer.next() {
        match next {
            Ok(kind) if kind.is_trivia() => {}
            Ok(kind) => return classify_token(kind, lexer.slice()),
            Err(()) => return Classification::None,
        }
    }
    Classification::None
}

/// Shorthand for `classify(fragment).declaration_kind()`
#[must_use]
pub fn declaration_kind(fragment: &str) -> DeclarationKind {
    classify(fragment).declaration_kind()
}

fn classify_token(kind: TokenKind, text: &str) -> Classification {
    use Classification::{Declaration, Expression};
    match kind {
        TokenKind::Class | TokenKind::Object | TokenKind::Interface => {
            Declaration(DeclarationKind::Class)
        }
        TokenKind::Fun => Declaration(DeclarationKind::Function),
        TokenKind::Val | TokenKind::Var => Declaration(DeclarationKind::Property),
        TokenKind::TypeAlias => Declaration(DeclarationKind::TypeAlias),
        TokenKind::Ident if CLASS_SOFT_KEYWORDS.contains(&text) => {
            Declaration(DeclarationKind::Class)
        }
        TokenKind::Return => Expression(ExpressionKind::Return),
        TokenKind::If => Expression(ExpressionKind::If),
        TokenKind::When => Expression(ExpressionKind::When),
        TokenKind::Throw => Expression(ExpressionKind::Throw),
        TokenKind::Break => Expression(ExpressionKind::Break),
        TokenKind::Continue => Expression(ExpressionKind::Continue),
        TokenKind::Try => Expression(ExpressionKind::Try),
        TokenKind::For => Expression(ExpressionKind::For),
        TokenKind::While => Expression(ExpressionKind::While),
        TokenKind::Do => Expression(ExpressionKind::Do),
        _ => Classification::None,
    }
}
