//! Token kinds of the host language

use logos::Logos;
use rk_span::Span;

/// Kind of a lexical token.
///
/// Trivia (`Newline`, comments) is produced by the raw logos lexer and
/// folded into [`Token::newline_before`] by [`crate::tokenize`]; it never
/// reaches the parser.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\f]+")]
pub enum TokenKind {
    // === Trivia ===
    /// Line break
    #[token("\n")]
    Newline,
    /// `// ...`
    #[regex(r"//[^\n]*")]
    LineComment,
    /// `/* ... */`, not nested
    #[token("/*", block_comment)]
    BlockComment,

    // === Declaration keywords ===
    /// `class`
    #[token("class")]
    Class,
    /// `object`
    #[token("object")]
    Object,
    /// `interface`
    #[token("interface")]
    Interface,
    /// `fun`
    #[token("fun")]
    Fun,
    /// `val`
    #[token("val")]
    Val,
    /// `var`
    #[token("var")]
    Var,
    /// `typealias`
    #[token("typealias")]
    TypeAlias,

    // === Control-flow keywords ===
    /// `return`
    #[token("return")]
    Return,
    /// `if`
    #[token("if")]
    If,
    /// `else`
    #[token("else")]
    Else,
    /// `when`
    #[token("when")]
    When,
    /// `throw`
    #[token("throw")]
    Throw,
    /// `break`
    #[token("break")]
    Break,
    /// `continue`
    #[token("continue")]
    Continue,
    /// `try`
    #[token("try")]
    Try,
    /// `catch`
    #[token("catch")]
    Catch,
    /// `finally`
    #[token("finally")]
    Finally,
    /// `for`
    #[token("for")]
    For,
    /// `while`
    #[token("while")]
    While,
    /// `do`
    #[token("do")]
    Do,
    /// `in`
    #[token("in")]
    In,

    // === Value keywords ===
    /// `this`
    #[token("this")]
    This,
    /// `null`
    #[token("null")]
    Null,
    /// `true`
    #[token("true")]
    True,
    /// `false`
    #[token("false")]
    False,

    // === Literals and names ===
    /// Identifier, including soft keywords such as `sealed` or `data`
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    /// `42`
    #[regex(r"[0-9][0-9_]*")]
    Int,
    /// `42L`
    #[regex(r"[0-9][0-9_]*L")]
    Long,
    /// `4.2`
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*")]
    Double,
    /// `"text"`
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,
    /// `'c'`
    #[regex(r"'([^'\\\n]|\\.)'")]
    Char,

    // === Delimiters ===
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,
    /// `[`
    #[token("[")]
    LBracket,
    /// `]`
    #[token("]")]
    RBracket,
    /// `,`
    #[token(",")]
    Comma,
    /// `;`
    #[token(";")]
    Semi,
    /// `:`
    #[token(":")]
    Colon,
    /// `::`
    #[token("::")]
    ColonColon,
    /// `@`
    #[token("@")]
    At,

    // === Operators ===
    /// `.`
    #[token(".")]
    Dot,
    /// `?.`
    #[token("?.")]
    SafeDot,
    /// `..`
    #[token("..")]
    DotDot,
    /// `->`
    #[token("->")]
    Arrow,
    /// `=`
    #[token("=")]
    Eq,
    /// `+=`
    #[token("+=")]
    PlusEq,
    /// `-=`
    #[token("-=")]
    MinusEq,
    /// `==`
    #[token("==")]
    EqEq,
    /// `!=`
    #[token("!=")]
    NotEq,
    /// `<`
    #[token("<")]
    Lt,
    /// `>`
    #[token(">")]
    Gt,
    /// `<=`
    #[token("<=")]
    Le,
    /// `>=`
    #[token(">=")]
    Ge,
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `%`
    #[token("%")]
    Percent,
    /// `!`
    #[token("!")]
    Bang,
    /// `!!`
    #[token("!!")]
    BangBang,
    /// `&&`
    #[token("&&")]
    AndAnd,
    /// `||`
    #[token("||")]
    OrOr,
    /// `?:`
    #[token("?:")]
    Elvis,
    /// `?`
    #[token("?")]
    Question,

    /// End of input; appended by [`crate::tokenize`]
    Eof,
}

/// Consumes the rest of a block comment after its opening `/*`.
///
/// Returns `false`, and so a lexing error, when the comment is unterminated.
fn block_comment(lexer: &mut logos::Lexer<'_, TokenKind>) -> bool {
    match lexer.remainder().find("*/") {
        Some(end) => {
            lexer.bump(end + 2);
            true
        }
        None => false,
    }
}

impl TokenKind {
    /// Whether the raw lexer emits this kind only as trivia
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::Newline | Self::LineComment | Self::BlockComment)
    }

    /// Human readable spelling used in parse errors
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Newline => "line break",
            Self::LineComment | Self::BlockComment => "comment",
            Self::Class => "`class`",
            Self::Object => "`object`",
            Self::Interface => "`interface`",
            Self::Fun => "`fun`",
            Self::Val => "`val`",
            Self::Var => "`var`",
            Self::TypeAlias => "`typealias`",
            Self::Return => "`return`",
            Self::If => "`if`",
            Self::Else => "`else`",
            Self::When => "`when`",
            Self::Throw => "`throw`",
            Self::Break => "`break`",
            Self::Continue => "`continue`",
            Self::Try => "`try`",
            Self::Catch => "`catch`",
            Self::Finally => "`finally`",
            Self::For => "`for`",
            Self::While => "`while`",
            Self::Do => "`do`",
            Self::In => "`in`",
            Self::This => "`this`",
            Self::Null => "`null`",
            Self::True => "`true`",
            Self::False => "`false`",
            Self::Ident => "identifier",
            Self::Int | Self::Long | Self::Double => "number",
            Self::String => "string literal",
            Self::Char => "character literal",
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBrace => "`{`",
            Self::RBrace => "`}`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::Comma => "`,`",
            Self::Semi => "`;`",
            Self::Colon => "`:`",
            Self::ColonColon => "`::`",
            Self::At => "`@`",
            Self::Dot => "`.`",
            Self::SafeDot => "`?.`",
            Self::DotDot => "`..`",
            Self::Arrow => "`->`",
            Self::Eq => "`=`",
            Self::PlusEq => "`+=`",
            Self::MinusEq => "`-=`",
            Self::EqEq => "`==`",
            Self::NotEq => "`!=`",
            Self::Lt => "`<`",
            Self::Gt => "`>`",
            Self::Le => "`<=`",
            Self::Ge => "`>=`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::Slash => "`/`",
            Self::Percent => "`%`",
            Self::Bang => "`!`",
            Self::BangBang => "`!!`",
            Self::AndAnd => "`&&`",
            Self::OrOr => "`||`",
            Self::Elvis => "`?:`",
            Self::Question => "`?`",
            Self::Eof => "end of input",
        }
    }
}

/// A significant token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Token kind
    pub kind: TokenKind,
    /// Byte range in the lexed text
    pub span: Span,
    /// Whether a line break separates this token from the previous one
    pub newline_before: bool,
}

impl Token {
    /// Text of the token in `source`
    #[must_use]
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.span.range()]
    }
}
