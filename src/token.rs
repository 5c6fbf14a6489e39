use std::{fmt, ops::Range};

#[derive(Copy, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Returns the end-of-file token for the given source.
    pub fn eof_for(src: &str) -> Token {
        Token::new(TokenKind::Eof, Span::new_of_length(src.len(), 0))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    /// Lengths past `u32::MAX` saturate, so such a span ends early.
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        let len = u32::try_from(hi - lo).unwrap_or(u32::MAX);
        Self::new_of_length(lo, len)
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns the smallest span that covers both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let lo = self.lo.min(other.lo);
        let hi = self.hi().max(other.hi());
        Span::new_of_bounds(lo..hi)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

/// A value paired with the source span it was produced from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.inner)
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for Spanned<T> {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Print,
    Def,
    Return,
    Pass,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Range,
    Not,
    And,
    Or,
    None,

    True,
    False,

    /// The `int` type name.
    Int,
    /// The `bool` type name.
    Bool,

    Plus,
    Minus,
    Star,
    /// `//`
    SlashSlash,
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    LParen,
    RParen,
    Colon,
    Comma,
    /// `->`
    Arrow,
    /// `=`
    Assign,

    Identifier,
    Number,

    Newline,
    Indent,
    Dedent,
    Eof,
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "print" => TokenKind::Print,
    "def" => TokenKind::Def,
    "return" => TokenKind::Return,
    "pass" => TokenKind::Pass,
    "if" => TokenKind::If,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "in" => TokenKind::In,
    "range" => TokenKind::Range,
    "not" => TokenKind::Not,
    "and" => TokenKind::And,
    "or" => TokenKind::Or,
    "None" => TokenKind::None,
    "True" => TokenKind::True,
    "False" => TokenKind::False,
    "int" => TokenKind::Int,
    "bool" => TokenKind::Bool,
};
