use crate::{lexer, parser, token::Spanned, type_checker};

/// Any of the fatal errors a compilation may stop with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("lexing error at {0}")]
    Lex(#[from] Spanned<lexer::Error>),
    #[error("syntax error at {0}")]
    Syntax(#[from] Spanned<parser::Error>),
    #[error("type error at {0}")]
    Type(#[from] Spanned<type_checker::Error>),
}

impl Error {
    pub fn span(&self) -> crate::token::Span {
        match self {
            Error::Lex(e) => e.span,
            Error::Syntax(e) => e.span,
            Error::Type(e) => e.span,
        }
    }
}
