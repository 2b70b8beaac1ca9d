use logos::Logos;
use strum_macros::{Display, EnumIter, EnumString};

pub use self::TokenKind::*;

#[derive(Logos, EnumIter, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Error,

    EOI,

    #[regex(r"[ \t\r\f]+", logos::skip)]
    Whitespace,

    #[regex(r"//[^\n]*", logos::skip)]
    Comment,

    #[regex(r"[\n]+")]
    Newline,

    #[regex(r"[_a-zA-Z][_a-zA-Z0-9]*")]
    Ident,

    #[regex(r"-?[0-9]+")]
    LiteralInteger,

    // Symbols
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
}

/// The command vocabulary, spelled exactly as it appears in scripts. Commands
/// are case sensitive; anything else is a fatal input error.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum CommandName {
    begin,
    beginRO,
    R,
    W,
    end,
    fail,
    recover,
    dump,
}

impl TokenKind {
    pub fn is_literal(&self) -> bool {
        matches!(self, LiteralInteger)
    }
}
