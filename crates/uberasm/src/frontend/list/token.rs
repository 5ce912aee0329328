//! Token definitions for list files

use crate::common::Span;
use logos::Logos;
use std::fmt;

/// Token with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// All token kinds in a list file
///
/// Statements are line oriented, so newlines are tokens rather than skipped.
/// A bare word that only contains hex digits lexes as `Number`; the parser
/// accepts it as a path where a path is expected.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")] // Skip horizontal whitespace
#[logos(skip r";[^\n]*")] // Skip comments
pub enum TokenKind {
    #[token("\n")]
    Newline,

    // === Commands ===
    #[token("verbose:")]
    Verbose,
    #[token("rom:")]
    Rom,
    #[token("global:")]
    Global,
    #[token("statusbar:")]
    Statusbar,
    #[token("macrolib:")]
    Macrolib,
    #[token("freeram:")]
    Freeram,

    // === Context headers ===
    #[token("level:")]
    Level,
    #[token("gamemode:")]
    Gamemode,
    #[token("overworld:")]
    Overworld,

    #[token("*")]
    Star,

    /// Hex number, optionally `$`-prefixed
    #[regex(r"\$?[0-9A-Fa-f]+", priority = 3)]
    Number,

    /// Unquoted path or keyword argument
    #[regex(r#"[^\s;:*"]+"#)]
    Word,

    /// Double-quoted path, for names containing spaces or colons
    #[regex(r#""[^"\n]*""#)]
    Quoted,

    Eof,
}

impl TokenKind {
    /// True for tokens that can name a file
    pub fn is_path(&self) -> bool {
        matches!(self, TokenKind::Word | TokenKind::Quoted | TokenKind::Number)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Newline => "end of line",
            TokenKind::Verbose => "'verbose:'",
            TokenKind::Rom => "'rom:'",
            TokenKind::Global => "'global:'",
            TokenKind::Statusbar => "'statusbar:'",
            TokenKind::Macrolib => "'macrolib:'",
            TokenKind::Freeram => "'freeram:'",
            TokenKind::Level => "'level:'",
            TokenKind::Gamemode => "'gamemode:'",
            TokenKind::Overworld => "'overworld:'",
            TokenKind::Star => "'*'",
            TokenKind::Number => "number",
            TokenKind::Word => "word",
            TokenKind::Quoted => "quoted path",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}
