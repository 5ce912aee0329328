//! List file lexer using logos

use super::token::{Token, TokenKind};
use crate::common::{ListError, Span};
use logos::Logos;

/// Lexer for list files
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, TokenKind>,
    at_eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            at_eof: false,
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, ListError> {
        if self.at_eof {
            let len = self.inner.source().len();
            return Ok(Token::new(TokenKind::Eof, Span::new(len, len)));
        }

        match self.inner.next() {
            Some(Ok(kind)) => Ok(Token::new(kind, self.inner.span().into())),
            Some(Err(())) => Err(ListError::new(
                format!("unexpected character '{}'", self.inner.slice()),
                self.inner.span().into(),
            )),
            None => {
                self.at_eof = true;
                let len = self.inner.source().len();
                Ok(Token::new(TokenKind::Eof, Span::new(len, len)))
            }
        }
    }

    /// Discard tokens up to and including the next newline
    ///
    /// Used to resynchronize after an error so later lines are still checked.
    pub fn skip_line(&mut self) {
        loop {
            match self.next_token() {
                Ok(Token { kind: TokenKind::Newline | TokenKind::Eof, .. }) => break,
                _ => continue,
            }
        }
    }

    /// Text of a token's span
    pub fn text(&self, span: Span) -> &'a str {
        &self.inner.source()[span.range()]
    }
}
