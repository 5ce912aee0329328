//! Line-oriented parser turning list file tokens into statements
//!
//! A malformed line produces a [`ListError`] and parsing resumes on the next
//! line, so a single run reports every problem in the file.

use super::scanner::Lexer;
use super::statement::{FileCommand, ResourceItem, Statement};
use super::token::{Token, TokenKind};
use crate::common::{ListError, Span};
use crate::link::{ContextKind, SlotIndex};

/// Parser output: every statement that parsed cleanly plus every error found
#[derive(Debug, Default)]
pub struct ParsedList {
    pub statements: Vec<Statement>,
    pub errors: Vec<ListError>,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    /// Kind of the last token consumed, `None` after a lexer error
    last: Option<TokenKind>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            last: None,
        }
    }

    pub fn parse(mut self) -> ParsedList {
        let mut parsed = ParsedList::default();

        loop {
            let first = match self.next() {
                Ok(token) => token,
                Err(err) => {
                    parsed.errors.push(err);
                    self.recover();
                    continue;
                }
            };

            match first.kind {
                TokenKind::Eof => break,
                TokenKind::Newline => continue,
                _ => {}
            }

            match self.statement(first) {
                Ok(statement) => parsed.statements.push(statement),
                Err(err) => {
                    parsed.errors.push(err);
                    self.recover();
                }
            }
        }

        parsed
    }

    fn next(&mut self) -> Result<Token, ListError> {
        let token = self.lexer.next_token();
        self.last = token.as_ref().ok().map(|t| t.kind);
        token
    }

    /// Skip the rest of the current line unless the error already consumed it
    fn recover(&mut self) {
        if !matches!(self.last, Some(TokenKind::Newline | TokenKind::Eof)) {
            self.lexer.skip_line();
        }
    }

    fn statement(&mut self, first: Token) -> Result<Statement, ListError> {
        let start = first.span;
        match first.kind {
            TokenKind::Verbose => {
                let arg = self.expect_path("'on' or 'off'")?;
                let on = match self.lexer.text(arg.span) {
                    "on" => true,
                    "off" => false,
                    other => {
                        return Err(ListError::new(
                            format!("expected 'on' or 'off', found '{other}'"),
                            arg.span,
                        ));
                    }
                };
                self.end_of_line()?;
                Ok(Statement::Verbose { on, span: start.to(arg.span) })
            }
            TokenKind::Rom => {
                let (path, span) = self.path("a ROM file name")?;
                self.end_of_line()?;
                Ok(Statement::Rom { path, span: start.to(span) })
            }
            TokenKind::Global | TokenKind::Statusbar | TokenKind::Macrolib => {
                let command = match first.kind {
                    TokenKind::Global => FileCommand::Global,
                    TokenKind::Statusbar => FileCommand::Statusbar,
                    _ => FileCommand::Macrolib,
                };
                let (path, span) = self.path("a file name")?;
                self.end_of_line()?;
                Ok(Statement::File { command, path, span: start.to(span) })
            }
            TokenKind::Freeram => {
                let token = self.next()?;
                if token.kind != TokenKind::Number {
                    return Err(ListError::new(
                        format!("expected a RAM address, found {}", token.kind),
                        token.span,
                    ));
                }
                let address = self.hex(&token)?;
                if address > 0xFF_FFFF {
                    return Err(ListError::new("freeram address must fit in 24 bits", token.span));
                }
                self.end_of_line()?;
                Ok(Statement::Freeram { address, span: start.to(token.span) })
            }
            TokenKind::Level | TokenKind::Gamemode | TokenKind::Overworld => {
                let context = match first.kind {
                    TokenKind::Level => ContextKind::Level,
                    TokenKind::Gamemode => ContextKind::Gamemode,
                    _ => ContextKind::Overworld,
                };
                self.end_of_line()?;
                Ok(Statement::Mode { context, span: start })
            }
            TokenKind::Star | TokenKind::Number => self.resource_line(first),
            other => Err(ListError::new(
                format!("unexpected {other} at start of statement"),
                first.span,
            )
            .with_note("expected a command such as 'rom:' or a slot number followed by files")),
        }
    }

    fn resource_line(&mut self, slot_token: Token) -> Result<Statement, ListError> {
        let slot = if slot_token.kind == TokenKind::Star {
            SlotIndex::All
        } else {
            SlotIndex::Index(self.hex(&slot_token)? as usize)
        };

        let mut items: Vec<ResourceItem> = Vec::new();
        let mut end = slot_token.span;
        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::Newline | TokenKind::Eof => break,
                // Numbers after a file are its extra byte values
                TokenKind::Number if !items.is_empty() => {
                    let value = self.hex(&token)?;
                    let byte = u8::try_from(value).map_err(|_| {
                        ListError::new(format!("byte value ${value:X} is larger than $FF"), token.span)
                    })?;
                    if let Some(item) = items.last_mut() {
                        item.bytes.push(byte);
                        item.span = item.span.to(token.span);
                    }
                }
                kind if kind.is_path() => {
                    items.push(ResourceItem {
                        file: self.path_text(&token),
                        bytes: Vec::new(),
                        span: token.span,
                    });
                }
                other => {
                    return Err(ListError::new(format!("expected a file name, found {other}"), token.span));
                }
            }
            end = token.span;
        }

        if items.is_empty() {
            return Err(ListError::new("no resource files given for this slot", slot_token.span));
        }

        Ok(Statement::Resource {
            slot,
            slot_span: slot_token.span,
            items,
            span: slot_token.span.to(end),
        })
    }

    fn path(&mut self, what: &str) -> Result<(String, Span), ListError> {
        let token = self.expect_path(what)?;
        Ok((self.path_text(&token), token.span))
    }

    fn expect_path(&mut self, what: &str) -> Result<Token, ListError> {
        let token = self.next()?;
        if token.kind.is_path() {
            Ok(token)
        } else {
            Err(ListError::new(format!("expected {what}, found {}", token.kind), token.span))
        }
    }

    fn path_text(&self, token: &Token) -> String {
        let text = self.lexer.text(token.span);
        match token.kind {
            TokenKind::Quoted => text.trim_matches('"').to_string(),
            _ => text.to_string(),
        }
    }

    fn hex(&self, token: &Token) -> Result<u32, ListError> {
        let text = self.lexer.text(token.span);
        let digits = text.strip_prefix('$').unwrap_or(text);
        u32::from_str_radix(digits, 16)
            .map_err(|_| ListError::new(format!("invalid hex number '{text}'"), token.span))
    }

    fn end_of_line(&mut self) -> Result<(), ListError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Newline | TokenKind::Eof => Ok(()),
            other => Err(ListError::new(format!("unexpected {other} at end of statement"), token.span)),
        }
    }
}
