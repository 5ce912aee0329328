//! List file lexer, statements and parser

mod parser;
mod scanner;
mod statement;
mod token;

pub use parser::{ParsedList, Parser};
pub use scanner::Lexer;
pub use statement::{FileCommand, ResourceItem, Statement};
pub use token::{Token, TokenKind};

/// Parse list file source into statements, collecting every error
pub fn parse_list(source: &str) -> ParsedList {
    Parser::new(source).parse()
}
