//! Typed list file statements

use crate::common::Span;
use crate::link::{ContextKind, SlotIndex};

/// Top-level commands that name an asm file and may appear only once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCommand {
    Global,
    Statusbar,
    Macrolib,
}

impl FileCommand {
    pub const ALL: [FileCommand; 3] = [FileCommand::Global, FileCommand::Statusbar, FileCommand::Macrolib];

    pub fn keyword(self) -> &'static str {
        match self {
            FileCommand::Global => "global:",
            FileCommand::Statusbar => "statusbar:",
            FileCommand::Macrolib => "macrolib:",
        }
    }

    /// Name of the define the file path is published under
    pub fn define(self) -> &'static str {
        match self {
            FileCommand::Global => "UberGlobalFile",
            FileCommand::Statusbar => "UberStatusbarFile",
            FileCommand::Macrolib => "UberMacrolibFile",
        }
    }
}

/// One file named on a resource line, with its optional extra byte values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceItem {
    pub file: String,
    pub bytes: Vec<u8>,
    pub span: Span,
}

/// A parsed list file statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Verbose { on: bool, span: Span },
    Rom { path: String, span: Span },
    File { command: FileCommand, path: String, span: Span },
    Freeram { address: u32, span: Span },
    Mode { context: ContextKind, span: Span },
    Resource {
        slot: SlotIndex,
        slot_span: Span,
        items: Vec<ResourceItem>,
        span: Span,
    },
}
