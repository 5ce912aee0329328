//! Assembler boundary and ROM image
//!
//! The machine-code assembler is an external tool. Everything the linker
//! needs from it goes through the [`Assembler`] trait:
//! 1. Patching a source file into the ROM buffer with a set of defines
//! 2. Reading back the labels produced by that patch
//! 3. Reading back the print output of that patch
//!
//! [`rom::Rom`] owns the buffer and all run-wide linker state.

pub mod asar;
pub mod rom;
mod symbols;

use indexmap::IndexMap;
use std::path::Path;
use thiserror::Error;

pub use asar::AsarCli;
pub use rom::{PrintSummary, Rom, RoutineRegistry, SizeCategory, SizeLedger};
pub use symbols::parse_wla_symbols;

/// Textual substitutions handed to the assembler, in insertion order
pub type Defines = IndexMap<String, String>;

/// A resolved label from the assembler's symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub address: u32,
}

impl Label {
    pub fn new(name: impl Into<String>, address: u32) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// Failure reported by an assembler implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    /// The assembler could not be started at all
    #[error("{0}")]
    Unavailable(String),

    /// The source did not assemble; diagnostics are kept verbatim
    #[error("{}", .0.join("\n"))]
    Failed(Vec<String>),
}

/// Trait for the external assembler toolchain
///
/// A patch either succeeds and replaces the buffer contents, or fails and
/// leaves the buffer untouched. `labels` and `prints` describe the most
/// recent successful patch.
pub trait Assembler {
    /// The name of this assembler (e.g., "asar")
    fn name(&self) -> &'static str;

    /// Assemble `source` on top of `rom`
    fn patch(&mut self, rom: &mut Vec<u8>, source: &Path, defines: &Defines) -> Result<(), AssemblerError>;

    /// Every label produced by the last patch
    fn labels(&self) -> &[Label];

    /// Every print line emitted by the last patch
    fn prints(&self) -> &[String];
}

/// Format a 24-bit SNES address the way generated sources expect it
pub fn snes_address(address: u32) -> String {
    format!("${:06X}", address & 0xFF_FFFF)
}

/// Parse a `$XXXXXX` (or bare hex) address
pub fn parse_address(text: &str) -> Option<u32> {
    let digits = text.trim().strip_prefix('$').unwrap_or(text.trim());
    if digits.is_empty() || digits.len() > 6 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snes_address_is_fixed_width_uppercase() {
        assert_eq!(snes_address(0x8000), "$008000");
        assert_eq!(snes_address(0x1fab3c), "$1FAB3C");
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("$1FAB3C"), Some(0x1FAB3C));
        assert_eq!(parse_address("108000"), Some(0x108000));
        assert_eq!(parse_address("$"), None);
        assert_eq!(parse_address("$1234567"), None);
        assert_eq!(parse_address("$XYZ"), None);
    }
}
