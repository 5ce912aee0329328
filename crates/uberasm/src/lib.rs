//! UberASM - resource linker and dispatch-table generator for SNES ROM hacks
//!
//! This library inserts user-authored asm resources into a Super Nintendo
//! ROM through an external assembler and generates the per-level,
//! per-game-mode and per-overworld dispatch tables that call them.
//!
//! ## Architecture
//!
//! The tool is organized into:
//! - **Frontend** (`frontend/`): List file lexing and parsing
//! - **Backend** (`backend/`): Assembler boundary and the ROM build session
//! - **Link** (`link/`): Resources, contexts, slots and the library
//! - **Driver** (`driver/`): The build pipeline
//! - **Common** (`common/`): Shared infrastructure (errors, spans, work files)

pub mod backend;
pub mod common;
pub mod driver;
pub mod frontend;
pub mod link;

// Re-exports for convenience
pub use backend::{Assembler, AssemblerError, AsarCli, Defines, Label, Rom};
pub use common::{BuildError, BuildResult, DiagnosticReporter, Span, Workspace};
pub use driver::{BuildReport, Pipeline};
pub use link::{Config, ContextKind, SlotIndex};
