//! Common infrastructure shared by the list front end, the ROM backend and the linker

mod error;
mod span;
pub mod workspace;

pub use error::{BuildError, BuildResult, DiagnosticReporter, ListError};
pub use span::Span;
pub use workspace::Workspace;
