//! Error types and diagnostic reporting

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use std::path::{Path, PathBuf};
use thiserror::Error;
use super::Span;

/// Build error
///
/// Authoring errors name the offending file or value. Toolchain and
/// environment errors carry the underlying diagnostic text unchanged.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{count} error(s) found in list file \"{}\"", path.display())]
    ListRejected { path: PathBuf, count: usize },

    #[error("error in \"{}\": {message}", file.display())]
    Authoring { file: PathBuf, message: String },

    #[error("shared routine \"{name}\" is defined by both \"{}\" and \"{}\"", first.display(), second.display())]
    RoutineCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("define \"{0}\" is already set")]
    DuplicateDefine(String),

    #[error("error patching \"{}\":\n{diagnostics}", source_file.display())]
    Toolchain {
        source_file: PathBuf,
        diagnostics: String,
    },

    #[error("could not run assembler: {0}")]
    AssemblerUnavailable(String),

    #[error("invalid ROM \"{}\": {reason}", path.display())]
    InvalidRom { path: PathBuf, reason: String },

    #[error("no ROM loaded")]
    NoRom,

    #[error("no ROM file specified in list file or on command line")]
    NoRomFile,

    #[error("{0}")]
    OutOfOrder(String),

    #[error("could not access \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub fn authoring(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Authoring {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn toolchain(source_file: impl Into<PathBuf>, diagnostics: impl Into<String>) -> Self {
        Self::Toolchain {
            source_file: source_file.into(),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn invalid_rom(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidRom {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn out_of_order(message: impl Into<String>) -> Self {
        Self::OutOfOrder(message.into())
    }

    /// True for mistakes in user-authored input rather than in the environment
    pub fn is_authoring(&self) -> bool {
        matches!(
            self,
            Self::ListRejected { .. } | Self::Authoring { .. } | Self::RoutineCollision { .. }
        )
    }
}

pub type BuildResult<T> = Result<T, BuildError>;

/// Error in a list file statement
///
/// These are collected over a whole list pass and reported together.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ListError {
    pub message: String,
    pub span: Span,
    pub note: Option<String>,
}

impl ListError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Diagnostic reporter for pretty list file errors
pub struct DiagnosticReporter {
    files: SimpleFiles<String, String>,
    writer: StandardStream,
    config: term::Config,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self {
            files: SimpleFiles::new(),
            writer: StandardStream::stderr(ColorChoice::Auto),
            config: term::Config::default(),
        }
    }

    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        self.files.add(name.into(), source.into())
    }

    pub fn report(&self, file_id: usize, error: &ListError) {
        let mut diagnostic = Diagnostic::error()
            .with_message("List file error")
            .with_labels(vec![
                Label::primary(file_id, error.span.range()).with_message(&error.message),
            ]);
        if let Some(note) = &error.note {
            diagnostic = diagnostic.with_notes(vec![note.clone()]);
        }

        let _ = term::emit(&mut self.writer.lock(), &self.config, &self.files, &diagnostic);
    }

    pub fn report_all(&self, file_id: usize, errors: &[ListError]) {
        for error in errors {
            self.report(file_id, error);
        }
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}
