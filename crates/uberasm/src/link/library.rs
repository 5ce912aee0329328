//! Library files shared by every resource
//!
//! Each file under `library/` is inserted once before any resource. Asm
//! files export their labels under a prefix derived from the file path,
//! binary files export their start address under the prefix itself.

use crate::backend::rom::{ROUTINE_PREFIX, is_label_name};
use crate::backend::{Defines, Label, Rom, SizeCategory, snes_address};
use crate::common::workspace::{LIBRARY_DIR, asm_path};
use crate::common::{BuildError, BuildResult, Workspace};
use std::path::{Path, PathBuf};

/// Generated wrapper patched once per library file
pub const LIBRARY_FILE: &str = "library.asm";
/// Generated label exports for resources and the main patch
pub const LIBRARY_LABELS_FILE: &str = "library_labels.asm";

const INNER_PREFIX: &str = "Inner_";

#[derive(Debug, Clone)]
pub struct LibraryFile {
    file: PathBuf,
    prefix: String,
    binary: bool,
    start: Option<u32>,
    labels: Vec<Label>,
}

impl LibraryFile {
    fn new(file: PathBuf) -> BuildResult<Self> {
        let prefix = library_prefix(&file);
        if !is_label_name(&prefix) {
            return Err(BuildError::authoring(
                &file,
                "library file paths may only contain letters, digits and underscores",
            ));
        }
        let binary = file.extension().and_then(|e| e.to_str()) != Some("asm");
        Ok(Self {
            file,
            prefix,
            binary,
            start: None,
            labels: Vec::new(),
        })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    fn wrapper_source(&self) -> String {
        let macro_name = if self.binary { "UberLibraryBinary" } else { "UberLibrary" };
        format!(
            "incsrc \"../base/library_template.asm\"\n%{macro_name}(\"{}\", \"{}\")\n",
            asm_path(&self.file),
            self.prefix
        )
    }

    fn build(&mut self, rom: &mut Rom, workspace: &mut Workspace) -> BuildResult<()> {
        tracing::debug!("adding library file \"{}\"", self.file.display());

        let source = workspace.write_work_file(LIBRARY_FILE, &self.wrapper_source())?;
        rom.patch(&source, &Defines::new())?;
        let summary = rom.process_prints(&self.file, true)?;
        self.start = Some(summary.start);
        rom.ledger_mut().add(SizeCategory::Library, summary.size);

        let labels = rom.labels().to_vec();
        for label in &labels {
            if label.name.contains(':') {
                continue;
            }
            if let Some(name) = label.name.strip_prefix(ROUTINE_PREFIX) {
                rom.add_routine(&self.file, name, label.address)?;
            } else if let Some(name) = label.name.strip_prefix(INNER_PREFIX) {
                self.labels.push(Label::new(name, label.address));
            }
        }
        Ok(())
    }

    fn generate_labels(&self, output: &mut String) {
        if self.binary {
            if let Some(start) = self.start {
                output.push_str(&format!("{} = {}\n", self.prefix, snes_address(start)));
            }
            return;
        }
        for label in &self.labels {
            output.push_str(&format!("{}_{} = {}\n", self.prefix, label.name, snes_address(label.address)));
        }
    }
}

#[derive(Debug, Default)]
pub struct Library {
    files: Vec<LibraryFile>,
}

impl Library {
    /// Every file under `library/`, in path order
    pub fn discover(workspace: &Workspace) -> BuildResult<Self> {
        let files = workspace
            .files_in(LIBRARY_DIR, true)?
            .into_iter()
            .map(LibraryFile::new)
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(Self { files })
    }

    pub fn files(&self) -> &[LibraryFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Insert every file and write `library_labels.asm`
    pub fn build(&mut self, rom: &mut Rom, workspace: &mut Workspace) -> BuildResult<()> {
        for file in &mut self.files {
            file.build(rom, workspace)?;
        }
        workspace.write_work_file(LIBRARY_LABELS_FILE, &self.generate_labels())?;
        Ok(())
    }

    pub fn generate_labels(&self) -> String {
        let mut output = String::new();
        for file in &self.files {
            file.generate_labels(&mut output);
        }
        output
    }
}

/// `library/gfx/font.bin` becomes `gfx_font`
fn library_prefix(file: &Path) -> String {
    let relative = file.strip_prefix(LIBRARY_DIR).unwrap_or(file);
    let stem = relative.with_extension("");
    stem.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("_")
}
