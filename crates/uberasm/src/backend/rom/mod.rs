//! ROM image and linker state for one build
//!
//! [`Rom`] is the build session: it owns
//! - the ROM buffer and its source path
//! - the global define table handed to every patch
//! - the shared routine registry
//! - the clean list (addresses exported to the pointer table)
//! - the size ledger used for the final report
//!
//! Nothing here is global, so several builds can run in one process.

mod checksum;
mod header;
mod routines;

pub use checksum::{calculate_checksum, update_checksum, verify_checksum};
pub use header::{InternalHeader, Mapping};
pub use routines::{ROUTINE_PREFIX, RoutineEntry, RoutineRegistry};

use super::{Assembler, AssemblerError, Defines, Label, parse_address};
use crate::common::workspace::ROUTINE_DIR;
use crate::common::{BuildError, BuildResult, Workspace};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Copier header some dumps carry in front of the ROM body
pub const COPIER_HEADER_LEN: usize = 0x200;
const BANK_SIZE: usize = 0x8000;
const MAX_BODY_LEN: usize = 0x100_0000;

/// Name of the generated routine declaration source
pub const ROUTINE_DECLARATIONS: &str = "routines.asm";
/// Fixed source patched by the routine scan
pub const ROUTINE_SCAN_SOURCE: &str = "routine_scan.asm";

/// Byte counter categories for the final report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCategory {
    Main,
    Library,
    Resources,
    /// Routines and protected data inserted on the side
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeLedger {
    main: usize,
    library: usize,
    resources: usize,
    other: usize,
}

impl SizeLedger {
    pub fn add(&mut self, category: SizeCategory, bytes: usize) {
        *self.slot(category) += bytes;
    }

    pub fn get(&self, category: SizeCategory) -> usize {
        match category {
            SizeCategory::Main => self.main,
            SizeCategory::Library => self.library,
            SizeCategory::Resources => self.resources,
            SizeCategory::Other => self.other,
        }
    }

    pub fn total(&self) -> usize {
        self.main + self.library + self.resources + self.other
    }

    fn slot(&mut self, category: SizeCategory) -> &mut usize {
        match category {
            SizeCategory::Main => &mut self.main,
            SizeCategory::Library => &mut self.library,
            SizeCategory::Resources => &mut self.resources,
            SizeCategory::Other => &mut self.other,
        }
    }
}

/// Insertion address and size reported by a patch's print markers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintSummary {
    pub start: u32,
    pub size: usize,
}

pub struct Rom {
    path: Option<PathBuf>,
    data: Vec<u8>,
    header: Option<InternalHeader>,
    defines: Defines,
    routines: RoutineRegistry,
    cleans: Vec<u32>,
    ledger: SizeLedger,
    assembler: Box<dyn Assembler>,
}

impl Rom {
    pub fn new(assembler: Box<dyn Assembler>) -> Self {
        Self {
            path: None,
            data: Vec::new(),
            header: None,
            defines: Defines::new(),
            routines: RoutineRegistry::new(),
            cleans: Vec::new(),
            ledger: SizeLedger::default(),
            assembler,
        }
    }

    /// Read and validate a ROM file
    pub fn load(&mut self, path: &Path) -> BuildResult<()> {
        let data = fs::read(path).map_err(|e| BuildError::io(path, e))?;
        self.load_bytes(path, data)
    }

    /// Validate and adopt an in-memory image that will be saved to `path`
    pub fn load_bytes(&mut self, path: &Path, data: Vec<u8>) -> BuildResult<()> {
        let header = Self::validate(path, &data)?;

        tracing::debug!(
            "ROM \"{}\": {} KiB, {:?}{}, title \"{}\"",
            path.display(),
            data.len() / 1024,
            header.mapping,
            if header.is_sa1() { " (SA-1)" } else { "" },
            header.title
        );

        self.path = Some(path.to_path_buf());
        self.data = data;
        self.header = Some(header);
        Ok(())
    }

    fn validate(path: &Path, data: &[u8]) -> BuildResult<InternalHeader> {
        let header_len = data.len() % BANK_SIZE;
        if header_len != 0 && header_len != COPIER_HEADER_LEN {
            return Err(BuildError::invalid_rom(
                path,
                format!("size {:#X} is not a whole number of 32 KiB banks", data.len()),
            ));
        }

        let body = &data[header_len..];
        if body.is_empty() || body.len() > MAX_BODY_LEN {
            return Err(BuildError::invalid_rom(
                path,
                format!("size {:#X} is outside the supported range", data.len()),
            ));
        }

        let header = InternalHeader::locate(body)
            .ok_or_else(|| BuildError::invalid_rom(path, "no valid internal header found"))?;

        if !verify_checksum(body, &header) {
            tracing::warn!("ROM \"{}\" has a bad checksum", path.display());
        }

        Ok(header)
    }

    pub fn is_loaded(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> Option<&InternalHeader> {
        self.header.as_ref()
    }

    pub fn assembler_name(&self) -> &'static str {
        self.assembler.name()
    }

    /// Register a global define visible to every later patch
    pub fn add_define(&mut self, name: impl Into<String>, value: impl Into<String>) -> BuildResult<()> {
        let name = name.into();
        if self.defines.contains_key(&name) {
            return Err(BuildError::DuplicateDefine(name));
        }
        self.defines.insert(name, value.into());
        Ok(())
    }

    pub fn defines(&self) -> &Defines {
        &self.defines
    }

    /// Global defines, known routine addresses, then `local`
    fn patch_defines(&self, local: &Defines) -> BuildResult<Defines> {
        let mut defines = self.defines.clone();
        for (name, value) in self.routines.defines().into_iter().chain(local.clone()) {
            if defines.contains_key(&name) {
                return Err(BuildError::DuplicateDefine(name));
            }
            defines.insert(name, value);
        }
        Ok(defines)
    }

    /// Assemble `source` into the ROM buffer
    pub fn patch(&mut self, source: &Path, local: &Defines) -> BuildResult<()> {
        if !self.is_loaded() {
            return Err(BuildError::NoRom);
        }
        let defines = self.patch_defines(local)?;
        tracing::trace!("patching \"{}\" with {} define(s)", source.display(), defines.len());
        self.assembler
            .patch(&mut self.data, source, &defines)
            .map_err(|e| assembler_error(source, e))
    }

    /// Labels produced by the most recent patch
    pub fn labels(&self) -> &[Label] {
        self.assembler.labels()
    }

    /// Bootstrap pass over the shared routine declarations
    ///
    /// Writes one declaration per `routines/*.asm` file and assembles the
    /// fixed scan source against a scratch copy of the buffer, so nothing is
    /// inserted. Must run exactly once, before any resource is built.
    pub fn scan_shared_routines(&mut self, workspace: &mut Workspace) -> BuildResult<usize> {
        if self.routines.is_scanned() {
            return Err(BuildError::out_of_order("shared routines were already scanned"));
        }
        if !self.is_loaded() {
            return Err(BuildError::NoRom);
        }

        let mut names = Vec::new();
        let mut declarations = String::new();
        for file in workspace.files_in(ROUTINE_DIR, false)? {
            if file.extension().and_then(|e| e.to_str()) != Some("asm") {
                continue;
            }
            let name = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            if !is_label_name(name) {
                return Err(BuildError::authoring(
                    &file,
                    "routine file names may only contain letters, digits and underscores",
                ));
            }
            declarations.push_str(&format!("%UberRoutineDeclare({name})\n"));
            names.push(name.to_string());
        }
        workspace.write_work_file(ROUTINE_DECLARATIONS, &declarations)?;

        let source = workspace.base_source(ROUTINE_SCAN_SOURCE);
        let defines = self.patch_defines(&Defines::new())?;
        let mut scratch = self.data.clone();
        self.assembler
            .patch(&mut scratch, &source, &defines)
            .map_err(|e| assembler_error(&source, e))?;

        let count = names.len();
        self.routines.declare(names)?;
        Ok(count)
    }

    pub fn add_routine(&mut self, file: &Path, name: &str, address: u32) -> BuildResult<()> {
        if !self.routines.is_scanned() {
            return Err(BuildError::out_of_order("shared routines must be scanned before resources are built"));
        }
        self.routines.add(file, name, address)
    }

    pub fn routines(&self) -> &RoutineRegistry {
        &self.routines
    }

    /// Interpret the print markers of the most recent patch
    ///
    /// `_startl`/`_endl` bracket the main insertion, `_extral` reports side
    /// insertions. Other lines are user output from `file`.
    pub fn process_prints(&mut self, file: &Path, capture_start: bool) -> BuildResult<PrintSummary> {
        let prints = self.assembler.prints().to_vec();
        let mut summary = PrintSummary::default();
        let mut open: Option<u32> = None;
        let mut seen_start = false;

        for line in &prints {
            let mut words = line.split_whitespace();
            match words.next() {
                Some("_startl") => {
                    let start = marker_address(file, line, words.next())?;
                    if !seen_start {
                        seen_start = true;
                        summary.start = start;
                        if capture_start {
                            self.cleans.push(start);
                        }
                    }
                    open = Some(start);
                }
                Some("_endl") => {
                    let end = marker_address(file, line, words.next())?;
                    let start = open
                        .take()
                        .ok_or_else(|| BuildError::toolchain(file, format!("\"{line}\" without a matching _startl")))?;
                    summary.size += span_len(file, line, start, end)?;
                }
                Some("_extral") => {
                    let start = marker_address(file, line, words.next())?;
                    let end = marker_address(file, line, words.next())?;
                    let len = span_len(file, line, start, end)?;
                    self.cleans.push(start);
                    self.ledger.add(SizeCategory::Other, len);
                }
                _ => tracing::info!("{}: {line}", file.display()),
            }
        }

        Ok(summary)
    }

    /// Addresses to export to the pointer table, in insertion order
    pub fn cleans(&self) -> &[u32] {
        &self.cleans
    }

    pub fn ledger(&self) -> &SizeLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut SizeLedger {
        &mut self.ledger
    }

    /// Write the buffer back over the loaded file
    ///
    /// The image goes to a temporary file next to the target first and is
    /// renamed into place, so a failed save never leaves a truncated ROM.
    /// A symlinked ROM is written through the link, and the replacement
    /// keeps the original file's permissions.
    pub fn save(&self) -> BuildResult<()> {
        let path = self.path.as_deref().ok_or(BuildError::NoRom)?;
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| BuildError::io(dir, e))?;
        if let Ok(metadata) = fs::metadata(&target) {
            staged
                .as_file()
                .set_permissions(metadata.permissions())
                .map_err(|e| BuildError::io(staged.path(), e))?;
        }
        staged
            .write_all(&self.data)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| BuildError::io(staged.path(), e))?;
        staged.persist(&target).map_err(|e| BuildError::io(&target, e.error))?;
        Ok(())
    }
}

fn assembler_error(source: &Path, err: AssemblerError) -> BuildError {
    match err {
        AssemblerError::Unavailable(message) => BuildError::AssemblerUnavailable(message),
        AssemblerError::Failed(lines) => BuildError::toolchain(source, lines.join("\n")),
    }
}

fn marker_address(file: &Path, line: &str, word: Option<&str>) -> BuildResult<u32> {
    word.and_then(parse_address)
        .ok_or_else(|| BuildError::toolchain(file, format!("malformed print marker \"{line}\"")))
}

fn span_len(file: &Path, line: &str, start: u32, end: u32) -> BuildResult<usize> {
    end.checked_sub(start)
        .map(|len| len as usize)
        .ok_or_else(|| BuildError::toolchain(file, format!("print marker \"{line}\" ends before it starts")))
}

/// Letters, digits and underscores, not starting with a digit
pub fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
