//! Build driver and pipeline orchestration

use crate::backend::{Assembler, Defines, Rom, SizeCategory, snes_address};
use crate::common::workspace::read_source;
use crate::common::{BuildError, BuildResult, DiagnosticReporter, Workspace};
use crate::link::{Config, Library, VERSION_MAJOR, VERSION_MINOR};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CLEAN_SOURCE: &str = "clean.asm";
pub const MAIN_SOURCE: &str = "main.asm";
pub const RESOURCE_LABELS_FILE: &str = "resource_labels.asm";
pub const CALLS_FILE: &str = "resource_calls.asm";
pub const POINTER_LIST_FILE: &str = "pointer_list.asm";

/// Printed on any failure; the ROM on disk is never written before the final save
pub const ABORT_MESSAGE: &str = "Some errors occurred while running UberASM Tool. Process aborted.";
pub const ROM_UNTOUCHED_MESSAGE: &str = "Your ROM has not been modified.";

/// Bytes inserted by one successful build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub main: usize,
    pub library: usize,
    pub resources: usize,
    pub other: usize,
    pub resource_count: usize,
}

impl BuildReport {
    pub fn total(&self) -> usize {
        self.main + self.library + self.resources + self.other
    }

    pub fn log(&self) {
        tracing::debug!("  Main patch insert size: {} bytes.", self.main);
        tracing::debug!("  Library insert size: {} bytes.", self.library);
        tracing::debug!("  Resource insert size: {} bytes.", self.resources);
        tracing::debug!("  Other (routines and prots) insert size: {} bytes.", self.other);
        tracing::info!("  Total insert size: {} bytes.", self.total());
    }
}

/// One build of one ROM
///
/// The pipeline owns the ROM session and the work directory. Generated
/// work files are removed when [`Pipeline::build`] returns, whatever the
/// outcome.
pub struct Pipeline {
    workspace: Workspace,
    rom: Rom,
}

impl Pipeline {
    pub fn new(root: impl Into<PathBuf>, assembler: Box<dyn Assembler>) -> Self {
        Self {
            workspace: Workspace::new(root),
            rom: Rom::new(assembler),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Read and validate the list file, reporting every list error at once
    pub fn load_config(&self, list: &Path) -> BuildResult<Config> {
        let path = self.workspace.path(list);
        let source = read_source(&path)?;

        Config::parse(&source, &self.workspace).map_err(|errors| {
            let mut reporter = DiagnosticReporter::new();
            let file_id = reporter.add_file(path.display().to_string(), source.as_str());
            reporter.report_all(file_id, &errors);
            BuildError::ListRejected {
                path: path.clone(),
                count: errors.len(),
            }
        })
    }

    /// Run every build step and save the ROM
    ///
    /// `rom_override` (the command line ROM) wins over the list's `rom:`.
    pub fn build(mut self, config: Config, rom_override: Option<&Path>) -> BuildResult<BuildReport> {
        let result = self.run(config, rom_override);
        self.workspace.cleanup();
        result
    }

    fn run(&mut self, mut config: Config, rom_override: Option<&Path>) -> BuildResult<BuildReport> {
        let rom_file = rom_override
            .map(Path::to_path_buf)
            .or_else(|| config.rom_file.clone())
            .ok_or(BuildError::NoRomFile)?;
        let rom_path = self.workspace.path(&rom_file);

        tracing::info!("Loading ROM \"{}\"...", rom_path.display());
        self.rom.load(&rom_path)?;
        tracing::debug!("using assembler \"{}\"", self.rom.assembler_name());
        for (name, value) in config.defines() {
            self.rom.add_define(name, value)?;
        }

        let clean = self.workspace.base_source(CLEAN_SOURCE);
        self.rom.patch(&clean, &Defines::new())?;
        self.rom.process_prints(&clean, false)?;

        let routines = self.rom.scan_shared_routines(&mut self.workspace)?;
        tracing::debug!("{routines} shared routine(s) declared");

        tracing::info!("Building library...");
        let mut library = Library::discover(&self.workspace)?;
        library.build(&mut self.rom, &mut self.workspace)?;

        tracing::info!("Building resources...");
        let Config { contexts, resources, .. } = &mut config;
        for id in resources.ids() {
            let Some(resource) = resources.get_mut(id) else {
                continue;
            };
            let extra_bytes = contexts.extra_bytes_fragment(id, resource.extra_bytes());
            resource.add(&mut self.rom, &mut self.workspace, &extra_bytes)?;
        }
        self.workspace
            .write_work_file(RESOURCE_LABELS_FILE, &resources.generate_labels())?;

        tracing::info!("Building main patch...");
        contexts.resolve(resources);
        for (name, value) in contexts.nmi_defines() {
            self.rom.add_define(name, value)?;
        }
        self.workspace
            .write_work_file(CALLS_FILE, &contexts.generate_call_file(resources))?;
        self.workspace
            .write_work_file(POINTER_LIST_FILE, &pointer_list(self.rom.cleans()))?;

        let main = self.workspace.base_source(MAIN_SOURCE);
        self.rom.patch(&main, &Defines::new())?;
        let summary = self.rom.process_prints(&main, false)?;
        self.rom.ledger_mut().add(SizeCategory::Main, summary.size);

        self.rom.save()?;

        let ledger = self.rom.ledger();
        let report = BuildReport {
            main: ledger.get(SizeCategory::Main),
            library: ledger.get(SizeCategory::Library),
            resources: ledger.get(SizeCategory::Resources),
            other: ledger.get(SizeCategory::Other),
            resource_count: resources.len(),
        };
        report.log();
        tracing::info!("All code inserted successfully.");

        write_extmod(&rom_path);
        Ok(report)
    }
}

/// Contents of `pointer_list.asm`: one `dl` per clean address, in order
pub fn pointer_list(cleans: &[u32]) -> String {
    cleans
        .iter()
        .map(|&address| format!("dl {}\n", snes_address(address)))
        .collect()
}

/// Text appended to the `.extmod` marker
pub fn extmod_marker() -> String {
    format!("UberASM Tool v{VERSION_MAJOR}.{VERSION_MINOR} ")
}

/// Record this tool in `<rom>.extmod`, once
///
/// Failure only warns: the ROM has already been saved.
pub fn write_extmod(rom_path: &Path) {
    let path = rom_path.with_extension("extmod");
    let marker = extmod_marker();

    let result = match fs::read(&path) {
        Ok(contents) if contents.ends_with(marker.as_bytes()) => return,
        Ok(_) => append(&path, &marker),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => append(&path, &marker),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::warn!("could not update contents of extmod file: {e}");
    }
}

fn append(path: &Path, text: &str) -> std::io::Result<()> {
    OpenOptions::new().create(true).append(true).open(path)?.write_all(text.as_bytes())
}
