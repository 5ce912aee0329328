//! Resources: user asm files linked once and called from slots

use crate::backend::rom::ROUTINE_PREFIX;
use crate::backend::{Defines, Label, Rom, SizeCategory, snes_address};
use crate::common::workspace::{asm_path, normalize, read_source};
use crate::common::{BuildError, BuildResult, Workspace};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Call sites a resource may ask to run on the SA-1
pub const SA1_LABELS: [&str; 4] = ["init", "main", "load", "end"];

/// Generated wrapper patched once per resource
pub const RESOURCE_FILE: &str = "resource.asm";
/// Generated extra-bytes tables included by the wrapper
pub const EXTRA_BYTES_FILE: &str = "extra_bytes.asm";

const ENTRY_LABEL: &str = "Inner_ResourceEntry";
const NMI_LABEL: &str = "Inner_nmi";
const EXTRA_BYTES_LABEL: &str = "Inner_ExtraBytes";
const INNER_PREFIX: &str = "Inner_";

/// Stable, 0-based resource number in discovery order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub usize);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `;>` commands read from a resource file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    /// Cleared by `;>dbr off`
    pub set_dbr: bool,
    /// `;>bytes N`
    pub extra_bytes: u8,
    /// `;>sa1 init,main,...`
    pub sa1_labels: BTreeSet<String>,
}

impl Default for Directives {
    fn default() -> Self {
        Self {
            set_dbr: true,
            extra_bytes: 0,
            sa1_labels: BTreeSet::new(),
        }
    }
}

impl Directives {
    /// Read the directives of `source`; only the first line of each kind counts
    pub fn parse(file: &Path, source: &str) -> BuildResult<Self> {
        let mut directives = Self::default();
        let lines: Vec<&str> = source.lines().collect();

        if lines.iter().any(|line| *line == ";>dbr off") {
            directives.set_dbr = false;
        }

        if let Some(arg) = lines.iter().find_map(|line| line.strip_prefix(";>bytes ")) {
            let bytes: i64 = arg
                .trim()
                .parse()
                .map_err(|_| BuildError::authoring(file, "invalid number in \";>bytes\" command"))?;
            directives.extra_bytes = u8::try_from(bytes).map_err(|_| {
                BuildError::authoring(file, "invalid value in \";>bytes\" command (must be 0 - 255)")
            })?;
        }

        if let Some(arg) = lines.iter().find_map(|line| line.strip_prefix(";>sa1 ")) {
            for label in arg.split(',').map(str::trim) {
                if !SA1_LABELS.contains(&label) {
                    return Err(BuildError::authoring(
                        file,
                        format!("invalid label \"{label}\" in \";>sa1\" command"),
                    ));
                }
                directives.sa1_labels.insert(label.to_string());
            }
        }

        Ok(directives)
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    id: ResourceId,
    file: PathBuf,
    directives: Directives,
    entry: Option<u32>,
    nmi: Option<u32>,
    bytes_labels: Vec<Label>,
}

impl Resource {
    pub fn new(id: ResourceId, file: impl Into<PathBuf>) -> Self {
        Self {
            id,
            file: file.into(),
            directives: Directives::default(),
            entry: None,
            nmi: None,
            bytes_labels: Vec::new(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Path relative to the tool directory
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    pub fn directives_mut(&mut self) -> &mut Directives {
        &mut self.directives
    }

    pub fn extra_bytes(&self) -> u8 {
        self.directives.extra_bytes
    }

    pub fn has_nmi(&self) -> bool {
        self.nmi.is_some()
    }

    /// Read the file once and pick up its directives
    pub fn preprocess(&mut self, workspace: &Workspace) -> BuildResult<()> {
        let path = workspace.path(&self.file);
        let source = read_source(&path)?;
        self.directives = Directives::parse(&self.file, &source)?;
        Ok(())
    }

    /// Wrapper source handed to the assembler
    pub fn wrapper_source(&self) -> String {
        format!(
            "incsrc \"../base/resource_template.asm\"\n%UberResource(\"{}\", {})\n",
            asm_path(&self.file),
            u8::from(self.directives.set_dbr)
        )
    }

    /// Patch the resource into the ROM and collect its labels
    pub fn add(&mut self, rom: &mut Rom, workspace: &mut Workspace, extra_bytes: &str) -> BuildResult<()> {
        tracing::debug!("adding resource \"{}\"", self.file.display());

        workspace.write_work_file(EXTRA_BYTES_FILE, extra_bytes)?;
        let source = workspace.write_work_file(RESOURCE_FILE, &self.wrapper_source())?;

        let mut defines = Defines::new();
        for label in SA1_LABELS {
            let invoke = self.directives.sa1_labels.contains(label);
            defines.insert(format!("InvokeSA1{label}"), u8::from(invoke).to_string());
        }

        rom.patch(&source, &defines)?;
        let summary = rom.process_prints(&self.file, true)?;
        rom.ledger_mut().add(SizeCategory::Resources, summary.size);

        tracing::debug!("  inserted at {}", snes_address(summary.start));
        tracing::debug!("  insert size: {0} (0x{0:X}) bytes", summary.size);

        self.process_labels(rom)
    }

    /// Take the entry points from the last patch and register its routines
    pub fn process_labels(&mut self, rom: &mut Rom) -> BuildResult<()> {
        let labels = rom.labels().to_vec();
        self.apply_labels(&labels)?;

        for label in &labels {
            if let Some(name) = label.name.strip_prefix(ROUTINE_PREFIX) {
                if !name.contains(':') {
                    rom.add_routine(&self.file, name, label.address)?;
                }
            }
        }
        Ok(())
    }

    /// Record entry, NMI and extra-bytes addresses from a symbol table
    pub fn apply_labels(&mut self, labels: &[Label]) -> BuildResult<()> {
        let entry = labels
            .iter()
            .find(|l| l.name == ENTRY_LABEL)
            .ok_or_else(|| BuildError::authoring(&self.file, "ResourceEntry label not found"))?;
        self.entry = Some(entry.address);
        self.nmi = labels.iter().find(|l| l.name == NMI_LABEL).map(|l| l.address);

        // The bare ExtraBytes label is kept too; nothing references it
        self.bytes_labels = labels
            .iter()
            .filter(|l| l.name.starts_with(EXTRA_BYTES_LABEL))
            .map(|l| Label::new(&l.name[INNER_PREFIX.len()..], l.address))
            .collect();
        Ok(())
    }

    /// Append this resource's exported labels to `resource_labels.asm`
    pub fn generate_labels(&self, output: &mut String) {
        let id = self.id;
        if let Some(entry) = self.entry {
            output.push_str(&format!("UberResource{id}_ResourceEntry = {}\n", snes_address(entry)));
        }
        if let Some(nmi) = self.nmi {
            output.push_str(&format!("UberResource{id}_NMI = {}\n", snes_address(nmi)));
        }
        for label in &self.bytes_labels {
            output.push_str(&format!("UberResource{id}_{} = {}\n", label.name, snes_address(label.address)));
        }
    }
}

/// Every resource of a build, indexed by ID and deduplicated by path
#[derive(Debug, Default)]
pub struct Resources {
    items: IndexMap<PathBuf, Resource>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// ID of `file`, creating a resource on first sight
    ///
    /// Paths are normalized first, so `level/./a.asm` and `level/a.asm`
    /// share an ID.
    pub fn intern(&mut self, file: &Path) -> ResourceId {
        let file = normalize(file);
        let entry = self.items.entry(file);
        let id = ResourceId(entry.index());
        let path = entry.key().clone();
        entry.or_insert_with(|| Resource::new(id, path));
        id
    }

    pub fn lookup(&self, file: &Path) -> Option<ResourceId> {
        self.items.get_index_of(&normalize(file)).map(ResourceId)
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.items.get_index(id.0).map(|(_, r)| r)
    }

    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.items.get_index_mut(id.0).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.items.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + use<> {
        (0..self.items.len()).map(ResourceId)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Contents of `resource_labels.asm`
    pub fn generate_labels(&self) -> String {
        let mut output = String::new();
        for resource in self.iter() {
            resource.generate_labels(&mut output);
        }
        output
    }
}
