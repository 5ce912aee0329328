//! Shared routine registry
//!
//! Routines are deduplicated by name only. The first file that inserts a
//! routine owns it; later patches call it through the address published as
//! an `UberRoutine_<name>` define instead of inserting another copy.

use crate::backend::{Defines, snes_address};
use crate::common::{BuildError, BuildResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Prefix shared by routine labels and their address defines
pub const ROUTINE_PREFIX: &str = "UberRoutine_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineEntry {
    pub file: PathBuf,
    pub address: u32,
}

#[derive(Debug, Default)]
pub struct RoutineRegistry {
    declared: BTreeSet<String>,
    scanned: bool,
    entries: BTreeMap<String, RoutineEntry>,
}

impl RoutineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the routine names found by the bootstrap scan
    pub fn declare(&mut self, names: impl IntoIterator<Item = String>) -> BuildResult<()> {
        if self.scanned {
            return Err(BuildError::out_of_order("shared routines were already scanned"));
        }
        self.declared.extend(names);
        self.scanned = true;
        Ok(())
    }

    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    /// Register a routine inserted by `file`
    ///
    /// Re-registering the same name from the same file at the same address is
    /// a no-op; any other reuse of the name is a collision.
    pub fn add(&mut self, file: &Path, name: &str, address: u32) -> BuildResult<()> {
        if let Some(existing) = self.entries.get(name) {
            if existing.file == file && existing.address == address {
                return Ok(());
            }
            return Err(BuildError::RoutineCollision {
                name: name.to_string(),
                first: existing.file.clone(),
                second: file.to_path_buf(),
            });
        }

        if !self.declared.is_empty() && !self.declared.contains(name) {
            tracing::debug!("routine \"{name}\" from \"{}\" is not in the routines folder", file.display());
        }

        self.entries.insert(
            name.to_string(),
            RoutineEntry {
                file: file.to_path_buf(),
                address,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RoutineEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Addresses of every inserted routine, as defines for the next patch
    pub fn defines(&self) -> Defines {
        self.entries
            .iter()
            .map(|(name, entry)| (format!("{ROUTINE_PREFIX}{name}"), snes_address(entry.address)))
            .collect()
    }
}
