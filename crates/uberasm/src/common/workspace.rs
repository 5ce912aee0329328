//! Tool directory layout and generated work files
//!
//! All paths handed to the assembler are rooted at the tool directory:
//! `asm/base/` holds the fixed sources, `asm/work/` receives generated ones,
//! and `level/`, `gamemode/`, `overworld/`, `library/` and `routines/` hold
//! user files.

use super::{BuildError, BuildResult};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const BASE_DIR: &str = "asm/base";
pub const WORK_DIR: &str = "asm/work";
pub const LIBRARY_DIR: &str = "library";
pub const ROUTINE_DIR: &str = "routines";

pub struct Workspace {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the tool directory
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }

    /// A fixed source under `asm/base/`
    pub fn base_source(&self, name: &str) -> PathBuf {
        self.root.join(BASE_DIR).join(name)
    }

    /// A generated source under `asm/work/`
    pub fn work_file(&self, name: &str) -> PathBuf {
        self.root.join(WORK_DIR).join(name)
    }

    /// Write a generated source, remembering it for [`Workspace::cleanup`]
    pub fn write_work_file(&mut self, name: &str, contents: &str) -> BuildResult<PathBuf> {
        let path = self.work_file(name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }
        fs::write(&path, contents).map_err(|e| BuildError::io(&path, e))?;
        if !self.written.contains(&path) {
            self.written.push(path.clone());
        }
        Ok(path)
    }

    /// Generated files written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Remove every generated file
    pub fn cleanup(&mut self) {
        for path in self.written.drain(..) {
            if let Err(err) = fs::remove_file(&path) {
                tracing::debug!("could not remove {}: {err}", path.display());
            }
        }
    }

    /// Regular files under a tool subdirectory, relative to the root, in name order
    ///
    /// A missing directory yields no files.
    pub fn files_in(&self, dir: &str, recursive: bool) -> BuildResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let start = self.root.join(dir);
        if !start.is_dir() {
            return Ok(files);
        }

        let depth = if recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(&start).min_depth(1).max_depth(depth).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(start.as_path()).to_path_buf();
                BuildError::io(&path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                files.push(relative.to_path_buf());
            }
        }

        Ok(files)
    }
}

/// Lexically normalize a relative path, folding `.` and `..` components
///
/// Two spellings of the same file normalize to the same path, which is
/// how a resource named twice in the list keeps a single ID.
pub fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last().copied() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Read a user source as text
///
/// Bytes that are not UTF-8 (Latin-1 or Shift-JIS comments) become
/// replacement characters; everything the tool interprets is ASCII.
pub fn read_source(path: &Path) -> BuildResult<String> {
    let bytes = fs::read(path).map_err(|e| BuildError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Path as written into generated assembly: forward slashes only
pub fn asm_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
