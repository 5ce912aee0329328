//! Asar command-line assembler
//!
//! Each patch stages the ROM buffer in a scratch directory, runs the `asar`
//! executable on it with WLA symbol output enabled, and reads the patched
//! image and symbol file back.

use super::{Assembler, AssemblerError, Defines, Label, parse_wla_symbols};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct AsarCli {
    program: PathBuf,
    labels: Vec<Label>,
    prints: Vec<String>,
}

impl AsarCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            labels: Vec::new(),
            prints: Vec::new(),
        }
    }

    /// Check that the executable can be started
    pub fn check(&self) -> Result<String, AssemblerError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .map_err(|e| self.unavailable(&e))?;
        let version = String::from_utf8_lossy(&output.stdout);
        Ok(version.lines().next().unwrap_or_default().trim().to_string())
    }

    fn unavailable(&self, err: &std::io::Error) -> AssemblerError {
        AssemblerError::Unavailable(format!("{}: {err}", self.program.display()))
    }

    fn build_command(&self, source: &Path, rom: &Path, symbols: &Path, defines: &Defines) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--no-title-check")
            .arg("--symbols=wla")
            .arg(format!("--symbols-path={}", symbols.display()));
        for (name, value) in defines {
            cmd.arg(format!("-D{name}={value}"));
        }
        cmd.arg(source).arg(rom);
        cmd
    }
}

impl Assembler for AsarCli {
    fn name(&self) -> &'static str {
        "asar"
    }

    fn patch(&mut self, rom: &mut Vec<u8>, source: &Path, defines: &Defines) -> Result<(), AssemblerError> {
        let scratch = tempfile::tempdir().map_err(|e| self.unavailable(&e))?;
        let rom_path = scratch.path().join("rom.smc");
        let symbols_path = scratch.path().join("rom.sym");
        fs::write(&rom_path, rom.as_slice()).map_err(|e| self.unavailable(&e))?;

        let output = self
            .build_command(source, &rom_path, &symbols_path, defines)
            .output()
            .map_err(|e| self.unavailable(&e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let diagnostics = if stderr.trim().is_empty() { &stdout } else { &stderr };
            return Err(AssemblerError::Failed(
                diagnostics.lines().map(str::to_string).collect(),
            ));
        }

        let patched = fs::read(&rom_path).map_err(|e| self.unavailable(&e))?;
        let symbols = fs::read_to_string(&symbols_path).unwrap_or_default();

        *rom = patched;
        self.labels = parse_wla_symbols(&symbols);
        self.prints = stdout.lines().map(str::to_string).collect();
        tracing::trace!(
            source = %source.display(),
            labels = self.labels.len(),
            prints = self.prints.len(),
            "asar patch finished"
        );

        Ok(())
    }

    fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn prints(&self) -> &[String] {
        &self.prints
    }
}
