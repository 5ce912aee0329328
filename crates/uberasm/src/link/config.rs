//! List file configuration
//!
//! Turns parsed statements into the build configuration: the top-level
//! files and settings, the resource collection and every slot assignment.
//! Validation keeps going after a bad statement so that one run reports
//! every problem in the list.

use super::context::{Assignment, ContextKind, Contexts, SlotIndex};
use super::resource::Resources;
use crate::backend::{Defines, snes_address};
use crate::common::workspace::asm_path;
use crate::common::{ListError, Span, Workspace};
use crate::frontend::{FileCommand, ParsedList, ResourceItem, Statement, parse_list};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Version published as `UberMajorVersion` / `UberMinorVersion`
pub const VERSION_MAJOR: u32 = 2;
pub const VERSION_MINOR: u32 = 0;

pub struct Config {
    pub verbose: Option<bool>,
    pub rom_file: Option<PathBuf>,
    pub files: IndexMap<FileCommand, String>,
    pub freeram: Option<u32>,
    pub contexts: Contexts,
    pub resources: Resources,
}

impl Config {
    /// Parse and validate list file source
    ///
    /// Resource files are preprocessed as they are discovered, so a bad
    /// directive is reported alongside the list's own errors.
    pub fn parse(source: &str, workspace: &Workspace) -> Result<Self, Vec<ListError>> {
        let ParsedList { statements, mut errors } = parse_list(source);
        let mut builder = ConfigBuilder::new(workspace);
        for statement in statements {
            if let Err(err) = builder.apply(statement) {
                errors.push(err);
            }
        }
        errors.extend(builder.missing(Span::new(source.len(), source.len())));

        if errors.is_empty() {
            Ok(builder.config)
        } else {
            errors.sort_by_key(|e| e.span.start);
            Err(errors)
        }
    }

    /// Global defines derived from the list
    pub fn defines(&self) -> Defines {
        let mut defines = Defines::new();
        defines.insert("UberMajorVersion".to_string(), VERSION_MAJOR.to_string());
        defines.insert("UberMinorVersion".to_string(), VERSION_MINOR.to_string());
        for (command, path) in &self.files {
            defines.insert(command.define().to_string(), path.clone());
        }
        if let Some(freeram) = self.freeram {
            defines.insert("UberFreeram".to_string(), snes_address(freeram));
        }
        defines
    }
}

struct ConfigBuilder<'a> {
    workspace: &'a Workspace,
    config: Config,
    verbose_set: bool,
    mode: Option<ContextKind>,
}

impl<'a> ConfigBuilder<'a> {
    fn new(workspace: &'a Workspace) -> Self {
        Self {
            workspace,
            config: Config {
                verbose: None,
                rom_file: None,
                files: IndexMap::new(),
                freeram: None,
                contexts: Contexts::new(),
                resources: Resources::new(),
            },
            verbose_set: false,
            mode: None,
        }
    }

    fn apply(&mut self, statement: Statement) -> Result<(), ListError> {
        match statement {
            Statement::Verbose { on, span } => {
                if std::mem::replace(&mut self.verbose_set, true) {
                    return Err(duplicate("verbose:", span));
                }
                self.config.verbose = Some(on);
            }
            Statement::Rom { path, span } => {
                if self.config.rom_file.is_some() {
                    return Err(duplicate("rom:", span));
                }
                self.config.rom_file = Some(PathBuf::from(path));
            }
            Statement::File { command, path, span } => {
                if self.config.files.contains_key(&command) {
                    return Err(duplicate(command.keyword(), span));
                }
                self.config.files.insert(command, path);
            }
            Statement::Freeram { address, span } => {
                if self.config.freeram.is_some() {
                    return Err(duplicate("freeram:", span));
                }
                self.config.freeram = Some(address);
            }
            Statement::Mode { context, .. } => self.mode = Some(context),
            Statement::Resource { slot, slot_span, items, .. } => {
                let context = self.mode.ok_or_else(|| {
                    ListError::new("resource given before any context", slot_span)
                        .with_note("start the section with 'level:', 'gamemode:' or 'overworld:'")
                })?;
                let mut first_error = None;
                for item in items {
                    let result = self.assign(context, slot, item);
                    if let Err(err) = result {
                        first_error.get_or_insert(err);
                    }
                }
                if let Some(err) = first_error {
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn assign(&mut self, context: ContextKind, slot: SlotIndex, item: ResourceItem) -> Result<(), ListError> {
        let file = Path::new(context.directory()).join(&item.file);
        let known = self.config.resources.lookup(&file).is_some();
        if !known && !self.workspace.path(&file).is_file() {
            return Err(ListError::new(format!("resource file \"{}\" not found", asm_path(&file)), item.span));
        }

        let id = self.config.resources.intern(&file);
        let Some(resource) = self.config.resources.get_mut(id) else {
            return Err(ListError::new("resource could not be registered", item.span));
        };
        if !known {
            resource
                .preprocess(self.workspace)
                .map_err(|e| ListError::new(e.to_string(), item.span))?;
        }

        let expected = usize::from(resource.extra_bytes());
        if !item.bytes.is_empty() && item.bytes.len() != expected {
            return Err(ListError::new(
                format!("{} extra byte(s) given, but the resource uses {expected}", item.bytes.len()),
                item.span,
            ));
        }

        self.config
            .contexts
            .get_mut(context)
            .assign(slot, Assignment { resource: id, bytes: item.bytes })
            .map_err(|e| ListError::new(e.to_string(), item.span))
    }

    fn missing(&self, at: Span) -> Vec<ListError> {
        let mut errors: Vec<ListError> = FileCommand::ALL
            .into_iter()
            .filter(|command| !self.config.files.contains_key(command))
            .map(|command| ListError::new(format!("missing '{}' command", command.keyword()), at))
            .collect();
        if self.config.freeram.is_none() {
            errors.push(ListError::new("missing 'freeram:' command", at));
        }
        errors
    }
}

fn duplicate(keyword: &str, span: Span) -> ListError {
    ListError::new(format!("'{keyword}' is given more than once"), span)
}
