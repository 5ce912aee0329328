//! Contexts, slots and dispatch-table generation
//!
//! Every context has a fixed number of indexed slots plus one aggregate
//! slot. Slots hold resource IDs in assignment order; the generated call
//! file turns them into `<Ctx><HEX>JSLs` / `<Ctx><HEX>NMIJSLs` subroutines
//! and the `<Ctx>AllJSLs` / `<Ctx>AllNMIJSLs` macros.

use super::resource::{ResourceId, Resources};
use crate::backend::Defines;
use std::fmt;
use thiserror::Error;

/// One of the three call-site domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Level,
    Gamemode,
    Overworld,
}

impl ContextKind {
    pub const ALL: [ContextKind; 3] = [ContextKind::Level, ContextKind::Gamemode, ContextKind::Overworld];

    /// Capitalized name used in labels and defines
    pub fn name(self) -> &'static str {
        match self {
            ContextKind::Level => "Level",
            ContextKind::Gamemode => "Gamemode",
            ContextKind::Overworld => "Overworld",
        }
    }

    /// Directory resource paths are relative to
    pub fn directory(self) -> &'static str {
        match self {
            ContextKind::Level => "level",
            ContextKind::Gamemode => "gamemode",
            ContextKind::Overworld => "overworld",
        }
    }

    pub fn slot_count(self) -> usize {
        match self {
            ContextKind::Level => 512,
            ContextKind::Gamemode => 256,
            ContextKind::Overworld => 7,
        }
    }

    fn index(self) -> usize {
        match self {
            ContextKind::Level => 0,
            ContextKind::Gamemode => 1,
            ContextKind::Overworld => 2,
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Slot address within a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotIndex {
    /// The aggregate slot, run for every index
    All,
    Index(usize),
}

impl SlotIndex {
    /// Label token: `All` or the index in uppercase hex
    pub fn suffix(self) -> String {
        match self {
            SlotIndex::All => "All".to_string(),
            SlotIndex::Index(i) => format!("{i:X}"),
        }
    }
}

/// Rejected slot assignment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("{context} slot ${index:X} is out of range (last slot is ${last:X})")]
    OutOfRange {
        context: ContextKind,
        index: usize,
        last: usize,
    },

    #[error("resource is already assigned to {context} slot {}", .slot.suffix())]
    AlreadyAssigned { context: ContextKind, slot: SlotIndex },
}

/// A resource placed in a slot, with the extra byte values given in the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub resource: ResourceId,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Slot {
    assignments: Vec<Assignment>,
    has_calls: bool,
    has_nmi_calls: bool,
}

impl Slot {
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn has_calls(&self) -> bool {
        self.has_calls
    }

    pub fn has_nmi_calls(&self) -> bool {
        self.has_nmi_calls
    }

    fn resolve(&mut self, resources: &Resources) {
        self.has_calls = !self.assignments.is_empty();
        self.has_nmi_calls = self
            .assignments
            .iter()
            .any(|a| resources.get(a.resource).is_some_and(|r| r.has_nmi()));
    }

    fn generate_calls(&self, output: &mut String, resources: &Resources, label: &str, nmi: bool) {
        for assignment in &self.assignments {
            let Some(resource) = resources.get(assignment.resource) else {
                continue;
            };
            let id = assignment.resource;
            if nmi {
                if resource.has_nmi() {
                    output.push_str(&format!("    jsl UberResource{id}_NMI\n"));
                }
            } else {
                if resource.extra_bytes() > 0 {
                    output.push_str(&format!("    %UberSetExtraBytes(UberResource{id}_ExtraBytes_{label})\n"));
                }
                output.push_str(&format!("    jsl UberResource{id}_ResourceEntry\n"));
            }
        }
    }
}

/// NMI usage of one context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NmiFlags {
    /// Some aggregate-slot resource has an NMI entry
    pub all: bool,
    /// Some indexed-slot resource has an NMI entry
    pub normal: bool,
}

impl NmiFlags {
    pub fn any(self) -> bool {
        self.all || self.normal
    }
}

pub struct Context {
    kind: ContextKind,
    all: Slot,
    slots: Vec<Slot>,
}

impl Context {
    pub fn new(kind: ContextKind) -> Self {
        Self {
            kind,
            all: Slot::default(),
            slots: vec![Slot::default(); kind.slot_count()],
        }
    }

    pub fn slot(&self, index: SlotIndex) -> Option<&Slot> {
        match index {
            SlotIndex::All => Some(&self.all),
            SlotIndex::Index(i) => self.slots.get(i),
        }
    }

    /// Append a resource to a slot's call list
    pub fn assign(&mut self, index: SlotIndex, assignment: Assignment) -> Result<(), SlotError> {
        let context = self.kind;
        let count = self.slots.len();
        let slot = match index {
            SlotIndex::All => &mut self.all,
            SlotIndex::Index(i) => self.slots.get_mut(i).ok_or(SlotError::OutOfRange {
                context,
                index: i,
                last: count - 1,
            })?,
        };

        if slot.assignments.iter().any(|a| a.resource == assignment.resource) {
            return Err(SlotError::AlreadyAssigned { context, slot: index });
        }
        slot.assignments.push(assignment);
        Ok(())
    }

    /// Every (slot, assignment) pair naming `resource`, aggregate slot first
    pub fn assignments_of(&self, resource: ResourceId) -> impl Iterator<Item = (SlotIndex, &Assignment)> {
        std::iter::once((SlotIndex::All, &self.all))
            .chain(self.slots.iter().enumerate().map(|(i, slot)| (SlotIndex::Index(i), slot)))
            .flat_map(move |(index, slot)| {
                slot.assignments
                    .iter()
                    .filter(move |a| a.resource == resource)
                    .map(move |a| (index, a))
            })
    }

    /// Compute each slot's call flags once resource addresses are known
    pub fn resolve(&mut self, resources: &Resources) {
        self.all.resolve(resources);
        for slot in &mut self.slots {
            slot.resolve(resources);
        }
    }

    pub fn nmi_flags(&self) -> NmiFlags {
        NmiFlags {
            all: self.all.has_nmi_calls,
            normal: self.slots.iter().any(Slot::has_nmi_calls),
        }
    }

    /// Publish `Uber<Ctx>NMIAll`, `Uber<Ctx>NMINormal` and `Uber<Ctx>NMI`
    pub fn nmi_defines(&self, defines: &mut Defines) -> bool {
        let flags = self.nmi_flags();
        let name = self.kind.name();
        defines.insert(format!("Uber{name}NMIAll"), flag(flags.all));
        defines.insert(format!("Uber{name}NMINormal"), flag(flags.normal));
        defines.insert(format!("Uber{name}NMI"), flag(flags.any()));
        flags.any()
    }

    /// Extra-bytes tables `resource` needs in this context
    ///
    /// One sublabel per assignment, filled with the list's values or zeros.
    pub fn extra_bytes_fragment(&self, resource: ResourceId, count: u8, output: &mut String) {
        if count == 0 {
            return;
        }
        for (index, assignment) in self.assignments_of(resource) {
            output.push_str(&format!("..{}{}:\n", self.kind.name(), index.suffix()));
            let values = (0..usize::from(count))
                .map(|i| format!("${:02X}", assignment.bytes.get(i).copied().unwrap_or(0)))
                .collect::<Vec<_>>()
                .join(",");
            output.push_str(&format!("    db {values}\n"));
        }
    }

    /// Dispatch text for this context
    pub fn generate_calls(&self, resources: &Resources, output: &mut String) {
        let name = self.kind.name();

        // Unused labels share a single rts
        for (i, slot) in self.slots.iter().enumerate() {
            if !slot.has_calls {
                output.push_str(&format!("{name}{i:X}JSLs:\n"));
            }
            if !slot.has_nmi_calls {
                output.push_str(&format!("{name}{i:X}NMIJSLs:\n"));
            }
        }
        output.push_str("    rts\n\n");

        for nmi in [false, true] {
            let kind = if nmi { "NMI" } else { "" };
            for (i, slot) in self.slots.iter().enumerate() {
                let used = if nmi { slot.has_nmi_calls } else { slot.has_calls };
                if !used {
                    continue;
                }
                output.push_str(&format!("{name}{i:X}{kind}JSLs:\n"));
                slot.generate_calls(output, resources, &format!("{name}{i:X}"), nmi);
                output.push_str("    rts\n\n");
            }
        }

        let label = format!("{name}All");
        output.push_str(&format!("macro {name}AllJSLs()\n"));
        if !self.all.is_empty() {
            // The entry reads its slot offset at a fixed stack depth, so the
            // inline path pushes two placeholder bytes (pea is a cycle cheaper than pha : pha)
            output.push_str("    pea $0000\n");
            self.all.generate_calls(output, resources, &label, false);
            output.push_str("    pla : pla\n");
        }
        output.push_str("endmacro\n\n");

        output.push_str(&format!("macro {name}AllNMIJSLs()\n"));
        if !self.all.is_empty() {
            self.all.generate_calls(output, resources, &label, true);
        }
        output.push_str("endmacro\n\n");
    }
}

/// The three contexts of one build
pub struct Contexts {
    contexts: [Context; 3],
}

impl Contexts {
    pub fn new() -> Self {
        Self {
            contexts: ContextKind::ALL.map(Context::new),
        }
    }

    pub fn get(&self, kind: ContextKind) -> &Context {
        &self.contexts[kind.index()]
    }

    pub fn get_mut(&mut self, kind: ContextKind) -> &mut Context {
        &mut self.contexts[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.contexts.iter()
    }

    pub fn resolve(&mut self, resources: &Resources) {
        for context in &mut self.contexts {
            context.resolve(resources);
        }
    }

    /// Per-context NMI flags plus the global `UberUseNMI`
    pub fn nmi_defines(&self) -> Defines {
        let mut defines = Defines::new();
        let mut any = false;
        for context in &self.contexts {
            any |= context.nmi_defines(&mut defines);
        }
        defines.insert("UberUseNMI".to_string(), flag(any));
        defines
    }

    /// Contents of `extra_bytes.asm` for one resource
    pub fn extra_bytes_fragment(&self, resource: ResourceId, count: u8) -> String {
        let mut output = String::new();
        for context in &self.contexts {
            context.extra_bytes_fragment(resource, count, &mut output);
        }
        output
    }

    /// Contents of `resource_calls.asm`
    pub fn generate_call_file(&self, resources: &Resources) -> String {
        let mut output = String::new();
        for context in &self.contexts {
            context.generate_calls(resources, &mut output);
        }
        output
    }
}

impl Default for Contexts {
    fn default() -> Self {
        Self::new()
    }
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Label;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    /// Resources with fixed directives and label sets, no assembler involved
    fn resources(specs: &[(&str, u8, bool)]) -> Resources {
        let mut resources = Resources::new();
        for &(file, bytes, nmi) in specs {
            let id = resources.intern(Path::new(file));
            let resource = resources.get_mut(id).unwrap();
            resource.directives_mut().extra_bytes = bytes;
            let mut labels = vec![Label::new("Inner_ResourceEntry", 0x108000)];
            if nmi {
                labels.push(Label::new("Inner_nmi", 0x108010));
            }
            resource.apply_labels(&labels).unwrap();
        }
        resources
    }

    fn assign(context: &mut Context, slot: SlotIndex, id: usize) {
        context
            .assign(slot, Assignment { resource: ResourceId(id), bytes: Vec::new() })
            .unwrap();
    }

    fn count_labels(text: &str, suffix: &str) -> usize {
        text.lines()
            .filter(|l| !l.starts_with(' ') && l.ends_with(suffix))
            .count()
    }

    #[test]
    fn test_label_count_is_independent_of_occupancy() {
        let resources = resources(&[("level/a.asm", 0, true)]);
        for kind in ContextKind::ALL {
            for occupied in [false, true] {
                let mut context = Context::new(kind);
                if occupied {
                    assign(&mut context, SlotIndex::Index(0), 0);
                    assign(&mut context, SlotIndex::All, 0);
                }
                context.resolve(&resources);
                let mut text = String::new();
                context.generate_calls(&resources, &mut text);

                let normal = count_labels(&text, "JSLs:") - count_labels(&text, "NMIJSLs:");
                assert_eq!(normal, kind.slot_count());
                assert_eq!(count_labels(&text, "NMIJSLs:"), kind.slot_count());
                assert_eq!(text.matches(&format!("macro {kind}AllJSLs()")).count(), 1);
                assert_eq!(text.matches(&format!("macro {kind}AllNMIJSLs()")).count(), 1);
            }
        }
    }

    #[test]
    fn test_call_order_follows_assignment_order() {
        let resources = resources(&[("level/r1.asm", 0, false), ("level/r2.asm", 0, false)]);
        let mut context = Context::new(ContextKind::Level);
        assign(&mut context, SlotIndex::Index(5), 1);
        assign(&mut context, SlotIndex::Index(5), 0);
        context.resolve(&resources);

        let mut text = String::new();
        context.generate_calls(&resources, &mut text);
        let body = text.split("Level5JSLs:\n").nth(1).unwrap();
        assert!(body.starts_with(
            "    jsl UberResource1_ResourceEntry\n    jsl UberResource0_ResourceEntry\n    rts\n"
        ));
    }

    #[test]
    fn test_normal_and_nmi_flags_are_independent() {
        let resources = resources(&[("level/plain.asm", 0, false), ("level/nmi.asm", 0, true)]);
        let mut context = Context::new(ContextKind::Level);
        assign(&mut context, SlotIndex::Index(1), 0);
        assign(&mut context, SlotIndex::Index(2), 0);
        assign(&mut context, SlotIndex::Index(2), 1);
        context.resolve(&resources);

        let one = context.slot(SlotIndex::Index(1)).unwrap();
        assert!(one.has_calls() && !one.has_nmi_calls());
        let two = context.slot(SlotIndex::Index(2)).unwrap();
        assert!(two.has_calls() && two.has_nmi_calls());
        let empty = context.slot(SlotIndex::Index(3)).unwrap();
        assert!(!empty.has_calls() && !empty.has_nmi_calls());

        let mut text = String::new();
        context.generate_calls(&resources, &mut text);
        assert!(text.contains("Level2NMIJSLs:\n    jsl UberResource1_NMI\n    rts\n\n"));
        assert!(text.contains("Level1NMIJSLs:\n"));
        assert!(!text.contains("Level1NMIJSLs:\n    jsl"));
    }

    #[test]
    fn test_overworld_call_text() {
        let resources = resources(&[("overworld/a.asm", 2, true)]);
        let mut context = Context::new(ContextKind::Overworld);
        assign(&mut context, SlotIndex::Index(1), 0);
        assign(&mut context, SlotIndex::All, 0);
        context.resolve(&resources);

        let mut text = String::new();
        context.generate_calls(&resources, &mut text);
        assert_eq!(
            text,
            "\
Overworld0JSLs:
Overworld0NMIJSLs:
Overworld2JSLs:
Overworld2NMIJSLs:
Overworld3JSLs:
Overworld3NMIJSLs:
Overworld4JSLs:
Overworld4NMIJSLs:
Overworld5JSLs:
Overworld5NMIJSLs:
Overworld6JSLs:
Overworld6NMIJSLs:
    rts

Overworld1JSLs:
    %UberSetExtraBytes(UberResource0_ExtraBytes_Overworld1)
    jsl UberResource0_ResourceEntry
    rts

Overworld1NMIJSLs:
    jsl UberResource0_NMI
    rts

macro OverworldAllJSLs()
    pea $0000
    %UberSetExtraBytes(UberResource0_ExtraBytes_OverworldAll)
    jsl UberResource0_ResourceEntry
    pla : pla
endmacro

macro OverworldAllNMIJSLs()
    jsl UberResource0_NMI
endmacro

"
        );
    }

    #[test]
    fn test_empty_aggregate_macros_have_no_body() {
        let resources = Resources::new();
        let mut context = Context::new(ContextKind::Gamemode);
        context.resolve(&resources);
        let mut text = String::new();
        context.generate_calls(&resources, &mut text);
        assert!(text.ends_with("macro GamemodeAllJSLs()\nendmacro\n\nmacro GamemodeAllNMIJSLs()\nendmacro\n\n"));
    }

    #[test]
    fn test_assign_rejects_out_of_range_and_duplicates() {
        let mut context = Context::new(ContextKind::Overworld);
        let err = context
            .assign(SlotIndex::Index(7), Assignment { resource: ResourceId(0), bytes: Vec::new() })
            .expect_err("out of range");
        assert_eq!(
            err,
            SlotError::OutOfRange {
                context: ContextKind::Overworld,
                index: 7,
                last: 6,
            }
        );
        assert_eq!(err.to_string(), "Overworld slot $7 is out of range (last slot is $6)");

        assign(&mut context, SlotIndex::Index(6), 0);
        let err = context
            .assign(SlotIndex::Index(6), Assignment { resource: ResourceId(0), bytes: Vec::new() })
            .expect_err("duplicate");
        assert_eq!(err.to_string(), "resource is already assigned to Overworld slot 6");

        assign(&mut context, SlotIndex::All, 0);
        let err = context
            .assign(SlotIndex::All, Assignment { resource: ResourceId(0), bytes: Vec::new() })
            .expect_err("duplicate");
        assert_eq!(err, SlotError::AlreadyAssigned { context: ContextKind::Overworld, slot: SlotIndex::All });
    }

    #[test]
    fn test_extra_bytes_fragment() {
        let mut contexts = Contexts::new();
        contexts
            .get_mut(ContextKind::Level)
            .assign(SlotIndex::Index(0x105), Assignment { resource: ResourceId(0), bytes: vec![1, 0xFF] })
            .unwrap();
        contexts
            .get_mut(ContextKind::Level)
            .assign(SlotIndex::All, Assignment { resource: ResourceId(0), bytes: Vec::new() })
            .unwrap();

        assert_eq!(
            contexts.extra_bytes_fragment(ResourceId(0), 2),
            "..LevelAll:\n    db $00,$00\n..Level105:\n    db $01,$FF\n"
        );
        assert_eq!(contexts.extra_bytes_fragment(ResourceId(0), 0), "");
        assert_eq!(contexts.extra_bytes_fragment(ResourceId(1), 2), "");
    }

    #[test]
    fn test_nmi_flag_algebra() {
        let resources = resources(&[("level/a.asm", 0, true), ("gamemode/b.asm", 0, true)]);
        let cases = [
            (None, None, false),
            (Some(SlotIndex::Index(3)), None, true),
            (None, Some(SlotIndex::All), true),
        ];
        for (level, gamemode, global) in cases {
            let mut contexts = Contexts::new();
            if let Some(slot) = level {
                assign(contexts.get_mut(ContextKind::Level), slot, 0);
            }
            if let Some(slot) = gamemode {
                assign(contexts.get_mut(ContextKind::Gamemode), slot, 1);
            }
            contexts.resolve(&resources);
            let defines = contexts.nmi_defines();

            for kind in ContextKind::ALL {
                let all = defines[&format!("Uber{kind}NMIAll")] == "1";
                let normal = defines[&format!("Uber{kind}NMINormal")] == "1";
                let any = defines[&format!("Uber{kind}NMI")] == "1";
                assert_eq!(any, all || normal);
            }
            assert_eq!(defines["UberUseNMI"], flag(global));
        }
    }
}
