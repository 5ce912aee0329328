//! End-to-end builds against a scripted assembler

use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use uberasm::backend::rom::{Mapping, update_checksum};
use uberasm::{Assembler, AssemblerError, BuildError, BuildReport, BuildResult, Defines, Label, Pipeline};

const LIST_HEADER: &str = "\
rom: hack.smc
global: other/global_code.asm
statusbar: other/status_code.asm
macrolib: other/macro_library.asm
freeram: $7FAC80
";

/// What the scripted assembler should report for particular resource files
#[derive(Default, Clone)]
struct Script {
    nmi: Vec<&'static str>,
    routines: Vec<(&'static str, &'static str, u32)>,
    fail: Option<(&'static str, &'static str)>,
    /// Replace the ROM file with a directory while the main patch runs
    lock_rom: bool,
}

/// Everything the pipeline handed to the assembler
#[derive(Default)]
struct Log {
    patched: Vec<String>,
    resource_defines: HashMap<String, Defines>,
    extra_bytes: HashMap<String, String>,
    main_defines: Defines,
    calls: String,
    pointers: String,
    resource_labels: String,
}

struct FakeAsar {
    root: PathBuf,
    script: Script,
    log: Rc<RefCell<Log>>,
    next: u32,
    labels: Vec<Label>,
    prints: Vec<String>,
}

impl Assembler for FakeAsar {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn patch(&mut self, rom: &mut Vec<u8>, source: &Path, defines: &Defines) -> Result<(), AssemblerError> {
        let work = self.root.join("asm/work");
        let read = |name: &str| fs::read_to_string(work.join(name)).unwrap_or_default();
        let mut log = self.log.borrow_mut();
        let mut labels = Vec::new();
        let mut prints = Vec::new();

        match source.file_name().and_then(|n| n.to_str()).unwrap_or_default() {
            "resource.asm" => {
                let wrapper = read("resource.asm");
                let file = wrapper.split('"').nth(3).unwrap_or_default().to_string();
                if let Some((failing, message)) = self.script.fail {
                    if failing == file {
                        return Err(AssemblerError::Failed(vec![message.to_string()]));
                    }
                }

                let start = self.next;
                self.next += 0x100;
                labels.push(Label::new("Inner_ResourceEntry", start));
                if self.script.nmi.contains(&file.as_str()) {
                    labels.push(Label::new("Inner_nmi", start + 0x10));
                }
                let extra_bytes = read("extra_bytes.asm");
                for line in extra_bytes.lines() {
                    if let Some(name) = line.strip_prefix("..").and_then(|l| l.strip_suffix(':')) {
                        labels.push(Label::new(format!("Inner_ExtraBytes_{name}"), start + 0x40));
                    }
                }
                for &(owner, name, address) in &self.script.routines {
                    if owner == file {
                        labels.push(Label::new(format!("UberRoutine_{name}"), address));
                        labels.push(Label::new(format!("UberRoutine_{name}:pos_1_0"), address));
                    }
                }
                prints.push(format!("_startl ${start:06X}"));
                prints.push(format!("_endl ${:06X}", start + 0x20));

                log.resource_defines.insert(file.clone(), defines.clone());
                log.extra_bytes.insert(file.clone(), extra_bytes);
                log.patched.push(file);
            }
            "main.asm" => {
                log.main_defines = defines.clone();
                log.calls = read("resource_calls.asm");
                log.pointers = read("pointer_list.asm");
                log.resource_labels = read("resource_labels.asm");
                prints.push("_startl $008000".to_string());
                prints.push("_endl $008100".to_string());
                log.patched.push("main.asm".to_string());
                if self.script.lock_rom {
                    let rom_path = self.root.join("hack.smc");
                    fs::remove_file(&rom_path).unwrap();
                    fs::create_dir_all(rom_path.join("locked")).unwrap();
                }
            }
            other => log.patched.push(other.to_string()),
        }

        rom[0x100] = rom[0x100].wrapping_add(1);
        self.labels = labels;
        self.prints = prints;
        Ok(())
    }

    fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn prints(&self) -> &[String] {
        &self.prints
    }
}

fn rom_image() -> Vec<u8> {
    let mut data = vec![0u8; 0x80000];
    data[0x7FC0..0x7FD5].copy_from_slice(b"SUPER MARIOWORLD     ");
    update_checksum(&mut data, Mapping::LoRom.header_offset());
    data
}

/// A tool directory with a ROM and the given user files
fn tool_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    fs::create_dir_all(dir.path().join("asm/work")).unwrap();
    fs::write(dir.path().join("hack.smc"), rom_image()).unwrap();
    dir
}

fn build(dir: &Path, list: &str, script: Script) -> (BuildResult<BuildReport>, Rc<RefCell<Log>>) {
    fs::write(dir.join("list.txt"), format!("{LIST_HEADER}{list}")).unwrap();
    build_existing(dir, script)
}

/// Build with whatever `list.txt` is already in `dir`
fn build_existing(dir: &Path, script: Script) -> (BuildResult<BuildReport>, Rc<RefCell<Log>>) {
    let log = Rc::new(RefCell::new(Log::default()));
    let fake = FakeAsar {
        root: dir.to_path_buf(),
        script,
        log: Rc::clone(&log),
        next: 0x108000,
        labels: Vec::new(),
        prints: Vec::new(),
    };
    let pipeline = Pipeline::new(dir, Box::new(fake));
    let result = match pipeline.load_config(Path::new("list.txt")) {
        Ok(config) => pipeline.build(config, None),
        Err(err) => Err(err),
    };
    (result, log)
}

fn work_dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir.join("asm/work")).unwrap().next().is_none()
}

#[test]
fn test_single_level_resource_with_extra_bytes() {
    let dir = tool_dir(&[("level/a.asm", ";>bytes 4\nmain:\n    rtl\n")]);
    let (result, log) = build(dir.path(), "level:\n0 a.asm\n", Script::default());
    let report = result.unwrap();
    let log = log.borrow();

    assert_eq!(report.resource_count, 1);
    assert_eq!(report.resources, 0x20);
    assert_eq!(report.main, 0x100);

    assert_eq!(log.extra_bytes["level/a.asm"], "..Level0:\n    db $00,$00,$00,$00\n");
    assert!(log.calls.starts_with("Level0NMIJSLs:\nLevel1JSLs:\nLevel1NMIJSLs:\n"));
    assert!(log.calls.contains(
        "Level0JSLs:\n    %UberSetExtraBytes(UberResource0_ExtraBytes_Level0)\n    jsl UberResource0_ResourceEntry\n    rts\n\n"
    ));
    for i in 1..512 {
        assert!(log.calls.contains(&format!("\nLevel{i:X}JSLs:\n")), "slot {i:X}");
    }
    assert!(log.calls.contains("macro LevelAllJSLs()\nendmacro\n"));
    assert!(log.calls.contains("macro LevelAllNMIJSLs()\nendmacro\n"));

    assert_eq!(
        log.resource_labels,
        "UberResource0_ResourceEntry = $108000\nUberResource0_ExtraBytes_Level0 = $108040\n"
    );

    // Saved, marked, cleaned up
    assert_eq!(fs::read(dir.path().join("hack.smc")).unwrap()[0x100], 3);
    assert_eq!(fs::read_to_string(dir.path().join("hack.extmod")).unwrap(), "UberASM Tool v2.0 ");
    assert!(work_dir_is_empty(dir.path()));
}

#[test]
fn test_gamemode_nmi_in_aggregate_slot() {
    let dir = tool_dir(&[("gamemode/music.asm", "nmi:\n    rtl\n")]);
    let script = Script {
        nmi: vec!["gamemode/music.asm"],
        ..Script::default()
    };
    let (result, log) = build(dir.path(), "gamemode:\n* music.asm\n", script);
    result.unwrap();
    let log = log.borrow();

    let defines = &log.main_defines;
    assert_eq!(defines["UberGamemodeNMI"], "1");
    assert_eq!(defines["UberGamemodeNMIAll"], "1");
    assert_eq!(defines["UberGamemodeNMINormal"], "0");
    assert_eq!(defines["UberLevelNMI"], "0");
    assert_eq!(defines["UberUseNMI"], "1");

    for i in 0..256 {
        assert!(log.calls.contains(&format!("Gamemode{i:X}NMIJSLs:\n")), "slot {i:X}");
    }
    assert!(log.calls.contains(
        "macro GamemodeAllJSLs()\n    pea $0000\n    jsl UberResource0_ResourceEntry\n    pla : pla\nendmacro\n"
    ));
    assert!(log.calls.contains("macro GamemodeAllNMIJSLs()\n    jsl UberResource0_NMI\nendmacro\n"));
}

#[test]
fn test_routine_collision_leaves_rom_untouched() {
    let dir = tool_dir(&[("level/a.asm", ""), ("level/b.asm", "")]);
    let script = Script {
        routines: vec![("level/a.asm", "Foo", 0x10A000), ("level/b.asm", "Foo", 0x10B000)],
        ..Script::default()
    };
    let (result, log) = build(dir.path(), "level:\n0 a.asm\n1 b.asm\n", script);

    let err = result.expect_err("collision");
    assert!(matches!(err, BuildError::RoutineCollision { ref name, .. } if name == "Foo"));
    assert!(!log.borrow().patched.contains(&"main.asm".to_string()));
    assert_eq!(fs::read(dir.path().join("hack.smc")).unwrap(), rom_image());
    assert!(!dir.path().join("hack.extmod").exists());
    assert!(work_dir_is_empty(dir.path()));
}

#[test]
fn test_shared_routine_is_published_to_later_resources() {
    let dir = tool_dir(&[("level/a.asm", ""), ("level/b.asm", "")]);
    let script = Script {
        routines: vec![("level/a.asm", "Foo", 0x10A000)],
        ..Script::default()
    };
    let (result, log) = build(dir.path(), "level:\n0 a.asm b.asm\n", script);
    result.unwrap();
    let log = log.borrow();

    assert!(!log.resource_defines["level/a.asm"].contains_key("UberRoutine_Foo"));
    assert_eq!(log.resource_defines["level/b.asm"]["UberRoutine_Foo"], "$10A000");
    assert_eq!(log.resource_defines["level/b.asm"]["InvokeSA1main"], "0");
    assert_eq!(log.main_defines["UberRoutine_Foo"], "$10A000");
}

#[test]
fn test_pointer_list_follows_insertion_order() {
    let dir = tool_dir(&[("level/a.asm", ""), ("level/b.asm", ""), ("overworld/c.asm", ";>sa1 init\n")]);
    let (result, log) = build(
        dir.path(),
        "level:\n105 b.asm\n0 a.asm\noverworld:\n1 c.asm\n",
        Script::default(),
    );
    result.unwrap();
    let log = log.borrow();

    assert_eq!(log.patched, vec!["clean.asm", "routine_scan.asm", "level/b.asm", "level/a.asm", "overworld/c.asm", "main.asm"]);
    assert_eq!(log.pointers, "dl $108000\ndl $108100\ndl $108200\n");
    assert_eq!(log.resource_defines["overworld/c.asm"]["InvokeSA1init"], "1");
}

#[test]
fn test_extmod_marker_written_once() {
    let dir = tool_dir(&[("level/a.asm", "")]);
    build(dir.path(), "level:\n0 a.asm\n", Script::default()).0.unwrap();
    build(dir.path(), "level:\n0 a.asm\n", Script::default()).0.unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("hack.extmod")).unwrap(), "UberASM Tool v2.0 ");
}

#[test]
fn test_assembler_diagnostics_are_verbatim() {
    let dir = tool_dir(&[("level/a.asm", ""), ("level/bad.asm", "")]);
    let script = Script {
        fail: Some(("level/bad.asm", "bad.asm:3: error: (E5101): Label 'x' wasn't found.")),
        ..Script::default()
    };
    let (result, _) = build(dir.path(), "level:\n0 a.asm bad.asm\n", script);

    let err = result.expect_err("toolchain failure");
    assert!(matches!(err, BuildError::Toolchain { .. }));
    assert!(err.to_string().ends_with("bad.asm:3: error: (E5101): Label 'x' wasn't found."));
    assert_eq!(fs::read(dir.path().join("hack.smc")).unwrap(), rom_image());
    assert!(work_dir_is_empty(dir.path()));
}

#[test]
fn test_list_errors_are_all_reported() {
    let dir = tool_dir(&[("level/a.asm", ";>bytes 1\n")]);
    let (result, log) = build(dir.path(), "level:\n0 a.asm 1 2\n200 missing.asm\nrom: other.smc\n", Script::default());

    let err = result.expect_err("list errors");
    assert!(matches!(err, BuildError::ListRejected { count: 3, .. }));
    assert!(log.borrow().patched.is_empty());
}

#[test]
fn test_missing_rom_file() {
    let dir = tool_dir(&[("level/a.asm", "")]);
    fs::remove_file(dir.path().join("hack.smc")).unwrap();
    let (result, _) = build(dir.path(), "level:\n0 a.asm\n", Script::default());
    assert!(matches!(result, Err(BuildError::Io { .. })));
}

#[test]
fn test_sources_with_legacy_encoded_comments() {
    let dir = tool_dir(&[]);
    fs::create_dir_all(dir.path().join("level")).unwrap();
    fs::write(dir.path().join("level/a.asm"), b";>bytes 2\n; caf\xE9\nmain:\n    rtl\n").unwrap();
    let mut list = LIST_HEADER.as_bytes().to_vec();
    list.extend_from_slice(b"; n\x82\xA0me\nlevel:\n0 a.asm\n");
    fs::write(dir.path().join("list.txt"), list).unwrap();

    let (result, log) = build_existing(dir.path(), Script::default());
    assert_eq!(result.unwrap().resource_count, 1);
    assert_eq!(log.borrow().extra_bytes["level/a.asm"], "..Level0:\n    db $00,$00\n");
}

#[test]
fn test_failed_save_skips_extmod() {
    let dir = tool_dir(&[("level/a.asm", "")]);
    let script = Script {
        lock_rom: true,
        ..Script::default()
    };
    let (result, log) = build(dir.path(), "level:\n0 a.asm\n", script);

    assert!(matches!(result, Err(BuildError::Io { .. })));
    assert!(log.borrow().patched.contains(&"main.asm".to_string()));
    assert!(!dir.path().join("hack.extmod").exists());
    assert!(dir.path().join("hack.smc/locked").is_dir());
    assert!(work_dir_is_empty(dir.path()));

    let mut stray: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    stray.sort();
    assert_eq!(stray, vec!["asm", "hack.smc", "level", "list.txt"]);
}
