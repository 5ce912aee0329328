//! UberASM - resource linker for SNES ROM hacks
//!
//! Usage: uberasm [OPTIONS] [LIST] [ROM]

use anyhow::Context as _;
use clap::Parser as ClapParser;
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, fmt, reload};
use uberasm::driver::{ABORT_MESSAGE, ROM_UNTOUCHED_MESSAGE};
use uberasm::{AsarCli, Pipeline};

#[derive(ClapParser, Debug)]
#[command(name = "uberasm")]
#[command(author = "UberASM Tool Team")]
#[command(version)]
#[command(about = "Inserts level, game mode and overworld asm into a SNES ROM", long_about = None)]
struct Args {
    /// List file, relative to the tool directory unless absolute
    #[arg(default_value = "list.txt")]
    list: PathBuf,

    /// ROM file; overrides the list file's 'rom:' command
    rom: Option<PathBuf>,

    /// Tool directory holding asm/, level/, gamemode/, overworld/, library/ and routines/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Assembler executable
    #[arg(long, default_value = "asar")]
    asar: PathBuf,

    /// Verbose output (overrides the list file)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

type FilterHandle = reload::Handle<LevelFilter, Registry>;

fn main() {
    let args = Args::parse();

    let initial = if args.quiet {
        LevelFilter::WARN
    } else if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let (filter, handle) = reload::Layer::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).without_time().with_target(false))
        .init();

    if let Err(e) = run(&args, &handle) {
        tracing::error!("{e:#}");
        tracing::error!("{ABORT_MESSAGE}");
        tracing::error!("{ROM_UNTOUCHED_MESSAGE}");
        process::exit(1);
    }
}

fn run(args: &Args, handle: &FilterHandle) -> anyhow::Result<()> {
    let asar = AsarCli::new(&args.asar);
    let version = asar.check().context("assembler could not be started")?;
    tracing::debug!("assembler: {version}");

    let pipeline = Pipeline::new(&args.root, Box::new(asar));
    let config = pipeline.load_config(&args.list)?;

    // The list may switch verbosity unless the command line already chose
    if let Some(on) = config.verbose {
        if !args.verbose && !args.quiet {
            let level = if on { LevelFilter::DEBUG } else { LevelFilter::INFO };
            handle.modify(|filter| *filter = level).context("could not change log level")?;
        }
    }

    pipeline.build(config, args.rom.as_deref())?;
    Ok(())
}
