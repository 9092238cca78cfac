//! `golite`: loads a compiled, serde_json-encoded [`golite_vm::Program`] and
//! runs it (ambient CLI surface; spec.md itself has no front-end — modeled
//! on the teacher's `golite-cli` thin-binary-over-library split).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use golite_vm::{Program, Vm, VmConfig};

/// Run a compiled golite bytecode file.
#[derive(Debug, Parser)]
#[command(name = "golite", version, about)]
struct Cli {
    /// Path to a JSON-encoded instruction stream.
    program: PathBuf,

    /// Instructions each task runs per scheduler turn.
    #[arg(long, default_value_t = VmConfig::default().quantum)]
    quantum: u32,

    /// Initial heap size in machine words.
    #[arg(long, default_value_t = VmConfig::default().initial_heap_words)]
    heap_words: usize,

    /// Emit `[gc]`/`[sched]` diagnostics to stderr.
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.program)
        .with_context(|| format!("reading program file {}", cli.program.display()))?;
    let program: Program = serde_json::from_str(&source)
        .with_context(|| format!("parsing {} as a golite bytecode file", cli.program.display()))?;

    let config = VmConfig {
        quantum: cli.quantum,
        initial_heap_words: cli.heap_words,
        debug: cli.debug,
    };

    let mut vm = Vm::new(program, config).context("initializing the vm")?;
    vm.run().context("running the program")?;
    Ok(())
}
