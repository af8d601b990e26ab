//! MMU simulator - Main Entry Point
//!
//! Usage: mmu [-f<frames>] [-a<algo>] [-o<options>] [-v] <inputfile> [randomfile]
//!
//! Algorithms: f (FIFO), r (random), c (clock), e (NRU), a (aging),
//! w (working set).
//!
//! Options: O events, P page tables, F frame table, S statistics,
//! x/y page tables after each instruction, f frame table after each
//! instruction, a victim selection.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::LevelFilter;

use paging_sim::logging;
use paging_sim::random::Randomizer;
use paging_sim::report::run_with_report;
use paging_sim::{DisplayOptions, MAX_FRAMES, PagerKind, Simulator, Trace};

/// Command-line configuration
#[derive(Parser, Debug)]
#[command(name = "mmu")]
#[command(about = "Demand-paging virtual memory simulator")]
#[command(version)]
struct Config {
    /// Number of physical frames
    #[arg(short = 'f', default_value_t = MAX_FRAMES)]
    frames: usize,

    /// Replacement algorithm: f, r, c, e, a, w
    #[arg(short = 'a', default_value = "f")]
    algo: String,

    /// Output option letters (OPFSxyfa)
    #[arg(short = 'o', default_value = "")]
    options: String,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Trace file with processes, VMAs and instructions
    input_file: PathBuf,

    /// Random value file, needed by the random algorithm
    random_file: Option<PathBuf>,
}

fn main() {
    let config = Config::parse();
    logging::init(if config.verbose { LevelFilter::Info } else { LevelFilter::Warn });

    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(config: &Config) -> paging_sim::Result<()> {
    let kind: PagerKind = config.algo.parse()?;
    let opts = match config.options.parse::<DisplayOptions>() {
        Ok(opts) => opts,
        Err(never) => match never {},
    };

    let trace = Trace::from_file(&config.input_file)?;
    log::info!(
        "{}: {} processes, {} instructions",
        config.input_file.display(),
        trace.processes.len(),
        trace.instructions.len()
    );
    for process in &trace.processes {
        for vma in &process.vmas {
            log::debug!(
                "process {} VMA {}: {}..{} wp={} file={}",
                process.pid,
                vma.id,
                vma.start,
                vma.end,
                vma.write_protected,
                vma.file_mapped
            );
        }
    }

    let rng = match &config.random_file {
        Some(path) if kind.needs_randomizer() => Some(Randomizer::from_file(path)?),
        _ => None,
    };
    let pager = kind.build(rng)?;

    let mut sim = Simulator::new(trace.processes, config.frames, pager)?;
    let stdout = io::stdout();
    let mut out = run_with_report(&mut sim, &trace.instructions, &opts, BufWriter::new(stdout.lock()))?;
    out.flush()?;

    log::info!("done, total cost {}", sim.cost());
    Ok(())
}
