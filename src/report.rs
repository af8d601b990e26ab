//! Text rendering of the protocol stream, page/frame tables and statistics.

use std::io::Write;
use std::str::FromStr;

use crate::error::Result;
use crate::io::Instruction;
use crate::memory::{FrameTable, Pte};
use crate::process::Process;
use crate::translation::Event;
use crate::vm_manager::{GlobalStats, Simulator, total_cost};

/// Which diagnostics to print, from the `-o` option letters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayOptions {
    /// `O`: per-instruction events
    pub output: bool,
    /// `P`: final page tables
    pub page_tables: bool,
    /// `F`: final frame table
    pub frame_table: bool,
    /// `S`: per-process stats and the total cost line
    pub stats: bool,
    /// `x`: current page table after each instruction
    pub current_page_table: bool,
    /// `y`: all page tables after each instruction
    pub all_page_tables: bool,
    /// `f`: frame table after each instruction
    pub frame_table_each: bool,
    /// `a`: victim selection trace
    pub selection: bool,
}

impl FromStr for DisplayOptions {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut opts = DisplayOptions::default();
        for c in s.chars() {
            match c {
                'O' => opts.output = true,
                'P' => opts.page_tables = true,
                'F' => opts.frame_table = true,
                'S' => opts.stats = true,
                'x' => opts.current_page_table = true,
                'y' => opts.all_page_tables = true,
                'f' => opts.frame_table_each = true,
                'a' => opts.selection = true,
                other => log::warn!("ignoring unknown output option '{}'", other),
            }
        }
        Ok(opts)
    }
}

pub fn page_table_line(process: &Process) -> String {
    let entries: Vec<String> = process
        .page_table
        .iter()
        .enumerate()
        .map(|(vpage, pte)| pte_cell(vpage, pte))
        .collect();
    format!("PT[{}]: {}", process.pid, entries.join(" "))
}

fn pte_cell(vpage: usize, pte: &Pte) -> String {
    if !pte.present() {
        let cell = if pte.paged_out() { "#" } else { "*" };
        return cell.to_string();
    }
    format!(
        "{}:{}{}{}",
        vpage,
        if pte.referenced() { 'R' } else { '-' },
        if pte.modified() { 'M' } else { '-' },
        if pte.paged_out() { 'S' } else { '-' },
    )
}

pub fn frame_table_line(frames: &FrameTable) -> String {
    let entries: Vec<String> = frames
        .frames()
        .iter()
        .map(|frame| match frame.mapping {
            Some(m) => format!("{}:{}", m.pid, m.vpage),
            None => "*".to_string(),
        })
        .collect();
    format!("FT: {}", entries.join(" "))
}

pub fn process_stats_line(process: &Process) -> String {
    let s = &process.stats;
    format!(
        "PROC[{}]: U={} M={} I={} O={} FI={} FO={} Z={} SV={} SP={}",
        process.pid, s.unmaps, s.maps, s.ins, s.outs, s.fins, s.fouts, s.zeros, s.segv, s.segprot
    )
}

pub fn total_cost_line(global: &GlobalStats, processes: &[Process]) -> String {
    format!(
        "TOTALCOST {} {} {} {} {}",
        global.logical_time(),
        global.context_switches,
        global.process_exits,
        total_cost(global, processes),
        std::mem::size_of::<Pte>()
    )
}

/// Writes diagnostics selected by [`DisplayOptions`] to `out`
pub struct Reporter<'a, W: Write> {
    opts: &'a DisplayOptions,
    out: W,
}

impl<'a, W: Write> Reporter<'a, W> {
    pub fn new(opts: &'a DisplayOptions, out: W) -> Self {
        Reporter { opts, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Echo of instruction `n` and the events it produced
    pub fn instruction(&mut self, n: usize, instruction: &Instruction, events: &[Event]) -> Result<()> {
        if self.opts.output {
            writeln!(self.out, "{}: ==> {}", n, instruction)?;
        }
        for event in events {
            let show = match event {
                Event::Select { .. } => self.opts.selection,
                // exits are always announced
                Event::Exit { .. } => true,
                _ => self.opts.output,
            };
            if show {
                writeln!(self.out, "{}", event)?;
            }
        }
        Ok(())
    }

    /// Per-instruction table dumps (`x`, `y`, `f`)
    pub fn after_instruction(&mut self, sim: &Simulator) -> Result<()> {
        if self.opts.all_page_tables {
            for process in sim.processes() {
                writeln!(self.out, "{}", page_table_line(process))?;
            }
        } else if self.opts.current_page_table {
            if let Some(process) = sim.current() {
                writeln!(self.out, "{}", page_table_line(process))?;
            }
        }
        if self.opts.frame_table_each {
            writeln!(self.out, "{}", frame_table_line(&sim.mmu().frames))?;
        }
        Ok(())
    }

    /// End-of-run summaries (`P`, `F`, `S`)
    pub fn summary(&mut self, sim: &Simulator) -> Result<()> {
        if self.opts.page_tables {
            for process in sim.processes() {
                writeln!(self.out, "{}", page_table_line(process))?;
            }
        }
        if self.opts.frame_table {
            writeln!(self.out, "{}", frame_table_line(&sim.mmu().frames))?;
        }
        if self.opts.stats {
            for process in sim.processes() {
                writeln!(self.out, "{}", process_stats_line(process))?;
            }
            writeln!(self.out, "{}", total_cost_line(sim.stats(), sim.processes()))?;
        }
        Ok(())
    }
}

/// Replay `instructions` on `sim`, writing the selected diagnostics
pub fn run_with_report<W: Write>(
    sim: &mut Simulator,
    instructions: &[Instruction],
    opts: &DisplayOptions,
    out: W,
) -> Result<W> {
    let mut reporter = Reporter::new(opts, out);
    for (n, instruction) in instructions.iter().enumerate() {
        let events = sim.step(*instruction)?;
        reporter.instruction(n, instruction, &events)?;
        reporter.after_instruction(sim)?;
    }
    reporter.summary(sim)?;
    Ok(reporter.into_inner())
}
