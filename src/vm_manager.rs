//! Simulation driver: dispatches trace instructions and owns the counters
//! the cost model is computed from.

use crate::constants::*;
use crate::error::{Result, SimError};
use crate::io::{Instruction, Operation};
use crate::pager::Pager;
use crate::process::{Process, ProcessStats};
use crate::translation::{Access, Event, Mmu};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub instruction_count: u64,
    pub context_switches: u64,
    pub process_exits: u64,
}

impl GlobalStats {
    /// Logical clock used by the working-set policy
    #[inline]
    pub fn logical_time(&self) -> u64 {
        self.instruction_count + self.context_switches + self.process_exits
    }
}

/// Weighted cost of one process's events
pub fn process_cost(stats: &ProcessStats) -> u64 {
    stats.maps * COST_MAP
        + stats.unmaps * COST_UNMAP
        + stats.ins * COST_IN
        + stats.outs * COST_OUT
        + stats.fins * COST_FIN
        + stats.fouts * COST_FOUT
        + stats.zeros * COST_ZERO
        + stats.segv * COST_SEGV
        + stats.segprot * COST_SEGPROT
}

/// Total simulated cost of a run
pub fn total_cost(global: &GlobalStats, processes: &[Process]) -> u64 {
    global.instruction_count * COST_RW
        + global.context_switches * COST_CTX_SWITCH
        + global.process_exits * COST_PROC_EXIT
        + processes.iter().map(|p| process_cost(&p.stats)).sum::<u64>()
}

pub struct Simulator {
    mmu: Mmu,
    stats: GlobalStats,
    current: Option<usize>,
    /// Instructions executed so far, of any kind
    executed: usize,
}

impl Simulator {
    pub fn new(processes: Vec<Process>, num_frames: usize, pager: Box<dyn Pager>) -> Result<Self> {
        if num_frames == 0 || num_frames > MAX_FRAMES {
            return Err(SimError::InvalidFrameCount {
                got: num_frames,
                max: MAX_FRAMES,
            });
        }
        log::info!(
            "{} processes, {} frames, {} replacement",
            processes.len(),
            num_frames,
            pager.name()
        );
        Ok(Simulator {
            mmu: Mmu::new(processes, num_frames, pager),
            stats: GlobalStats::default(),
            current: None,
            executed: 0,
        })
    }

    /// Execute one instruction and return the events it produced
    pub fn step(&mut self, instruction: Instruction) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        match instruction.op {
            Operation::ContextSwitch => {
                let pid = instruction.arg;
                if pid >= self.mmu.processes.len() {
                    return Err(SimError::NoSuchProcess(pid));
                }
                self.current = Some(pid);
                self.stats.context_switches += 1;
            }
            Operation::Exit => {
                let pid = self.current_pid()?;
                self.mmu.exit_process(pid, &mut events);
                self.stats.process_exits += 1;
            }
            Operation::Read | Operation::Write => {
                let pid = self.current_pid()?;
                let access = if instruction.op == Operation::Write {
                    Access::Write
                } else {
                    Access::Read
                };
                self.stats.instruction_count += 1;
                self.mmu.tick();
                let now = self.stats.logical_time();
                self.mmu.access(pid, instruction.arg, access, now, &mut events)?;
            }
        }
        self.executed += 1;
        Ok(events)
    }

    fn current_pid(&self) -> Result<usize> {
        self.current.ok_or(SimError::NoCurrentProcess(self.executed))
    }

    /// Execute a whole instruction stream, discarding events
    pub fn run(&mut self, instructions: &[Instruction]) -> Result<()> {
        for &instruction in instructions {
            self.step(instruction)?;
        }
        Ok(())
    }

    pub fn current(&self) -> Option<&Process> {
        self.current.map(|pid| &self.mmu.processes[pid])
    }

    pub fn processes(&self) -> &[Process] {
        &self.mmu.processes
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn stats(&self) -> &GlobalStats {
        &self.stats
    }

    pub fn cost(&self) -> u64 {
        total_cost(&self.stats, &self.mmu.processes)
    }
}
