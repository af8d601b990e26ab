//! Page replacement policies.
//!
//! A [`Pager`] is only asked for a victim when the free list is empty, so
//! every frame it scans holds a mapping. Scanning policies keep a hand that
//! resumes one past the last victim. Selection is allowed to clear
//! referenced bits and update per-frame aging/working-set metadata.

use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::error::{Result, SimError};
use crate::memory::{Frame, PteFlags};
use crate::process::Process;
use crate::random::Randomizer;

/// Mutable view over the frame table and the page tables its frames serve
pub struct VictimScan<'a> {
    pub frames: &'a mut [Frame],
    pub processes: &'a mut [Process],
    /// Current logical time
    pub now: u64,
}

impl VictimScan<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn pte_flag(&self, frame: usize, flag: PteFlags) -> bool {
        self.frames[frame]
            .mapping
            .is_some_and(|m| self.processes[m.pid].page_table[m.vpage].is(flag))
    }

    pub fn referenced(&self, frame: usize) -> bool {
        self.pte_flag(frame, PteFlags::REFERENCED)
    }

    pub fn modified(&self, frame: usize) -> bool {
        self.pte_flag(frame, PteFlags::MODIFIED)
    }

    pub fn clear_referenced(&mut self, frame: usize) {
        if let Some(m) = self.frames[frame].mapping {
            self.processes[m.pid].page_table[m.vpage].set(PteFlags::REFERENCED, false);
        }
    }
}

pub trait Pager {
    fn name(&self) -> &'static str;

    /// Pick the frame to evict
    fn select_victim(&mut self, scan: &mut VictimScan<'_>) -> usize;

    /// Called once per read/write instruction
    fn tick(&mut self) {}

    /// Called when `frame` receives new content
    fn on_map(&mut self, _frame: &mut Frame, _now: u64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerKind {
    Fifo,
    Random,
    Clock,
    Nru,
    Aging,
    WorkingSet,
}

impl PagerKind {
    pub fn needs_randomizer(self) -> bool {
        self == PagerKind::Random
    }

    /// Instantiate the policy. `rng` is required for [`PagerKind::Random`].
    pub fn build(self, rng: Option<Randomizer>) -> Result<Box<dyn Pager>> {
        Ok(match self {
            PagerKind::Fifo => Box::new(Fifo::default()),
            PagerKind::Random => Box::new(RandomPager::new(rng.ok_or(SimError::MissingRandomFile)?)),
            PagerKind::Clock => Box::new(Clock::default()),
            PagerKind::Nru => Box::new(Nru::default()),
            PagerKind::Aging => Box::new(Aging::default()),
            PagerKind::WorkingSet => Box::new(WorkingSet::default()),
        })
    }
}

impl FromStr for PagerKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "f" | "fifo" => Ok(PagerKind::Fifo),
            "r" | "random" => Ok(PagerKind::Random),
            "c" | "clock" => Ok(PagerKind::Clock),
            "e" | "n" | "nru" => Ok(PagerKind::Nru),
            "a" | "aging" => Ok(PagerKind::Aging),
            "w" | "ws" | "working-set" => Ok(PagerKind::WorkingSet),
            _ => Err(SimError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for PagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PagerKind::Fifo => "fifo",
            PagerKind::Random => "random",
            PagerKind::Clock => "clock",
            PagerKind::Nru => "nru",
            PagerKind::Aging => "aging",
            PagerKind::WorkingSet => "working-set",
        };
        f.write_str(name)
    }
}

// =========================================================================
// FIFO
// =========================================================================

#[derive(Debug, Default)]
pub struct Fifo {
    hand: usize,
}

impl Pager for Fifo {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn select_victim(&mut self, scan: &mut VictimScan<'_>) -> usize {
        let victim = self.hand;
        self.hand = (self.hand + 1) % scan.len();
        victim
    }
}

// =========================================================================
// Random
// =========================================================================

#[derive(Debug)]
pub struct RandomPager {
    rng: Randomizer,
}

impl RandomPager {
    pub fn new(rng: Randomizer) -> Self {
        RandomPager { rng }
    }
}

impl Pager for RandomPager {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn select_victim(&mut self, scan: &mut VictimScan<'_>) -> usize {
        self.rng.next(scan.len())
    }
}

// =========================================================================
// Clock (second chance)
// =========================================================================

#[derive(Debug, Default)]
pub struct Clock {
    hand: usize,
}

impl Pager for Clock {
    fn name(&self) -> &'static str {
        "Clock"
    }

    fn select_victim(&mut self, scan: &mut VictimScan<'_>) -> usize {
        let n = scan.len();
        // every bit is cleared within one revolution
        for _ in 0..2 * n {
            let idx = self.hand;
            self.hand = (self.hand + 1) % n;
            if !scan.referenced(idx) {
                return idx;
            }
            scan.clear_referenced(idx);
        }
        let idx = self.hand;
        self.hand = (self.hand + 1) % n;
        idx
    }
}

// =========================================================================
// NRU
// =========================================================================

#[derive(Debug, Default)]
pub struct Nru {
    hand: usize,
    instructions: u64,
    last_reset: u64,
}

impl Nru {
    fn class(scan: &VictimScan<'_>, frame: usize) -> u8 {
        2 * scan.referenced(frame) as u8 + scan.modified(frame) as u8
    }
}

impl Pager for Nru {
    fn name(&self) -> &'static str {
        "NRU"
    }

    fn tick(&mut self) {
        self.instructions += 1;
    }

    fn select_victim(&mut self, scan: &mut VictimScan<'_>) -> usize {
        let n = scan.len();
        let reset = self.instructions - self.last_reset >= NRU_RESET_INTERVAL;
        // first frame seen per class, in scan order
        let mut first_in_class: [Option<usize>; 4] = [None; 4];

        for i in 0..n {
            let idx = (self.hand + i) % n;
            let class = Nru::class(scan, idx) as usize;
            if first_in_class[class].is_none() {
                first_in_class[class] = Some(idx);
            }
            if reset {
                scan.clear_referenced(idx);
            } else if class == 0 {
                break;
            }
        }
        if reset {
            self.last_reset = self.instructions;
        }

        let victim = first_in_class.iter().flatten().next().copied().unwrap_or(self.hand);
        log::trace!("NRU reset={} classes={:?} victim={}", reset, first_in_class, victim);
        self.hand = (victim + 1) % n;
        victim
    }
}

// =========================================================================
// Aging
// =========================================================================

#[derive(Debug, Default)]
pub struct Aging {
    hand: usize,
}

impl Pager for Aging {
    fn name(&self) -> &'static str {
        "Aging"
    }

    fn select_victim(&mut self, scan: &mut VictimScan<'_>) -> usize {
        let n = scan.len();
        let mut victim = self.hand;
        let mut min_age = u32::MAX;

        for i in 0..n {
            let idx = (self.hand + i) % n;
            let referenced = scan.referenced(idx);
            let frame = &mut scan.frames[idx];
            frame.age >>= 1;
            if referenced {
                frame.age |= AGE_TOP_BIT;
            }
            let age = frame.age;
            if referenced {
                scan.clear_referenced(idx);
            }
            if i == 0 || age < min_age {
                min_age = age;
                victim = idx;
            }
        }

        self.hand = (victim + 1) % n;
        victim
    }

    fn on_map(&mut self, frame: &mut Frame, _now: u64) {
        frame.age = 0;
    }
}

// =========================================================================
// Working set
// =========================================================================

#[derive(Debug, Default)]
pub struct WorkingSet {
    hand: usize,
}

impl Pager for WorkingSet {
    fn name(&self) -> &'static str {
        "WorkingSet"
    }

    fn select_victim(&mut self, scan: &mut VictimScan<'_>) -> usize {
        let n = scan.len();
        let now = scan.now;
        let mut stale = None;
        // (last_used, frame)
        let mut oldest_unreferenced: Option<(u64, usize)> = None;
        let mut oldest_referenced: Option<(u64, usize)> = None;

        for i in 0..n {
            let idx = (self.hand + i) % n;
            if scan.referenced(idx) {
                scan.frames[idx].last_used = now;
                scan.clear_referenced(idx);
                if oldest_referenced.is_none_or(|(t, _)| now < t) {
                    oldest_referenced = Some((now, idx));
                }
                continue;
            }
            let last_used = scan.frames[idx].last_used;
            if now.saturating_sub(last_used) > WS_TAU {
                stale = Some(idx);
                break;
            }
            if oldest_unreferenced.is_none_or(|(t, _)| last_used < t) {
                oldest_unreferenced = Some((last_used, idx));
            }
        }

        let victim = stale
            .or(oldest_unreferenced.map(|(_, idx)| idx))
            .or(oldest_referenced.map(|(_, idx)| idx))
            .unwrap_or(self.hand);
        self.hand = (victim + 1) % n;
        victim
    }

    fn on_map(&mut self, frame: &mut Frame, now: u64) {
        frame.last_used = now;
    }
}
