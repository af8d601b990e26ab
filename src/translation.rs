//! Access path, page-fault handler and exit teardown.

use std::fmt;

use crate::constants::MAX_VPAGES;
use crate::error::{Result, SimError};
use crate::memory::{FrameMapping, FrameTable, PteFlags};
use crate::pager::{Pager, VictimScan};
use crate::process::Process;

/// Protocol events emitted while an instruction executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Victim chosen by the replacement policy (free list was empty)
    Select { frame: usize },
    Unmap { pid: usize, vpage: usize },
    Out,
    Fout,
    In,
    Fin,
    Zero,
    Map { frame: usize },
    Segv,
    Segprot,
    Exit { pid: usize },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Select { frame } => write!(f, "ASELECT {frame}"),
            Event::Unmap { pid, vpage } => write!(f, " UNMAP {pid}:{vpage}"),
            Event::Out => f.write_str(" OUT"),
            Event::Fout => f.write_str(" FOUT"),
            Event::In => f.write_str(" IN"),
            Event::Fin => f.write_str(" FIN"),
            Event::Zero => f.write_str(" ZERO"),
            Event::Map { frame } => write!(f, " MAP {frame}"),
            Event::Segv => f.write_str(" SEGV"),
            Event::Segprot => f.write_str(" SEGPROT"),
            Event::Exit { pid } => write!(f, "EXIT current process {pid}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// How a memory access ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    /// Page was faulted into this frame
    Faulted(usize),
    /// Page is outside every VMA; nothing changed but the counter
    SegmentationFault,
}

/// Processes, frames and the replacement policy of one simulation
pub struct Mmu {
    pub processes: Vec<Process>,
    pub frames: FrameTable,
    pager: Box<dyn Pager>,
}

impl Mmu {
    pub fn new(processes: Vec<Process>, num_frames: usize, pager: Box<dyn Pager>) -> Self {
        Mmu {
            processes,
            frames: FrameTable::new(num_frames),
            pager,
        }
    }

    /// Advance policy timers by one read/write instruction
    pub fn tick(&mut self) {
        self.pager.tick();
    }

    /// Run one read or write of `vpage` by process `pid`
    pub fn access(
        &mut self,
        pid: usize,
        vpage: usize,
        access: Access,
        now: u64,
        events: &mut Vec<Event>,
    ) -> Result<AccessOutcome> {
        if vpage >= MAX_VPAGES {
            return Err(SimError::VpageOutOfRange(vpage));
        }

        let mut outcome = AccessOutcome::Hit;
        if !self.processes[pid].page_table[vpage].present() {
            match self.handle_fault(pid, vpage, now, events) {
                Some(frame) => outcome = AccessOutcome::Faulted(frame),
                None => return Ok(AccessOutcome::SegmentationFault),
            }
        }

        let process = &mut self.processes[pid];
        let pte = &mut process.page_table[vpage];
        pte.set(PteFlags::REFERENCED, true);
        if access == Access::Write {
            if pte.write_protected() {
                process.stats.segprot += 1;
                events.push(Event::Segprot);
            } else {
                pte.set(PteFlags::MODIFIED, true);
            }
        }
        Ok(outcome)
    }

    /// Resolve a miss on (`pid`, `vpage`). Returns the frame now backing
    /// the page, or `None` on a segmentation fault.
    fn handle_fault(&mut self, pid: usize, vpage: usize, now: u64, events: &mut Vec<Event>) -> Option<usize> {
        let Some(vma) = self.processes[pid].find_vma(vpage).copied() else {
            self.processes[pid].stats.segv += 1;
            events.push(Event::Segv);
            return None;
        };

        let frame = self.acquire_frame(now, events);
        self.evict(frame, events);

        let process = &mut self.processes[pid];
        let pte = &mut process.page_table[vpage];
        pte.set_frame(frame);
        pte.set(PteFlags::WRITE_PROTECT, vma.write_protected);
        pte.set(PteFlags::PRESENT, true);

        if vma.file_mapped {
            process.stats.fins += 1;
            events.push(Event::Fin);
        } else if pte.paged_out() {
            process.stats.ins += 1;
            events.push(Event::In);
        } else {
            process.stats.zeros += 1;
            events.push(Event::Zero);
        }

        process.stats.maps += 1;
        events.push(Event::Map { frame });

        let slot = self.frames.get_mut(frame);
        slot.mapping = Some(FrameMapping {
            pid,
            vpage,
            vma: vma.id,
        });
        self.pager.on_map(slot, now);
        log::trace!("pid {} vpage {} -> frame {}", pid, vpage, frame);
        Some(frame)
    }

    /// Free frame if one is left, otherwise a victim from the policy
    fn acquire_frame(&mut self, now: u64, events: &mut Vec<Event>) -> usize {
        if let Some(frame) = self.frames.pop_free() {
            return frame;
        }
        let mut scan = VictimScan {
            frames: self.frames.frames_mut(),
            processes: &mut self.processes,
            now,
        };
        let frame = self.pager.select_victim(&mut scan);
        events.push(Event::Select { frame });
        frame
    }

    /// Detach `frame` from its current owner, writing dirty content back
    fn evict(&mut self, frame: usize, events: &mut Vec<Event>) {
        let Some(old) = self.frames.get_mut(frame).mapping.take() else {
            return;
        };
        let owner = &mut self.processes[old.pid];
        let file_mapped = owner.vmas.get(old.vma).is_some_and(|vma| vma.file_mapped);

        owner.stats.unmaps += 1;
        events.push(Event::Unmap {
            pid: old.pid,
            vpage: old.vpage,
        });

        let pte = &mut owner.page_table[old.vpage];
        if pte.modified() {
            if file_mapped {
                owner.stats.fouts += 1;
                events.push(Event::Fout);
            } else {
                owner.stats.outs += 1;
                events.push(Event::Out);
                pte.set(PteFlags::PAGEDOUT, true);
            }
            pte.set(PteFlags::MODIFIED, false);
        }
        pte.set(PteFlags::PRESENT, false);
    }

    /// Tear down every mapping of `pid` and return its frames to the free list
    pub fn exit_process(&mut self, pid: usize, events: &mut Vec<Event>) {
        events.push(Event::Exit { pid });
        let process = &mut self.processes[pid];

        for vpage in 0..MAX_VPAGES {
            let pte = process.page_table[vpage];
            if pte.present() {
                process.stats.unmaps += 1;
                events.push(Event::Unmap { pid, vpage });

                let frame = pte.frame();
                let file_mapped = self
                    .frames
                    .get(frame)
                    .mapping
                    .and_then(|m| process.vmas.get(m.vma))
                    .is_some_and(|vma| vma.file_mapped);
                if pte.modified() && file_mapped {
                    process.stats.fouts += 1;
                    events.push(Event::Fout);
                }
                self.frames.release(frame);
            }
            process.page_table[vpage].reset();
        }
        log::debug!("process {} exited, {} frames free", pid, self.frames.free_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::{Fifo, PagerKind};
    use crate::process::Vma;

    fn anon(id: usize, start: usize, end: usize) -> Vma {
        Vma {
            id,
            start,
            end,
            write_protected: false,
            file_mapped: false,
        }
    }

    fn mmu(vmas: Vec<Vma>, frames: usize) -> Mmu {
        Mmu::new(vec![Process::new(0, vmas)], frames, Box::new(Fifo::default()))
    }

    fn run(mmu: &mut Mmu, pid: usize, vpage: usize, access: Access) -> Vec<Event> {
        let mut events = Vec::new();
        mmu.access(pid, vpage, access, 0, &mut events).unwrap();
        events
    }

    // =========================================================================
    // Access path
    // =========================================================================

    #[test]
    fn test_zero_fill_on_first_touch() {
        let mut mmu = mmu(vec![anon(0, 0, 9)], 2);
        let events = run(&mut mmu, 0, 3, Access::Read);
        assert_eq!(events, vec![Event::Zero, Event::Map { frame: 0 }]);

        let pte = mmu.processes[0].page_table[3];
        assert!(pte.present());
        assert!(pte.referenced());
        assert!(!pte.modified());
        assert_eq!(pte.frame(), 0);
        assert_eq!(mmu.frames.get(0).mapping, Some(FrameMapping { pid: 0, vpage: 3, vma: 0 }));
    }

    #[test]
    fn test_hit_emits_nothing() {
        let mut mmu = mmu(vec![anon(0, 0, 9)], 2);
        run(&mut mmu, 0, 3, Access::Read);
        let mut events = Vec::new();
        let outcome = mmu.access(0, 3, Access::Write, 1, &mut events).unwrap();
        assert_eq!(outcome, AccessOutcome::Hit);
        assert!(events.is_empty());
        assert!(mmu.processes[0].page_table[3].modified());
    }

    #[test]
    fn test_segv_changes_nothing_but_counter() {
        let mut mmu = mmu(vec![anon(0, 0, 9)], 2);
        let mut events = Vec::new();
        let outcome = mmu.access(0, 10, Access::Write, 0, &mut events).unwrap();
        assert_eq!(outcome, AccessOutcome::SegmentationFault);
        assert_eq!(events, vec![Event::Segv]);
        assert_eq!(mmu.processes[0].stats.segv, 1);
        assert_eq!(mmu.processes[0].page_table[10], Default::default());
        assert_eq!(mmu.frames.free_count(), 2);
    }

    #[test]
    fn test_vpage_out_of_range_is_fatal() {
        let mut mmu = mmu(vec![anon(0, 0, 9)], 2);
        let mut events = Vec::new();
        assert!(matches!(
            mmu.access(0, 64, Access::Read, 0, &mut events),
            Err(SimError::VpageOutOfRange(64))
        ));
    }

    #[test]
    fn test_write_protected_page_raises_segprot() {
        let vma = Vma {
            write_protected: true,
            ..anon(0, 0, 9)
        };
        let mut mmu = mmu(vec![vma], 2);
        let events = run(&mut mmu, 0, 1, Access::Write);
        assert_eq!(events, vec![Event::Zero, Event::Map { frame: 0 }, Event::Segprot]);

        let pte = mmu.processes[0].page_table[1];
        assert!(pte.referenced());
        assert!(!pte.modified());
        assert!(pte.write_protected());
        assert_eq!(mmu.processes[0].stats.segprot, 1);

        // a second write to the now-present page faults again
        let events = run(&mut mmu, 0, 1, Access::Write);
        assert_eq!(events, vec![Event::Segprot]);
        assert_eq!(mmu.processes[0].stats.segprot, 2);
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    #[test]
    fn test_clean_victim_is_only_unmapped() {
        let mut mmu = mmu(vec![anon(0, 0, 9)], 1);
        run(&mut mmu, 0, 0, Access::Read);
        let events = run(&mut mmu, 0, 1, Access::Read);
        assert_eq!(
            events,
            vec![
                Event::Select { frame: 0 },
                Event::Unmap { pid: 0, vpage: 0 },
                Event::Zero,
                Event::Map { frame: 0 },
            ]
        );
        let old = mmu.processes[0].page_table[0];
        assert!(!old.present());
        assert!(!old.paged_out());
    }

    #[test]
    fn test_dirty_anonymous_victim_is_swapped_out_and_back_in() {
        let mut mmu = mmu(vec![anon(0, 0, 9)], 1);
        run(&mut mmu, 0, 0, Access::Write);
        let events = run(&mut mmu, 0, 1, Access::Read);
        assert_eq!(
            events,
            vec![
                Event::Select { frame: 0 },
                Event::Unmap { pid: 0, vpage: 0 },
                Event::Out,
                Event::Zero,
                Event::Map { frame: 0 },
            ]
        );
        let old = mmu.processes[0].page_table[0];
        assert!(old.paged_out());
        assert!(!old.present());
        assert!(!old.modified());

        let events = run(&mut mmu, 0, 0, Access::Read);
        assert_eq!(
            events,
            vec![
                Event::Select { frame: 0 },
                Event::Unmap { pid: 0, vpage: 1 },
                Event::In,
                Event::Map { frame: 0 },
            ]
        );
        // paged-out stays set while resident
        assert!(mmu.processes[0].page_table[0].paged_out());

        let stats = mmu.processes[0].stats;
        assert_eq!((stats.outs, stats.ins, stats.zeros, stats.maps, stats.unmaps), (1, 1, 2, 3, 2));
    }

    #[test]
    fn test_file_mapped_pages_use_fin_and_fout() {
        let vma = Vma {
            file_mapped: true,
            ..anon(0, 0, 9)
        };
        let mut mmu = mmu(vec![vma], 1);
        let events = run(&mut mmu, 0, 0, Access::Write);
        assert_eq!(events, vec![Event::Fin, Event::Map { frame: 0 }]);

        let events = run(&mut mmu, 0, 1, Access::Read);
        assert_eq!(
            events,
            vec![
                Event::Select { frame: 0 },
                Event::Unmap { pid: 0, vpage: 0 },
                Event::Fout,
                Event::Fin,
                Event::Map { frame: 0 },
            ]
        );
        assert!(!mmu.processes[0].page_table[0].paged_out());
        let stats = mmu.processes[0].stats;
        assert_eq!((stats.fins, stats.fouts, stats.outs), (2, 1, 0));
    }

    #[test]
    fn test_eviction_across_processes() {
        let procs = vec![Process::new(0, vec![anon(0, 0, 9)]), Process::new(1, vec![anon(0, 0, 9)])];
        let mut mmu = Mmu::new(procs, 1, PagerKind::Fifo.build(None).unwrap());
        run(&mut mmu, 0, 5, Access::Write);
        let events = run(&mut mmu, 1, 5, Access::Read);
        assert_eq!(events[1], Event::Unmap { pid: 0, vpage: 5 });
        assert_eq!(events[2], Event::Out);
        assert_eq!(mmu.processes[0].stats.unmaps, 1);
        assert_eq!(mmu.processes[0].stats.outs, 1);
        assert_eq!(mmu.processes[1].stats.unmaps, 0);
        assert_eq!(mmu.frames.get(0).mapping.map(|m| m.pid), Some(1));
    }

    // =========================================================================
    // Exit teardown
    // =========================================================================

    #[test]
    fn test_exit_releases_frames_in_vpage_order() {
        let file = Vma {
            file_mapped: true,
            ..anon(1, 10, 19)
        };
        let mut mmu = mmu(vec![anon(0, 0, 9), file], 4);
        run(&mut mmu, 0, 12, Access::Write); // frame 0, dirty file page
        run(&mut mmu, 0, 3, Access::Write); // frame 1, dirty anon page
        run(&mut mmu, 0, 7, Access::Read); // frame 2
        assert_eq!(mmu.frames.free_count(), 1);

        let mut events = Vec::new();
        mmu.exit_process(0, &mut events);
        assert_eq!(
            events,
            vec![
                Event::Exit { pid: 0 },
                Event::Unmap { pid: 0, vpage: 3 },
                Event::Unmap { pid: 0, vpage: 7 },
                Event::Unmap { pid: 0, vpage: 12 },
                Event::Fout,
            ]
        );
        assert_eq!(mmu.frames.free_frames().collect::<Vec<_>>(), vec![3, 1, 2, 0]);
        assert_eq!(mmu.frames.mapped_count(), 0);
        assert_eq!(mmu.processes[0].resident_pages(), 0);
        let stats = mmu.processes[0].stats;
        assert_eq!((stats.unmaps, stats.fouts, stats.outs), (3, 1, 0));
    }

    #[test]
    fn test_exit_clears_paged_out() {
        let mut mmu = mmu(vec![anon(0, 0, 9)], 1);
        run(&mut mmu, 0, 0, Access::Write);
        run(&mut mmu, 0, 1, Access::Read);
        assert!(mmu.processes[0].page_table[0].paged_out());

        let mut events = Vec::new();
        mmu.exit_process(0, &mut events);
        assert!(mmu.processes[0].page_table.iter().all(|pte| *pte == Default::default()));

        // a fresh touch after exit zero-fills again
        let events = run(&mut mmu, 0, 0, Access::Read);
        assert_eq!(events, vec![Event::Zero, Event::Map { frame: 0 }]);
    }

    #[test]
    fn test_event_rendering() {
        assert_eq!(Event::Unmap { pid: 1, vpage: 42 }.to_string(), " UNMAP 1:42");
        assert_eq!(Event::Map { frame: 3 }.to_string(), " MAP 3");
        assert_eq!(Event::Out.to_string(), " OUT");
        assert_eq!(Event::Segprot.to_string(), " SEGPROT");
        assert_eq!(Event::Exit { pid: 2 }.to_string(), "EXIT current process 2");
        assert_eq!(Event::Select { frame: 5 }.to_string(), "ASELECT 5");
    }
}
