use crate::constants::MAX_VPAGES;
use crate::memory::{PageTable, Pte};

/// Virtual memory area: an inclusive range of valid virtual pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vma {
    /// Index within the owning process's VMA list
    pub id: usize,
    pub start: usize,
    pub end: usize,
    pub write_protected: bool,
    pub file_mapped: bool,
}

impl Vma {
    #[inline]
    pub fn contains(&self, vpage: usize) -> bool {
        self.start <= vpage && vpage <= self.end
    }

    pub fn overlaps(&self, other: &Vma) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Per-process event counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub unmaps: u64,
    pub maps: u64,
    pub ins: u64,
    pub outs: u64,
    pub fins: u64,
    pub fouts: u64,
    pub zeros: u64,
    pub segv: u64,
    pub segprot: u64,
}

#[derive(Debug, Clone)]
pub struct Process {
    pub pid: usize,
    pub page_table: PageTable,
    pub vmas: Vec<Vma>,
    pub stats: ProcessStats,
}

impl Process {
    pub fn new(pid: usize, vmas: Vec<Vma>) -> Self {
        Process {
            pid,
            page_table: [Pte::default(); MAX_VPAGES],
            vmas,
            stats: ProcessStats::default(),
        }
    }

    /// The VMA covering `vpage`, if any. Only consulted on a page-table miss.
    pub fn find_vma(&self, vpage: usize) -> Option<&Vma> {
        self.vmas.iter().find(|vma| vma.contains(vpage))
    }

    pub fn resident_pages(&self) -> usize {
        self.page_table.iter().filter(|pte| pte.present()).count()
    }
}
