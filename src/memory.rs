use std::collections::VecDeque;

use bitflags::bitflags;

use crate::constants::*;

bitflags! {
    /// Status bits of a page table entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u32 {
        const PRESENT = 1 << 0;
        const REFERENCED = 1 << 1;
        const MODIFIED = 1 << 2;
        const WRITE_PROTECT = 1 << 3;
        const PAGEDOUT = 1 << 4;
    }
}

/// Page table entry packed into one 32-bit word.
///
/// Bits 0..5 hold [`PteFlags`], bits 7..14 the physical frame number. The
/// frame number is only meaningful while `PRESENT` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pte(u32);

impl Pte {
    #[inline]
    pub fn flags(&self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub fn is(&self, flag: PteFlags) -> bool {
        self.flags().contains(flag)
    }

    #[inline]
    pub fn set(&mut self, flag: PteFlags, on: bool) {
        if on {
            self.0 |= flag.bits();
        } else {
            self.0 &= !flag.bits();
        }
    }

    #[inline]
    pub fn present(&self) -> bool {
        self.is(PteFlags::PRESENT)
    }

    #[inline]
    pub fn referenced(&self) -> bool {
        self.is(PteFlags::REFERENCED)
    }

    #[inline]
    pub fn modified(&self) -> bool {
        self.is(PteFlags::MODIFIED)
    }

    #[inline]
    pub fn write_protected(&self) -> bool {
        self.is(PteFlags::WRITE_PROTECT)
    }

    #[inline]
    pub fn paged_out(&self) -> bool {
        self.is(PteFlags::PAGEDOUT)
    }

    #[inline]
    pub fn frame(&self) -> usize {
        ((self.0 >> FRAME_SHIFT) & FRAME_MASK) as usize
    }

    pub fn set_frame(&mut self, frame: usize) {
        self.0 &= !(FRAME_MASK << FRAME_SHIFT);
        self.0 |= (frame as u32 & FRAME_MASK) << FRAME_SHIFT;
    }

    /// Clear every bit, paged-out included
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

pub type PageTable = [Pte; MAX_VPAGES];

/// Owner of a frame's current content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMapping {
    pub pid: usize,
    pub vpage: usize,
    pub vma: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: usize,
    pub mapping: Option<FrameMapping>,
    /// Aging counter
    pub age: u32,
    /// Logical time of the last fault-in or observed reference (working set)
    pub last_used: u64,
}

impl Frame {
    pub fn new(id: usize) -> Self {
        Frame {
            id,
            mapping: None,
            age: 0,
            last_used: 0,
        }
    }
}

/// Physical frames plus the queue of frames with no mapping
pub struct FrameTable {
    frames: Vec<Frame>,
    free: VecDeque<usize>,
}

impl FrameTable {
    /// All frames start empty and on the free list in ascending order
    pub fn new(num_frames: usize) -> Self {
        FrameTable {
            frames: (0..num_frames).map(Frame::new).collect(),
            free: (0..num_frames).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    pub fn get(&self, id: usize) -> &Frame {
        &self.frames[id]
    }

    pub fn get_mut(&mut self, id: usize) -> &mut Frame {
        &mut self.frames[id]
    }

    /// Take the oldest free frame, if any
    pub fn pop_free(&mut self) -> Option<usize> {
        self.free.pop_front()
    }

    /// Return a frame to the back of the free list
    pub fn release(&mut self, id: usize) {
        self.frames[id].mapping = None;
        self.free.push_back(id);
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn free_frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.free.iter().copied()
    }

    pub fn mapped_count(&self) -> usize {
        self.frames.iter().filter(|f| f.mapping.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // PTE bit layout
    // =========================================================================

    #[test]
    fn test_pte_is_one_word() {
        assert_eq!(std::mem::size_of::<Pte>(), 4);
    }

    #[test]
    fn test_pte_default_is_clear() {
        let pte = Pte::default();
        assert!(!pte.present());
        assert!(!pte.referenced());
        assert!(!pte.modified());
        assert!(!pte.write_protected());
        assert!(!pte.paged_out());
        assert_eq!(pte.frame(), 0);
    }

    #[test]
    fn test_pte_flags_are_independent() {
        let mut pte = Pte::default();
        pte.set(PteFlags::REFERENCED, true);
        pte.set(PteFlags::PAGEDOUT, true);
        assert!(pte.referenced());
        assert!(pte.paged_out());
        assert!(!pte.modified());

        pte.set(PteFlags::REFERENCED, false);
        assert!(!pte.referenced());
        assert!(pte.paged_out());
    }

    #[test]
    fn test_pte_frame_field_does_not_touch_flags() {
        let mut pte = Pte::default();
        pte.set(PteFlags::PRESENT, true);
        pte.set(PteFlags::WRITE_PROTECT, true);
        pte.set_frame(127);
        assert_eq!(pte.frame(), 127);
        assert!(pte.present());
        assert!(pte.write_protected());

        pte.set_frame(5);
        assert_eq!(pte.frame(), 5);
        assert_eq!(pte.flags(), PteFlags::PRESENT | PteFlags::WRITE_PROTECT);
    }

    #[test]
    fn test_pte_reset_clears_paged_out() {
        let mut pte = Pte::default();
        pte.set(PteFlags::PAGEDOUT, true);
        pte.set(PteFlags::MODIFIED, true);
        pte.set_frame(9);
        pte.reset();
        assert_eq!(pte, Pte::default());
    }

    // =========================================================================
    // Frame table and free list
    // =========================================================================

    #[test]
    fn test_frame_table_initialization() {
        let ft = FrameTable::new(4);
        assert_eq!(ft.len(), 4);
        assert_eq!(ft.free_count(), 4);
        assert_eq!(ft.mapped_count(), 0);
        for (i, frame) in ft.frames().iter().enumerate() {
            assert_eq!(frame.id, i);
            assert_eq!(frame.mapping, None);
            assert_eq!(frame.age, 0);
            assert_eq!(frame.last_used, 0);
        }
    }

    #[test]
    fn test_free_list_is_fifo() {
        let mut ft = FrameTable::new(3);
        assert_eq!(ft.pop_free(), Some(0));
        assert_eq!(ft.pop_free(), Some(1));
        assert_eq!(ft.pop_free(), Some(2));
        assert_eq!(ft.pop_free(), None);

        ft.release(2);
        ft.release(0);
        assert_eq!(ft.free_frames().collect::<Vec<_>>(), vec![2, 0]);
        assert_eq!(ft.pop_free(), Some(2));
        assert_eq!(ft.pop_free(), Some(0));
    }

    #[test]
    fn test_release_clears_mapping() {
        let mut ft = FrameTable::new(2);
        let id = ft.pop_free().unwrap();
        ft.get_mut(id).mapping = Some(FrameMapping { pid: 1, vpage: 7, vma: 0 });
        assert_eq!(ft.mapped_count(), 1);

        ft.release(id);
        assert_eq!(ft.get(id).mapping, None);
        assert_eq!(ft.mapped_count(), 0);
        assert_eq!(ft.free_count(), 2);
    }
}
