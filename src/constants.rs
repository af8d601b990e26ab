// virtual pages per process (page table length)
pub const MAX_VPAGES: usize = 64;
// the PTE frame field is 7 bits wide
pub const MAX_FRAMES: usize = 128;

pub const FRAME_BITS: u32 = 7;
pub const FRAME_SHIFT: u32 = 7;
pub const FRAME_MASK: u32 = (1 << FRAME_BITS) - 1;

// NRU clears referenced bits once this many read/write instructions have passed
pub const NRU_RESET_INTERVAL: u64 = 48;

// working-set window, in logical time units
pub const WS_TAU: u64 = 50;

pub const AGE_TOP_BIT: u32 = 1 << 31;

// cost model weights
pub const COST_RW: u64 = 1;
pub const COST_CTX_SWITCH: u64 = 130;
pub const COST_PROC_EXIT: u64 = 1230;
pub const COST_MAP: u64 = 350;
pub const COST_UNMAP: u64 = 410;
pub const COST_IN: u64 = 3200;
pub const COST_OUT: u64 = 2750;
pub const COST_FIN: u64 = 2350;
pub const COST_FOUT: u64 = 2800;
pub const COST_ZERO: u64 = 150;
pub const COST_SEGV: u64 = 440;
pub const COST_SEGPROT: u64 = 410;
