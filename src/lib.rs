pub mod constants;
pub mod error;
pub mod io;
pub mod logging;
pub mod memory;
pub mod pager;
pub mod process;
pub mod random;
pub mod report;
pub mod translation;
pub mod vm_manager;

// Re-export commonly used items for convenience
pub use constants::*;
pub use error::{Result, SimError};
pub use io::{Instruction, Operation, Trace};
pub use pager::{Pager, PagerKind};
pub use report::DisplayOptions;
pub use translation::Event;
pub use vm_manager::Simulator;
