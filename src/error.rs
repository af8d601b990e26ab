//! Fatal errors of a simulation run.
//!
//! Segmentation and protection faults are not errors: they are counted and
//! reported as protocol events. Everything here aborts the run.

use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed trace or random file
    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("unknown instruction operator '{0}'")]
    UnknownOperation(String),

    #[error("unknown replacement algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("frame count must be between 1 and {max}, got {got}")]
    InvalidFrameCount { got: usize, max: usize },

    #[error("process {pid}: invalid VMA {start}..{end}: {reason}")]
    InvalidVma {
        pid: usize,
        start: usize,
        end: usize,
        reason: &'static str,
    },

    #[error("context switch to unknown process {0}")]
    NoSuchProcess(usize),

    #[error("instruction {0} issued before any context switch")]
    NoCurrentProcess(usize),

    #[error("virtual page {0} is outside the page table")]
    VpageOutOfRange(usize),

    #[error("the random policy needs a random value file")]
    MissingRandomFile,

    #[error("random value file contains no values")]
    EmptyRandomFile,
}

impl SimError {
    pub(crate) fn parse(line: usize, msg: impl Into<String>) -> Self {
        SimError::Parse {
            line,
            msg: msg.into(),
        }
    }
}
