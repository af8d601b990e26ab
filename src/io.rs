use std::fmt;
use std::fs;
use std::path::Path;

use crate::constants::MAX_VPAGES;
use crate::error::{Result, SimError};
use crate::process::{Process, Vma};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ContextSwitch,
    Read,
    Write,
    Exit,
}

impl Operation {
    pub fn as_char(self) -> char {
        match self {
            Operation::ContextSwitch => 'c',
            Operation::Read => 'r',
            Operation::Write => 'w',
            Operation::Exit => 'e',
        }
    }
}

/// One trace instruction. `arg` is a pid for `c`, a vpage for `r`/`w`
/// and unused for `e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Operation,
    pub arg: usize,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_char(), self.arg)
    }
}

/// Processes with their VMAs, followed by the instruction stream
#[derive(Debug, Default)]
pub struct Trace {
    pub processes: Vec<Process>,
    pub instructions: Vec<Instruction>,
}

impl Trace {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        // (1-based line number, text) of every meaningful line
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

        let (line_no, line) = lines.next().ok_or_else(|| SimError::parse(1, "trace is empty"))?;
        let num_processes = parse_count(line_no, line, "process count")?;

        let mut processes = Vec::with_capacity(num_processes);
        for pid in 0..num_processes {
            let (line_no, line) = lines
                .next()
                .ok_or_else(|| SimError::parse(line_no, format!("missing VMA count for process {pid}")))?;
            let num_vmas = parse_count(line_no, line, "VMA count")?;

            let mut vmas = Vec::with_capacity(num_vmas);
            for id in 0..num_vmas {
                let (line_no, line) = lines
                    .next()
                    .ok_or_else(|| SimError::parse(line_no, format!("missing VMA {id} of process {pid}")))?;
                let vma = Self::parse_vma_line(line_no, line, id)?;
                validate_vma(pid, &vma, &vmas)?;
                vmas.push(vma);
            }
            processes.push(Process::new(pid, vmas));
        }

        let mut instructions = Vec::new();
        for (line_no, line) in lines {
            instructions.push(Self::parse_instruction_line(line_no, line)?);
        }

        Ok(Trace {
            processes,
            instructions,
        })
    }

    fn parse_vma_line(line_no: usize, line: &str, id: usize) -> Result<Vma> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 4 {
            return Err(SimError::parse(
                line_no,
                format!("VMA line has {} fields, expected 4", tokens.len()),
            ));
        }
        let start = parse_number(line_no, tokens[0], "start page")?;
        let end = parse_number(line_no, tokens[1], "end page")?;
        let write_protected = parse_flag(line_no, tokens[2], "write_protected")?;
        let file_mapped = parse_flag(line_no, tokens[3], "file_mapped")?;
        Ok(Vma {
            id,
            start,
            end,
            write_protected,
            file_mapped,
        })
    }

    fn parse_instruction_line(line_no: usize, line: &str) -> Result<Instruction> {
        let mut tokens = line.split_whitespace();
        let op = match tokens.next() {
            Some("c") => Operation::ContextSwitch,
            Some("r") => Operation::Read,
            Some("w") => Operation::Write,
            Some("e") => Operation::Exit,
            Some(other) => return Err(SimError::UnknownOperation(other.to_string())),
            None => return Err(SimError::parse(line_no, "empty instruction")),
        };
        let arg = match tokens.next() {
            Some(tok) => parse_number(line_no, tok, "instruction argument")?,
            None if op == Operation::Exit => 0,
            None => return Err(SimError::parse(line_no, format!("'{}' needs an argument", op.as_char()))),
        };
        Ok(Instruction { op, arg })
    }
}

fn parse_number(line_no: usize, tok: &str, what: &str) -> Result<usize> {
    tok.parse()
        .map_err(|_| SimError::parse(line_no, format!("invalid {what}: {tok}")))
}

fn parse_count(line_no: usize, line: &str, what: &str) -> Result<usize> {
    let tok = line.split_whitespace().next().unwrap_or_default();
    parse_number(line_no, tok, what)
}

fn parse_flag(line_no: usize, tok: &str, what: &str) -> Result<bool> {
    match tok {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(SimError::parse(line_no, format!("invalid {what} flag: {tok}"))),
    }
}

fn validate_vma(pid: usize, vma: &Vma, earlier: &[Vma]) -> Result<()> {
    let invalid = |reason| SimError::InvalidVma {
        pid,
        start: vma.start,
        end: vma.end,
        reason,
    };
    if vma.start > vma.end {
        return Err(invalid("start is after end"));
    }
    if vma.end >= MAX_VPAGES {
        return Err(invalid("range exceeds the page table"));
    }
    if earlier.iter().any(|other| other.overlaps(vma)) {
        return Err(invalid("overlaps an earlier VMA"));
    }
    Ok(())
}
