//! Precomputed pseudorandom stream used by the random replacement policy.

use std::fs;
use std::path::Path;

use crate::error::{Result, SimError};

#[derive(Debug, Clone)]
pub struct Randomizer {
    values: Vec<u32>,
    ofs: usize,
}

impl Randomizer {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// The first number is the count of values that follow. A file that
    /// holds fewer values than announced uses the ones present.
    pub fn parse(content: &str) -> Result<Self> {
        let mut tokens = content.split_whitespace();
        let count: usize = match tokens.next() {
            Some(tok) => tok
                .parse()
                .map_err(|_| SimError::parse(1, format!("invalid random value count: {tok}")))?,
            None => return Err(SimError::EmptyRandomFile),
        };

        let mut values = Vec::with_capacity(count);
        for tok in tokens.take(count) {
            let v: u32 = tok
                .parse()
                .map_err(|_| SimError::parse(1, format!("invalid random value: {tok}")))?;
            values.push(v);
        }
        Self::from_values(values)
    }

    pub fn from_values(values: Vec<u32>) -> Result<Self> {
        if values.is_empty() {
            return Err(SimError::EmptyRandomFile);
        }
        Ok(Randomizer { values, ofs: 0 })
    }

    /// Next value in `[0, bound)`; wraps around at the end of the stream
    pub fn next(&mut self, bound: usize) -> usize {
        let v = self.values[self.ofs] as usize % bound.max(1);
        self.ofs = (self.ofs + 1) % self.values.len();
        v
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
