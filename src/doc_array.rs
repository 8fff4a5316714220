//! Document array: document ids at run boundaries.
//!
//! Two packed vectors of length r, stored as a separate stream. Entry `k`
//! names the document containing the text position sampled at run `k`'s
//! first (respectively last) BWT position, so document reporting agrees
//! with the pointers the MS engine emits.

use std::io::{Read, Write};

use crate::intvec::IntVector;
use crate::io::{IndexError, Result};

#[derive(Debug, PartialEq, Eq)]
pub struct DocArray {
    start_runs: IntVector,
    end_runs: IntVector,
}

impl DocArray {
    pub fn from_values(start_runs: &[u64], end_runs: &[u64]) -> Result<Self> {
        if start_runs.len() != end_runs.len() {
            return Err(IndexError::Format(format!(
                "{} start-run ids against {} end-run ids",
                start_runs.len(),
                end_runs.len()
            )));
        }
        Ok(DocArray {
            start_runs: IntVector::from_values(start_runs),
            end_runs: IntVector::from_values(end_runs),
        })
    }

    /// Document id at run `k`'s first position.
    #[inline]
    pub fn start(&self, k: usize) -> u64 {
        self.start_runs.get(k)
    }

    /// Document id at run `k`'s last position.
    #[inline]
    pub fn end(&self, k: usize) -> u64 {
        self.end_runs.get(k)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.start_runs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start_runs.is_empty()
    }

    /// Serialize both vectors in sequence. Returns bytes written.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<usize> {
        Ok(self.start_runs.serialize(w)? + self.end_runs.serialize(w)?)
    }

    /// Load and validate both vectors against the run count of the
    /// already-loaded BWT.
    pub fn load<R: Read>(r: &mut R, num_runs: usize) -> Result<Self> {
        let start_runs = IntVector::load(r)?;
        let end_runs = IntVector::load(r)?;
        if start_runs.len() != num_runs || end_runs.len() != num_runs {
            return Err(IndexError::Format(format!(
                "document arrays hold {} and {} entries, index has {} runs",
                start_runs.len(),
                end_runs.len(),
                num_runs
            )));
        }
        Ok(DocArray {
            start_runs,
            end_runs,
        })
    }
}
