//! Per-run threshold positions.
//!
//! Maps each run index to the BWT position that separates "closer to the
//! previous occurrence" from "closer to the next occurrence" during a
//! backward step (`n` acts as a beyond-the-BWT sentinel). Stored packed;
//! loaded after the BWT so the run count is known.

use std::io::{Read, Write};

use crate::intvec::IntVector;
use crate::io::{IndexError, Result};

#[derive(Debug, PartialEq, Eq)]
pub struct Thresholds {
    values: IntVector,
}

impl Thresholds {
    /// Pack raw threshold values, validating them against `[0, n]`.
    pub fn from_values(values: &[u64], n: usize) -> Result<Self> {
        if let Some(&bad) = values.iter().find(|&&v| v > n as u64) {
            return Err(IndexError::Invariant(format!(
                "threshold {bad} beyond BWT length {n}"
            )));
        }
        Ok(Thresholds {
            values: IntVector::from_values(values),
        })
    }

    /// Threshold of run `k`.
    #[inline]
    pub fn get(&self, k: usize) -> usize {
        self.values.get(k) as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<usize> {
        self.values.serialize(w)
    }

    /// Load and validate against the run count and BWT length of the
    /// already-loaded BWT.
    pub fn load<R: Read>(r: &mut R, num_runs: usize, n: usize) -> Result<Self> {
        let values = IntVector::load(r)?;
        if values.len() != num_runs {
            return Err(IndexError::Format(format!(
                "{} thresholds against {} runs",
                values.len(),
                num_runs
            )));
        }
        if let Some(bad) = values.iter().find(|&v| v > n as u64) {
            return Err(IndexError::Invariant(format!(
                "threshold {bad} beyond BWT length {n}"
            )));
        }
        Ok(Thresholds { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_validation() {
        let thr = Thresholds::from_values(&[0, 3, 7, 12, 12], 12).unwrap();
        let mut buf = Vec::new();
        thr.serialize(&mut buf).unwrap();
        let back = Thresholds::load(&mut buf.as_slice(), 5, 12).unwrap();
        assert_eq!(back, thr);
        assert_eq!(back.get(2), 7);
    }

    #[test]
    fn rejects_out_of_range_and_miscounted() {
        assert!(Thresholds::from_values(&[13], 12).is_err());
        let thr = Thresholds::from_values(&[0, 1], 12).unwrap();
        let mut buf = Vec::new();
        thr.serialize(&mut buf).unwrap();
        assert!(Thresholds::load(&mut buf.as_slice(), 3, 12).is_err());
        assert!(Thresholds::load(&mut buf.as_slice(), 2, 0).is_err());
    }
}
