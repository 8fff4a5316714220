//! Run-length encoded BWT with per-character rank/select.
//!
//! Three synchronized structures: the packed run heads, a global sparse
//! vector of run-start positions over `[0, n)`, and, for every character
//! that occurs, a sparse vector over that character's occurrences marking
//! the last occurrence of each of its runs. A per-character map of run
//! indices (which runs carry head `c`) bridges the two spaces; it is
//! derived from the heads in one pass at load time and never serialized.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::intvec::IntVector;
use crate::io::{IndexError, Result};
use crate::sparse::SparseBits;

/// Per-character view of the run structure.
#[derive(Debug, PartialEq, Eq)]
struct CharRuns {
    /// Over `[0, count(c))` in occurrence order: last occurrence of each run.
    run_ends: SparseBits,
    /// Over `[0, r)`: run indices whose head is `c`. Rebuilt at load.
    runs: SparseBits,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RleBwt {
    heads: IntVector,
    starts: SparseBits,
    per_char: Vec<Option<CharRuns>>,
    n: usize,
    r: usize,
}

impl RleBwt {
    /// Assemble from run heads and lengths. Every length must be >= 1.
    pub fn from_runs(heads: &[u8], lens: &[u64]) -> Result<Self> {
        if heads.len() != lens.len() {
            return Err(IndexError::Format(format!(
                "{} run heads against {} run lengths",
                heads.len(),
                lens.len()
            )));
        }
        let r = heads.len();
        let n: u64 = lens.iter().sum();
        let mut start_positions = Vec::with_capacity(r);
        let mut char_counts = [0u64; 256];
        let mut at = 0u64;
        for (&c, &l) in heads.iter().zip(lens) {
            if l == 0 {
                return Err(IndexError::Invariant("zero-length run".into()));
            }
            start_positions.push(at);
            at += l;
            char_counts[c as usize] += l;
        }

        let mut end_positions: Vec<Vec<u64>> = vec![Vec::new(); 256];
        let mut run_indices: Vec<Vec<u64>> = vec![Vec::new(); 256];
        let mut seen = [0u64; 256];
        for (k, (&c, &l)) in heads.iter().zip(lens).enumerate() {
            let c = c as usize;
            seen[c] += l;
            end_positions[c].push(seen[c] - 1);
            run_indices[c].push(k as u64);
        }

        let per_char = (0..256)
            .map(|c| {
                if char_counts[c] == 0 {
                    None
                } else {
                    Some(CharRuns {
                        run_ends: SparseBits::from_positions(
                            &end_positions[c],
                            char_counts[c] as usize,
                        ),
                        runs: SparseBits::from_positions(&run_indices[c], r),
                    })
                }
            })
            .collect();

        Ok(RleBwt {
            heads: IntVector::from_values(
                &heads.iter().map(|&c| c as u64).collect::<Vec<_>>(),
            ),
            starts: SparseBits::from_positions(&start_positions, n as usize),
            per_char,
            n: n as usize,
            r,
        })
    }

    /// Total BWT length.
    #[inline]
    pub fn size(&self) -> usize {
        self.n
    }

    /// Number of equal-letter runs.
    #[inline]
    pub fn num_runs(&self) -> usize {
        self.r
    }

    /// Character at BWT position `i`.
    #[inline]
    pub fn at(&self, i: usize) -> u8 {
        debug_assert!(i < self.n);
        self.heads.get(self.run_of_position(i)) as u8
    }

    /// Index of the run containing position `i`.
    #[inline]
    pub fn run_of_position(&self, i: usize) -> usize {
        debug_assert!(i < self.n);
        self.starts.rank(i + 1) - 1
    }

    /// First BWT position of run `k`.
    #[inline]
    pub fn run_start(&self, k: usize) -> usize {
        self.starts.select(k)
    }

    /// Total occurrences of `c` in the BWT.
    #[inline]
    pub fn number_of_letter(&self, c: u8) -> usize {
        self.per_char[c as usize]
            .as_ref()
            .map_or(0, |pc| pc.run_ends.len())
    }

    /// Occurrences of `c` in `BWT[0..i)`. `i` may equal the BWT length.
    pub fn rank(&self, i: usize, c: u8) -> usize {
        let Some(pc) = self.per_char[c as usize].as_ref() else {
            return 0;
        };
        if i == 0 {
            return 0;
        }
        if i >= self.n {
            return pc.run_ends.len();
        }
        let k = self.run_of_position(i);
        // Whole c-runs strictly before run k, then the partial current run.
        let j = pc.runs.rank(k);
        let mut count = if j == 0 {
            0
        } else {
            pc.run_ends.select(j - 1) + 1
        };
        if self.heads.get(k) as u8 == c {
            count += i - self.run_start(k);
        }
        count
    }

    /// Position of the `k`-th (0-indexed) occurrence of `c`.
    /// Requires `k < number_of_letter(c)`.
    pub fn select(&self, k: usize, c: u8) -> usize {
        let pc = self.per_char[c as usize]
            .as_ref()
            .expect("select on absent character");
        debug_assert!(k < pc.run_ends.len());
        let j = pc.run_ends.rank(k);
        let before = if j == 0 {
            0
        } else {
            pc.run_ends.select(j - 1) + 1
        };
        self.run_start(pc.runs.select(j)) + (k - before)
    }

    /// Serialize heads, run starts, and the per-character end vectors.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<usize> {
        let mut written = self.heads.serialize(w)?;
        written += self.starts.serialize(w)?;
        let present: Vec<u8> = (0..256u16)
            .filter(|&c| self.per_char[c as usize].is_some())
            .map(|c| c as u8)
            .collect();
        w.write_u16::<LE>(present.len() as u16)?;
        written += 2;
        for &c in &present {
            w.write_u8(c)?;
            written += 1;
            written += self.per_char[c as usize]
                .as_ref()
                .expect("present character")
                .run_ends
                .serialize(w)?;
        }
        Ok(written)
    }

    pub fn load<R: Read>(r: &mut R) -> Result<Self> {
        let heads = IntVector::load(r)?;
        let starts = SparseBits::load(r)?;
        let num_runs = heads.len();
        if starts.count_ones() != num_runs {
            return Err(IndexError::Format(format!(
                "{} run starts against {} run heads",
                starts.count_ones(),
                num_runs
            )));
        }
        let n = starts.len();
        if num_runs == 0 || n == 0 {
            return Err(IndexError::Invariant("empty BWT".into()));
        }

        let mut per_char: Vec<Option<CharRuns>> = (0..256).map(|_| None).collect();
        let mut total = 0usize;
        let present = r.read_u16::<LE>()? as usize;
        for _ in 0..present {
            let c = r.read_u8()? as usize;
            let run_ends = SparseBits::load(r)?;
            if per_char[c].is_some() {
                return Err(IndexError::Format(format!(
                    "duplicate per-character vector for byte {c}"
                )));
            }
            total += run_ends.len();
            per_char[c] = Some(CharRuns {
                run_ends,
                runs: SparseBits::from_positions(&[], num_runs),
            });
        }
        if total != n {
            return Err(IndexError::Invariant(format!(
                "per-character occurrence counts sum to {total}, BWT length is {n}"
            )));
        }

        // Rebuild the head -> run-index maps from the heads.
        let mut run_indices: Vec<Vec<u64>> = vec![Vec::new(); 256];
        for k in 0..num_runs {
            run_indices[heads.get(k) as usize].push(k as u64);
        }
        for c in 0..256 {
            match (&mut per_char[c], run_indices[c].is_empty()) {
                (Some(pc), false) => {
                    pc.runs = SparseBits::from_positions(&run_indices[c], num_runs);
                }
                (None, true) => {}
                _ => {
                    return Err(IndexError::Invariant(format!(
                        "run heads and per-character vectors disagree on byte {c}"
                    )));
                }
            }
        }

        Ok(RleBwt {
            heads,
            starts,
            per_char,
            n,
            r: num_runs,
        })
    }
}
