//! r-index substrate: cumulative character counts, sentinel position, LF.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::intvec::IntVector;
use crate::io::{IndexError, Result};
use crate::rle_bwt::RleBwt;

/// Reserved end-of-text byte. Occurs exactly once in a well-formed BWT;
/// every other character is strictly greater.
pub const TERMINATOR: u8 = 1;

/// F array, sentinel position, and the LF mapping, composed over a
/// run-length BWT.
#[derive(Debug, PartialEq, Eq)]
pub struct RIndex {
    bwt: RleBwt,
    /// `f[c]` = number of BWT characters strictly smaller than `c`.
    f: Vec<u64>,
    terminator_position: usize,
}

impl RIndex {
    /// Build F and locate the sentinel by streaming the runs of `bwt`.
    pub fn new(bwt: RleBwt) -> Result<Self> {
        let n = bwt.size();
        let r = bwt.num_runs();
        let mut f = vec![0u64; 256];
        let mut terminator_position = None;
        for k in 0..r {
            let start = bwt.run_start(k);
            let end = if k + 1 < r { bwt.run_start(k + 1) } else { n };
            let len = (end - start) as u64;
            let c = bwt.at(start);
            if c > TERMINATOR {
                f[c as usize] += len;
            } else if c == TERMINATOR {
                if terminator_position.is_some() || len != 1 {
                    return Err(IndexError::Invariant("duplicated terminator".into()));
                }
                f[TERMINATOR as usize] += len;
                terminator_position = Some(start);
            } else {
                return Err(IndexError::Invariant(format!(
                    "character {c} below the terminator"
                )));
            }
        }
        let terminator_position = terminator_position
            .ok_or_else(|| IndexError::Invariant("missing terminator".into()))?;
        // Shift right, then prefix-sum: f[c] becomes the count of smaller chars.
        for c in (1..256).rev() {
            f[c] = f[c - 1];
        }
        f[0] = 0;
        for c in 1..256 {
            f[c] += f[c - 1];
        }
        Ok(RIndex {
            bwt,
            f,
            terminator_position,
        })
    }

    /// Reconstruct from parts already read from disk, re-validating the
    /// invariants the builder established.
    pub fn from_parts(bwt: RleBwt, f: Vec<u64>, terminator_position: usize) -> Result<Self> {
        let n = bwt.size();
        if terminator_position >= n || bwt.at(terminator_position) != TERMINATOR {
            return Err(IndexError::Invariant(format!(
                "terminator position {terminator_position} does not hold the sentinel"
            )));
        }
        if f.len() != 256 {
            return Err(IndexError::Format(format!(
                "F carries {} entries, expected 256",
                f.len()
            )));
        }
        if f[0] != 0 || f.windows(2).any(|w| w[0] > w[1]) || f[255] > n as u64 {
            return Err(IndexError::Invariant("F is not a cumulative count".into()));
        }
        Ok(RIndex {
            bwt,
            f,
            terminator_position,
        })
    }

    #[inline]
    pub fn bwt(&self) -> &RleBwt {
        &self.bwt
    }

    /// BWT length n.
    #[inline]
    pub fn size(&self) -> usize {
        self.bwt.size()
    }

    #[inline]
    pub fn num_runs(&self) -> usize {
        self.bwt.num_runs()
    }

    #[inline]
    pub fn terminator_position(&self) -> usize {
        self.terminator_position
    }

    /// `LF(i, c) = F[c] + rank(i, c)`.
    #[inline]
    pub fn lf(&self, i: usize, c: u8) -> usize {
        self.f[c as usize] as usize + self.bwt.rank(i, c)
    }

    /// Serialize terminator position and F (the BWT blob is written by the
    /// index container, after these). Returns bytes written.
    pub fn serialize_front<W: Write>(&self, w: &mut W) -> Result<usize> {
        w.write_u64::<LE>(self.terminator_position as u64)?;
        let packed = IntVector::from_values(&self.f);
        Ok(8 + packed.serialize(w)?)
    }

    /// Read the front matter written by [`serialize_front`](Self::serialize_front).
    pub fn load_front<R: Read>(r: &mut R) -> Result<(usize, Vec<u64>)> {
        let terminator_position = r.read_u64::<LE>()? as usize;
        let packed = IntVector::load(r)?;
        Ok((terminator_position, packed.iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bwt_of(text: &[u8]) -> RleBwt {
        let mut heads = Vec::new();
        let mut lens = Vec::new();
        for &b in text {
            if heads.last() == Some(&b) {
                *lens.last_mut().unwrap() += 1;
            } else {
                heads.push(b);
                lens.push(1);
            }
        }
        RleBwt::from_runs(&heads, &lens).unwrap()
    }

    #[test]
    fn f_counts_smaller_characters() {
        // BWT of "abcabc" + sentinel (any permutation works for F).
        let idx = RIndex::new(bwt_of(b"ccbbaa\x01")).unwrap();
        assert_eq!(idx.terminator_position(), 6);
        // 0 chars below the sentinel, 1 below 'a', 3 below 'b', 5 below 'c'.
        assert_eq!(idx.lf(0, b'a'), 1);
        assert_eq!(idx.lf(7, b'a'), 3);
        assert_eq!(idx.lf(7, b'c'), 7);
    }

    #[test]
    fn lf_is_a_permutation() {
        let text = b"isi\x01pisms";
        let idx = RIndex::new(bwt_of(text)).unwrap();
        let n = idx.size();
        let mut seen = vec![false; n];
        for i in 0..n {
            let c = idx.bwt().at(i);
            let j = idx.lf(i, c);
            assert!(!seen[j], "LF collides at {j}");
            seen[j] = true;
        }
    }

    #[test]
    fn rejects_missing_or_duplicated_terminator() {
        assert!(matches!(
            RIndex::new(bwt_of(b"abc")),
            Err(IndexError::Invariant(_))
        ));
        assert!(matches!(
            RIndex::new(bwt_of(b"a\x01b\x01")),
            Err(IndexError::Invariant(_))
        ));
        assert!(matches!(
            RIndex::new(bwt_of(b"a\x01\x01b")),
            Err(IndexError::Invariant(_))
        ));
    }
}
