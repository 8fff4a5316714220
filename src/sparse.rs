//! Elias-Fano encoded sparse bit vector.
//!
//! Represents a strictly increasing set of positions over a universe
//! `[0, n)` where the one-bits are much sparser than the zero-bits. Each
//! position is split into `l` low bits, packed densely, and a high part,
//! unary-coded into a plain bit vector. `select` is a single select1 on
//! the upper vector; `rank` narrows to one high-bucket via select0 and
//! binary-searches the low bits.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::bitvec::BitVector;
use crate::intvec::IntVector;
use crate::io::{IndexError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseBits {
    high: BitVector,
    low: IntVector,
    low_width: usize,
    universe: usize,
    ones: usize,
}

impl SparseBits {
    /// Encode a strictly increasing sequence of positions in `[0, universe)`.
    pub fn from_positions(positions: &[u64], universe: usize) -> Self {
        let ones = positions.len();
        if ones == 0 {
            return SparseBits {
                high: BitVector::from_ones(&[], 0),
                low: IntVector::new(1),
                low_width: 0,
                universe,
                ones: 0,
            };
        }
        debug_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        debug_assert!((*positions.last().unwrap() as usize) < universe);

        let ratio = (universe / ones).max(1) as u64;
        let low_width = 63 - ratio.leading_zeros() as usize;
        let mut low = IntVector::new(low_width.max(1));
        let high_len = ones + (universe >> low_width) + 1;
        let mut high_ones = Vec::with_capacity(ones);
        for (k, &p) in positions.iter().enumerate() {
            high_ones.push((p >> low_width) + k as u64);
            if low_width > 0 {
                low.push(p & ((1u64 << low_width) - 1));
            }
        }
        SparseBits {
            high: BitVector::from_ones(&high_ones, high_len),
            low,
            low_width,
            universe,
            ones,
        }
    }

    /// Universe size.
    #[inline]
    pub fn len(&self) -> usize {
        self.universe
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.universe == 0
    }

    /// Number of encoded positions.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.ones
    }

    /// The `k`-th (0-indexed) encoded position.
    #[inline]
    pub fn select(&self, k: usize) -> usize {
        debug_assert!(k < self.ones);
        let p = self.high.select1(k).expect("select past last one-bit");
        let high_part = p - k;
        (high_part << self.low_width) | self.low_value(k)
    }

    #[inline]
    fn low_value(&self, k: usize) -> usize {
        if self.low_width == 0 {
            0
        } else {
            self.low.get(k) as usize
        }
    }

    /// Number of encoded positions strictly below `i`.
    pub fn rank(&self, i: usize) -> usize {
        if self.ones == 0 || i == 0 {
            return 0;
        }
        let i = i.min(self.universe);
        let hp = i >> self.low_width;
        // Positions with a smaller high part all precede bucket `hp`.
        let lo = if hp == 0 {
            0
        } else {
            self.high.select0(hp - 1).expect("missing high bucket") - (hp - 1)
        };
        let hi = match self.high.select0(hp) {
            Some(p) => p - hp,
            None => self.ones,
        };
        // Binary search the low bits inside the bucket.
        let target = if self.low_width == 0 {
            0
        } else {
            i & ((1usize << self.low_width) - 1)
        };
        let (mut a, mut b) = (lo, hi);
        while a < b {
            let mid = (a + b) / 2;
            if self.low_value(mid) < target {
                a = mid + 1;
            } else {
                b = mid;
            }
        }
        a
    }

    /// Membership test for position `i`.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        self.rank(i + 1) > self.rank(i)
    }

    /// Serialize as `universe | ones | low_width | high | low`.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<usize> {
        w.write_u64::<LE>(self.universe as u64)?;
        w.write_u64::<LE>(self.ones as u64)?;
        w.write_u8(self.low_width as u8)?;
        let mut written = 17;
        written += self.high.serialize(w)?;
        written += self.low.serialize(w)?;
        Ok(written)
    }

    pub fn load<R: Read>(r: &mut R) -> Result<Self> {
        let universe = r.read_u64::<LE>()? as usize;
        let ones = r.read_u64::<LE>()? as usize;
        let low_width = r.read_u8()? as usize;
        let high = BitVector::load(r)?;
        let low = IntVector::load(r)?;
        if high.count_ones() != ones {
            return Err(IndexError::Format(format!(
                "sparse vector upper bits carry {} ones, header says {}",
                high.count_ones(),
                ones
            )));
        }
        if low_width > 0 && low.len() != ones {
            return Err(IndexError::Format(format!(
                "sparse vector low bits hold {} entries, header says {}",
                low.len(),
                ones
            )));
        }
        Ok(SparseBits {
            high,
            low,
            low_width,
            universe,
            ones,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(universe: usize, stride_mix: usize) -> Vec<u64> {
        let mut p = Vec::new();
        let mut at = 0usize;
        let mut step = 1usize;
        while at < universe {
            p.push(at as u64);
            step = step % stride_mix + 3;
            at += step;
        }
        p
    }

    #[test]
    fn select_and_rank_agree_with_naive() {
        let universe = 5000;
        let pos = positions(universe, 17);
        let sb = SparseBits::from_positions(&pos, universe);
        assert_eq!(sb.count_ones(), pos.len());
        for (k, &p) in pos.iter().enumerate() {
            assert_eq!(sb.select(k), p as usize, "select({k})");
        }
        for i in 0..=universe {
            let naive = pos.iter().filter(|&&p| (p as usize) < i).count();
            assert_eq!(sb.rank(i), naive, "rank({i})");
        }
    }

    #[test]
    fn membership() {
        let pos = [3u64, 7, 64, 65, 1000];
        let sb = SparseBits::from_positions(&pos, 1024);
        for i in 0..1024 {
            assert_eq!(sb.get(i), pos.contains(&(i as u64)), "get({i})");
        }
    }

    #[test]
    fn dense_one_run() {
        // Every position set: low_width becomes 0.
        let pos: Vec<u64> = (0..256).collect();
        let sb = SparseBits::from_positions(&pos, 256);
        for (k, &p) in pos.iter().enumerate() {
            assert_eq!(sb.select(k), p as usize);
        }
        assert_eq!(sb.rank(256), 256);
        assert_eq!(sb.rank(100), 100);
    }

    #[test]
    fn empty_set() {
        let sb = SparseBits::from_positions(&[], 100);
        assert_eq!(sb.count_ones(), 0);
        assert_eq!(sb.rank(50), 0);
        assert!(!sb.get(7));
    }

    #[test]
    fn round_trip() {
        let pos = positions(3000, 11);
        let sb = SparseBits::from_positions(&pos, 3000);
        let mut buf = Vec::new();
        let written = sb.serialize(&mut buf).unwrap();
        assert_eq!(written, buf.len());
        let back = SparseBits::load(&mut buf.as_slice()).unwrap();
        assert_eq!(back, sb);
        assert_eq!(back.select(5), sb.select(5));
    }
}
