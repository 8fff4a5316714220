//! Plain bit vector with rank/select support.
//!
//! Raw bits live in `u64` words; a directory of cumulative one-counts per
//! 512-bit block gives O(1) rank (block count + at most eight popcounts)
//! and O(log b) select (binary search over blocks, then an in-word scan).
//! The directory is rebuilt at load, so only the raw words hit the disk.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::io::{self, IndexError, Result};

const WORDS_PER_BLOCK: usize = 8; // 512 bits

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u64>,
    /// Ones strictly before each block; one trailing sentinel entry.
    block_ranks: Vec<u64>,
    len: usize,
}

/// Position of the `k`-th (0-indexed) set bit of `word`.
#[inline]
fn select_in_word(word: u64, k: usize) -> usize {
    let mut w = word;
    for _ in 0..k {
        w &= w - 1;
    }
    w.trailing_zeros() as usize
}

impl BitVector {
    /// Build from raw little-endian words; `len` is the bit length.
    /// Bits at positions >= `len` in the last word must be zero.
    pub fn from_words(mut words: Vec<u64>, len: usize) -> Self {
        words.truncate(len.div_ceil(64));
        words.resize(len.div_ceil(64), 0);
        let num_blocks = words.len().div_ceil(WORDS_PER_BLOCK);
        let mut block_ranks = Vec::with_capacity(num_blocks + 1);
        let mut ones = 0u64;
        for block in 0..num_blocks {
            block_ranks.push(ones);
            let lo = block * WORDS_PER_BLOCK;
            let hi = (lo + WORDS_PER_BLOCK).min(words.len());
            ones += words[lo..hi].iter().map(|w| w.count_ones() as u64).sum::<u64>();
        }
        block_ranks.push(ones);
        BitVector {
            words,
            block_ranks,
            len,
        }
    }

    /// Build from a sorted list of one-positions over `[0, len)`.
    pub fn from_ones(ones: &[u64], len: usize) -> Self {
        let mut words = vec![0u64; len.div_ceil(64)];
        for &p in ones {
            debug_assert!((p as usize) < len);
            words[(p / 64) as usize] |= 1u64 << (p % 64);
        }
        Self::from_words(words, len)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of set bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        *self.block_ranks.last().unwrap_or(&0) as usize
    }

    /// Bit at position `i`.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        self.words[i / 64] & (1u64 << (i % 64)) != 0
    }

    /// Number of set bits in `[0, i)`. `i` saturates at the length.
    pub fn rank1(&self, i: usize) -> usize {
        let i = i.min(self.len);
        if i == 0 {
            return 0;
        }
        let block = i / (WORDS_PER_BLOCK * 64);
        let mut rank = self.block_ranks[block] as usize;
        let first_word = block * WORDS_PER_BLOCK;
        let word = i / 64;
        for w in first_word..word {
            rank += self.words[w].count_ones() as usize;
        }
        let off = i % 64;
        if off > 0 {
            rank += (self.words[word] & ((1u64 << off) - 1)).count_ones() as usize;
        }
        rank
    }

    /// Number of unset bits in `[0, i)`.
    #[inline]
    pub fn rank0(&self, i: usize) -> usize {
        i.min(self.len) - self.rank1(i)
    }

    /// Position of the `k`-th (0-indexed) set bit, or `None` past the end.
    pub fn select1(&self, k: usize) -> Option<usize> {
        if k >= self.count_ones() {
            return None;
        }
        let target = k as u64;
        // Last block whose prefix rank is <= target.
        let mut lo = 0usize;
        let mut hi = self.block_ranks.len() - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.block_ranks[mid] <= target {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        let mut remaining = (target - self.block_ranks[lo]) as usize;
        let first_word = lo * WORDS_PER_BLOCK;
        for w in first_word..self.words.len() {
            let ones = self.words[w].count_ones() as usize;
            if remaining < ones {
                return Some(w * 64 + select_in_word(self.words[w], remaining));
            }
            remaining -= ones;
        }
        None
    }

    /// Position of the `k`-th (0-indexed) unset bit, or `None` past the end.
    pub fn select0(&self, k: usize) -> Option<usize> {
        if k >= self.rank0(self.len) {
            return None;
        }
        let target = k as u64;
        let zeros_before = |block: usize| (block * WORDS_PER_BLOCK * 64) as u64 - self.block_ranks[block];
        let mut lo = 0usize;
        let mut hi = self.block_ranks.len() - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if zeros_before(mid) <= target {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        let mut remaining = (target - zeros_before(lo)) as usize;
        let first_word = lo * WORDS_PER_BLOCK;
        for w in first_word..self.words.len() {
            let zeros = self.words[w].count_zeros() as usize;
            if remaining < zeros {
                return Some(w * 64 + select_in_word(!self.words[w], remaining));
            }
            remaining -= zeros;
        }
        None
    }

    /// Serialize as `len (u64) | words`. Returns bytes written.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<usize> {
        w.write_u64::<LE>(self.len as u64)?;
        let payload = io::write_words(w, &self.words)?;
        Ok(8 + payload)
    }

    pub fn load<R: Read>(r: &mut R) -> Result<Self> {
        let len = r.read_u64::<LE>()? as usize;
        let words = io::read_words(r, len.div_ceil(64))?;
        if let Some(&last) = words.last() {
            let tail = len % 64;
            if tail != 0 && last >> tail != 0 {
                return Err(IndexError::Format(
                    "set bits beyond bit-vector length".into(),
                ));
            }
        }
        Ok(Self::from_words(words, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> (BitVector, Vec<bool>) {
        // Deterministic irregular pattern crossing block boundaries.
        let bits: Vec<bool> = (0..len).map(|i| (i * i + i / 3) % 7 < 2).collect();
        let ones: Vec<u64> = bits
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b)
            .map(|(i, _)| i as u64)
            .collect();
        (BitVector::from_ones(&ones, len), bits)
    }

    #[test]
    fn rank_matches_naive() {
        let (bv, bits) = sample(1500);
        let mut ones = 0;
        for i in 0..=1500 {
            assert_eq!(bv.rank1(i), ones, "rank1({i})");
            assert_eq!(bv.rank0(i), i - ones, "rank0({i})");
            if i < 1500 && bits[i] {
                ones += 1;
            }
        }
    }

    #[test]
    fn select_matches_naive() {
        let (bv, bits) = sample(1500);
        let one_positions: Vec<usize> = (0..1500).filter(|&i| bits[i]).collect();
        let zero_positions: Vec<usize> = (0..1500).filter(|&i| !bits[i]).collect();
        for (k, &p) in one_positions.iter().enumerate() {
            assert_eq!(bv.select1(k), Some(p), "select1({k})");
        }
        for (k, &p) in zero_positions.iter().enumerate() {
            assert_eq!(bv.select0(k), Some(p), "select0({k})");
        }
        assert_eq!(bv.select1(one_positions.len()), None);
        assert_eq!(bv.select0(zero_positions.len()), None);
    }

    #[test]
    fn get_and_round_trip() {
        let (bv, bits) = sample(700);
        for i in 0..700 {
            assert_eq!(bv.get(i), bits[i]);
        }
        let mut buf = Vec::new();
        let written = bv.serialize(&mut buf).unwrap();
        assert_eq!(written, buf.len());
        let back = BitVector::load(&mut buf.as_slice()).unwrap();
        assert_eq!(back, bv);
    }

    #[test]
    fn empty_vector() {
        let bv = BitVector::from_ones(&[], 0);
        assert_eq!(bv.count_ones(), 0);
        assert_eq!(bv.rank1(0), 0);
        assert_eq!(bv.select1(0), None);
    }
}
