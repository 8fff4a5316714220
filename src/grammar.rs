//! Grammar-compressed random access over the reference text.
//!
//! A balanced binary straight-line program: symbols `0..256` expand to the
//! corresponding byte, symbol `256 + g` expands to rule `g`'s left then
//! right child. Rules are hash-consed during construction, so repeated
//! substrings share subtrees. The rule tables are packed integer vectors;
//! `char_at` walks from the root comparing against stored left-expansion
//! lengths, which bounds it by the tree depth, O(log n).

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{Read, Write};

use crate::intvec::IntVector;
use crate::io::{self, IndexError, Result};

/// First symbol id that denotes a rule rather than a literal byte.
const FIRST_RULE: u64 = 256;

#[derive(Debug, PartialEq, Eq)]
pub struct GrammarText {
    left: IntVector,
    right: IntVector,
    /// Expansion length of each rule's left child.
    left_len: IntVector,
    root: u64,
    text_len: usize,
}

impl GrammarText {
    /// Compress `text` by pairing adjacent symbols level by level until a
    /// single root remains. Identical pairs map to the same rule.
    pub fn from_text(text: &[u8]) -> Result<Self> {
        if text.is_empty() {
            return Err(IndexError::Invariant(
                "cannot build random access over an empty text".into(),
            ));
        }
        let mut level: Vec<u64> = text.iter().map(|&b| b as u64).collect();
        let mut rules: Vec<(u64, u64)> = Vec::new();
        let mut lens: Vec<u64> = Vec::new(); // total expansion per rule
        let mut memo: HashMap<(u64, u64), u64> = HashMap::new();

        let sym_len = |s: u64, lens: &[u64]| -> u64 {
            if s < FIRST_RULE {
                1
            } else {
                lens[(s - FIRST_RULE) as usize]
            }
        };

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                match pair {
                    &[a, b] => {
                        let id = *memo.entry((a, b)).or_insert_with(|| {
                            let total = sym_len(a, &lens) + sym_len(b, &lens);
                            rules.push((a, b));
                            lens.push(total);
                            FIRST_RULE + (rules.len() - 1) as u64
                        });
                        next.push(id);
                    }
                    // Odd leftover carries up unchanged.
                    &[a] => next.push(a),
                    _ => unreachable!("chunks(2) yields one or two symbols"),
                }
            }
            level = next;
        }
        let root = level[0];

        let left_len: Vec<u64> = rules.iter().map(|&(a, _)| sym_len(a, &lens)).collect();
        Ok(GrammarText {
            left: IntVector::from_values(&rules.iter().map(|&(a, _)| a).collect::<Vec<_>>()),
            right: IntVector::from_values(&rules.iter().map(|&(_, b)| b).collect::<Vec<_>>()),
            left_len: IntVector::from_values(&left_len),
            root,
            text_len: text.len(),
        })
    }

    /// Length of the underlying text.
    #[inline]
    pub fn len(&self) -> usize {
        self.text_len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text_len == 0
    }

    /// Number of grammar rules.
    #[inline]
    pub fn num_rules(&self) -> usize {
        self.left.len()
    }

    /// Character at text position `p`.
    pub fn char_at(&self, p: usize) -> u8 {
        debug_assert!(p < self.text_len);
        let mut s = self.root;
        let mut p = p as u64;
        while s >= FIRST_RULE {
            let g = (s - FIRST_RULE) as usize;
            let ll = self.left_len.get(g);
            if p < ll {
                s = self.left.get(g);
            } else {
                p -= ll;
                s = self.right.get(g);
            }
        }
        s as u8
    }

    /// Serialize as a self-describing blob. Returns bytes written.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<usize> {
        w.write_u32::<LE>(io::GRAMMAR_MAGIC)?;
        w.write_u64::<LE>(self.text_len as u64)?;
        w.write_u64::<LE>(self.root)?;
        let mut written = 4 + 16;
        written += self.left.serialize(w)?;
        written += self.right.serialize(w)?;
        written += self.left_len.serialize(w)?;
        Ok(written)
    }

    pub fn load<R: Read>(r: &mut R) -> Result<Self> {
        let magic = r.read_u32::<LE>()?;
        if magic != io::GRAMMAR_MAGIC {
            return Err(IndexError::Format(format!(
                "bad random-access magic {magic:#010x}"
            )));
        }
        let text_len = r.read_u64::<LE>()? as usize;
        let root = r.read_u64::<LE>()?;
        let left = IntVector::load(r)?;
        let right = IntVector::load(r)?;
        let left_len = IntVector::load(r)?;
        let num_rules = left.len();
        if right.len() != num_rules || left_len.len() != num_rules {
            return Err(IndexError::Format(format!(
                "rule tables disagree: {} left, {} right, {} lengths",
                num_rules,
                right.len(),
                left_len.len()
            )));
        }
        // Children may only reference literals or earlier rules; this rules
        // out cycles, so every descent terminates.
        for g in 0..num_rules {
            let limit = FIRST_RULE + g as u64;
            if left.get(g) >= limit || right.get(g) >= limit {
                return Err(IndexError::Invariant(format!(
                    "rule {g} references a later rule"
                )));
            }
        }
        if root >= FIRST_RULE + num_rules as u64 {
            return Err(IndexError::Invariant("root references no rule".into()));
        }
        Ok(GrammarText {
            left,
            right,
            left_len,
            root,
            text_len,
        })
    }
}
