//! Query indexes: pseudo-matching lengths and matching statistics.
//!
//! Both engines run the same right-to-left state machine over the pattern:
//! keep one BWT position, extend for free while the current position
//! already carries the pattern character, otherwise consult the run's
//! threshold to jump to the nearest next/previous occurrence, then take
//! one LF step. The PML engine tracks a match length through that walk;
//! the MS engine tracks a sampled text position instead and derives the
//! lengths afterwards by comparing against the random-access oracle.
//!
//! On-disk layout (all little-endian): header, terminator position, F,
//! RLBWT blob, [samples_last], thresholds blob, [samples_start], where the
//! bracketed parts exist only in the MS flavor.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::doc_array::DocArray;
use crate::grammar::GrammarText;
use crate::intvec::IntVector;
use crate::io::{FileHeader, IndexError, IndexFlavor, Result};
use crate::rindex::RIndex;
use crate::rle_bwt::RleBwt;
use crate::thresholds::Thresholds;

/// Outcome of one backward step's jump decision.
struct Jump {
    next_pos: usize,
    /// Run jumped into, with `true` when the previous-occurrence branch won.
    run: usize,
    took_prev: bool,
}

/// Decide where a mismatching backward step lands. `pos` may equal `n`
/// (one past the BWT) after an LF step with a character absent above it.
#[inline]
fn jump_step(bwt: &RleBwt, thresholds: &Thresholds, pos: usize, c: u8) -> Jump {
    let n = bwt.size();
    let mut rnk = bwt.rank(pos, c);
    let mut thr = n + 1;
    let mut next_pos = pos;
    let mut run = 0;
    let mut took_prev = false;
    let mut jumped = false;
    if rnk < bwt.number_of_letter(c) {
        // First position of the next run of c's.
        let j = bwt.select(rnk, c);
        run = bwt.run_of_position(j);
        thr = thresholds.get(run);
        next_pos = j;
        jumped = true;
    }
    if pos < thr {
        // The previous occurrence is closer; `rnk > 0` whenever this branch
        // is reachable (a first run's threshold is 0).
        rnk -= 1;
        let j = bwt.select(rnk, c);
        run = bwt.run_of_position(j);
        next_pos = j;
        took_prev = true;
        jumped = true;
    }
    debug_assert!(jumped);
    Jump {
        next_pos,
        run,
        took_prev,
    }
}

/// Pseudo-matching-length index: r-index substrate plus thresholds.
#[derive(Debug, PartialEq, Eq)]
pub struct PmlIndex {
    core: RIndex,
    thresholds: Thresholds,
}

impl PmlIndex {
    pub fn new(core: RIndex, thresholds: Thresholds) -> Result<Self> {
        if thresholds.len() != core.num_runs() {
            return Err(IndexError::Format(format!(
                "{} thresholds against {} runs",
                thresholds.len(),
                core.num_runs()
            )));
        }
        Ok(PmlIndex { core, thresholds })
    }

    /// `(n, r)` of the underlying BWT.
    pub fn bwt_stats(&self) -> (usize, usize) {
        (self.core.size(), self.core.num_runs())
    }

    /// Pseudo-matching length for every position of `pattern`.
    pub fn query(&self, pattern: &[u8]) -> Vec<u64> {
        self.scan(pattern, None).0
    }

    /// As [`query`](Self::query), also reporting the document id of the run
    /// each match was taken from.
    pub fn query_doc(&self, pattern: &[u8], docs: &DocArray) -> (Vec<u64>, Vec<u64>) {
        self.scan(pattern, Some(docs))
    }

    fn scan(&self, pattern: &[u8], docs: Option<&DocArray>) -> (Vec<u64>, Vec<u64>) {
        let m = pattern.len();
        let mut lengths = vec![0u64; m];
        let mut doc_ids = vec![0u64; if docs.is_some() { m } else { 0 }];
        if m == 0 {
            return (lengths, doc_ids);
        }
        let bwt = self.core.bwt();
        let n = self.core.size();
        let mut pos = n - 1;
        let mut length = 0u64;
        let mut doc = docs.map_or(0, |d| d.end(self.core.num_runs() - 1));

        for i in 0..m {
            let c = pattern[m - 1 - i];
            if bwt.number_of_letter(c) == 0 {
                length = 0;
            } else if pos < n && bwt.at(pos) == c {
                length += 1;
            } else {
                let jump = jump_step(bwt, &self.thresholds, pos, c);
                length = 0;
                pos = jump.next_pos;
                if let Some(d) = docs {
                    doc = if jump.took_prev {
                        d.end(jump.run)
                    } else {
                        d.start(jump.run)
                    };
                }
            }
            lengths[m - 1 - i] = length;
            if docs.is_some() {
                doc_ids[m - 1 - i] = doc;
            }
            pos = self.core.lf(pos, c);
        }
        (lengths, doc_ids)
    }

    /// Write the index. Returns total bytes written.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<usize> {
        let mut written = FileHeader::new(IndexFlavor::Pml).write_to(w)?;
        written += self.core.serialize_front(w)?;
        written += self.core.bwt().serialize(w)?;
        written += self.thresholds.serialize(w)?;
        Ok(written)
    }

    pub fn load<R: Read>(r: &mut R) -> Result<Self> {
        let header = FileHeader::read_from(r)?;
        if header.flavor != IndexFlavor::Pml {
            return Err(IndexError::Format(
                "matching-statistics index opened as a PML index".into(),
            ));
        }
        let (terminator_position, f) = RIndex::load_front(r)?;
        let bwt = RleBwt::load(r)?;
        let (num_runs, n) = (bwt.num_runs(), bwt.size());
        let core = RIndex::from_parts(bwt, f, terminator_position)?;
        let thresholds = Thresholds::load(r, num_runs, n)?;
        PmlIndex::new(core, thresholds)
    }

    pub fn load_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| IndexError::from(e).at_path(path))?;
        Self::load(&mut BufReader::new(file)).map_err(|e| e.at_path(path))
    }

    pub fn store_path(&self, path: &Path) -> Result<usize> {
        let file = File::create(path).map_err(|e| IndexError::from(e).at_path(path))?;
        let mut w = BufWriter::new(file);
        let written = self.serialize(&mut w).map_err(|e| e.at_path(path))?;
        w.flush().map_err(|e| IndexError::from(e).at_path(path))?;
        Ok(written)
    }

    /// Per-component serialized sizes, for structure diagnostics.
    pub fn component_sizes(&self) -> Result<Vec<(&'static str, usize)>> {
        let mut sink = std::io::sink();
        Ok(vec![
            ("r-index front", self.core.serialize_front(&mut sink)?),
            ("rlbwt", self.core.bwt().serialize(&mut sink)?),
            ("thresholds", self.thresholds.serialize(&mut sink)?),
        ])
    }
}

/// Matching-statistics index: substrate, thresholds, and the SA samples at
/// both boundaries of every run.
#[derive(Debug, PartialEq, Eq)]
pub struct MsIndex {
    core: RIndex,
    thresholds: Thresholds,
    samples_last: IntVector,
    samples_start: IntVector,
}

impl MsIndex {
    pub fn new(
        core: RIndex,
        thresholds: Thresholds,
        samples_last: IntVector,
        samples_start: IntVector,
    ) -> Result<Self> {
        let (n, r) = (core.size(), core.num_runs());
        if thresholds.len() != r {
            return Err(IndexError::Format(format!(
                "{} thresholds against {r} runs",
                thresholds.len()
            )));
        }
        for (name, samples) in [("last", &samples_last), ("start", &samples_start)] {
            if samples.len() != r {
                return Err(IndexError::Format(format!(
                    "{} {name}-samples against {r} runs",
                    samples.len()
                )));
            }
            if let Some(bad) = samples.iter().find(|&v| v >= n as u64) {
                return Err(IndexError::Invariant(format!(
                    "{name}-sample {bad} beyond text length {n}"
                )));
            }
        }
        Ok(MsIndex {
            core,
            thresholds,
            samples_last,
            samples_start,
        })
    }

    /// `(n, r)` of the underlying BWT.
    pub fn bwt_stats(&self) -> (usize, usize) {
        (self.core.size(), self.core.num_runs())
    }

    /// Text length the index was built over.
    pub fn text_len(&self) -> usize {
        self.core.size()
    }

    /// One sampled text position per pattern position: the start in T of a
    /// longest match for the suffix beginning there.
    pub fn pointers(&self, pattern: &[u8]) -> Vec<u64> {
        self.scan(pattern, None).0
    }

    /// As [`pointers`](Self::pointers), also reporting document ids.
    pub fn pointers_doc(&self, pattern: &[u8], docs: &DocArray) -> (Vec<u64>, Vec<u64>) {
        self.scan(pattern, Some(docs))
    }

    fn scan(&self, pattern: &[u8], docs: Option<&DocArray>) -> (Vec<u64>, Vec<u64>) {
        let m = pattern.len();
        let mut pointers = vec![0u64; m];
        let mut doc_ids = vec![0u64; if docs.is_some() { m } else { 0 }];
        if m == 0 {
            return (pointers, doc_ids);
        }
        let bwt = self.core.bwt();
        let n = self.core.size();
        let r = self.core.num_runs();
        let mut pos = n - 1;
        // The suffix start at the last BWT row: the stored sample is the
        // text position of the row's character, one to its left.
        let mut sample = (self.samples_last.get(r - 1) as usize + 1) % n;
        let mut doc = docs.map_or(0, |d| d.end(r - 1));

        for i in 0..m {
            let c = pattern[m - 1 - i];
            if bwt.number_of_letter(c) == 0 {
                sample = 0;
                if let Some(d) = docs {
                    doc = d.start(bwt.run_of_position(0));
                }
            } else if pos < n && bwt.at(pos) == c {
                // Extend one character left in the text; wraps modulo n.
                sample = if sample == 0 { n - 1 } else { sample - 1 };
            } else {
                let jump = jump_step(bwt, &self.thresholds, pos, c);
                pos = jump.next_pos;
                sample = if jump.took_prev {
                    self.samples_last.get(jump.run) as usize
                } else {
                    self.samples_start.get(jump.run) as usize
                };
                if let Some(d) = docs {
                    doc = if jump.took_prev {
                        d.end(jump.run)
                    } else {
                        d.start(jump.run)
                    };
                }
            }
            pointers[m - 1 - i] = sample as u64;
            if docs.is_some() {
                doc_ids[m - 1 - i] = doc;
            }
            pos = self.core.lf(pos, c);
        }
        (pointers, doc_ids)
    }

    /// Write the index. Returns total bytes written.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<usize> {
        let mut written = FileHeader::new(IndexFlavor::Ms).write_to(w)?;
        written += self.core.serialize_front(w)?;
        written += self.core.bwt().serialize(w)?;
        written += self.samples_last.serialize(w)?;
        written += self.thresholds.serialize(w)?;
        written += self.samples_start.serialize(w)?;
        Ok(written)
    }

    pub fn load<R: Read>(r: &mut R) -> Result<Self> {
        let header = FileHeader::read_from(r)?;
        if header.flavor != IndexFlavor::Ms {
            return Err(IndexError::Format(
                "PML index opened as a matching-statistics index".into(),
            ));
        }
        let (terminator_position, f) = RIndex::load_front(r)?;
        let bwt = RleBwt::load(r)?;
        let (num_runs, n) = (bwt.num_runs(), bwt.size());
        let core = RIndex::from_parts(bwt, f, terminator_position)?;
        let samples_last = IntVector::load(r)?;
        let thresholds = Thresholds::load(r, num_runs, n)?;
        let samples_start = IntVector::load(r)?;
        MsIndex::new(core, thresholds, samples_last, samples_start)
    }

    pub fn load_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| IndexError::from(e).at_path(path))?;
        Self::load(&mut BufReader::new(file)).map_err(|e| e.at_path(path))
    }

    pub fn store_path(&self, path: &Path) -> Result<usize> {
        let file = File::create(path).map_err(|e| IndexError::from(e).at_path(path))?;
        let mut w = BufWriter::new(file);
        let written = self.serialize(&mut w).map_err(|e| e.at_path(path))?;
        w.flush().map_err(|e| IndexError::from(e).at_path(path))?;
        Ok(written)
    }

    /// Per-component serialized sizes, for structure diagnostics.
    pub fn component_sizes(&self) -> Result<Vec<(&'static str, usize)>> {
        let mut sink = std::io::sink();
        Ok(vec![
            ("r-index front", self.core.serialize_front(&mut sink)?),
            ("rlbwt", self.core.bwt().serialize(&mut sink)?),
            ("samples_last", self.samples_last.serialize(&mut sink)?),
            ("thresholds", self.thresholds.serialize(&mut sink)?),
            ("samples_start", self.samples_start.serialize(&mut sink)?),
        ])
    }
}

/// Matching-statistics facade: an [`MsIndex`] coupled with the
/// random-access oracle that turns sampled pointers into true lengths.
pub struct MsMatcher {
    index: MsIndex,
    text: GrammarText,
}

impl MsMatcher {
    pub fn new(index: MsIndex, text: GrammarText) -> Result<Self> {
        if text.len() != index.text_len() {
            return Err(IndexError::Format(format!(
                "random-access text of length {} against an index over {}",
                text.len(),
                index.text_len()
            )));
        }
        Ok(MsMatcher { index, text })
    }

    #[inline]
    pub fn index(&self) -> &MsIndex {
        &self.index
    }

    #[inline]
    pub fn text(&self) -> &GrammarText {
        &self.text
    }

    /// Matching statistics: `(lengths, pointers)`, both in pattern order.
    pub fn query(&self, pattern: &[u8]) -> (Vec<u64>, Vec<u64>) {
        let pointers = self.index.pointers(pattern);
        let lengths = self.verify(pattern, &pointers);
        (lengths, pointers)
    }

    /// As [`query`](Self::query), also reporting document ids.
    pub fn query_doc(
        &self,
        pattern: &[u8],
        docs: &DocArray,
    ) -> (Vec<u64>, Vec<u64>, Vec<u64>) {
        let (pointers, doc_ids) = self.index.pointers_doc(pattern, docs);
        let lengths = self.verify(pattern, &pointers);
        (lengths, pointers, doc_ids)
    }

    /// Forward pass: compare the pattern against the oracle at each sampled
    /// pointer. A pointer that left-extends its predecessor needs no new
    /// comparisons, and carrying `len - 1` across positions makes the total
    /// comparison count linear in the pattern length.
    fn verify(&self, pattern: &[u8], pointers: &[u64]) -> Vec<u64> {
        let m = pattern.len();
        let n = self.text.len();
        let mut lengths = vec![0u64; m];
        let mut len = 0usize;
        for i in 0..m {
            let p = pointers[i] as usize;
            while i + len < m
                && p + len < n
                && (i == 0 || pointers[i] != pointers[i - 1] + 1)
                && pattern[i + len] == self.text.char_at(p + len)
            {
                len += 1;
            }
            lengths[i] = len as u64;
            len = len.saturating_sub(1);
        }
        lengths
    }
}
