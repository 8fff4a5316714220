//! Naive reference builder.
//!
//! Assembles every artifact the query engines consume — BWT runs,
//! thresholds, run-boundary SA samples, document arrays, and the
//! random-access grammar — from an in-memory reference. Construction is
//! quadratic (rotation sort plus naive LCP), which is fine for the tests
//! and small references it exists for; production artifacts come from an
//! external offline pipeline.
//!
//! Documents are concatenated with a separator byte between them and a
//! single terminator at the very end, so the separator occurrences stay
//! ordinary characters and the sentinel stays unique.

use crate::doc_array::DocArray;
use crate::grammar::GrammarText;
use crate::index::{MsIndex, MsMatcher, PmlIndex};
use crate::intvec::IntVector;
use crate::io::{IndexError, Result};
use crate::rindex::{RIndex, TERMINATOR};
use crate::rle_bwt::RleBwt;
use crate::thresholds::Thresholds;

/// Builder over one or more reference documents.
#[derive(Clone)]
pub struct ReferenceBuilder {
    documents: Vec<Vec<u8>>,
    separator: u8,
}

impl Default for ReferenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceBuilder {
    pub fn new() -> Self {
        ReferenceBuilder {
            documents: Vec::new(),
            separator: b'$',
        }
    }

    /// Append a document. Order assigns the 0-based document ids.
    pub fn document(mut self, bytes: &[u8]) -> Self {
        self.documents.push(bytes.to_vec());
        self
    }

    /// Separator byte placed between documents (default `b'$'`).
    pub fn separator(mut self, b: u8) -> Self {
        self.separator = b;
        self
    }

    /// Run the offline construction.
    pub fn build(self) -> Result<BuiltReference> {
        if self.separator <= TERMINATOR {
            return Err(IndexError::Invariant(format!(
                "separator byte {} collides with the terminator",
                self.separator
            )));
        }
        let mut text = Vec::new();
        let mut doc_starts = Vec::with_capacity(self.documents.len());
        for (d, doc) in self.documents.iter().enumerate() {
            if let Some(&bad) = doc.iter().find(|&&b| b <= TERMINATOR) {
                return Err(IndexError::Invariant(format!(
                    "byte {bad} in document {d} is not above the terminator"
                )));
            }
            doc_starts.push(text.len());
            text.extend_from_slice(doc);
            if d + 1 < self.documents.len() {
                text.push(self.separator);
            }
        }
        text.push(TERMINATOR);
        let n = text.len();

        // Suffix array by direct sort; the unique minimal terminator makes
        // suffix order and rotation order coincide.
        let mut sa: Vec<usize> = (0..n).collect();
        sa.sort_by(|&a, &b| text[a..].cmp(&text[b..]));

        let bwt: Vec<u8> = sa.iter().map(|&p| text[(p + n - 1) % n]).collect();

        let mut heads = Vec::new();
        let mut lens: Vec<u64> = Vec::new();
        let mut run_bounds: Vec<(usize, usize)> = Vec::new(); // [first, last] per run
        for (j, &c) in bwt.iter().enumerate() {
            if heads.last() == Some(&c) {
                *lens.last_mut().unwrap() += 1;
                run_bounds.last_mut().unwrap().1 = j;
            } else {
                heads.push(c);
                lens.push(1);
                run_bounds.push((j, j));
            }
        }

        // Text position of the BWT character, i.e. SA[j] - 1 mod n.
        let text_pos = |j: usize| ((sa[j] + n - 1) % n) as u64;
        let samples_start: Vec<u64> = run_bounds.iter().map(|&(a, _)| text_pos(a)).collect();
        let samples_last: Vec<u64> = run_bounds.iter().map(|&(_, b)| text_pos(b)).collect();

        let lcp = naive_lcp(&text, &sa);
        let thresholds = compute_thresholds(&heads, &run_bounds, &lcp);

        let doc_of = |p: u64| -> u64 {
            if doc_starts.is_empty() {
                0
            } else {
                (doc_starts.partition_point(|&s| s as u64 <= p) - 1) as u64
            }
        };
        let start_docs: Vec<u64> = samples_start.iter().map(|&p| doc_of(p)).collect();
        let end_docs: Vec<u64> = samples_last.iter().map(|&p| doc_of(p)).collect();

        Ok(BuiltReference {
            text,
            heads,
            lens,
            thresholds,
            samples_start,
            samples_last,
            start_docs,
            end_docs,
        })
    }
}

/// LCP between lexicographically adjacent suffixes; entry 0 is 0.
fn naive_lcp(text: &[u8], sa: &[usize]) -> Vec<u64> {
    let mut lcp = vec![0u64; sa.len()];
    for j in 1..sa.len() {
        let (a, b) = (&text[sa[j - 1]..], &text[sa[j]..]);
        lcp[j] = a.iter().zip(b).take_while(|(x, y)| x == y).count() as u64;
    }
    lcp
}

/// Classical per-run thresholds: 0 for a character's first run, otherwise
/// the position of the LCP minimum in the gap since that character's
/// previous run (smallest such position on ties).
fn compute_thresholds(heads: &[u8], run_bounds: &[(usize, usize)], lcp: &[u64]) -> Vec<u64> {
    let mut prev_end = [None::<usize>; 256];
    let mut thresholds = Vec::with_capacity(heads.len());
    for (k, &c) in heads.iter().enumerate() {
        let (first, last) = run_bounds[k];
        let thr = match prev_end[c as usize] {
            None => 0,
            Some(e) => {
                let mut best = e + 1;
                for p in e + 1..=first {
                    if lcp[p] < lcp[best] {
                        best = p;
                    }
                }
                best as u64
            }
        };
        thresholds.push(thr);
        prev_end[c as usize] = Some(last);
    }
    thresholds
}

/// Everything the offline construction produces for one reference.
pub struct BuiltReference {
    text: Vec<u8>,
    heads: Vec<u8>,
    lens: Vec<u64>,
    thresholds: Vec<u64>,
    samples_start: Vec<u64>,
    samples_last: Vec<u64>,
    start_docs: Vec<u64>,
    end_docs: Vec<u64>,
}

impl BuiltReference {
    /// The concatenated text, terminator included.
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    fn rle_bwt(&self) -> Result<RleBwt> {
        RleBwt::from_runs(&self.heads, &self.lens)
    }

    pub fn pml_index(&self) -> Result<PmlIndex> {
        let core = RIndex::new(self.rle_bwt()?)?;
        let thresholds = Thresholds::from_values(&self.thresholds, core.size())?;
        PmlIndex::new(core, thresholds)
    }

    pub fn ms_index(&self) -> Result<MsIndex> {
        let core = RIndex::new(self.rle_bwt()?)?;
        let thresholds = Thresholds::from_values(&self.thresholds, core.size())?;
        MsIndex::new(
            core,
            thresholds,
            IntVector::from_values(&self.samples_last),
            IntVector::from_values(&self.samples_start),
        )
    }

    pub fn grammar(&self) -> Result<GrammarText> {
        GrammarText::from_text(&self.text)
    }

    pub fn ms_matcher(&self) -> Result<MsMatcher> {
        MsMatcher::new(self.ms_index()?, self.grammar()?)
    }

    pub fn doc_array(&self) -> Result<DocArray> {
        DocArray::from_values(&self.start_docs, &self.end_docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bwt_of_mississippi() {
        let built = ReferenceBuilder::new()
            .document(b"mississippi")
            .build()
            .unwrap();
        // Well-known transform with '$' as the sentinel: "ipssm$pissii".
        let bwt: Vec<u8> = built
            .heads
            .iter()
            .zip(&built.lens)
            .flat_map(|(&c, &l)| std::iter::repeat_n(c, l as usize))
            .collect();
        assert_eq!(bwt, b"ipssm\x01pissii");
    }

    #[test]
    fn first_runs_have_zero_threshold() {
        let built = ReferenceBuilder::new()
            .document(b"abracadabra")
            .build()
            .unwrap();
        let mut seen = [false; 256];
        for (k, &c) in built.heads.iter().enumerate() {
            if !seen[c as usize] {
                assert_eq!(built.thresholds[k], 0, "first run of byte {c}");
                seen[c as usize] = true;
            }
        }
    }

    #[test]
    fn samples_point_at_bwt_characters() {
        let built = ReferenceBuilder::new()
            .document(b"mississippi")
            .build()
            .unwrap();
        // The sampled text position holds the run's character.
        for (k, &c) in built.heads.iter().enumerate() {
            assert_eq!(built.text[built.samples_start[k] as usize], c);
            assert_eq!(built.text[built.samples_last[k] as usize], c);
        }
    }

    #[test]
    fn document_ids_follow_boundaries() {
        let built = ReferenceBuilder::new()
            .document(b"cat")
            .document(b"dog")
            .document(b"cow")
            .build()
            .unwrap();
        assert_eq!(built.text(), b"cat$dog$cow\x01");
        let docs = built.doc_array().unwrap();
        for k in 0..built.heads.len() {
            let expect = |p: u64| match p {
                0..=3 => 0u64,
                4..=7 => 1,
                _ => 2,
            };
            assert_eq!(docs.start(k), expect(built.samples_start[k]));
            assert_eq!(docs.end(k), expect(built.samples_last[k]));
        }
    }

    #[test]
    fn rejects_terminator_bytes_in_documents() {
        assert!(
            ReferenceBuilder::new()
                .document(b"ab\x01cd")
                .build()
                .is_err()
        );
        assert!(
            ReferenceBuilder::new()
                .document(b"ab")
                .separator(1)
                .build()
                .is_err()
        );
    }

    #[test]
    fn empty_reference_is_just_the_terminator() {
        let built = ReferenceBuilder::new().build().unwrap();
        assert_eq!(built.text(), b"\x01");
        let pml = built.pml_index().unwrap();
        assert_eq!(pml.bwt_stats(), (1, 1));
        assert_eq!(pml.query(b"xyz"), vec![0, 0, 0]);
    }
}
