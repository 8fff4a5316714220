use proptest::prelude::*;
use rlbwt_matcher::{MsIndex, PmlIndex, ReferenceBuilder};

/// True matching statistic of `pattern[i..]` against `text` by brute force.
fn naive_lengths(text: &[u8], pattern: &[u8]) -> Vec<u64> {
    (0..pattern.len())
        .map(|i| {
            (0..text.len())
                .map(|p| {
                    pattern[i..]
                        .iter()
                        .zip(&text[p..])
                        .take_while(|(a, b)| a == b)
                        .count()
                })
                .max()
                .unwrap_or(0) as u64
        })
        .collect()
}

fn doc_of(doc_lens: &[usize], p: usize) -> u64 {
    // Each document owns its bytes plus the following separator
    // (or the terminator for the last one).
    let mut start = 0;
    for (d, &l) in doc_lens.iter().enumerate() {
        let end = start + l + 1;
        if p < end {
            return d as u64;
        }
        start = end;
    }
    (doc_lens.len().max(1) - 1) as u64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // The verified MS lengths equal the brute-force matching statistics,
    // every pointer is a sound witness, and every match is maximal.
    #[test]
    fn ms_matches_brute_force(
        doc in prop::collection::vec(prop::sample::select(b"abc".to_vec()), 1..48),
        pattern in prop::collection::vec(prop::sample::select(b"abcx".to_vec()), 0..24),
    ) {
        let built = ReferenceBuilder::new().document(&doc).build().unwrap();
        let matcher = built.ms_matcher().unwrap();
        let (lengths, pointers) = matcher.query(&pattern);
        let text = built.text();
        prop_assert_eq!(&lengths, &naive_lengths(text, &pattern));
        let (n, m) = (text.len(), pattern.len());
        for i in 0..m {
            let (l, p) = (lengths[i] as usize, pointers[i] as usize);
            prop_assert!(l <= m - i && l <= n);
            prop_assert_eq!(&pattern[i..i + l], &text[p..p + l]);
            if i + l < m && p + l < n {
                prop_assert_ne!(pattern[i + l], text[p + l]);
            }
        }
    }

    // Pseudo-matching lengths never exceed the true statistic and either
    // reset to zero or extend their right neighbor by exactly one.
    #[test]
    fn pml_bounded_by_ms_and_well_shaped(
        doc in prop::collection::vec(prop::sample::select(b"ab".to_vec()), 1..40),
        pattern in prop::collection::vec(prop::sample::select(b"abx".to_vec()), 1..20),
    ) {
        let built = ReferenceBuilder::new().document(&doc).build().unwrap();
        let pml_lengths = built.pml_index().unwrap().query(&pattern);
        let (ms_lengths, _) = built.ms_matcher().unwrap().query(&pattern);
        let m = pattern.len();
        for i in 0..m {
            prop_assert!(pml_lengths[i] <= ms_lengths[i]);
            let next = if i + 1 < m { pml_lengths[i + 1] } else { 0 };
            prop_assert!(pml_lengths[i] == 0 || pml_lengths[i] == next + 1);
        }
    }

    // Reported document ids agree with the document containing the
    // returned pointer wherever a real match exists.
    #[test]
    fn documents_consistent_with_pointers(
        docs in prop::collection::vec(
            prop::collection::vec(prop::sample::select(b"ab".to_vec()), 1..12),
            1..4,
        ),
        pattern in prop::collection::vec(prop::sample::select(b"abx".to_vec()), 0..16),
    ) {
        let mut builder = ReferenceBuilder::new();
        for d in &docs {
            builder = builder.document(d);
        }
        let built = builder.build().unwrap();
        let doc_array = built.doc_array().unwrap();
        let matcher = built.ms_matcher().unwrap();
        let (lengths, pointers, doc_ids) = matcher.query_doc(&pattern, &doc_array);
        let doc_lens: Vec<usize> = docs.iter().map(|d| d.len()).collect();
        for i in 0..pattern.len() {
            if lengths[i] > 0 {
                prop_assert_eq!(
                    doc_ids[i],
                    doc_of(&doc_lens, pointers[i] as usize),
                    "position {}", i
                );
            }
        }
    }

    // Serialization round-trips structurally for both flavors.
    #[test]
    fn round_trip(
        doc in prop::collection::vec(prop::sample::select(b"abcd".to_vec()), 1..40),
    ) {
        let built = ReferenceBuilder::new().document(&doc).build().unwrap();

        let pml = built.pml_index().unwrap();
        let mut buf = Vec::new();
        pml.serialize(&mut buf).unwrap();
        prop_assert_eq!(PmlIndex::load(&mut buf.as_slice()).unwrap(), pml);

        let ms = built.ms_index().unwrap();
        let mut buf = Vec::new();
        ms.serialize(&mut buf).unwrap();
        prop_assert_eq!(MsIndex::load(&mut buf.as_slice()).unwrap(), ms);
    }
}
