//! Property tests for chunking.

use docvault_rag::chunking::{Chunker, FixedSizeChunker, SeparatorChunker, split};
use docvault_rag::document::Document;
use proptest::prelude::*;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Text with a good share of paragraph breaks and multi-byte characters.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => "[a-zA-Z ]{1,40}",
            1 => Just("\n\n".to_string()),
            1 => "[éßж😀]{1,5}",
        ],
        0..30,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Without overlap, windows rebuild the text exactly and none exceeds the bound.
    #[test]
    fn split_without_overlap_reconstructs(text in arb_text(), size in 1usize..120) {
        let windows = split(&text, size, 0);
        prop_assert!(windows.iter().all(|w| char_len(w) <= size));
        prop_assert!(windows.iter().all(|w| !w.is_empty()));
        prop_assert_eq!(windows.concat(), text);
    }

    /// With overlap, adjacent windows share exactly `overlap` characters and
    /// dropping the shared prefix rebuilds the text.
    #[test]
    fn split_with_overlap_shares_characters(
        text in arb_text(),
        size in 2usize..120,
        overlap_ratio in 0.0f64..1.0,
    ) {
        let overlap = ((size as f64) * overlap_ratio) as usize;
        let overlap = overlap.min(size - 1);
        let windows = split(&text, size, overlap);
        prop_assert!(windows.iter().all(|w| char_len(w) <= size));

        let mut rebuilt = String::new();
        for (i, window) in windows.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(window);
            } else {
                let prev: Vec<char> = windows[i - 1].chars().collect();
                let shared: String = prev[prev.len() - overlap..].iter().collect();
                prop_assert!(window.starts_with(&shared));
                rebuilt.extend(window.chars().skip(overlap));
            }
        }
        prop_assert_eq!(rebuilt, text);
    }

    #[test]
    fn separator_chunker_reconstructs(text in arb_text(), size in 1usize..120) {
        let doc = Document::new(text.clone(), "doc.txt");
        let chunks = SeparatorChunker::new(size, 0).chunk(&doc);
        prop_assert!(chunks.iter().all(|c| char_len(&c.text) <= size));
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        prop_assert_eq!(joined, text);
    }

    #[test]
    fn separator_chunker_respects_bound_with_overlap(
        text in arb_text(),
        size in 2usize..120,
        overlap in 0usize..60,
    ) {
        let overlap = overlap.min(size - 1);
        let doc = Document::new(text, "doc.txt");
        let chunks = SeparatorChunker::new(size, overlap).chunk(&doc);
        prop_assert!(chunks.iter().all(|c| char_len(&c.text) <= size));
    }
}

#[test]
fn empty_text_yields_no_chunks() {
    let doc = Document::new("", "empty.txt");
    assert!(FixedSizeChunker::new(1000, 0).chunk(&doc).is_empty());
    assert!(SeparatorChunker::new(1000, 0).chunk(&doc).is_empty());
    assert!(split("", 10, 3).is_empty());
}

#[test]
fn short_document_is_one_chunk_equal_to_text() {
    let text = "The quick brown fox jumps over the lazy dog, twice.";
    let doc = Document::new(text, "fox.txt");
    let chunks = FixedSizeChunker::new(1000, 0).chunk(&doc);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
}

#[test]
fn chunk_count_is_ceiling_of_length_over_size() {
    let doc = Document::new("x".repeat(2000), "a.txt");
    assert_eq!(FixedSizeChunker::new(1000, 0).chunk(&doc).len(), 2);
    let doc = Document::new("x".repeat(2001), "a.txt");
    assert_eq!(FixedSizeChunker::new(1000, 0).chunk(&doc).len(), 3);
}
