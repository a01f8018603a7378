//! Property tests for the offline embedder.

use docvault_rag::embedding::EmbeddingProvider;
use docvault_rag::hashing::HashEmbeddingProvider;
use proptest::prelude::*;

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Same text, same vector; every vector has the advertised dimension and
    /// is either unit length or all zeros.
    #[test]
    fn embeddings_are_deterministic_and_normalised(
        text in "[a-zA-Z0-9 ,.!?]{0,80}",
        dims in 1usize..512,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let provider = HashEmbeddingProvider::new(dims);
        let (first, second) = rt.block_on(async {
            (provider.embed(&text).await.unwrap(), provider.embed(&text).await.unwrap())
        });

        prop_assert_eq!(first.len(), dims);
        prop_assert_eq!(&first, &second);
        let n = norm(&first);
        prop_assert!(n == 0.0 || (n - 1.0).abs() < 1e-4, "norm was {}", n);
    }

    /// Batch embedding is the same as embedding each text on its own.
    #[test]
    fn batch_matches_single_embeddings(
        texts in proptest::collection::vec("[a-z ]{0,40}", 0..10),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let provider = HashEmbeddingProvider::default();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let (batch, singles) = rt.block_on(async {
            let batch = provider.embed_batch(&refs).await.unwrap();
            let mut singles = Vec::new();
            for text in &refs {
                singles.push(provider.embed(text).await.unwrap());
            }
            (batch, singles)
        });

        prop_assert_eq!(batch, singles);
    }
}

#[tokio::test]
async fn shared_words_score_higher_than_disjoint_text() {
    let provider = HashEmbeddingProvider::default();
    let query = provider.embed("hello").await.unwrap();
    let related = provider.embed("hello world").await.unwrap();
    let unrelated = provider.embed("goodbye moon").await.unwrap();

    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&query, &related) > dot(&query, &unrelated));
    assert!((dot(&query, &related) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
}
