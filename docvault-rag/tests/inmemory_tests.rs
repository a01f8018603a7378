//! Property tests for in-memory vector store search ordering.

use std::collections::HashMap;

use docvault_rag::document::{IndexedItem, SearchQuery};
use docvault_rag::inmemory::InMemoryVectorStore;
use docvault_rag::vectorstore::VectorStore;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate an item with a normalized embedding.
fn arb_item(dim: usize) -> impl Strategy<Value = IndexedItem> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| IndexedItem {
            id,
            text,
            metadata: HashMap::new(),
            embedding: Some(embedding),
        },
    )
}

/// *For any* set of items stored in an InMemoryVectorStore, searching with a
/// query embedding returns results ordered by descending cosine similarity,
/// at most `k` of them, and `count` equals the number of distinct items added.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            items in proptest::collection::vec(arb_item(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count, stored) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                let handle = store.get_or_create_collection("test").await.unwrap();

                // Duplicate ids are rejected, so keep one item per id.
                let mut deduped: HashMap<String, IndexedItem> = HashMap::new();
                for item in &items {
                    deduped.entry(item.id.clone()).or_insert_with(|| item.clone());
                }
                let unique_items: Vec<IndexedItem> = deduped.into_values().collect();
                let count = unique_items.len();

                store.add(&handle, &unique_items).await.unwrap();
                let query = SearchQuery { text: String::new(), embedding: Some(query) };
                let results = store.similarity_search("test", &query, k).await.unwrap();
                let stored = store.count("test").await.unwrap();
                (results, count, stored)
            });

            prop_assert_eq!(stored, unique_count);
            prop_assert!(results.len() <= k);
            prop_assert_eq!(results.len(), k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}

#[tokio::test]
async fn concurrent_adds_to_one_collection_are_all_kept() {
    let store = std::sync::Arc::new(InMemoryVectorStore::new());
    let handle = store.get_or_create_collection("shared").await.unwrap();

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let store = store.clone();
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let items: Vec<IndexedItem> = (0..10)
                .map(|i| IndexedItem {
                    id: format!("{worker}-{i}"),
                    text: format!("item {i}"),
                    metadata: HashMap::new(),
                    embedding: Some(vec![1.0, i as f32]),
                })
                .collect();
            store.add(&handle, &items).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.count("shared").await.unwrap(), 80);
}
