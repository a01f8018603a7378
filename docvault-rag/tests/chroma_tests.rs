//! Chroma adapter against a local stand-in server that only knows `docs`.

use axum::{
    Json, Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docvault_rag::chroma::ChromaVectorStore;
use docvault_rag::document::SearchQuery;
use docvault_rag::vectorstore::VectorStore;
use serde_json::json;

const DOCS_ID: &str = "6f1c2a8e-docs";

fn missing(id: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Collection {id} does not exist.")).into_response()
}

async fn get_collection(Path(id): Path<String>) -> Response {
    if id == "docs" {
        Json(json!({"id": DOCS_ID, "name": "docs"})).into_response()
    } else {
        missing(&id)
    }
}

async fn count(Path(id): Path<String>) -> Response {
    if id == DOCS_ID { Json(5).into_response() } else { missing(&id) }
}

async fn query(Path(id): Path<String>) -> Response {
    if id != DOCS_ID {
        return missing(&id);
    }
    Json(json!({
        "ids": [["a"]],
        "documents": [["hello from docs"]],
        "metadatas": [[{"source": "/srv/upload/notes.txt"}]],
        "distances": [[0.0]]
    }))
    .into_response()
}

async fn spawn_chroma() -> (ChromaVectorStore, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/api/v1/collections/{id}", get(get_collection))
        .route("/api/v1/collections/{id}/count", get(count))
        .route("/api/v1/collections/{id}/query", post(query));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub chroma");
    let addr = listener.local_addr().expect("stub addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub chroma run");
    });

    let store = ChromaVectorStore::new(format!("http://{addr}")).expect("chroma client");
    (store, handle)
}

fn query_for(text: &str) -> SearchQuery {
    SearchQuery { text: text.to_string(), embedding: Some(vec![1.0, 0.0, 0.0]) }
}

#[tokio::test]
async fn counts_only_the_named_collection() {
    let (store, handle) = spawn_chroma().await;

    assert_eq!(store.count("docs").await.unwrap(), 5);
    assert_eq!(store.count("other").await.unwrap(), 0);
    for name in ["docs#secret", "docs?x=1", "docs/count", "docs%2F"] {
        assert_eq!(store.count(name).await.unwrap(), 0, "collection '{name}'");
    }

    handle.abort();
}

#[tokio::test]
async fn searches_only_the_named_collection() {
    let (store, handle) = spawn_chroma().await;

    let found = store.similarity_search("docs", &query_for("hello"), 4).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text, "hello from docs");

    for name in ["docs?x=1", "docs#frag", "docs/query"] {
        let results = store.similarity_search(name, &query_for("hello"), 4).await.unwrap();
        assert!(results.is_empty(), "collection '{name}' returned {results:?}");
    }

    handle.abort();
}
