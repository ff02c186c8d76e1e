//! Store and retrieval pipeline tests against a real SQLite database.

use serde_json::json;
use tempfile::TempDir;

use handbook_qa::db;
use handbook_qa::embedding::vector_to_literal;
use handbook_qa::migrate;
use handbook_qa::models::{DocumentKind, NewDocument, StoredChunk};
use handbook_qa::store::VectorStore;

async fn test_store() -> (VectorStore, TempDir) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&tmp.path().join("test.db")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (VectorStore::new(pool), tmp)
}

fn document(title: &str) -> NewDocument {
    NewDocument {
        title: title.to_string(),
        kind: DocumentKind::Handbook,
        version: Some("2026".to_string()),
        metadata: json!({}),
        dedup_hash: format!("hash-{title}"),
    }
}

fn chunk(id: &str, document_id: &str, index: i64, text: &str) -> StoredChunk {
    StoredChunk {
        id: id.to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        start_char: index * 100,
        end_char: index * 100 + text.len() as i64,
        metadata: json!({}),
    }
}

#[tokio::test]
async fn status_counts_follow_inserts() {
    let (store, _tmp) = test_store().await;

    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();
    store
        .insert_chunk(&chunk("c1", &doc_id, 0, "Attendance is mandatory."))
        .await
        .unwrap();
    store
        .insert_chunk(&chunk("c2", &doc_id, 1, "Library hours are 8-17."))
        .await
        .unwrap();
    store.insert_embedding("c1", &[1.0, 0.0, 0.0]).await.unwrap();

    let status = store.status().await.unwrap();
    assert_eq!(status.documents, 1);
    assert_eq!(status.chunks, 2);
    assert_eq!(status.embeddings, 1);
}

#[tokio::test]
async fn dedup_hash_lookup_finds_existing_document() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();

    assert_eq!(
        store.find_document_by_hash("hash-Handbook").await.unwrap(),
        Some(doc_id)
    );
    assert_eq!(store.find_document_by_hash("other").await.unwrap(), None);
}

#[tokio::test]
async fn chunk_for_unknown_document_is_rejected() {
    let (store, _tmp) = test_store().await;
    let result = store
        .insert_chunk(&chunk("c1", "no-such-document", 0, "text"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn duplicate_chunk_index_is_rejected() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();
    store
        .insert_chunk(&chunk("c1", &doc_id, 0, "first"))
        .await
        .unwrap();
    let result = store.insert_chunk(&chunk("c2", &doc_id, 0, "second")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn second_embedding_for_a_chunk_is_rejected() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();
    store
        .insert_chunk(&chunk("c1", &doc_id, 0, "text"))
        .await
        .unwrap();
    store.insert_embedding("c1", &[1.0, 0.0]).await.unwrap();
    assert!(store.insert_embedding("c1", &[0.0, 1.0]).await.is_err());
}

#[tokio::test]
async fn embedding_for_unknown_chunk_is_rejected() {
    let (store, _tmp) = test_store().await;
    assert!(store
        .insert_embedding("no-such-chunk", &[1.0, 0.0])
        .await
        .is_err());
}

#[tokio::test]
async fn top_k_returns_nearest_first() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();

    for (id, index, vector) in [
        ("c0", 0, [1.0f32, 0.0, 0.0]),
        ("c1", 1, [0.0, 1.0, 0.0]),
        ("c2", 2, [0.7, 0.7, 0.0]),
    ] {
        store
            .insert_chunk(&chunk(id, &doc_id, index, &format!("chunk {index}")))
            .await
            .unwrap();
        store.insert_embedding(id, &vector).await.unwrap();
    }

    let results = store
        .top_k_by_distance(&[1.0, 0.0, 0.0], 2)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_id, "c0");
    assert!(results[0].distance.abs() < 1e-6);
    assert_eq!(results[1].chunk_id, "c2");
    assert!(results[0].distance <= results[1].distance);
}

#[tokio::test]
async fn top_k_caps_at_available_chunks() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();
    store
        .insert_chunk(&chunk("c0", &doc_id, 0, "only chunk"))
        .await
        .unwrap();
    store.insert_embedding("c0", &[0.0, 1.0]).await.unwrap();

    let results = store.top_k_by_distance(&[0.0, 1.0], 10).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn degraded_zero_vector_never_outranks_a_real_match() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();

    store
        .insert_chunk(&chunk("real", &doc_id, 0, "real chunk"))
        .await
        .unwrap();
    store
        .insert_embedding("real", &[0.6, 0.8, 0.0])
        .await
        .unwrap();

    store
        .insert_chunk(&chunk("degraded", &doc_id, 1, "degraded chunk"))
        .await
        .unwrap();
    store
        .insert_embedding("degraded", &[0.0, 0.0, 0.0])
        .await
        .unwrap();

    let results = store
        .top_k_by_distance(&[0.6, 0.8, 0.0], 2)
        .await
        .unwrap();
    assert_eq!(results[0].chunk_id, "real");
    assert_eq!(results[1].chunk_id, "degraded");
    // Zero magnitude reads as zero similarity, distance 1.
    assert!((results[1].distance - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn malformed_stored_vectors_are_skipped() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();

    store
        .insert_chunk(&chunk("good", &doc_id, 0, "good chunk"))
        .await
        .unwrap();
    store.insert_embedding("good", &[1.0, 0.0]).await.unwrap();

    store
        .insert_chunk(&chunk("bad", &doc_id, 1, "bad chunk"))
        .await
        .unwrap();
    // Corrupt row written directly, bypassing the literal encoder.
    sqlx::query(
        "INSERT INTO embeddings (id, chunk_id, vector, dims, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind("e-bad")
    .bind("bad")
    .bind("0.1,not-a-vector")
    .bind(2i64)
    .bind("2026-01-01T00:00:00Z")
    .execute(store.pool())
    .await
    .unwrap();

    let results = store.top_k_by_distance(&[1.0, 0.0], 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "good");
}

#[tokio::test]
async fn dimension_mismatch_rows_are_skipped() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();

    store
        .insert_chunk(&chunk("c3", &doc_id, 0, "three dims"))
        .await
        .unwrap();
    store.insert_embedding("c3", &[1.0, 0.0, 0.0]).await.unwrap();

    store
        .insert_chunk(&chunk("c2", &doc_id, 1, "two dims"))
        .await
        .unwrap();
    store.insert_embedding("c2", &[1.0, 0.0]).await.unwrap();

    let results = store
        .top_k_by_distance(&[1.0, 0.0, 0.0], 5)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_id, "c3");
}

#[tokio::test]
async fn empty_query_vector_is_a_retrieval_error() {
    let (store, _tmp) = test_store().await;
    assert!(store.top_k_by_distance(&[], 5).await.is_err());
    assert!(store.top_k_by_distance(&[1.0], 0).await.is_err());
}

#[tokio::test]
async fn delete_document_cascades_to_chunks_and_embeddings() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();
    store
        .insert_chunk(&chunk("c1", &doc_id, 0, "text"))
        .await
        .unwrap();
    store.insert_embedding("c1", &[1.0, 0.0]).await.unwrap();

    assert!(store.delete_document(&doc_id).await.unwrap());

    let status = store.status().await.unwrap();
    assert_eq!(status.documents, 0);
    assert_eq!(status.chunks, 0);
    assert_eq!(status.embeddings, 0);

    assert!(!store.delete_document(&doc_id).await.unwrap());
}

#[tokio::test]
async fn stored_vector_roundtrips_through_the_literal_form() {
    let (store, _tmp) = test_store().await;
    let doc_id = store.insert_document(&document("Handbook")).await.unwrap();
    store
        .insert_chunk(&chunk("c1", &doc_id, 0, "text"))
        .await
        .unwrap();

    let vector = vec![0.25f32, -1.5, 0.0, 3.125];
    store.insert_embedding("c1", &vector).await.unwrap();

    let stored: String = sqlx::query_scalar("SELECT vector FROM embeddings WHERE chunk_id = 'c1'")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(stored, vector_to_literal(&vector));

    let results = store.top_k_by_distance(&vector, 1).await.unwrap();
    assert!(results[0].distance.abs() < 1e-6);
}
