use std::sync::Arc;

use evidencerag_core::core::{CorpusId, EvidenceRagError};
use evidencerag_core::vector::{
    EmbeddingRecord, InMemoryVectorStore, PersistedVectorStore, VectorStore,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn record(doc: &str, chunk: &str, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord::new(doc, chunk, vector)
}

fn sample_records() -> Vec<EmbeddingRecord> {
    vec![
        record("doc-a", "doc-a::chunk_0", vec![1.0, 0.0, 0.0]),
        record("doc-a", "doc-a::chunk_1", vec![0.8, 0.6, 0.0]),
        record("doc-b", "doc-b::chunk_0", vec![0.0, 1.0, 0.0]),
        record("doc-c", "doc-c::chunk_0", vec![0.0, 0.0, 1.0]),
    ]
}

#[test]
fn test_backends_rank_identically() {
    init_tracing();
    let corpus = CorpusId::new("corpus");
    let records = sample_records();

    let memory = InMemoryVectorStore::new(true);
    memory.index(&corpus, &records).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let persisted = PersistedVectorStore::new(dir.path(), true).unwrap();
    persisted.index(&corpus, &records).unwrap();

    let query = vec![0.9, 0.1, 0.0];
    let from_memory = memory.search(&corpus, &query, 4).unwrap();
    let from_disk = persisted.search(&corpus, &query, 4).unwrap();

    assert_eq!(from_memory.len(), from_disk.len());
    for (a, b) in from_memory.iter().zip(from_disk.iter()) {
        assert_eq!(a.document_id, b.document_id);
        assert_eq!(a.chunk_id, b.chunk_id);
        assert!((a.score - b.score).abs() < 1e-6);
    }
}

#[test]
fn test_persisted_index_survives_reopen() {
    init_tracing();
    let corpus = CorpusId::new("corpus");
    let dir = tempfile::tempdir().unwrap();

    {
        let store = PersistedVectorStore::new(dir.path(), true).unwrap();
        store.index(&corpus, &sample_records()).unwrap();
    }

    let reopened = PersistedVectorStore::new(dir.path(), true).unwrap();
    let hits = reopened.search(&corpus, &[1.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(hits[0].chunk_id.0, "doc-a::chunk_0");
    assert!(hits[0].score > hits[1].score);
}

#[test]
fn test_persisted_appends_across_restarts() {
    init_tracing();
    let corpus = CorpusId::new("corpus");
    let dir = tempfile::tempdir().unwrap();

    {
        let store = PersistedVectorStore::new(dir.path(), true).unwrap();
        store
            .index(&corpus, &[record("doc-a", "doc-a::chunk_0", vec![1.0, 0.0])])
            .unwrap();
    }

    let reopened = PersistedVectorStore::new(dir.path(), true).unwrap();
    reopened
        .index(&corpus, &[record("doc-b", "doc-b::chunk_0", vec![0.0, 1.0])])
        .unwrap();

    let hits = reopened.search(&corpus, &[0.0, 1.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].document_id.0, "doc-b");
}

#[test]
fn test_duplicate_key_rejected_by_both_backends() {
    init_tracing();
    let corpus = CorpusId::new("corpus");
    let duplicate = record("doc-a", "doc-a::chunk_0", vec![0.5, 0.5]);

    let dir = tempfile::tempdir().unwrap();
    let stores: Vec<Arc<dyn VectorStore>> = vec![
        Arc::new(InMemoryVectorStore::new(true)),
        Arc::new(PersistedVectorStore::new(dir.path(), true).unwrap()),
    ];

    for store in stores {
        store.index(&corpus, std::slice::from_ref(&duplicate)).unwrap();
        let err = store
            .index(&corpus, std::slice::from_ref(&duplicate))
            .unwrap_err();
        assert!(matches!(err, EvidenceRagError::AlreadyExists { .. }));
    }
}

#[test]
fn test_dimension_mismatch_rejected() {
    init_tracing();
    let corpus = CorpusId::new("corpus");
    let store = InMemoryVectorStore::new(false);
    store
        .index(&corpus, &[record("doc-a", "doc-a::chunk_0", vec![1.0, 0.0, 0.0])])
        .unwrap();

    let err = store
        .index(&corpus, &[record("doc-b", "doc-b::chunk_0", vec![1.0, 0.0])])
        .unwrap_err();
    assert!(matches!(err, EvidenceRagError::DimensionMismatch { .. }));

    let err = store.search(&corpus, &[1.0], 1).unwrap_err();
    assert!(matches!(err, EvidenceRagError::DimensionMismatch { .. }));
}

#[test]
fn test_missing_manifest_is_data_corruption() {
    init_tracing();
    let corpus = CorpusId::new("corpus");
    let dir = tempfile::tempdir().unwrap();

    {
        let store = PersistedVectorStore::new(dir.path(), true).unwrap();
        store.index(&corpus, &sample_records()).unwrap();
    }
    std::fs::remove_file(dir.path().join("corpus.manifest.json")).unwrap();

    let reopened = PersistedVectorStore::new(dir.path(), true).unwrap();
    let err = reopened.search(&corpus, &[1.0, 0.0, 0.0], 1).unwrap_err();
    assert!(matches!(err, EvidenceRagError::DataCorruption { .. }));
}

#[test]
fn test_truncated_index_file_is_data_corruption() {
    init_tracing();
    let corpus = CorpusId::new("corpus");
    let dir = tempfile::tempdir().unwrap();

    {
        let store = PersistedVectorStore::new(dir.path(), true).unwrap();
        store.index(&corpus, &sample_records()).unwrap();
    }
    let index_path = dir.path().join("corpus.index");
    let bytes = std::fs::read(&index_path).unwrap();
    std::fs::write(&index_path, &bytes[..bytes.len() - 4]).unwrap();

    let reopened = PersistedVectorStore::new(dir.path(), true).unwrap();
    let err = reopened.search(&corpus, &[1.0, 0.0, 0.0], 1).unwrap_err();
    assert!(matches!(err, EvidenceRagError::DataCorruption { .. }));
}

#[test]
fn test_unknown_corpus_searches_empty() {
    init_tracing();
    let memory = InMemoryVectorStore::new(true);
    let hits = memory.search(&CorpusId::new("ghost"), &[1.0, 0.0], 5).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn test_zero_query_vector_rejected_when_normalizing() {
    init_tracing();
    let corpus = CorpusId::new("corpus");
    let store = InMemoryVectorStore::new(true);
    store
        .index(&corpus, &[record("doc-a", "doc-a::chunk_0", vec![1.0, 0.0])])
        .unwrap();

    let err = store.search(&corpus, &[0.0, 0.0], 1).unwrap_err();
    assert!(matches!(err, EvidenceRagError::VectorSearch { .. }));
}
