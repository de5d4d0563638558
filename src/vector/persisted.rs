//! Durable vector backend: per-corpus index file + key manifest.
//!
//! Each corpus is stored as two files under the root directory:
//!
//! - `<corpus>.index` — row-major little-endian f32 vectors (opaque,
//!   backend-specific format)
//! - `<corpus>.manifest.json` — `{dim, keys}` where row `i` of the index
//!   corresponds to `keys[i]`
//!
//! Both files are rewritten after every successful [`index`] call. A
//! crash between the two writes leaves a detectable mismatch: loading
//! verifies the pairing (both files present, byte length consistent
//! with `keys.len() * dim`) and fails with `DataCorruption` instead of
//! silently treating the corpus as empty.
//!
//! [`index`]: crate::vector::VectorStore::index

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::core::{ChunkId, CorpusId, DocumentId, EvidenceRagError, Result};

use super::{dot, prepare, top_k, EmbeddingRecord, VectorHit, VectorStore};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Manifest {
    dim: usize,
    keys: Vec<(String, String)>,
}

#[derive(Debug)]
struct PersistedCorpus {
    dim: usize,
    vectors: Vec<Vec<f32>>,
    keys: Vec<(DocumentId, ChunkId)>,
    key_index: HashMap<(DocumentId, ChunkId), usize>,
    index_path: PathBuf,
    manifest_path: PathBuf,
}

impl PersistedCorpus {
    fn persist(&self) -> Result<()> {
        let mut bytes = Vec::with_capacity(self.vectors.len() * self.dim * 4);
        for vector in &self.vectors {
            for value in vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        fs::write(&self.index_path, bytes)?;

        let manifest = Manifest {
            dim: self.dim,
            keys: self
                .keys
                .iter()
                .map(|(d, c)| (d.0.clone(), c.0.clone()))
                .collect(),
        };
        fs::write(&self.manifest_path, serde_json::to_vec(&manifest)?)?;
        Ok(())
    }
}

/// Durable [`VectorStore`] backend persisting each corpus to disk.
///
/// Corpora are loaded lazily on first use and flushed after every
/// successful insert, so the store survives process restarts.
pub struct PersistedVectorStore {
    root_dir: PathBuf,
    normalize: bool,
    corpora: RwLock<HashMap<CorpusId, PersistedCorpus>>,
}

impl PersistedVectorStore {
    /// Open a store rooted at `root_dir`, creating the directory if
    /// needed.
    pub fn new(root_dir: impl AsRef<Path>, normalize: bool) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root_dir)?;
        Ok(Self {
            root_dir,
            normalize,
            corpora: RwLock::new(HashMap::new()),
        })
    }

    fn paths_for(&self, corpus_id: &CorpusId) -> (PathBuf, PathBuf) {
        (
            self.root_dir.join(format!("{}.index", corpus_id.0)),
            self.root_dir.join(format!("{}.manifest.json", corpus_id.0)),
        )
    }

    /// Load a corpus from disk if its files exist.
    ///
    /// A manifest without an index file (or the reverse), or an index
    /// whose byte length disagrees with the manifest, is corruption —
    /// never an empty corpus.
    fn load_from_disk(&self, corpus_id: &CorpusId) -> Result<Option<PersistedCorpus>> {
        let (index_path, manifest_path) = self.paths_for(corpus_id);
        let have_index = index_path.exists();
        let have_manifest = manifest_path.exists();

        if !have_index && !have_manifest {
            return Ok(None);
        }
        if have_index != have_manifest {
            return Err(EvidenceRagError::DataCorruption {
                message: format!(
                    "corpus {corpus_id}: index/manifest pairing incomplete (index: {have_index}, manifest: {have_manifest})"
                ),
            });
        }

        let manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path)?)?;
        if manifest.dim == 0 {
            return Err(EvidenceRagError::DataCorruption {
                message: format!("corpus {corpus_id}: manifest declares zero dimension"),
            });
        }

        let bytes = fs::read(&index_path)?;
        let expected_len = manifest.keys.len() * manifest.dim * 4;
        if bytes.len() != expected_len {
            return Err(EvidenceRagError::DataCorruption {
                message: format!(
                    "corpus {corpus_id}: index file is {} bytes, manifest implies {}",
                    bytes.len(),
                    expected_len
                ),
            });
        }

        let mut values = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        let mut vectors = Vec::with_capacity(manifest.keys.len());
        for _ in 0..manifest.keys.len() {
            vectors.push((&mut values).take(manifest.dim).collect::<Vec<f32>>());
        }

        let keys: Vec<(DocumentId, ChunkId)> = manifest
            .keys
            .into_iter()
            .map(|(d, c)| (DocumentId(d), ChunkId(c)))
            .collect();
        let key_index = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();

        tracing::debug!(
            corpus = %corpus_id,
            rows = keys.len(),
            dim = manifest.dim,
            "loaded persisted corpus"
        );

        Ok(Some(PersistedCorpus {
            dim: manifest.dim,
            vectors,
            keys,
            key_index,
            index_path,
            manifest_path,
        }))
    }

    /// Ensure `corpus_id` is resident in `corpora`, loading from disk if
    /// present. Returns whether the corpus exists at all.
    fn ensure_loaded(
        &self,
        corpora: &mut HashMap<CorpusId, PersistedCorpus>,
        corpus_id: &CorpusId,
    ) -> Result<bool> {
        if corpora.contains_key(corpus_id) {
            return Ok(true);
        }
        match self.load_from_disk(corpus_id)? {
            Some(corpus) => {
                corpora.insert(corpus_id.clone(), corpus);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl VectorStore for PersistedVectorStore {
    fn index(&self, corpus_id: &CorpusId, items: &[EmbeddingRecord]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let first = &items[0].vector;
        if first.is_empty() {
            return Err(EvidenceRagError::VectorSearch {
                message: "embedding vectors cannot be empty".to_string(),
            });
        }

        let mut corpora = self.corpora.write();
        if !self.ensure_loaded(&mut corpora, corpus_id)? {
            let (index_path, manifest_path) = self.paths_for(corpus_id);
            corpora.insert(
                corpus_id.clone(),
                PersistedCorpus {
                    dim: first.len(),
                    vectors: Vec::new(),
                    keys: Vec::new(),
                    key_index: HashMap::new(),
                    index_path,
                    manifest_path,
                },
            );
        }
        let corpus = corpora
            .get_mut(corpus_id)
            .expect("corpus inserted or loaded above");

        for item in items {
            let key = (item.document_id.clone(), item.chunk_id.clone());
            if corpus.key_index.contains_key(&key) {
                return Err(EvidenceRagError::AlreadyExists {
                    resource: "embedding".to_string(),
                    id: format!("{}/{}::{}", corpus_id, key.0, key.1),
                });
            }
            let processed = prepare(&item.vector, corpus.dim, self.normalize)?;
            corpus.vectors.push(processed);
            let row = corpus.vectors.len() - 1;
            corpus.keys.push(key.clone());
            corpus.key_index.insert(key, row);
        }

        // Flush both files so the insert survives a restart
        corpus.persist()?;

        tracing::debug!(
            corpus = %corpus_id,
            added = items.len(),
            total = corpus.vectors.len(),
            "indexed embeddings (persisted backend)"
        );
        Ok(())
    }

    fn search(
        &self,
        corpus_id: &CorpusId,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorHit>> {
        // Fast path when the corpus is already resident
        {
            let corpora = self.corpora.read();
            if let Some(corpus) = corpora.get(corpus_id) {
                return search_corpus(corpus, query_vector, k, self.normalize);
            }
        }

        let mut corpora = self.corpora.write();
        if !self.ensure_loaded(&mut corpora, corpus_id)? {
            return Ok(Vec::new());
        }
        let corpus = corpora.get(corpus_id).expect("loaded above");
        search_corpus(corpus, query_vector, k, self.normalize)
    }
}

fn search_corpus(
    corpus: &PersistedCorpus,
    query_vector: &[f32],
    k: usize,
    normalize: bool,
) -> Result<Vec<VectorHit>> {
    if corpus.vectors.is_empty() {
        return Ok(Vec::new());
    }

    let query = prepare(query_vector, corpus.dim, normalize)?;

    let scores: Vec<(usize, f32)> = corpus
        .vectors
        .iter()
        .enumerate()
        .map(|(row, vec)| (row, dot(&query, vec)))
        .collect();

    Ok(top_k(scores, k)
        .into_iter()
        .map(|(row, score)| {
            let (document_id, chunk_id) = corpus.keys[row].clone();
            VectorHit {
                document_id,
                chunk_id,
                score,
            }
        })
        .collect())
}
