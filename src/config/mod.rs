//! Configuration for the retrieval stack.
//!
//! Plain serde structs with sensible defaults, loadable from TOML.
//! Every section is optional in the file; absent sections take their
//! defaults, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{EvidenceRagError, Result};
use crate::search::{SearchOptions, DEFAULT_B, DEFAULT_K1};
use crate::vector::{InMemoryVectorStore, PersistedVectorStore, VectorStore};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bm25: Bm25Config,
    pub vector: VectorConfig,
    pub hybrid: HybridConfig,
    pub retrieval: RetrievalConfig,
}

/// BM25 ranking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// Term-frequency saturation
    pub k1: f32,
    /// Length normalization strength
    pub b: f32,
    /// Drop stopwords during indexing and querying
    pub remove_stopwords: bool,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            remove_stopwords: false,
        }
    }
}

/// Which vector backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    /// Volatile, rebuilt on restart
    Memory,
    /// Flushed to disk per corpus, reloaded lazily
    Persisted,
}

/// Vector search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub backend: VectorBackend,
    /// L2-normalize vectors at index and query time (inner product
    /// becomes cosine similarity)
    pub normalize: bool,
    /// Root directory for the persisted backend's index files
    pub data_dir: PathBuf,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            normalize: true,
            data_dir: PathBuf::from("data/vectors"),
        }
    }
}

impl VectorConfig {
    /// Construct the configured backend.
    pub fn build_store(&self) -> Result<Arc<dyn VectorStore>> {
        Ok(match self.backend {
            VectorBackend::Memory => Arc::new(InMemoryVectorStore::new(self.normalize)),
            VectorBackend::Persisted => {
                Arc::new(PersistedVectorStore::new(&self.data_dir, self.normalize)?)
            }
        })
    }
}

/// Hybrid fusion weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub w_bm25: f32,
    pub w_vector: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            w_bm25: 0.5,
            w_vector: 0.5,
        }
    }
}

/// Result-shaping knobs shared by plain and graph-guided retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Final result count
    pub k: usize,
    /// BM25 candidate depth before fusion
    pub k_bm25: usize,
    /// Vector candidate depth before fusion
    pub k_vector: usize,
    /// Excerpt length in characters
    pub excerpt_length: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let defaults = SearchOptions::default();
        Self {
            k: defaults.k,
            k_bm25: defaults.k_bm25,
            k_vector: defaults.k_vector,
            excerpt_length: defaults.excerpt_length,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&raw).map_err(|e| EvidenceRagError::Config {
            message: format!("invalid config {}: {}", path.as_ref().display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter values the ranking math cannot take.
    pub fn validate(&self) -> Result<()> {
        if self.bm25.k1 <= 0.0 {
            return Err(EvidenceRagError::Config {
                message: format!("bm25.k1 must be positive, got {}", self.bm25.k1),
            });
        }
        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(EvidenceRagError::Config {
                message: format!("bm25.b must be in [0, 1], got {}", self.bm25.b),
            });
        }
        if self.hybrid.w_bm25 < 0.0 || self.hybrid.w_vector < 0.0 {
            return Err(EvidenceRagError::Config {
                message: "hybrid weights must be non-negative".to_string(),
            });
        }
        if self.hybrid.w_bm25 + self.hybrid.w_vector == 0.0 {
            return Err(EvidenceRagError::Config {
                message: "at least one hybrid weight must be positive".to_string(),
            });
        }
        if self.retrieval.k == 0 {
            return Err(EvidenceRagError::Config {
                message: "retrieval.k must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Search options derived from this configuration.
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            k: self.retrieval.k,
            k_bm25: self.retrieval.k_bm25,
            k_vector: self.retrieval.k_vector,
            w_bm25: self.hybrid.w_bm25,
            w_vector: self.hybrid.w_vector,
            excerpt_length: self.retrieval.excerpt_length,
        }
    }
}
