//! Persisted index: a single JSON file of parallel embedding/metadata
//! arrays, wrapped so the storage backend can change without touching the
//! builder or retriever.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::builder;
use crate::chunker::Chunker;
use crate::document;
use crate::error::{IndexError, Result};
use lumi_llm::provider::LlmProvider;

/// Metadata for one indexed chunk. Field names are part of the persisted
/// format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub doc_id: String,
    pub text: String,
}

/// Point-in-time snapshot of the embedded corpus.
///
/// `embeddings[i]` and `metas[i]` always describe the same chunk. The
/// index is read-only once built; a rebuild replaces the file wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Embedding model the vectors were produced with. Absent in files
    /// written before the field existed; those skip model validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metas: Vec<ChunkMeta>,
}

impl Index {
    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.embeddings.len() != self.metas.len() {
            return Err(IndexError::Corrupt(format!(
                "{} embeddings but {} metas",
                self.embeddings.len(),
                self.metas.len()
            )));
        }
        if let Some(first) = self.embeddings.first() {
            let width = first.len();
            if let Some(bad) = self.embeddings.iter().position(|v| v.len() != width) {
                return Err(IndexError::Corrupt(format!(
                    "vector {bad} has {} dimensions, expected {width}",
                    self.embeddings[bad].len()
                )));
            }
        }
        Ok(())
    }
}

/// Load and validate a persisted index.
///
/// # Errors
///
/// Returns `NotFound` when the file does not exist, `Corrupt` when the
/// parallel arrays disagree, and IO/JSON errors otherwise.
pub async fn load(path: &Path) -> Result<Index> {
    if !tokio::fs::try_exists(path).await? {
        return Err(IndexError::NotFound(path.to_path_buf()));
    }
    let content = tokio::fs::read_to_string(path).await?;
    let index: Index = serde_json::from_str(&content)?;
    index.validate()?;
    tracing::debug!(path = %path.display(), entries = index.len(), "index loaded");
    Ok(index)
}

/// Persist an index atomically: write a sibling temp file, then rename.
///
/// # Errors
///
/// Returns an error if serialization or the filesystem operations fail.
pub async fn save(index: &Index, path: &Path) -> Result<()> {
    let json = serde_json::to_string(index)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Load the index at `path`, building it from `data_dir` first when the
/// file is absent. Idempotent; there is no staleness check against the
/// source documents — an explicit reindex is the only refresh mechanism.
///
/// # Errors
///
/// Returns `EmptyCorpus` when a build finds no documents or no chunks,
/// plus any build or load failure.
pub async fn ensure<P: LlmProvider>(
    data_dir: &Path,
    path: &Path,
    chunker: &Chunker,
    provider: &P,
) -> Result<Index> {
    if tokio::fs::try_exists(path).await? {
        return load(path).await;
    }

    tracing::info!(
        index = %path.display(),
        data_dir = %data_dir.display(),
        "index missing, building"
    );
    let documents = document::load_documents(data_dir).await?;
    if documents.is_empty() {
        return Err(IndexError::EmptyCorpus);
    }
    builder::build_index(&documents, chunker, provider, path).await?;
    load(path).await
}
