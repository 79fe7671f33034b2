//! Index construction: chunk the corpus, embed it, persist the result.

use std::path::Path;

use crate::chunker::Chunker;
use crate::document::Document;
use crate::error::{IndexError, Result};
use crate::store::{self, ChunkMeta, Index};
use lumi_llm::provider::LlmProvider;

/// Chunk every document, embed the non-blank chunks through the provider,
/// and write the resulting index to `path` in one atomic step.
///
/// Chunk order is per-document insertion order; `embeddings[i]` and
/// `metas[i]` stay aligned because the provider contract returns exactly
/// one vector per input, in input order. A failed build writes nothing.
///
/// # Errors
///
/// Returns `EmptyCorpus` when no document yields a non-blank chunk, a
/// provider error when a whole embedding call fails, and IO/JSON errors
/// from the final write.
pub async fn build_index<P: LlmProvider>(
    documents: &[Document],
    chunker: &Chunker,
    provider: &P,
    path: &Path,
) -> Result<Index> {
    let mut texts = Vec::new();
    let mut metas = Vec::new();

    for doc in documents {
        let chunks = chunker.chunk(&doc.text)?;
        tracing::debug!(doc = %doc.id, chunks = chunks.len(), "document chunked");
        for chunk in chunks {
            if chunk.trim().is_empty() {
                continue;
            }
            metas.push(ChunkMeta {
                doc_id: doc.id.clone(),
                text: chunk.clone(),
            });
            texts.push(chunk);
        }
    }

    if texts.is_empty() {
        return Err(IndexError::EmptyCorpus);
    }

    tracing::info!(
        chunks = texts.len(),
        documents = documents.len(),
        provider = provider.name(),
        model = provider.embedding_model(),
        "embedding corpus"
    );

    let embeddings = provider.embed_batch(&texts).await?;
    if embeddings.len() != metas.len() {
        return Err(IndexError::Other(format!(
            "provider returned {} vectors for {} chunks",
            embeddings.len(),
            metas.len()
        )));
    }

    let index = Index {
        model: Some(provider.embedding_model().to_owned()),
        embeddings,
        metas,
    };
    store::save(&index, path).await?;
    tracing::info!(path = %path.display(), entries = index.len(), "index saved");

    Ok(index)
}
