//! Full-scan cosine retrieval over a loaded index.

use crate::error::{IndexError, Result};
use crate::store::{ChunkMeta, Index};
use lumi_llm::provider::LlmProvider;

/// One retrieval hit, highest score first.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub score: f32,
    pub meta: ChunkMeta,
}

/// Normalized dot product in [-1, 1]; defined as 0 when either vector has
/// zero magnitude, so degenerate vectors rank as maximally dissimilar
/// instead of erroring.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Embed the query and rank every stored chunk against it.
///
/// Results are sorted descending by score; ties keep index-storage order
/// (stable sort), so repeated calls over the same index and query vector
/// return the same ranking. At most `top_k` results are returned.
///
/// # Errors
///
/// Fails fast with `ModelMismatch` when the index records a different
/// embedding model than the provider, and with `DimensionMismatch` when
/// the query vector width differs from the stored vectors — similarity is
/// undefined in both cases. Provider failures pass through.
pub async fn retrieve<P: LlmProvider>(
    query: &str,
    index: &Index,
    provider: &P,
    top_k: usize,
) -> Result<Vec<ScoredChunk>> {
    if let Some(ref indexed) = index.model {
        let queried = provider.embedding_model();
        if indexed != queried {
            return Err(IndexError::ModelMismatch {
                indexed: indexed.clone(),
                queried: queried.to_owned(),
            });
        }
    }

    let query_vec = provider
        .embed_batch(&[query.to_owned()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| IndexError::Other("provider returned no query embedding".into()))?;

    if let Some(first) = index.embeddings.first()
        && first.len() != query_vec.len()
    {
        return Err(IndexError::DimensionMismatch {
            indexed: first.len(),
            queried: query_vec.len(),
        });
    }

    let mut scored: Vec<ScoredChunk> = index
        .embeddings
        .iter()
        .zip(&index.metas)
        .map(|(embedding, meta)| ScoredChunk {
            score: cosine_similarity(&query_vec, embedding),
            meta: meta.clone(),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);

    tracing::debug!(query, results = scored.len(), "retrieval complete");
    Ok(scored)
}

/// Render retrieved chunks for injection into a system message.
#[must_use]
pub fn format_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("Source {}:\n{}", i + 1, r.meta.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumi_llm::mock::MockProvider;

    fn meta(doc_id: &str, text: &str) -> ChunkMeta {
        ChunkMeta {
            doc_id: doc_id.into(),
            text: text.into(),
        }
    }

    fn sample_index() -> Index {
        Index {
            model: Some("mock-embedding".into()),
            embeddings: vec![
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0, 0.0],
                vec![0.9, 0.1, 0.0, 0.0],
            ],
            metas: vec![
                meta("a.txt", "first"),
                meta("b.txt", "second"),
                meta("c.txt", "third"),
            ],
        }
    }

    #[test]
    fn cosine_of_vector_with_itself_is_one() {
        let v = vec![0.3, -0.5, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let v = vec![1.0, 2.0, 3.0];
        let zero = vec![0.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn cosine_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn retrieve_ranks_by_similarity() {
        let provider =
            MockProvider::default().with_embedding("query", vec![1.0, 0.0, 0.0, 0.0]);
        let results = retrieve("query", &sample_index(), &provider, 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].meta.doc_id, "a.txt");
        assert_eq!(results[1].meta.doc_id, "c.txt");
        assert_eq!(results[2].meta.doc_id, "b.txt");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn retrieve_respects_top_k() {
        let provider =
            MockProvider::default().with_embedding("query", vec![1.0, 0.0, 0.0, 0.0]);
        let results = retrieve("query", &sample_index(), &provider, 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn retrieve_is_deterministic() {
        let provider =
            MockProvider::default().with_embedding("query", vec![0.5, 0.5, 0.0, 0.0]);
        let index = sample_index();

        let first = retrieve("query", &index, &provider, 3).await.unwrap();
        let second = retrieve("query", &index, &provider, 3).await.unwrap();

        let order = |r: &[ScoredChunk]| r.iter().map(|s| s.meta.doc_id.clone()).collect::<Vec<_>>();
        assert_eq!(order(&first), order(&second));
    }

    #[tokio::test]
    async fn ties_keep_storage_order() {
        let index = Index {
            model: Some("mock-embedding".into()),
            embeddings: vec![
                vec![1.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 0.0],
            ],
            metas: vec![meta("a", "1"), meta("b", "2"), meta("c", "3")],
        };
        let provider = MockProvider::default().with_embedding("q", vec![1.0, 0.0]);

        let results = retrieve("q", &index, &provider, 3).await.unwrap();
        assert_eq!(results[0].meta.doc_id, "a");
        assert_eq!(results[1].meta.doc_id, "b");
        assert_eq!(results[2].meta.doc_id, "c");
    }

    #[tokio::test]
    async fn semantic_scenario_ranks_related_document_first() {
        let index = Index {
            model: Some("mock-embedding".into()),
            embeddings: vec![
                vec![0.9, 0.1, 0.0, 0.0], // solar panels convert sunlight
                vec![0.1, 0.9, 0.0, 0.0], // wind turbines generate electricity
            ],
            metas: vec![
                meta("A", "solar panels convert sunlight"),
                meta("B", "wind turbines generate electricity"),
            ],
        };
        let provider = MockProvider::default()
            .with_embedding("photovoltaic energy", vec![1.0, 0.05, 0.0, 0.0]);

        let results = retrieve("photovoltaic energy", &index, &provider, 2)
            .await
            .unwrap();
        assert_eq!(results[0].meta.doc_id, "A");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn model_mismatch_fails_fast() {
        let provider = MockProvider::default().with_model("other-model");
        let err = retrieve("q", &sample_index(), &provider, 3).await.unwrap_err();
        assert!(matches!(err, IndexError::ModelMismatch { .. }));
    }

    #[tokio::test]
    async fn legacy_index_without_model_skips_validation() {
        let mut index = sample_index();
        index.model = None;
        let provider = MockProvider::default().with_model("whatever");
        let results = retrieve("q", &index, &provider, 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_fails_fast() {
        let provider = MockProvider::default().with_embedding("q", vec![1.0, 0.0]);
        let err = retrieve("q", &sample_index(), &provider, 3).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn empty_index_returns_no_results() {
        let index = Index {
            model: Some("mock-embedding".into()),
            embeddings: vec![],
            metas: vec![],
        };
        let provider = MockProvider::default();
        let results = retrieve("q", &index, &provider, 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn format_context_numbers_sources_from_one() {
        let results = vec![
            ScoredChunk {
                score: 0.9,
                meta: meta("a", "solar facts"),
            },
            ScoredChunk {
                score: 0.5,
                meta: meta("b", "wind facts"),
            },
        ];
        let context = format_context(&results);
        assert_eq!(context, "Source 1:\nsolar facts\n\nSource 2:\nwind facts");
    }

    #[test]
    fn format_context_empty_results() {
        assert_eq!(format_context(&[]), "");
    }
}
