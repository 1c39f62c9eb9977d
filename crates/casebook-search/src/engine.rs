//! Retrieval engine
//!
//! Embeds a query, scores it against every stored vector with a dot product
//! (cosine similarity, since both sides are unit length) and returns the top
//! matches. The scan is brute force over the whole matrix.
//!
//! The engine can only be constructed from a loaded [`Index`], so there is
//! no way to search before the index is ready.

use crate::embeddings::{dot, ensure_unit_vector, SharedEmbeddingProvider};
use crate::error::{Error, Result};
use crate::store::{EmbeddingMatrix, Index, IndexRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Smallest number of matches a search returns (for a non-empty index)
pub const MIN_TOP_K: usize = 1;
/// Largest number of matches a search returns
pub const MAX_TOP_K: usize = 10;

/// Clamp a requested match count into `[MIN_TOP_K, MAX_TOP_K]`
pub fn effective_top_k(requested: i64) -> usize {
    requested.clamp(MIN_TOP_K as i64, MAX_TOP_K as i64) as usize
}

/// Remediation steps bundled with a match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendedNext {
    /// Questions to ask first
    pub triage_questions: Vec<String>,
    /// Evidence worth collecting
    pub evidence_to_collect: Vec<String>,
    /// Fix procedure
    pub resolution_steps: Vec<String>,
}

/// A ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Case identifier
    pub id: String,
    /// Case title
    pub title: Option<String>,
    /// Cosine similarity with the query, in [-1, 1]
    pub score: f32,
    /// Origin tags
    pub origin: Vec<String>,
    /// Layer tags
    pub layer: Vec<String>,
    /// Owning team
    pub owner_team: Option<String>,
    /// Severity as authored
    pub severity: Option<Value>,
    /// Problem description
    pub problem_summary: String,
    /// Reported symptoms
    pub user_symptoms: Vec<String>,
    /// Root causes as authored
    pub root_causes: Vec<Value>,
    /// What to do next
    pub recommended_next: RecommendedNext,
}

impl Match {
    /// Shape an index record into a response match
    pub fn from_record(record: &IndexRecord, score: f32) -> Self {
        let case = &record.payload;
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            score,
            origin: record.origin.clone(),
            layer: record.layer.clone(),
            owner_team: record.owner_team.clone(),
            severity: record.severity.clone(),
            problem_summary: case.problem_summary.clone().unwrap_or_default(),
            user_symptoms: case.user_symptoms.clone(),
            root_causes: case.root_causes.clone(),
            recommended_next: RecommendedNext {
                triage_questions: case.triage_questions.clone(),
                evidence_to_collect: case.evidence_to_collect.clone(),
                resolution_steps: case.resolution_steps.clone(),
            },
        }
    }
}

/// Score every row against `query` and return the best `k` as `(row, score)`.
///
/// Rows are ordered by descending score; equal scores keep index order.
pub fn rank(embeddings: &EmbeddingMatrix, query: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = embeddings
        .iter_rows()
        .enumerate()
        .map(|(i, row)| (i, dot(query, row)))
        .collect();
    // Scores are finite (rows and query are unit vectors). sort_by is stable,
    // so equal scores, including 0.0 and -0.0, keep index order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

/// Read-only search over a loaded index
#[derive(Clone)]
pub struct RetrievalEngine {
    index: Arc<Index>,
    provider: SharedEmbeddingProvider,
    embed_timeout: Option<Duration>,
}

impl RetrievalEngine {
    /// Create an engine over a loaded index
    pub fn new(index: Index, provider: SharedEmbeddingProvider) -> Self {
        Self {
            index: Arc::new(index),
            provider,
            embed_timeout: None,
        }
    }

    /// Bound each query embedding call
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = Some(timeout);
        self
    }

    /// The loaded index
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Model the index was built with, or the provider's model when unknown
    pub fn model(&self) -> &str {
        self.index.model().unwrap_or_else(|| self.provider.model())
    }

    /// Search for the cases most similar to `query`.
    ///
    /// `top_k` is clamped to `[1, 10]`. An empty or whitespace-only query
    /// returns no matches without calling the embedding provider.
    #[instrument(skip(self, query), fields(query_len = query.len(), top_k = top_k))]
    pub async fn search(&self, query: &str, top_k: i64) -> Result<Vec<Match>> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Empty query, skipping embedding");
            return Ok(Vec::new());
        }

        let k = effective_top_k(top_k);
        let query_vector = self.embed_query(query).await?;

        let matches: Vec<Match> = rank(self.index.embeddings(), &query_vector, k)
            .into_iter()
            .map(|(row, score)| Match::from_record(&self.index.records()[row], score))
            .collect();

        debug!("Found {} matches", matches.len());
        Ok(matches)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let call = self.provider.embed(query);
        let vector = match self.embed_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::EmbeddingTimeout(limit))??,
            None => call.await?,
        };

        if vector.len() != self.index.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: self.index.dimensions(),
                actual: vector.len(),
            });
        }
        ensure_unit_vector("query", &vector)?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{l2_normalize, EmbeddingProvider};
    use crate::testing::FixedEmbedder;
    use async_trait::async_trait;
    use casebook_cases::Case;

    fn unit(v: &[f32]) -> Vec<f32> {
        l2_normalize(v.to_vec())
    }

    fn index_of(rows: Vec<(Case, Vec<f32>)>) -> Index {
        let (cases, vectors): (Vec<Case>, Vec<Vec<f32>>) = rows.into_iter().unzip();
        let records = cases.into_iter().map(IndexRecord::from_case).collect();
        Index::new(records, EmbeddingMatrix::from_rows(vectors).unwrap(), None).unwrap()
    }

    fn abc_index() -> Index {
        index_of(vec![
            (Case::new("A"), unit(&[1.0, 0.0, 0.0])),
            (Case::new("B"), unit(&[0.0, 1.0, 0.0])),
            (Case::new("C"), unit(&[0.6, 0.8, 0.0])),
        ])
    }

    fn engine(index: Index, query_vector: Vec<f32>) -> (RetrievalEngine, Arc<FixedEmbedder>) {
        let embedder = Arc::new(FixedEmbedder::new(query_vector));
        (RetrievalEngine::new(index, embedder.clone()), embedder)
    }

    #[test]
    fn test_clamp_law() {
        for requested in [-5i64, 0, 1, 3, 10, 11, 15, i64::MAX, i64::MIN] {
            let expected = requested.min(10).max(1) as usize;
            assert_eq!(effective_top_k(requested), expected, "top_k={requested}");
        }
    }

    #[test]
    fn test_rank_orders_by_score() {
        let index = abc_index();
        let ranked = rank(index.embeddings(), &unit(&[0.0, 1.0, 0.0]), 3);
        let rows: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(rows, vec![1, 2, 0]);
        assert!((ranked[0].1 - 1.0).abs() < 1e-6);
        assert!((ranked[1].1 - 0.8).abs() < 1e-6);
        assert!(ranked[2].1.abs() < 1e-6);
    }

    #[test]
    fn test_rank_ties_keep_index_order() {
        let index = index_of(vec![
            (Case::new("X"), unit(&[1.0, 0.0])),
            (Case::new("Y"), unit(&[0.0, 1.0])),
            (Case::new("Z"), unit(&[1.0, 0.0])),
        ]);
        let ranked = rank(index.embeddings(), &unit(&[1.0, 0.0]), 3);
        let rows: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(rows, vec![0, 2, 1]);
    }

    #[test]
    fn test_rank_signed_zero_scores_tie() {
        let embeddings =
            EmbeddingMatrix::from_rows(vec![vec![-0.0, 1.0], vec![0.0, 1.0]]).unwrap();
        let ranked = rank(&embeddings, &[1.0, -0.0], 2);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1]);
        assert_eq!(ranked[0].1, ranked[1].1);
    }

    #[tokio::test]
    async fn test_exact_vector_ranks_first() {
        let (engine, _) = engine(abc_index(), unit(&[0.0, 1.0, 0.0]));
        let matches = engine.search("vpn", 1).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "B");
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_scores_are_dot_products_in_order() {
        let query = unit(&[0.3, 0.5, 0.2]);
        let index = abc_index();
        let expected: Vec<f32> = index
            .embeddings()
            .iter_rows()
            .map(|row| dot(&query, row))
            .collect();
        let (engine, _) = engine(index, query);

        let matches = engine.search("anything", 10).await.unwrap();
        assert_eq!(matches.len(), 3);
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for m in &matches {
            let row = ["A", "B", "C"].iter().position(|id| *id == m.id).unwrap();
            assert!((m.score - expected[row]).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_top_k_clamped_to_available_cases() {
        let (engine, _) = engine(abc_index(), unit(&[1.0, 0.0, 0.0]));
        assert_eq!(engine.search("q", 15).await.unwrap().len(), 3);
        assert_eq!(engine.search("q", 0).await.unwrap().len(), 1);
        assert_eq!(engine.search("q", -3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_top_k_caps_at_ten() {
        let rows = (0..12)
            .map(|i| (Case::new(format!("CASE-{i:02}")), unit(&[1.0, i as f32])))
            .collect();
        let (engine, _) = engine(index_of(rows), unit(&[1.0, 0.0]));
        assert_eq!(engine.search("q", 15).await.unwrap().len(), MAX_TOP_K);
    }

    #[tokio::test]
    async fn test_empty_query_skips_provider() {
        let (engine, embedder) = engine(abc_index(), unit(&[1.0, 0.0, 0.0]));
        assert!(engine.search("", 3).await.unwrap().is_empty());
        assert!(engine.search("   \n\t", 3).await.unwrap().is_empty());
        assert!(embedder.seen().is_empty());
    }

    #[tokio::test]
    async fn test_query_is_trimmed_and_embedded_once() {
        let (engine, embedder) = engine(abc_index(), unit(&[1.0, 0.0, 0.0]));
        engine.search("  printer jam  ", 2).await.unwrap();
        assert_eq!(embedder.seen(), vec!["printer jam".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_fields_render_empty() {
        let case: Case =
            serde_yaml::from_str("id: SPARSE\ntitle: sparse case\nuser_symptoms: [slow]\n")
                .unwrap();
        let index = index_of(vec![(case, unit(&[1.0, 0.0]))]);
        let (engine, _) = engine(index, unit(&[1.0, 0.0]));

        let matches = engine.search("slow", 1).await.unwrap();
        let m = &matches[0];
        assert!(m.root_causes.is_empty());
        assert!(m.recommended_next.triage_questions.is_empty());
        assert_eq!(m.user_symptoms, vec!["slow"]);

        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["root_causes"], serde_json::json!([]));
        assert_eq!(
            json["recommended_next"]["triage_questions"],
            serde_json::json!([])
        );
        assert_eq!(json["problem_summary"], "");
    }

    #[tokio::test]
    async fn test_unnormalized_query_is_rejected() {
        let (engine, _) = engine(abc_index(), vec![2.0, 0.0, 0.0]);
        let err = engine.search("q", 1).await.unwrap_err();
        assert!(matches!(err, Error::NotNormalized { .. }));
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let (engine, _) = engine(abc_index(), unit(&[1.0, 0.0]));
        let err = engine.search("q", 1).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let engine = RetrievalEngine::new(abc_index(), Arc::new(FixedEmbedder::failing()));
        let err = engine.search("q", 1).await.unwrap_err();
        assert!(err.is_embedding_failure());
    }

    struct StalledEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StalledEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        fn dimensions(&self) -> Option<usize> {
            None
        }

        fn name(&self) -> &str {
            "stalled"
        }

        fn model(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedding_timeout() {
        let engine = RetrievalEngine::new(abc_index(), Arc::new(StalledEmbedder))
            .with_embed_timeout(Duration::from_secs(2));
        let err = engine.search("q", 1).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingTimeout(_)));
    }

    #[tokio::test]
    async fn test_concurrent_searches_share_index() {
        let (engine, embedder) = engine(abc_index(), unit(&[0.0, 1.0, 0.0]));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.search(&format!("query {i}"), 1).await })
            })
            .collect();

        for handle in handles {
            let matches = handle.await.unwrap().unwrap();
            assert_eq!(matches[0].id, "B");
        }
        assert_eq!(embedder.seen().len(), 8);
    }

    #[test]
    fn test_model_falls_back_to_provider() {
        let (engine, _) = engine(abc_index(), unit(&[1.0, 0.0, 0.0]));
        assert_eq!(engine.model(), "fixed-test");
    }
}
