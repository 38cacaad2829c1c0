use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::judge::{call_with_retry, Embedder, RetryPolicy};
use crate::scorer::Scorer;
use evalgate_types::{ScoreResult, TestCase};

/// Semantic similarity via an injected embedding capability: embeds the
/// expected and actual outputs and scores their cosine similarity, clamped
/// into [0, 1].
pub struct SimilarityScorer {
    embedder: Arc<dyn Embedder>,
    threshold: f64,
    retry: RetryPolicy,
}

impl SimilarityScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            threshold: 0.8,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Scorer for SimilarityScorer {
    fn name(&self) -> &str {
        "similarity"
    }

    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult> {
        let Some(expected) = &case.expected_output else {
            return Ok(ScoreResult::skipped(self.name(), "expected_output is not set"));
        };
        let Some(actual) = &case.actual_output else {
            return Ok(ScoreResult::skipped(self.name(), "actual_output is not set"));
        };

        let expected_emb = call_with_retry(self.retry, "embedding call", || {
            self.embedder.embed(expected)
        })
        .await?;
        let actual_emb = call_with_retry(self.retry, "embedding call", || {
            self.embedder.embed(actual)
        })
        .await?;

        let similarity =
            cosine_similarity(&expected_emb.vector, &actual_emb.vector).clamp(0.0, 1.0);
        let passed = similarity >= self.threshold;

        Ok(ScoreResult::scored(self.name(), similarity, passed)
            .with_reason(format!("cosine similarity {:.4}", similarity))
            .with_usage(
                expected_emb.tokens_used + actual_emb.tokens_used,
                expected_emb.cost_usd + actual_emb.cost_usd,
            ))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (a_val, b_val) in a.iter().zip(b.iter()) {
        let x = *a_val as f64;
        let y = *b_val as f64;

        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::Embedding;

    /// Maps a few known strings to fixed vectors.
    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            let vector = match text {
                "east" => vec![1.0, 0.0],
                "north" => vec![0.0, 1.0],
                "northeast" => vec![0.7071, 0.7071],
                _ => vec![1.0, 1.0],
            };
            Ok(Embedding {
                vector,
                tokens_used: 5,
                cost_usd: 0.0001,
            })
        }
    }

    fn case(expected: &str, actual: &str) -> TestCase {
        TestCase::new("q")
            .with_expected_output(expected)
            .with_actual_output(actual)
    }

    #[tokio::test]
    async fn identical_texts_score_one() {
        let scorer = SimilarityScorer::new(Arc::new(StubEmbedder));
        let score = scorer.evaluate(&case("east", "east")).await.unwrap();
        assert!((score.score - 1.0).abs() < 1e-6);
        assert!(score.passed);
    }

    #[tokio::test]
    async fn orthogonal_texts_score_zero() {
        let scorer = SimilarityScorer::new(Arc::new(StubEmbedder));
        let score = scorer.evaluate(&case("east", "north")).await.unwrap();
        assert!(score.score.abs() < 1e-6);
        assert!(!score.passed);
    }

    #[tokio::test]
    async fn threshold_separates_near_matches() {
        let scorer = SimilarityScorer::new(Arc::new(StubEmbedder)).with_threshold(0.9);
        let score = scorer.evaluate(&case("east", "northeast")).await.unwrap();
        assert!(score.score > 0.70 && score.score < 0.72);
        assert!(!score.passed);
    }

    #[tokio::test]
    async fn usage_accumulates_both_calls() {
        let scorer = SimilarityScorer::new(Arc::new(StubEmbedder));
        let score = scorer.evaluate(&case("east", "east")).await.unwrap();
        assert_eq!(score.tokens_used, 10);
        assert!((score.cost_usd - 0.0002).abs() < 1e-9);
    }

    #[tokio::test]
    async fn skips_without_expected_output() {
        let scorer = SimilarityScorer::new(Arc::new(StubEmbedder));
        let tc = TestCase::new("q").with_actual_output("east");
        let score = scorer.evaluate(&tc).await.unwrap();
        assert!(score.error.is_none());
        assert!(score.reason.unwrap().contains("expected_output"));
    }

    #[test]
    fn cosine_of_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
