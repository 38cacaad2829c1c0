use anyhow::Result;
use async_trait::async_trait;

use crate::scorer::Scorer;
use evalgate_types::{ScoreResult, TestCase};

/// String equality between actual and expected output. Both sides are
/// trimmed before comparison; case folding is opt-in.
pub struct ExactMatchScorer {
    case_insensitive: bool,
}

impl ExactMatchScorer {
    /// Creates a case-sensitive exact-match scorer.
    pub fn new() -> Self {
        Self {
            case_insensitive: false,
        }
    }

    /// Creates a case-insensitive exact-match scorer.
    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
        }
    }
}

impl Default for ExactMatchScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scorer for ExactMatchScorer {
    fn name(&self) -> &str {
        "exact_match"
    }

    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult> {
        let Some(expected) = &case.expected_output else {
            return Ok(ScoreResult::skipped(self.name(), "expected_output is not set"));
        };
        let Some(actual) = &case.actual_output else {
            return Ok(ScoreResult::skipped(self.name(), "actual_output is not set"));
        };

        let expected = expected.trim();
        let actual = actual.trim();
        let matches = if self.case_insensitive {
            expected.to_lowercase() == actual.to_lowercase()
        } else {
            expected == actual
        };

        let mut result = ScoreResult::scored(self.name(), if matches { 1.0 } else { 0.0 }, matches);
        if !matches {
            result = result.with_reason(format!("expected '{}', got '{}'", expected, actual));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_exactly() {
        let case = TestCase::new("What is 2+2?")
            .with_expected_output("4")
            .with_actual_output("4");
        let score = ExactMatchScorer::new().evaluate(&case).await.unwrap();
        assert_eq!(score.score, 1.0);
        assert!(score.passed);
    }

    #[tokio::test]
    async fn trims_whitespace() {
        let case = TestCase::new("What is 2+2?")
            .with_expected_output("4")
            .with_actual_output(" 4 ");
        let score = ExactMatchScorer::new().evaluate(&case).await.unwrap();
        assert_eq!(score.score, 1.0);
        assert!(score.passed);
    }

    #[tokio::test]
    async fn mismatch_scores_zero_with_reason() {
        let case = TestCase::new("What is 2+2?")
            .with_expected_output("4")
            .with_actual_output("four");
        let score = ExactMatchScorer::new().evaluate(&case).await.unwrap();
        assert_eq!(score.score, 0.0);
        assert!(!score.passed);
        assert!(score.reason.unwrap().contains("four"));
    }

    #[tokio::test]
    async fn optional_case_fold() {
        let case = TestCase::new("capital?")
            .with_expected_output("Paris")
            .with_actual_output("paris");

        let strict = ExactMatchScorer::new().evaluate(&case).await.unwrap();
        assert_eq!(strict.score, 0.0);

        let folded = ExactMatchScorer::case_insensitive()
            .evaluate(&case)
            .await
            .unwrap();
        assert_eq!(folded.score, 1.0);
    }

    #[tokio::test]
    async fn skips_without_expected_output() {
        let case = TestCase::new("q").with_actual_output("a");
        let score = ExactMatchScorer::new().evaluate(&case).await.unwrap();
        assert_eq!(score.score, 0.0);
        assert!(!score.passed);
        assert!(score.error.is_none());
        assert!(score.reason.unwrap().contains("expected_output"));
    }
}
