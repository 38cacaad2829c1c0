use anyhow::Result;
use async_trait::async_trait;

use crate::scorer::Scorer;
use evalgate_types::{ScoreResult, TestCase};

/// Scores 1.0 when at least one keyword appears in the actual output
/// (case-insensitive substring match).
pub struct ContainsAnyScorer {
    keywords: Vec<String>,
}

impl ContainsAnyScorer {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Scorer for ContainsAnyScorer {
    fn name(&self) -> &str {
        "contains_any"
    }

    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult> {
        let Some(actual) = &case.actual_output else {
            return Ok(ScoreResult::skipped(self.name(), "actual_output is not set"));
        };
        if self.keywords.is_empty() {
            return Ok(ScoreResult::skipped(self.name(), "no keywords configured"));
        }

        let haystack = actual.to_lowercase();
        let found: Vec<&str> = self
            .keywords
            .iter()
            .filter(|kw| haystack.contains(&kw.to_lowercase()))
            .map(String::as_str)
            .collect();

        let hit = !found.is_empty();
        let reason = if hit {
            format!("found keywords: {}", found.join(", "))
        } else {
            format!("none of {} keywords found", self.keywords.len())
        };
        Ok(ScoreResult::scored(self.name(), if hit { 1.0 } else { 0.0 }, hit).with_reason(reason))
    }
}

/// Scores the fraction of keywords present in the actual output; passes
/// only when every keyword is found.
pub struct ContainsAllScorer {
    keywords: Vec<String>,
}

impl ContainsAllScorer {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Scorer for ContainsAllScorer {
    fn name(&self) -> &str {
        "contains_all"
    }

    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult> {
        let Some(actual) = &case.actual_output else {
            return Ok(ScoreResult::skipped(self.name(), "actual_output is not set"));
        };
        if self.keywords.is_empty() {
            return Ok(ScoreResult::skipped(self.name(), "no keywords configured"));
        }

        let haystack = actual.to_lowercase();
        let (found, missing): (Vec<&String>, Vec<&String>) = self
            .keywords
            .iter()
            .partition(|kw| haystack.contains(&kw.to_lowercase()));

        let score = found.len() as f64 / self.keywords.len() as f64;
        let passed = missing.is_empty();
        let reason = if passed {
            format!("all {} keywords found", self.keywords.len())
        } else {
            format!(
                "matched {}/{} keywords; missing: {}",
                found.len(),
                self.keywords.len(),
                missing
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        Ok(ScoreResult::scored(self.name(), score, passed).with_reason(reason))
    }
}
