use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::scorer::Scorer;
use evalgate_types::{ScoreResult, TestCase};

/// Wraps a user-supplied pure function as a scorer.
pub struct FunctionScorer {
    name: String,
    threshold: f64,
    f: Arc<dyn Fn(&TestCase) -> f64 + Send + Sync>,
}

impl FunctionScorer {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&TestCase) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            threshold: 0.5,
            f: Arc::new(f),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

#[async_trait]
impl Scorer for FunctionScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult> {
        let score = (self.f)(case);
        Ok(ScoreResult::scored(
            self.name(),
            score,
            score >= self.threshold,
        ))
    }
}
