use anyhow::Result;
use async_trait::async_trait;
use evalgate_types::{ScoreResult, TestCase};

/// A pluggable scoring capability.
///
/// `evaluate` reads the test case and produces one [`ScoreResult`]. A
/// missing precondition (no expected output, no tool record) is handled by
/// the scorer itself via [`ScoreResult::skipped`] — `Err` is reserved for
/// the scorer genuinely failing to score, e.g. a judge backend outage.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;
    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult>;
}
