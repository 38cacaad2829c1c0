use anyhow::Result;
use async_trait::async_trait;

use crate::scorer::Scorer;
use evalgate_types::{ScoreResult, TestCase};

/// Order-sensitive tool-call scoring.
///
/// Credits tools called in the expected relative order while tolerating
/// extra interleaved calls: the score is the longest common subsequence of
/// `expected_tools` and `tools_called` divided by the expected count. A run
/// only passes on a full, order-preserving, exact-count match — a superset
/// of correct calls in the right order still scores 1.0 but does not pass,
/// so spurious calls stay visible.
pub struct ToolCorrectnessScorer;

#[async_trait]
impl Scorer for ToolCorrectnessScorer {
    fn name(&self) -> &str {
        "tool_correctness"
    }

    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult> {
        let Some(expected) = &case.expected_tools else {
            return Ok(ScoreResult::skipped(self.name(), "expected_tools is not set"));
        };
        if expected.is_empty() {
            return Ok(ScoreResult::skipped(self.name(), "expected_tools is empty"));
        }
        let Some(actual) = &case.tools_called else {
            return Ok(ScoreResult::skipped(self.name(), "tools_called is not set"));
        };

        let alignment = lcs_alignment(expected, actual);
        let score = (alignment.len() as f64 / expected.len() as f64).clamp(0.0, 1.0);
        let passed = alignment.len() == expected.len() && actual.len() == expected.len();

        let mut aligned_expected = vec![false; expected.len()];
        let mut aligned_actual = vec![false; actual.len()];
        for &(i, j) in &alignment {
            aligned_expected[i] = true;
            aligned_actual[j] = true;
        }
        let missing: Vec<&str> = expected
            .iter()
            .enumerate()
            .filter(|(i, _)| !aligned_expected[*i])
            .map(|(_, t)| t.as_str())
            .collect();
        let extra: Vec<&str> = actual
            .iter()
            .enumerate()
            .filter(|(j, _)| !aligned_actual[*j])
            .map(|(_, t)| t.as_str())
            .collect();

        let mut reason = format!(
            "matched {}/{} tools in order",
            alignment.len(),
            expected.len()
        );
        if !missing.is_empty() {
            reason.push_str(&format!("; missing: {}", missing.join(", ")));
        }
        if !extra.is_empty() {
            reason.push_str(&format!("; extra: {}", extra.join(", ")));
        }

        Ok(ScoreResult::scored(self.name(), score, passed).with_reason(reason))
    }
}

/// One maximal common subsequence as (expected_idx, actual_idx) pairs.
/// When several alignments of equal length exist, only the length is
/// observable; the backtrack picks one.
fn lcs_alignment(expected: &[String], actual: &[String]) -> Vec<(usize, usize)> {
    let n = expected.len();
    let m = actual.len();
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if expected[i] == actual[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(dp[0][0]);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if expected[i] == actual[j] && dp[i][j] == dp[i + 1][j + 1] + 1 {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}
