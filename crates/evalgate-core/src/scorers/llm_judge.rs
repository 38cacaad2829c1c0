use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::judge::{call_with_retry, Judge, RetryPolicy};
use crate::scorer::Scorer;
use evalgate_types::{ScoreResult, TestCase};

/// Scores output quality against free-form criteria by asking an injected
/// judge capability for a 0.0–1.0 verdict with a rationale.
///
/// A judge response that cannot be parsed is an error, not a 0.0 score —
/// a broken judge must stay distinguishable from a genuinely bad output.
pub struct LLMJudgeScorer {
    name: String,
    criteria: String,
    judge: Arc<dyn Judge>,
    threshold: f64,
    retry: RetryPolicy,
}

impl LLMJudgeScorer {
    pub fn new(
        name: impl Into<String>,
        criteria: impl Into<String>,
        judge: Arc<dyn Judge>,
    ) -> Self {
        Self {
            name: name.into(),
            criteria: criteria.into(),
            judge,
            threshold: 0.5,
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

    fn build_prompt(&self, case: &TestCase, actual: &str) -> String {
        let expected = case.expected_output.as_deref().unwrap_or("none provided");
        format!(
            "You are an evaluation judge. Score the output from 0.0 to 1.0.\n\n\
             Criteria: {}\n\
             Input: {}\n\
             Expected output: {}\n\
             Actual output: {}\n\n\
             Return ONLY valid JSON: {{\"score\": <float 0.0-1.0>, \"reason\": \"<explanation>\"}}",
            self.criteria, case.input, expected, actual
        )
    }
}

#[async_trait]
impl Scorer for LLMJudgeScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult> {
        let Some(actual) = &case.actual_output else {
            return Ok(ScoreResult::skipped(self.name(), "actual_output is not set"));
        };

        let prompt = self.build_prompt(case, actual);
        let response =
            call_with_retry(self.retry, "judge call", || self.judge.complete(&prompt)).await?;

        let (score, reason) = parse_verdict(&response.content)?;
        let score = score.clamp(0.0, 1.0);

        Ok(ScoreResult::scored(self.name(), score, score >= self.threshold)
            .with_reason(reason)
            .with_usage(response.tokens_used, response.cost_usd))
    }
}

/// Strip markdown code fences some judge models wrap their JSON in.
pub(crate) fn strip_fences(content: &str) -> Result<String> {
    let cleaned = content.trim();
    if !cleaned.starts_with("```") {
        return Ok(cleaned.to_string());
    }
    let open = Regex::new(r"^```[a-zA-Z]*\n?")?;
    let close = Regex::new(r"```\s*$")?;
    Ok(close
        .replace(&open.replace(cleaned, ""), "")
        .trim()
        .to_string())
}

fn parse_verdict(content: &str) -> Result<(f64, String)> {
    let cleaned = strip_fences(content)?;

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        if let Some(score) = value.get("score").and_then(Value::as_f64) {
            let reason = value
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Ok((score, reason));
        }
    }

    // Some judges wrap the JSON in prose; pull the fields out of the text.
    let score_re = Regex::new(r#""score"\s*:\s*([0-9.]+)"#)?;
    let reason_re = Regex::new(r#""reason"\s*:\s*"([^"]+)""#)?;
    if let Some(caps) = score_re.captures(content) {
        if let Ok(score) = caps[1].parse::<f64>() {
            let reason = reason_re
                .captures(content)
                .map(|c| c[1].to_string())
                .unwrap_or_else(|| "extracted from unstructured response".to_string());
            return Ok((score, reason));
        }
    }

    Err(anyhow!(
        "malformed judge response: {}",
        content.chars().take(200).collect::<String>()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::JudgeResponse;

    /// Replays a canned response, whatever the prompt.
    struct CannedJudge {
        content: String,
    }

    impl CannedJudge {
        fn new(content: &str) -> Arc<Self> {
            Arc::new(Self {
                content: content.to_string(),
            })
        }
    }

    #[async_trait]
    impl Judge for CannedJudge {
        async fn complete(&self, _prompt: &str) -> Result<JudgeResponse> {
            Ok(JudgeResponse {
                content: self.content.clone(),
                tokens_used: 120,
                cost_usd: 0.0003,
            })
        }
    }

    fn scorer(judge: Arc<CannedJudge>) -> LLMJudgeScorer {
        LLMJudgeScorer::new("correctness", "Is the output factually correct?", judge)
    }

    fn case() -> TestCase {
        TestCase::new("capital of France?")
            .with_expected_output("Paris")
            .with_actual_output("Paris is the capital of France")
    }

    #[tokio::test]
    async fn parses_clean_json_verdict() {
        let judge = CannedJudge::new(r#"{"score": 0.9, "reason": "matches the reference"}"#);
        let score = scorer(judge).evaluate(&case()).await.unwrap();
        assert_eq!(score.score, 0.9);
        assert!(score.passed);
        assert_eq!(score.reason.as_deref(), Some("matches the reference"));
        assert_eq!(score.tokens_used, 120);
    }

    #[tokio::test]
    async fn parses_fenced_json_verdict() {
        let judge = CannedJudge::new("```json\n{\"score\": 0.4, \"reason\": \"partial\"}\n```");
        let score = scorer(judge).evaluate(&case()).await.unwrap();
        assert_eq!(score.score, 0.4);
        assert!(!score.passed);
    }

    #[tokio::test]
    async fn extracts_fields_from_prose() {
        let judge =
            CannedJudge::new(r#"Sure! Here it is: {"score": 0.75, "reason": "mostly right"}"#);
        let score = scorer(judge).evaluate(&case()).await.unwrap();
        assert_eq!(score.score, 0.75);
    }

    #[tokio::test]
    async fn malformed_response_is_an_error_not_a_zero() {
        let judge = CannedJudge::new("I think it's pretty good overall.");
        let err = scorer(judge).evaluate(&case()).await.unwrap_err();
        assert!(err.to_string().contains("malformed judge response"));
    }

    #[tokio::test]
    async fn out_of_range_scores_are_clamped() {
        let judge = CannedJudge::new(r#"{"score": 3.5, "reason": "enthusiastic"}"#);
        let score = scorer(judge).evaluate(&case()).await.unwrap();
        assert_eq!(score.score, 1.0);
    }

    #[tokio::test]
    async fn skips_without_actual_output() {
        let judge = CannedJudge::new(r#"{"score": 1.0, "reason": "n/a"}"#);
        let tc = TestCase::new("q");
        let score = scorer(judge).evaluate(&tc).await.unwrap();
        assert!(score.error.is_none());
        assert!(score.reason.unwrap().contains("actual_output"));
    }
}
