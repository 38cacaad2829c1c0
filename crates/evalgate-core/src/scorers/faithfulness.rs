use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::judge::{call_with_retry, Judge, RetryPolicy};
use crate::scorer::Scorer;
use crate::scorers::llm_judge::strip_fences;
use evalgate_types::{ScoreResult, TestCase};

/// Groundedness check for RAG-style outputs: decomposes the actual output
/// into sentence-level claims and asks the judge to classify each one
/// against the context as supported, contradicted, or unclear.
///
/// score = supported / (supported + contradicted); unclear claims sit out
/// of both sides. Zero claims, zero context, or an all-unclear verdict set
/// are skips, never a division by zero.
pub struct FaithfulnessScorer {
    judge: Arc<dyn Judge>,
    threshold: f64,
    retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Verdict {
    Supported,
    Contradicted,
    Unclear,
}

impl FaithfulnessScorer {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self {
            judge,
            threshold: 0.7,
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
impl Scorer for FaithfulnessScorer {
    fn name(&self) -> &str {
        "faithfulness"
    }

    async fn evaluate(&self, case: &TestCase) -> Result<ScoreResult> {
        let Some(actual) = &case.actual_output else {
            return Ok(ScoreResult::skipped(self.name(), "actual_output is not set"));
        };
        if case.context.is_empty() {
            return Ok(ScoreResult::skipped(self.name(), "context is empty"));
        }
        let claims = split_claims(actual);
        if claims.is_empty() {
            return Ok(ScoreResult::skipped(
                self.name(),
                "no claims found in actual_output",
            ));
        }

        let prompt = build_prompt(&case.context, &claims);
        let response =
            call_with_retry(self.retry, "judge call", || self.judge.complete(&prompt)).await?;
        let verdicts = parse_verdicts(&response.content, claims.len())?;

        let supported = verdicts.iter().filter(|v| **v == Verdict::Supported).count();
        let contradicted = verdicts
            .iter()
            .filter(|v| **v == Verdict::Contradicted)
            .count();
        let unclear = verdicts.len() - supported - contradicted;

        if supported + contradicted == 0 {
            return Ok(ScoreResult::skipped(self.name(), "all claims judged unclear")
                .with_usage(response.tokens_used, response.cost_usd));
        }

        let score = supported as f64 / (supported + contradicted) as f64;
        let reason = format!(
            "{} supported, {} contradicted, {} unclear",
            supported, contradicted, unclear
        );

        Ok(ScoreResult::scored(self.name(), score, score >= self.threshold)
            .with_reason(reason)
            .with_usage(response.tokens_used, response.cost_usd))
    }
}

/// Sentence-level claim decomposition.
fn split_claims(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

fn build_prompt(context: &[String], claims: &[String]) -> String {
    let context_block = context.join("\n");
    let claims_block = claims
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a faithfulness evaluator. Using ONLY the information in the \
         context, classify each claim as \"supported\", \"contradicted\", or \
         \"unclear\".\n\n\
         Context:\n{}\n\n\
         Claims:\n{}\n\n\
         Return ONLY valid JSON: {{\"verdicts\": [\"<verdict per claim, in order>\"]}}",
        context_block, claims_block
    )
}

#[derive(Deserialize)]
struct VerdictList {
    verdicts: Vec<String>,
}

fn parse_verdicts(content: &str, expected_count: usize) -> Result<Vec<Verdict>> {
    let cleaned = strip_fences(content)?;
    let list: VerdictList = serde_json::from_str(&cleaned).map_err(|_| {
        anyhow!(
            "malformed judge response: {}",
            content.chars().take(200).collect::<String>()
        )
    })?;

    if list.verdicts.len() != expected_count {
        return Err(anyhow!(
            "judge returned {} verdicts for {} claims",
            list.verdicts.len(),
            expected_count
        ));
    }

    list.verdicts
        .iter()
        .map(|v| match v.to_lowercase().as_str() {
            "supported" => Ok(Verdict::Supported),
            "contradicted" => Ok(Verdict::Contradicted),
            "unclear" => Ok(Verdict::Unclear),
            other => Err(anyhow!("unknown verdict '{}'", other)),
        })
        .collect()
}
