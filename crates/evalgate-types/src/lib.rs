use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::Tabled;

/// A single unit of evaluation: one input, the output it produced, and the
/// reference material scorers compare against.
///
/// `actual_output` is populated exactly once by the runner, after the task
/// executes and before any scorer sees the case. Scorers only ever get a
/// shared reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub input: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expected_output: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub actual_output: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub context: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expected_tools: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tools_called: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Vec::is_empty", default)]
	pub tags: Vec<String>,
	#[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
	pub metadata: BTreeMap<String, Value>,
}

impl TestCase {
	pub fn new(input: impl Into<String>) -> Self {
		Self {
			id: None,
			input: input.into(),
			expected_output: None,
			actual_output: None,
			context: Vec::new(),
			expected_tools: None,
			tools_called: None,
			tags: Vec::new(),
			metadata: BTreeMap::new(),
		}
	}

	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = Some(id.into());
		self
	}

	pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
		self.expected_output = Some(expected.into());
		self
	}

	pub fn with_actual_output(mut self, actual: impl Into<String>) -> Self {
		self.actual_output = Some(actual.into());
		self
	}

	pub fn with_context<I, S>(mut self, context: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.context = context.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_expected_tools<I, S>(mut self, tools: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.expected_tools = Some(tools.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_tools_called<I, S>(mut self, tools: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tools_called = Some(tools.into_iter().map(Into::into).collect());
		self
	}
}

/// Outcome of one scorer applied to one test case.
///
/// `error` is set iff the scorer itself failed to produce a score (judge
/// backend down, malformed response). A skip for missing preconditions is
/// not an error: it scores 0 with a reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
	pub name: String,
	pub score: f64,
	pub passed: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(default)]
	pub cost_usd: f64,
	#[serde(default)]
	pub tokens_used: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl ScoreResult {
	/// A produced score.
	pub fn scored(name: impl Into<String>, score: f64, passed: bool) -> Self {
		Self {
			name: name.into(),
			score,
			passed,
			reason: None,
			cost_usd: 0.0,
			tokens_used: 0,
			error: None,
		}
	}

	/// A graceful skip: a required input was absent, so the scorer emits a
	/// zero score with the missing precondition spelled out.
	pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			score: 0.0,
			passed: false,
			reason: Some(reason.into()),
			cost_usd: 0.0,
			tokens_used: 0,
			error: None,
		}
	}

	/// A failure to score at all. Counts as 0 in the mean but is tracked
	/// separately in the summary's failure count.
	pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			score: 0.0,
			passed: false,
			reason: None,
			cost_usd: 0.0,
			tokens_used: 0,
			error: Some(error.into()),
		}
	}

	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());
		self
	}

	pub fn with_usage(mut self, tokens_used: u64, cost_usd: f64) -> Self {
		self.tokens_used = tokens_used;
		self.cost_usd = cost_usd;
		self
	}

	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}
}

/// One dataset row after task execution and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
	pub case: TestCase,
	pub scores: Vec<ScoreResult>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(default)]
	pub duration_ms: u64,
}

impl CaseResult {
	pub fn all_passed(&self) -> bool {
		self.error.is_none() && !self.scores.is_empty() && self.scores.iter().all(|s| s.passed)
	}
}

/// Aggregate statistics for one scorer across an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerStats {
	pub mean: f64,
	pub pass_rate: f64,
	pub total_cost_usd: f64,
	pub total_tokens: u64,
	pub failures: usize,
}

/// The immutable snapshot of one evaluation run.
///
/// `cases` keeps dataset order. `summary` and the totals are derived from
/// `cases`; recomputing them with [`ExperimentResult::summarize`] and
/// [`ExperimentResult::totals`] reproduces them exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
	pub name: String,
	pub started_at: DateTime<Utc>,
	pub duration_ms: u64,
	pub cases: Vec<CaseResult>,
	pub summary: BTreeMap<String, ScorerStats>,
	pub total_cost_usd: f64,
	pub total_tokens: u64,
}

impl ExperimentResult {
	pub fn from_cases(
		name: impl Into<String>,
		started_at: DateTime<Utc>,
		duration: Duration,
		cases: Vec<CaseResult>,
	) -> Self {
		let summary = Self::summarize(&cases);
		let (total_cost_usd, total_tokens) = Self::totals(&cases);
		Self {
			name: name.into(),
			started_at,
			duration_ms: duration.as_millis() as u64,
			cases,
			summary,
			total_cost_usd,
			total_tokens,
		}
	}

	/// Per-scorer aggregates. Error results count as score 0 in the mean and
	/// as not-passed in the pass rate, and are tallied under `failures` so a
	/// low mean is never mistaken for a scorer outage.
	pub fn summarize(cases: &[CaseResult]) -> BTreeMap<String, ScorerStats> {
		struct Acc {
			score_sum: f64,
			passed: usize,
			cost: f64,
			tokens: u64,
			failures: usize,
			count: usize,
		}

		let mut accs: BTreeMap<String, Acc> = BTreeMap::new();
		for cr in cases {
			for s in &cr.scores {
				let acc = accs.entry(s.name.clone()).or_insert(Acc {
					score_sum: 0.0,
					passed: 0,
					cost: 0.0,
					tokens: 0,
					failures: 0,
					count: 0,
				});
				acc.score_sum += if s.is_error() { 0.0 } else { s.score };
				if s.passed {
					acc.passed += 1;
				}
				if s.is_error() {
					acc.failures += 1;
				}
				acc.cost += s.cost_usd;
				acc.tokens += s.tokens_used;
				acc.count += 1;
			}
		}

		accs.into_iter()
			.map(|(name, acc)| {
				let n = acc.count.max(1) as f64;
				(
					name,
					ScorerStats {
						mean: acc.score_sum / n,
						pass_rate: acc.passed as f64 / n,
						total_cost_usd: acc.cost,
						total_tokens: acc.tokens,
						failures: acc.failures,
					},
				)
			})
			.collect()
	}

	pub fn totals(cases: &[CaseResult]) -> (f64, u64) {
		let mut cost = 0.0;
		let mut tokens = 0u64;
		for cr in cases {
			for s in &cr.scores {
				cost += s.cost_usd;
				tokens += s.tokens_used;
			}
		}
		(cost, tokens)
	}

	/// Per-scorer summary as a text table.
	pub fn summary_table(&self) -> String {
		use tabled::Table;

		let rows: Vec<ScorerRow> = self
			.summary
			.iter()
			.map(|(name, stats)| ScorerRow {
				scorer: name.clone(),
				mean: format!("{:.4}", stats.mean),
				pass_rate: format!("{:.1}%", stats.pass_rate * 100.0),
				failures: stats.failures,
				cost_usd: format!("{:.6}", stats.total_cost_usd),
				tokens: stats.total_tokens,
			})
			.collect();

		let table = Table::new(rows).to_string();
		let footer = format!(
			"Experiment: {}  Cases: {}  Duration: {}ms  Total cost: ${:.6}  Tokens: {}",
			self.name,
			self.cases.len(),
			self.duration_ms,
			self.total_cost_usd,
			self.total_tokens
		);
		format!("{}\n\n{}\n", table, footer)
	}

	/// Per-case detail as a text table.
	pub fn case_table(&self) -> String {
		use tabled::Table;

		let rows: Vec<CaseRow> = self
			.cases
			.iter()
			.enumerate()
			.map(|(idx, cr)| {
				let id = cr.case.id.clone().unwrap_or_else(|| idx.to_string());
				let status = if cr.error.is_some() {
					"!"
				} else if cr.all_passed() {
					"✓"
				} else {
					" "
				};
				let avg = if cr.scores.is_empty() {
					0.0
				} else {
					let sum: f64 = cr.scores.iter().map(|s| s.score).sum();
					sum / (cr.scores.len() as f64)
				};
				CaseRow {
					id,
					status: status.to_string(),
					avg_score: format!("{:.3}", avg),
					input: truncate(cr.case.input.clone(), 48),
					output: truncate(
						cr.case
							.actual_output
							.clone()
							.or_else(|| cr.error.clone())
							.unwrap_or_default(),
						48,
					),
					expected: truncate(cr.case.expected_output.clone().unwrap_or_default(), 48),
				}
			})
			.collect();

		Table::new(rows).to_string()
	}
}

#[derive(Tabled)]
struct ScorerRow {
	scorer: String,
	mean: String,
	pass_rate: String,
	failures: usize,
	cost_usd: String,
	tokens: u64,
}

#[derive(Tabled)]
struct CaseRow {
	id: String,
	status: String,
	avg_score: String,
	input: String,
	output: String,
	expected: String,
}

fn truncate(s: String, max_len: usize) -> String {
	if s.chars().count() <= max_len {
		return s;
	}
	let mut truncated = s.chars().take(max_len.saturating_sub(1)).collect::<String>();
	truncated.push('…');
	truncated
}

#[cfg(test)]
mod tests {
	use super::*;

	fn case(scores: Vec<ScoreResult>, error: Option<&str>) -> CaseResult {
		CaseResult {
			case: TestCase::new("q"),
			scores,
			error: error.map(|e| e.to_string()),
			duration_ms: 1,
		}
	}

	#[test]
	fn summarize_means_and_pass_rates() {
		let cases = vec![
			case(vec![ScoreResult::scored("exact_match", 1.0, true)], None),
			case(vec![ScoreResult::scored("exact_match", 0.0, false)], None),
		];
		let summary = ExperimentResult::summarize(&cases);
		let stats = &summary["exact_match"];
		assert_eq!(stats.mean, 0.5);
		assert_eq!(stats.pass_rate, 0.5);
		assert_eq!(stats.failures, 0);
	}

	#[test]
	fn summarize_counts_errors_as_zero_and_tracks_failures() {
		let cases = vec![
			case(vec![ScoreResult::scored("judge", 1.0, true)], None),
			case(vec![ScoreResult::failed("judge", "backend down")], None),
		];
		let summary = ExperimentResult::summarize(&cases);
		let stats = &summary["judge"];
		assert_eq!(stats.mean, 0.5);
		assert_eq!(stats.pass_rate, 0.5);
		assert_eq!(stats.failures, 1);
	}

	#[test]
	fn summarize_is_idempotent() {
		let cases = vec![
			case(
				vec![
					ScoreResult::scored("a", 0.9, true).with_usage(10, 0.001),
					ScoreResult::failed("b", "boom"),
				],
				None,
			),
			case(vec![ScoreResult::scored("a", 0.7, false)], None),
		];
		let first = ExperimentResult::summarize(&cases);
		let second = ExperimentResult::summarize(&cases);
		assert_eq!(first, second);
	}

	#[test]
	fn totals_accumulate_usage() {
		let cases = vec![case(
			vec![
				ScoreResult::scored("a", 1.0, true).with_usage(100, 0.002),
				ScoreResult::scored("b", 1.0, true).with_usage(50, 0.001),
			],
			None,
		)];
		let (cost, tokens) = ExperimentResult::totals(&cases);
		assert!((cost - 0.003).abs() < 1e-12);
		assert_eq!(tokens, 150);
	}

	#[test]
	fn result_roundtrips_through_json() {
		let cases = vec![
			case(vec![ScoreResult::scored("a", 0.25, false)], None),
			case(vec![ScoreResult::failed("a", "oops")], Some("task blew up")),
		];
		let result =
			ExperimentResult::from_cases("rt", Utc::now(), Duration::from_millis(42), cases);
		let json = serde_json::to_string(&result).unwrap();
		let back: ExperimentResult = serde_json::from_str(&json).unwrap();
		assert_eq!(back.cases.len(), 2);
		assert_eq!(back.summary, result.summary);
		assert_eq!(back.cases[1].error.as_deref(), Some("task blew up"));
		assert!(back.cases[1].scores[0].is_error());
	}
}
