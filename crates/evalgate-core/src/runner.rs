use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::datasource::DataSource;
use crate::error::ConfigError;
use crate::scorer::Scorer;
use crate::task::Task;
use evalgate_types::{CaseResult, ExperimentResult, ScoreResult, TestCase};

pub struct EvalBuilder {
	name: String,
	data_source: Option<Arc<dyn DataSource>>,
	task: Option<Arc<dyn Task>>,
	scorers: Vec<Arc<dyn Scorer>>,
	concurrency: usize,
	task_timeout: Duration,
}

impl EvalBuilder {
	pub fn new() -> Self {
		Self {
			name: "experiment".to_string(),
			data_source: None,
			task: None,
			scorers: Vec::new(),
			concurrency: 4,
			task_timeout: Duration::from_secs(60),
		}
	}

	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
		self.data_source = Some(data_source);
		self
	}

	pub fn task(mut self, task: Arc<dyn Task>) -> Self {
		self.task = Some(task);
		self
	}

	pub fn scorers<I>(mut self, scorers: I) -> Self
	where
		I: IntoIterator<Item = Arc<dyn Scorer>>,
	{
		self.scorers = scorers.into_iter().collect();
		self
	}

	pub fn add_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
		self.scorers.push(scorer);
		self
	}

	pub fn concurrency(mut self, n: usize) -> Self {
		self.concurrency = n.max(1);
		self
	}

	pub fn task_timeout(mut self, timeout: Duration) -> Self {
		self.task_timeout = timeout;
		self
	}

	pub fn build(self) -> Result<Eval, ConfigError> {
		if self.scorers.is_empty() {
			return Err(ConfigError::NoScorers);
		}
		Ok(Eval {
			name: self.name,
			data_source: self.data_source.ok_or(ConfigError::MissingDataSource)?,
			task: self.task.ok_or(ConfigError::MissingTask)?,
			scorers: self.scorers,
			concurrency: self.concurrency,
			task_timeout: self.task_timeout,
		})
	}
}

impl Default for EvalBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// The evaluation orchestrator: drives the task over every dataset row,
/// fans each materialized case out to every scorer, and aggregates the
/// outcome into one immutable [`ExperimentResult`].
///
/// Failures are isolated: a task failure poisons only its own case, a
/// scorer failure only its own (case, scorer) pair. Only configuration
/// problems abort a run, and those surface before any case executes.
pub struct Eval {
	name: String,
	data_source: Arc<dyn DataSource>,
	task: Arc<dyn Task>,
	scorers: Vec<Arc<dyn Scorer>>,
	concurrency: usize,
	task_timeout: Duration,
}

impl std::fmt::Debug for Eval {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Eval")
			.field("name", &self.name)
			.field("scorers", &self.scorers.len())
			.field("concurrency", &self.concurrency)
			.field("task_timeout", &self.task_timeout)
			.finish()
	}
}

impl Eval {
	pub fn builder() -> EvalBuilder {
		EvalBuilder::new()
	}

	pub async fn run(&self) -> Result<ExperimentResult> {
		let started_at = Utc::now();
		let started = Instant::now();

		let cases = self.data_source.load().await?;
		if cases.is_empty() {
			return Err(ConfigError::EmptyDataset.into());
		}

		tracing::info!(
			experiment = %self.name,
			cases = cases.len(),
			scorers = self.scorers.len(),
			concurrency = self.concurrency,
			"starting run"
		);

		let task = self.task.clone();
		let scorers = self.scorers.clone();
		let task_timeout = self.task_timeout;

		// `buffered`, not `buffer_unordered`: per-case results must come out
		// in dataset order no matter which case finishes first.
		let results: Vec<CaseResult> = stream::iter(cases.into_iter())
			.map(move |case| {
				let task = task.clone();
				let scorers = scorers.clone();
				async move { run_case(task, scorers, task_timeout, case).await }
			})
			.buffered(self.concurrency)
			.collect()
			.await;

		let result =
			ExperimentResult::from_cases(self.name.clone(), started_at, started.elapsed(), results);
		tracing::info!(
			experiment = %result.name,
			duration_ms = result.duration_ms,
			total_cost_usd = result.total_cost_usd,
			total_tokens = result.total_tokens,
			"run complete"
		);
		Ok(result)
	}
}

async fn run_case(
	task: Arc<dyn Task>,
	scorers: Vec<Arc<dyn Scorer>>,
	task_timeout: Duration,
	mut case: TestCase,
) -> CaseResult {
	let started = Instant::now();

	let outcome = match tokio::time::timeout(task_timeout, task.run(&case.input)).await {
		Ok(result) => result,
		Err(_) => Err(anyhow::anyhow!("task timed out after {:?}", task_timeout)),
	};

	match outcome {
		Ok(output) => {
			case.actual_output = Some(output.output);
			// The task's own report of its tool calls wins over whatever the
			// dataset row carried.
			if output.tools_called.is_some() {
				case.tools_called = output.tools_called;
			}

			// Scorers only read the case, so they can all run at once.
			let scores = futures::future::join_all(scorers.iter().map(|scorer| {
				let case = &case;
				async move {
					match scorer.evaluate(case).await {
						Ok(score) => score,
						Err(err) => {
							tracing::warn!(scorer = scorer.name(), error = %err, "scorer failed");
							ScoreResult::failed(scorer.name(), err.to_string())
						}
					}
				}
			}))
			.await;

			CaseResult {
				case,
				scores,
				error: None,
				duration_ms: started.elapsed().as_millis() as u64,
			}
		}
		Err(err) => {
			let cause = err.to_string();
			tracing::warn!(case = case.id.as_deref().unwrap_or("-"), error = %cause, "task failed");
			let scores = scorers
				.iter()
				.map(|s| ScoreResult::failed(s.name(), cause.clone()))
				.collect();
			CaseResult {
				case,
				scores,
				error: Some(cause),
				duration_ms: started.elapsed().as_millis() as u64,
			}
		}
	}
}
