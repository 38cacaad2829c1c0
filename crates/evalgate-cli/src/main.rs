use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use evalgate_core::{
	compare_experiments, from_async_fn, load_snapshot, save_snapshot, DataSource, Eval,
	EvalDefinition, Gate, JsonDataSource, JsonlDataSource, Task, TaskConfig, TaskOutput,
};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(name = "evalgate", about = "Run agent evaluations and gate CI on the results")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Run an eval definition and apply its gate
	Run(RunArgs),
	/// Diff two persisted result snapshots scorer by scorer
	Compare(CompareArgs),
}

#[derive(Debug, Clone, Parser)]
struct RunArgs {
	/// YAML eval definition (task, data, scorers, optional gate)
	definition: PathBuf,

	/// Exit 1 if the gated mean is below this threshold (overrides the
	/// definition's gate threshold)
	#[arg(long)]
	fail_under: Option<f64>,

	/// Gate on this scorer's mean instead of the minimum across scorers
	/// (overrides the definition's gate scorer)
	#[arg(long)]
	scorer: Option<String>,

	/// Write the experiment result snapshot to this path
	#[arg(long)]
	snapshot: Option<PathBuf>,

	/// Concurrency (cases in-flight); overrides the definition
	#[arg(long)]
	concurrency: Option<usize>,
}

#[derive(Debug, Clone, Parser)]
struct CompareArgs {
	/// Baseline snapshot (JSON, produced by `run --snapshot`)
	baseline: PathBuf,

	/// Candidate snapshot to compare against the baseline
	candidate: PathBuf,

	/// Exit 1 if any scorer's mean dropped
	#[arg(long, action = ArgAction::SetTrue)]
	fail_on_regression: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let cli = Cli::parse();
	match cli.command {
		Commands::Run(args) => run(args).await?,
		Commands::Compare(args) => compare(args).await?,
	}
	Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
	let def = EvalDefinition::load(&args.definition).await?;
	def.validate()?;

	let data: Arc<dyn DataSource> = match def.data.path.extension().and_then(|e| e.to_str()) {
		Some("jsonl") => Arc::new(JsonlDataSource::new(&def.data.path)),
		_ => Arc::new(JsonDataSource::new(&def.data.path)),
	};

	let task = match &def.task {
		TaskConfig::Http { url, method } => http_task(url.clone(), method.clone()),
	};

	let eval = Eval::builder()
		.name(def.name.clone())
		.data_source(data)
		.task(task)
		.scorers(def.build_scorers())
		.concurrency(args.concurrency.unwrap_or(def.concurrency))
		.build()?;

	let result = eval.run().await?;
	println!("{}", result.case_table());
	println!("{}", result.summary_table());

	if let Some(path) = &args.snapshot {
		save_snapshot(&result, path).await?;
		println!("Snapshot saved to {:?}", path);
	}

	// Command-line flags override the definition's gate piecewise.
	let threshold = args.fail_under.or(def.gate.as_ref().map(|g| g.fail_under));
	let scorer = args
		.scorer
		.clone()
		.or_else(|| def.gate.as_ref().and_then(|g| g.scorer.clone()));

	if let Some(threshold) = threshold {
		let gate = match scorer {
			Some(name) => Gate::new(threshold).with_scorer(name),
			None => Gate::new(threshold),
		};
		let decision = gate.check(&result)?;
		if !decision.passed {
			eprintln!(
				"FAIL: {} mean {:.4} < {:.4}",
				decision.scorer, decision.observed_mean, decision.threshold
			);
			std::process::exit(1);
		}
		println!(
			"PASS: {} mean {:.4} >= {:.4}",
			decision.scorer, decision.observed_mean, decision.threshold
		);
	}

	Ok(())
}

async fn compare(args: CompareArgs) -> Result<()> {
	let baseline = load_snapshot(&args.baseline).await?;
	let candidate = load_snapshot(&args.candidate).await?;

	let comparison = compare_experiments(&baseline, &candidate);
	println!("{}", comparison.table());

	if args.fail_on_regression && comparison.has_regressions() {
		eprintln!("FAIL: at least one scorer's mean regressed");
		std::process::exit(1);
	}

	Ok(())
}

/// HTTP task endpoint (POST by default). Sends { "input": <text> } and
/// accepts either a bare JSON string or { "output": ..., "tools_called": [..] }.
fn http_task(url: String, method: String) -> Arc<dyn Task> {
	let method = method.to_uppercase();
	from_async_fn(move |input| {
		let url = url.clone();
		let method = method.clone();
		let input = input.to_string();
		async move {
			let client = reqwest::Client::new();
			let resp = match method.as_str() {
				"GET" => {
					let q = [("input", input.as_str())];
					client.get(&url).query(&q).send().await?
				}
				_ => {
					client.post(&url).json(&json!({ "input": input })).send().await?
				}
			};
			let status = resp.status();
			let body = resp.json::<Value>().await?;
			if !status.is_success() {
				anyhow::bail!("HTTP {}: {}", status.as_u16(), body);
			}
			Ok(parse_task_response(body))
		}
	})
}

fn parse_task_response(body: Value) -> TaskOutput {
	match &body {
		Value::String(s) => TaskOutput::text(s.clone()),
		Value::Object(obj) => {
			let text = obj
				.get("output")
				.and_then(Value::as_str)
				.map(str::to_string)
				.unwrap_or_else(|| body.to_string());
			let tools = obj.get("tools_called").and_then(Value::as_array).map(|a| {
				a.iter()
					.filter_map(Value::as_str)
					.map(str::to_string)
					.collect::<Vec<_>>()
			});
			match tools {
				Some(tools) => TaskOutput::text(text).with_tools(tools),
				None => TaskOutput::text(text),
			}
		}
		other => TaskOutput::text(other.to_string()),
	}
}
