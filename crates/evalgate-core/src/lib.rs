//! evalgate-core: evaluation orchestrator and scoring pipeline.
//! Compose a data source, a task (your agent), and scorers; run with bounded
//! concurrency, then gate on the aggregate scores or diff two runs.
//! See `examples/simple.rs` for a quickstart.

pub mod compare;
pub mod config;
pub mod datasource;
pub mod error;
pub mod gate;
pub mod judge;
pub mod runner;
pub mod scorer;
pub mod snapshot;
pub mod task;
pub mod testing;

pub mod scorers {
    pub mod contains;
    pub mod exact;
    pub mod faithfulness;
    pub mod function;
    pub mod llm_judge;
    pub mod similarity;
    pub mod tool_correctness;
}

pub use compare::{compare_experiments, Comparison, ScorerDiff};
pub use config::{DataConfig, EvalDefinition, GateConfig, ScorerConfig, TaskConfig};
pub use datasource::{DataSource, JsonDataSource, JsonlDataSource, VecDataSource};
pub use error::ConfigError;
pub use gate::{Gate, GateDecision};
pub use judge::{call_with_retry, Embedder, Embedding, Judge, JudgeResponse, RetryPolicy};
pub use runner::{Eval, EvalBuilder};
pub use scorer::Scorer;
pub use scorers::{
    contains::{ContainsAllScorer, ContainsAnyScorer},
    exact::ExactMatchScorer,
    faithfulness::FaithfulnessScorer,
    function::FunctionScorer,
    llm_judge::LLMJudgeScorer,
    similarity::SimilarityScorer,
    tool_correctness::ToolCorrectnessScorer,
};
pub use snapshot::{load_snapshot, save_snapshot};
pub use task::{from_async_fn, Task, TaskOutput};

pub use evalgate_types::{
    CaseResult, ExperimentResult, ScoreResult, ScorerStats, TestCase,
};
