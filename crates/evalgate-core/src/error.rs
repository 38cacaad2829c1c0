use thiserror::Error;

/// Fatal setup errors, raised before any case executes.
///
/// Everything else that goes wrong during a run — task failures, scorer
/// failures, missing preconditions — is recovered per case or per
/// (case, scorer) pair and surfaced as data in the result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("data source must be set")]
    MissingDataSource,

    #[error("task must be set")]
    MissingTask,

    #[error("at least one scorer is required")]
    NoScorers,

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("gate references unknown scorer '{0}'")]
    UnknownGateScorer(String),

    #[error("result has no scorer summaries")]
    EmptySummary,

    #[error("invalid eval definition: {0}")]
    InvalidDefinition(String),
}
