use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use evalgate_types::ExperimentResult;

/// Pass/fail policy over an experiment's per-scorer means, for use as a
/// CI quality bar.
///
/// By default the gate watches the worst (minimum) mean across all
/// scorers; it can instead be pinned to a single scorer. The run fails
/// iff the watched mean is strictly below the threshold.
#[derive(Debug, Clone)]
pub struct Gate {
    threshold: f64,
    scorer: Option<String>,
}

impl Gate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            scorer: None,
        }
    }

    pub fn with_scorer(mut self, scorer: impl Into<String>) -> Self {
        self.scorer = Some(scorer.into());
        self
    }

    pub fn check(&self, result: &ExperimentResult) -> Result<GateDecision, ConfigError> {
        let (scorer, observed_mean) = match &self.scorer {
            Some(name) => {
                let stats = result
                    .summary
                    .get(name)
                    .ok_or_else(|| ConfigError::UnknownGateScorer(name.clone()))?;
                (name.clone(), stats.mean)
            }
            None => result
                .summary
                .iter()
                .map(|(name, stats)| (name.clone(), stats.mean))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .ok_or(ConfigError::EmptySummary)?,
        };

        Ok(GateDecision {
            passed: observed_mean >= self.threshold,
            scorer,
            observed_mean,
            threshold: self.threshold,
        })
    }
}

/// The gate's verdict: which scorer was decisive and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    pub passed: bool,
    pub scorer: String,
    pub observed_mean: f64,
    pub threshold: f64,
}
