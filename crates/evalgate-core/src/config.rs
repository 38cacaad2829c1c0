use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scorer::Scorer;
use crate::scorers::contains::{ContainsAllScorer, ContainsAnyScorer};
use crate::scorers::exact::ExactMatchScorer;
use crate::scorers::tool_correctness::ToolCorrectnessScorer;

/// YAML eval definition consumed by the CLI `run` command.
///
/// Only deterministic scorers can be declared here; judge-backed scorers
/// need an injected capability and are composed in library code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalDefinition {
    #[serde(default = "default_name")]
    pub name: String,
    pub task: TaskConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub scorers: Vec<ScorerConfig>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub gate: Option<GateConfig>,
}

fn default_name() -> String {
    "experiment".to_string()
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum TaskConfig {
    Http {
        url: String,
        #[serde(default = "default_http_method")]
        method: String,
    },
}

fn default_http_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ScorerConfig {
    ExactMatch {
        #[serde(default)]
        case_insensitive: bool,
    },
    ContainsAny {
        keywords: Vec<String>,
    },
    ContainsAll {
        keywords: Vec<String>,
    },
    ToolCorrectness,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    pub fail_under: f64,
    #[serde(default)]
    pub scorer: Option<String>,
}

impl EvalDefinition {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read eval definition {:?}", path))?;
        let def = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::InvalidDefinition(format!("{:?}: {}", path, e)))?;
        Ok(def)
    }

    /// Checks the definition before anything runs: the gate may only name a
    /// scorer the definition actually configures.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scorers.is_empty() {
            return Err(ConfigError::NoScorers);
        }
        if let Some(gate) = &self.gate {
            if let Some(name) = &gate.scorer {
                let known = self
                    .build_scorers()
                    .iter()
                    .any(|s| s.name() == name.as_str());
                if !known {
                    return Err(ConfigError::UnknownGateScorer(name.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn build_scorers(&self) -> Vec<Arc<dyn Scorer>> {
        self.scorers
            .iter()
            .map(|cfg| match cfg {
                ScorerConfig::ExactMatch { case_insensitive } => {
                    let scorer = if *case_insensitive {
                        ExactMatchScorer::case_insensitive()
                    } else {
                        ExactMatchScorer::new()
                    };
                    Arc::new(scorer) as Arc<dyn Scorer>
                }
                ScorerConfig::ContainsAny { keywords } => {
                    Arc::new(ContainsAnyScorer::new(keywords.clone()))
                }
                ScorerConfig::ContainsAll { keywords } => {
                    Arc::new(ContainsAllScorer::new(keywords.clone()))
                }
                ScorerConfig::ToolCorrectness => Arc::new(ToolCorrectnessScorer),
            })
            .collect()
    }
}
