use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tabled::Tabled;

use evalgate_types::ExperimentResult;

/// Scorer-by-scorer change between two runs. A scorer present on only one
/// side is reported as such, never defaulted to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScorerDiff {
    Both {
        baseline_mean: f64,
        candidate_mean: f64,
        mean_delta: f64,
        baseline_pass_rate: f64,
        candidate_pass_rate: f64,
        pass_rate_delta: f64,
    },
    BaselineOnly {
        mean: f64,
        pass_rate: f64,
    },
    CandidateOnly {
        mean: f64,
        pass_rate: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub baseline: String,
    pub candidate: String,
    pub scorers: BTreeMap<String, ScorerDiff>,
}

pub fn compare_experiments(
    baseline: &ExperimentResult,
    candidate: &ExperimentResult,
) -> Comparison {
    let names: BTreeSet<&String> = baseline
        .summary
        .keys()
        .chain(candidate.summary.keys())
        .collect();

    let scorers = names
        .into_iter()
        .filter_map(|name| {
            let diff = match (baseline.summary.get(name), candidate.summary.get(name)) {
                (Some(b), Some(c)) => ScorerDiff::Both {
                    baseline_mean: b.mean,
                    candidate_mean: c.mean,
                    mean_delta: c.mean - b.mean,
                    baseline_pass_rate: b.pass_rate,
                    candidate_pass_rate: c.pass_rate,
                    pass_rate_delta: c.pass_rate - b.pass_rate,
                },
                (Some(b), None) => ScorerDiff::BaselineOnly {
                    mean: b.mean,
                    pass_rate: b.pass_rate,
                },
                (None, Some(c)) => ScorerDiff::CandidateOnly {
                    mean: c.mean,
                    pass_rate: c.pass_rate,
                },
                (None, None) => return None,
            };
            Some((name.clone(), diff))
        })
        .collect();

    Comparison {
        baseline: baseline.name.clone(),
        candidate: candidate.name.clone(),
        scorers,
    }
}

impl Comparison {
    /// A regression is a scorer present in both runs whose mean dropped.
    pub fn has_regressions(&self) -> bool {
        self.scorers
            .values()
            .any(|d| matches!(d, ScorerDiff::Both { mean_delta, .. } if *mean_delta < 0.0))
    }

    pub fn table(&self) -> String {
        use tabled::Table;

        let rows: Vec<DiffRow> = self
            .scorers
            .iter()
            .map(|(name, diff)| match diff {
                ScorerDiff::Both {
                    baseline_mean,
                    candidate_mean,
                    mean_delta,
                    pass_rate_delta,
                    ..
                } => DiffRow {
                    scorer: name.clone(),
                    baseline: format!("{:.4}", baseline_mean),
                    candidate: format!("{:.4}", candidate_mean),
                    mean_delta: format!("{:+.4}", mean_delta),
                    pass_rate_delta: format!("{:+.1}%", pass_rate_delta * 100.0),
                },
                ScorerDiff::BaselineOnly { mean, .. } => DiffRow {
                    scorer: name.clone(),
                    baseline: format!("{:.4}", mean),
                    candidate: "-".to_string(),
                    mean_delta: "baseline only".to_string(),
                    pass_rate_delta: "-".to_string(),
                },
                ScorerDiff::CandidateOnly { mean, .. } => DiffRow {
                    scorer: name.clone(),
                    baseline: "-".to_string(),
                    candidate: format!("{:.4}", mean),
                    mean_delta: "candidate only".to_string(),
                    pass_rate_delta: "-".to_string(),
                },
            })
            .collect();

        let table = Table::new(rows).to_string();
        format!(
            "{}\n\nBaseline: {}  Candidate: {}\n",
            table, self.baseline, self.candidate
        )
    }
}

#[derive(Tabled)]
struct DiffRow {
    scorer: String,
    baseline: String,
    candidate: String,
    mean_delta: String,
    pass_rate_delta: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use evalgate_types::ScorerStats;

    fn result(name: &str, means: &[(&str, f64, f64)]) -> ExperimentResult {
        let mut summary = BTreeMap::new();
        for (scorer, mean, pass_rate) in means {
            summary.insert(
                scorer.to_string(),
                ScorerStats {
                    mean: *mean,
                    pass_rate: *pass_rate,
                    total_cost_usd: 0.0,
                    total_tokens: 0,
                    failures: 0,
                },
            );
        }
        ExperimentResult {
            name: name.to_string(),
            started_at: Utc::now(),
            duration_ms: 0,
            cases: Vec::new(),
            summary,
            total_cost_usd: 0.0,
            total_tokens: 0,
        }
    }

    #[test]
    fn reports_signed_mean_delta() {
        let baseline = result("v1", &[("A", 0.9, 0.9)]);
        let candidate = result("v2", &[("A", 0.75, 0.8)]);
        let comparison = compare_experiments(&baseline, &candidate);

        match &comparison.scorers["A"] {
            ScorerDiff::Both {
                mean_delta,
                pass_rate_delta,
                ..
            } => {
                assert!((mean_delta + 0.15).abs() < 1e-9);
                assert!((pass_rate_delta + 0.1).abs() < 1e-9);
            }
            other => panic!("expected Both, got {:?}", other),
        }
        assert!(comparison.has_regressions());
    }

    #[test]
    fn improvement_is_not_a_regression() {
        let baseline = result("v1", &[("A", 0.7, 0.7)]);
        let candidate = result("v2", &[("A", 0.9, 0.9)]);
        let comparison = compare_experiments(&baseline, &candidate);
        assert!(!comparison.has_regressions());
    }

    #[test]
    fn one_sided_scorers_are_reported_not_zeroed() {
        let baseline = result("v1", &[("A", 0.9, 0.9), ("old", 0.5, 0.5)]);
        let candidate = result("v2", &[("A", 0.9, 0.9), ("new", 0.8, 0.8)]);
        let comparison = compare_experiments(&baseline, &candidate);

        assert!(matches!(
            comparison.scorers["old"],
            ScorerDiff::BaselineOnly { .. }
        ));
        assert!(matches!(
            comparison.scorers["new"],
            ScorerDiff::CandidateOnly { .. }
        ));
        assert!(!comparison.has_regressions());
    }

    #[test]
    fn roundtrips_through_serde() {
        let baseline = result("v1", &[("A", 0.9, 0.9)]);
        let candidate = result("v2", &[("B", 0.8, 0.8)]);
        let comparison = compare_experiments(&baseline, &candidate);
        let json = serde_json::to_string(&comparison).unwrap();
        let back: Comparison = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scorers.len(), 2);
    }
}
