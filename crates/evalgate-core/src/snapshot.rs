use std::path::Path;

use anyhow::{Context, Result};

use evalgate_types::ExperimentResult;

/// Persist an experiment as a flat JSON snapshot, losslessly, so a later
/// `compare` can reload it with full per-case detail.
pub async fn save_snapshot(result: &ExperimentResult, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write snapshot {:?}", path))?;
    Ok(())
}

pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<ExperimentResult> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read snapshot {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("invalid snapshot {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use evalgate_types::{CaseResult, ScoreResult, TestCase};
    use std::time::Duration;

    #[tokio::test]
    async fn snapshot_roundtrip_preserves_order_and_detail() {
        let cases = (0..3)
            .map(|i| CaseResult {
                case: TestCase::new(format!("q{}", i)).with_id(i.to_string()),
                scores: vec![
                    ScoreResult::scored("exact_match", i as f64 / 2.0, i == 2)
                        .with_reason("why not"),
                    ScoreResult::failed("judge", "backend down"),
                ],
                error: None,
                duration_ms: 7,
            })
            .collect();
        let result =
            ExperimentResult::from_cases("snap", Utc::now(), Duration::from_millis(9), cases);

        let path = std::env::temp_dir().join(format!("evalgate-snap-{}.json", std::process::id()));
        save_snapshot(&result, &path).await.unwrap();
        let back = load_snapshot(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(back.name, "snap");
        assert_eq!(back.cases.len(), 3);
        for (i, cr) in back.cases.iter().enumerate() {
            assert_eq!(cr.case.input, format!("q{}", i));
            assert!(cr.scores[1].is_error());
            assert_eq!(cr.scores[0].reason.as_deref(), Some("why not"));
        }
        assert_eq!(back.summary, result.summary);
        assert_eq!(back.total_tokens, result.total_tokens);
    }
}
