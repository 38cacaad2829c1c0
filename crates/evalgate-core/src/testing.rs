use anyhow::Result;

use crate::gate::Gate;
use evalgate_types::ExperimentResult;

/// Helper to assert a gate decision inside a `#[tokio::test]`.
///
/// # Example
/// ```ignore
/// #[tokio::test]
/// async fn test_my_agent() -> Result<()> {
///     let result = eval.run().await?;
///     assert_gate(&result, &Gate::new(0.8))?;
///     Ok(())
/// }
/// ```
pub fn assert_gate(result: &ExperimentResult, gate: &Gate) -> Result<()> {
    let decision = gate.check(result)?;
    if !decision.passed {
        anyhow::bail!(
            "gate failed: {} mean {:.4} is below threshold {:.4}\n{}",
            decision.scorer,
            decision.observed_mean,
            decision.threshold,
            result.summary_table()
        );
    }
    Ok(())
}

/// Helper to assert one scorer's mean meets a threshold.
pub fn assert_min_mean(result: &ExperimentResult, scorer: &str, min_mean: f64) -> Result<()> {
    assert_gate(result, &Gate::new(min_mean).with_scorer(scorer))
}

/// Helper to assert one scorer's pass rate meets a threshold.
pub fn assert_pass_rate(result: &ExperimentResult, scorer: &str, min_pass_rate: f64) -> Result<()> {
    let stats = result
        .summary
        .get(scorer)
        .ok_or_else(|| anyhow::anyhow!("unknown scorer '{}'", scorer))?;
    if stats.pass_rate < min_pass_rate {
        anyhow::bail!(
            "pass rate {:.1}% for {} is below threshold {:.1}%\n{}",
            stats.pass_rate * 100.0,
            scorer,
            min_pass_rate * 100.0,
            result.summary_table()
        );
    }
    Ok(())
}
