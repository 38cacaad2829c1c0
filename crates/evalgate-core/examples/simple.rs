use std::sync::Arc;

use evalgate_core::{
    from_async_fn, ContainsAnyScorer, Eval, ExactMatchScorer, Gate, Scorer, TaskOutput, TestCase,
    VecDataSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cases = vec![
        TestCase::new("What is 2+2?")
            .with_id("0")
            .with_expected_output("4"),
        TestCase::new("Capital of France?")
            .with_id("1")
            .with_expected_output("Paris"),
    ];
    let data = Arc::new(VecDataSource::new(cases));

    // Task: a stand-in agent with two hardcoded answers
    let task = from_async_fn(|input| {
        let input = input.to_string();
        async move {
            let answer = if input.contains("2+2") { "4" } else { "Paris" };
            Ok(TaskOutput::text(answer))
        }
    });

    let scorers: Vec<Arc<dyn Scorer>> = vec![
        Arc::new(ExactMatchScorer::new()),
        Arc::new(ContainsAnyScorer::new(["4", "paris"])),
    ];

    let eval = Eval::builder()
        .name("quickstart")
        .data_source(data)
        .task(task)
        .scorers(scorers)
        .concurrency(4)
        .build()?;

    let result = eval.run().await?;
    println!("{}", result.case_table());
    println!("{}", result.summary_table());

    let decision = Gate::new(0.8).check(&result)?;
    println!(
        "gate: {} ({} mean {:.4} vs threshold {:.4})",
        if decision.passed { "PASS" } else { "FAIL" },
        decision.scorer,
        decision.observed_mean,
        decision.threshold
    );

    Ok(())
}
