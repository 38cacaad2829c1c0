use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use evalgate_types::TestCase;

/// Supplies the ordered sequence of cases an experiment runs over.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<Vec<TestCase>>;
}

pub struct VecDataSource {
    cases: Vec<TestCase>,
}

impl VecDataSource {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        validate(&self.cases)?;
        Ok(self.cases.clone())
    }
}

/// Read JSONL where each line is a test case object, e.g.
/// `{"input": "...", "expected_output": "...", "expected_tools": ["search"]}`
pub struct JsonlDataSource {
    path: PathBuf,
}

impl JsonlDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for JsonlDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {:?}", self.path))?;

        let mut cases = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let case: TestCase = serde_json::from_str(line)
                .with_context(|| format!("invalid test case on line {}", idx + 1))?;
            cases.push(case);
        }
        validate(&cases)?;
        Ok(cases)
    }
}

/// Read a whole-file JSON array of test case objects.
pub struct JsonDataSource {
    path: PathBuf,
}

impl JsonDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DataSource for JsonDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {:?}", self.path))?;
        let cases: Vec<TestCase> = serde_json::from_str(&content)
            .with_context(|| format!("invalid test case array in {:?}", self.path))?;
        validate(&cases)?;
        Ok(cases)
    }
}

fn validate(cases: &[TestCase]) -> Result<()> {
    for (idx, case) in cases.iter().enumerate() {
        if case.input.trim().is_empty() {
            bail!("case {}: input cannot be empty", idx);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("evalgate-{}-{}", std::process::id(), name));
        tokio::fs::write(&path, content).await.unwrap();
        path
    }

    #[tokio::test]
    async fn jsonl_loads_rich_rows() {
        let path = write_temp(
            "rows.jsonl",
            r#"{"input": "What is 2+2?", "expected_output": "4"}
{"input": "Fix the bug", "expected_tools": ["read_file", "edit_file"], "context": ["Bug in line 42"], "tags": ["agent"]}
"#,
        )
        .await;

        let cases = JsonlDataSource::new(&path).load().await.unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].expected_output.as_deref(), Some("4"));
        assert_eq!(
            cases[1].expected_tools.as_deref().unwrap(),
            ["read_file".to_string(), "edit_file".to_string()]
        );
        assert_eq!(cases[1].context, vec!["Bug in line 42".to_string()]);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn jsonl_reports_bad_line_number() {
        let path = write_temp("bad.jsonl", "{\"input\": \"ok\"}\nnot json\n").await;

        let err = JsonlDataSource::new(&path).load().await.unwrap_err();
        assert!(err.to_string().contains("line 2"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let cases = vec![TestCase::new("  ")];
        let err = VecDataSource::new(cases).load().await.unwrap_err();
        assert!(err.to_string().contains("input cannot be empty"));
    }

    #[tokio::test]
    async fn json_array_loads() {
        let path = write_temp(
            "rows.json",
            r#"[{"input": "a", "expected_output": "b"}, {"input": "c"}]"#,
        )
        .await;

        let cases = JsonDataSource::new(&path).load().await.unwrap();
        assert_eq!(cases.len(), 2);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
