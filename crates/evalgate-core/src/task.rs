use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// What a task produced for one input: the output text plus, optionally,
/// the tool calls it reports having made along the way.
#[derive(Debug, Clone)]
pub struct TaskOutput {
	pub output: String,
	pub tools_called: Option<Vec<String>>,
}

impl TaskOutput {
	pub fn text(output: impl Into<String>) -> Self {
		Self {
			output: output.into(),
			tools_called: None,
		}
	}

	pub fn with_tools<I, S>(mut self, tools: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tools_called = Some(tools.into_iter().map(Into::into).collect());
		self
	}
}

#[async_trait]
pub trait Task: Send + Sync {
	async fn run(&self, input: &str) -> Result<TaskOutput>;
}

/// Wrap an async closure as a `Task`.
pub fn from_async_fn<F, Fut>(f: F) -> Arc<dyn Task>
where
	F: Send + Sync + 'static + Fn(&str) -> Fut,
	Fut: Future<Output = Result<TaskOutput>> + Send + 'static,
{
	struct ClosureTask<F, Fut>
	where
		F: Send + Sync + 'static + Fn(&str) -> Fut,
		Fut: Future<Output = Result<TaskOutput>> + Send + 'static,
	{
		f: F,
	}

	#[async_trait]
	impl<F, Fut> Task for ClosureTask<F, Fut>
	where
		F: Send + Sync + 'static + Fn(&str) -> Fut,
		Fut: Future<Output = Result<TaskOutput>> + Send + 'static,
	{
		async fn run(&self, input: &str) -> Result<TaskOutput> {
			(self.f)(input).await
		}
	}

	Arc::new(ClosureTask { f })
}
