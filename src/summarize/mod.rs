//! Summarization chain
//!
//! Sends extracted text through the configured models. Each model is tried
//! with a descending ladder of token budgets; a capacity refusal moves on to
//! the next model straight away. The first non-empty completion wins.

mod condense;

pub use condense::*;

use crate::config::ModelsConfig;
use crate::llm::{next_step, AttemptLadder, ChatBackend, ChatRequest, CompletionFailure, Step};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ANALYSIS_INSTRUCTIONS: &str = "\
Analyze the following transcript summary and bring out its most important and least obvious points.

Focus on insights a plain retelling would miss: psychological, technical, cultural and ethical nuances.
Organize the review by theme rather than by chronology. Explain each point briefly and skip filler.
Where possible, include the concrete examples or observations that illustrate an idea.

Structure the answer as:
1. Main topic and context (2-3 sentences)
2. Key insights (7-10 points, each explained)
3. Unusual aspects and observations
4. Practical takeaways";

/// Prompt for the full analysis of `text`
pub fn analysis_prompt(text: &str) -> String {
    format!("{}\n\nText to analyze:\n\n{}", ANALYSIS_INSTRUCTIONS, text)
}

/// A usable completion and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub max_tokens: u32,
    /// Requests sent, including the successful one
    pub requests: usize,
}

/// Every model exhausted every budget
#[derive(Debug, Clone, PartialEq)]
pub struct Unavailable {
    pub stage: &'static str,
    pub requests: usize,
    pub last_failure: Option<CompletionFailure>,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} unavailable after {} requests", self.stage, self.requests)?;
        if let Some(failure) = &self.last_failure {
            write!(f, " (last: {})", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for Unavailable {}

/// Walk the ladder until a model returns usable text
pub async fn run_ladder(
    backend: &dyn ChatBackend,
    stage: &'static str,
    models: &[String],
    budgets: &[u32],
    prompt: &str,
    temperature: f32,
) -> Result<Completion, Unavailable> {
    let mut ladder = AttemptLadder::new(models, budgets);
    let mut requests = 0;
    let mut last_failure = None;

    while let Some(attempt) = ladder.next() {
        requests += 1;
        let request = ChatRequest {
            model: attempt.model.to_string(),
            prompt: prompt.to_string(),
            max_tokens: attempt.max_tokens,
            temperature,
        };

        debug!(
            stage,
            model = attempt.model,
            max_tokens = attempt.max_tokens,
            attempt = requests,
            "Requesting completion"
        );
        let outcome = backend.complete(&request).await;
        let step = next_step(&outcome);

        match outcome {
            Ok(text) => {
                info!(
                    stage,
                    model = attempt.model,
                    max_tokens = attempt.max_tokens,
                    chars = text.len(),
                    "Completion succeeded"
                );
                return Ok(Completion {
                    text,
                    model: attempt.model.to_string(),
                    max_tokens: attempt.max_tokens,
                    requests,
                });
            }
            Err(failure) => {
                warn!(
                    stage,
                    model = attempt.model,
                    max_tokens = attempt.max_tokens,
                    error = %failure,
                    "Completion attempt failed"
                );
                if step == Step::AdvanceModel {
                    ladder.abandon_model();
                }
                last_failure = Some(failure);
            }
        }
    }

    Err(Unavailable {
        stage,
        requests,
        last_failure,
    })
}

/// Produces the full analysis of extracted text
pub struct Summarizer {
    backend: Arc<dyn ChatBackend>,
    models: Vec<String>,
    budgets: Vec<u32>,
    temperature: f32,
}

impl Summarizer {
    pub fn new(config: &ModelsConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            models: config.summary_models.clone(),
            budgets: config.token_budgets.clone(),
            temperature: config.temperature,
        }
    }

    pub async fn summarize(&self, text: &str) -> Result<Completion, Unavailable> {
        run_ladder(
            self.backend.as_ref(),
            "summarization",
            &self.models,
            &self.budgets,
            &analysis_prompt(text),
            self.temperature,
        )
        .await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outcomes per model and records every request
    #[derive(Default)]
    pub struct ScriptedBackend {
        scripts: Mutex<Vec<(String, VecDeque<Result<String, CompletionFailure>>)>>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        pub fn with(mut self, model: &str, outcomes: Vec<Result<String, CompletionFailure>>) -> Self {
            self.scripts
                .get_mut()
                .unwrap()
                .push((model.to_string(), outcomes.into()));
            self
        }

        pub fn calls(&self) -> Vec<(String, u32)> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| (r.model.clone(), r.max_tokens))
                .collect()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionFailure> {
            self.requests.lock().unwrap().push(request.clone());
            let mut scripts = self.scripts.lock().unwrap();
            scripts
                .iter_mut()
                .find(|(model, _)| *model == request.model)
                .and_then(|(_, outcomes)| outcomes.pop_front())
                .unwrap_or(Err(CompletionFailure::Empty))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;

    fn config(models: &[&str], budgets: &[u32]) -> ModelsConfig {
        ModelsConfig {
            summary_models: models.iter().map(|m| m.to_string()).collect(),
            token_budgets: budgets.to_vec(),
            ..ModelsConfig::default()
        }
    }

    #[tokio::test]
    async fn test_no_instances_moves_to_next_model_after_one_request() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with(
                    "M1",
                    vec![Err(CompletionFailure::NoCapacity(
                        "no instances available".to_string(),
                    ))],
                )
                .with("M2", vec![Ok("summary text".to_string())]),
        );
        let summarizer = Summarizer::new(&config(&["M1", "M2"], &[64000, 32000]), backend.clone());

        let completion = summarizer.summarize("hello world").await.unwrap();
        assert_eq!(completion.text, "summary text");
        assert_eq!(completion.model, "M2");
        assert_eq!(
            backend.calls(),
            vec![("M1".to_string(), 64000), ("M2".to_string(), 64000)]
        );
    }

    #[tokio::test]
    async fn test_failures_walk_down_the_budget_ladder() {
        let backend = Arc::new(ScriptedBackend::default().with(
            "M1",
            vec![
                Err(CompletionFailure::Timeout),
                Err(CompletionFailure::Empty),
                Ok("done".to_string()),
            ],
        ));
        let summarizer = Summarizer::new(&config(&["M1"], &[300, 200, 100]), backend.clone());

        let completion = summarizer.summarize("text").await.unwrap();
        assert_eq!(completion.max_tokens, 100);
        assert_eq!(completion.requests, 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_unavailable() {
        let backend = Arc::new(ScriptedBackend::default());
        let summarizer = Summarizer::new(&config(&["M1", "M2"], &[200, 100]), backend.clone());

        let err = summarizer.summarize("text").await.unwrap_err();
        assert_eq!(err.requests, 4);
        assert_eq!(err.last_failure, Some(CompletionFailure::Empty));
        assert!(err.to_string().starts_with("summarization unavailable"));
    }

    #[tokio::test]
    async fn test_prompt_carries_text() {
        let backend = Arc::new(ScriptedBackend::default().with("M1", vec![Ok("ok".to_string())]));
        let summarizer = Summarizer::new(&config(&["M1"], &[100]), backend.clone());
        summarizer.summarize("the transcript").await.unwrap();

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].prompt.ends_with("Text to analyze:\n\nthe transcript"));
        assert_eq!(requests[0].temperature, 0.7);
    }
}
