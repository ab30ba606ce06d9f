//! Condensed digest of a full analysis

use super::{run_ladder, Completion, Unavailable};
use crate::config::ModelsConfig;
use crate::llm::ChatBackend;
use std::sync::Arc;
use std::time::Duration;

const CONDENSE_INSTRUCTIONS: &str = "\
From the analysis below, pick the single most interesting finding and state it as one short sentence.
Write exactly one highlight. No headings, no lists, no bold or italics, no quotes, no preamble.";

pub fn condense_prompt(full_text: &str) -> String {
    format!("{}\n\nAnalysis:\n\n{}", CONDENSE_INSTRUCTIONS, full_text)
}

/// Reduce a reply to one plain line: drop markup and keep the first
/// non-empty line.
pub fn clean_highlight(reply: &str) -> String {
    let line = reply
        .lines()
        .map(|l| {
            l.trim()
                .trim_start_matches(['#', '-', '*', '>', '•'])
                .trim()
        })
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    line.replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .trim_matches(|c| c == '"' || c == '\'' || c == '«' || c == '»')
        .trim()
        .to_string()
}

/// Produces the short digest with one fixed-size request per model
pub struct Condenser {
    backend: Arc<dyn ChatBackend>,
    models: Vec<String>,
    budget: [u32; 1],
    temperature: f32,
    pause: Duration,
}

impl Condenser {
    pub fn new(config: &ModelsConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            models: config.condense_models().to_vec(),
            budget: [config.condense_max_tokens],
            temperature: config.temperature,
            pause: Duration::from_secs(config.condense_pause_secs),
        }
    }

    /// Pause to take after the full analysis
    pub fn pause(&self) -> Duration {
        self.pause
    }

    pub async fn condense(&self, full_text: &str) -> Result<Completion, Unavailable> {
        let mut completion = run_ladder(
            self.backend.as_ref(),
            "condensation",
            &self.models,
            &self.budget,
            &condense_prompt(full_text),
            self.temperature,
        )
        .await?;

        let cleaned = clean_highlight(&completion.text);
        if !cleaned.is_empty() {
            completion.text = cleaned;
        }
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionFailure;
    use crate::summarize::testing::ScriptedBackend;

    #[test]
    fn test_clean_highlight() {
        assert_eq!(clean_highlight("**Short** point"), "Short point");
        assert_eq!(clean_highlight("\n\n# \"Quoted\"\nsecond line"), "Quoted");
        assert_eq!(clean_highlight("- `code` idea"), "code idea");
        assert_eq!(clean_highlight("plain"), "plain");
    }

    #[tokio::test]
    async fn test_one_request_per_model() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("M1", vec![Err(CompletionFailure::Timeout)])
                .with("M2", vec![Ok("short".to_string())]),
        );
        let config = ModelsConfig {
            summary_models: vec!["M1".to_string(), "M2".to_string()],
            condense_max_tokens: 256,
            ..ModelsConfig::default()
        };

        let completion = Condenser::new(&config, backend.clone())
            .condense("full")
            .await
            .unwrap();
        assert_eq!(completion.text, "short");
        assert_eq!(
            backend.calls(),
            vec![("M1".to_string(), 256), ("M2".to_string(), 256)]
        );
    }

    #[tokio::test]
    async fn test_uses_condense_models_when_set() {
        let backend = Arc::new(ScriptedBackend::default());
        let config = ModelsConfig {
            summary_models: vec!["big".to_string()],
            condense_models: vec!["tiny".to_string()],
            ..ModelsConfig::default()
        };

        let err = Condenser::new(&config, backend.clone())
            .condense("full")
            .await
            .unwrap_err();
        assert_eq!(err.requests, 1);
        assert_eq!(backend.calls(), vec![("tiny".to_string(), 512)]);
    }
}
