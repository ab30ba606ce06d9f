//! Video processing pipeline
//!
//! Claims one queued video at a time and runs it through acquisition, full
//! analysis and condensation, then commits the outcome. Stage failures are
//! absorbed into the item's error message; storage errors propagate.

use crate::acquire::{Acquirer, NoContentAvailable};
use crate::config::{Config, QueueConfig};
use crate::error::Result;
use crate::llm::{ChatBackend, HttpChatBackend};
use crate::meta::{Analysis, AnalysisFields, MetaDb, Status, Video};
use crate::notify::Notifier;
use crate::summarize::{Condenser, Summarizer, Unavailable};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal reason an item did not reach `analyzed`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineFailure {
    #[error("{0}")]
    NoContent(NoContentAvailable),

    #[error("{0}")]
    Summarization(Unavailable),
}

/// Outcome of one processed video
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedItem {
    pub id: String,
    pub video_id: String,
    pub title: String,
    pub status: Status,
    pub has_summary: bool,
    pub error: Option<String>,
}

/// What one scheduler cycle did
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub retried: u64,
    pub recovered: u64,
    pub processed: Vec<ProcessedItem>,
    /// Claims abandoned because a sweep or another worker took the video
    pub lost: u64,
}

impl CycleReport {
    pub fn analyzed(&self) -> usize {
        self.processed
            .iter()
            .filter(|p| p.status == Status::Analyzed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.processed
            .iter()
            .filter(|p| p.status == Status::Error)
            .count()
    }
}

pub struct Pipeline {
    db: MetaDb,
    acquirer: Acquirer,
    summarizer: Summarizer,
    condenser: Condenser,
    queue: QueueConfig,
}

impl Pipeline {
    pub fn new(
        db: MetaDb,
        acquirer: Acquirer,
        summarizer: Summarizer,
        condenser: Condenser,
        queue: QueueConfig,
    ) -> Self {
        Self {
            db,
            acquirer,
            summarizer,
            condenser,
            queue,
        }
    }

    /// Build every stage from config. Fails when credentials are missing.
    pub fn from_config(config: &Config, db: MetaDb, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let acquirer = Acquirer::new(&config.acquisition, notifier.clone())?;
        let backend: Arc<dyn ChatBackend> =
            Arc::new(HttpChatBackend::from_config(&config.models, notifier)?);

        Ok(Self::new(
            db,
            acquirer,
            Summarizer::new(&config.models, backend.clone()),
            Condenser::new(&config.models, backend),
            config.queue.clone(),
        ))
    }

    pub fn db(&self) -> &MetaDb {
        &self.db
    }

    /// Run acquisition, analysis and condensation for one URL.
    ///
    /// With `checkpoint_id`, freshly acquired text is stored on that video
    /// before the models are called.
    async fn run_stages(
        &self,
        url: &str,
        existing: Option<&Analysis>,
        checkpoint_id: Option<&str>,
    ) -> Result<AnalysisFields> {
        let acquired = match self.acquirer.acquire(url, existing).await {
            Ok(acquired) => acquired,
            Err(no_content) => {
                return Ok(AnalysisFields {
                    error_message: Some(PipelineFailure::NoContent(no_content).to_string()),
                    ..Default::default()
                })
            }
        };

        if let (Some(id), false) = (checkpoint_id, acquired.reused) {
            self.db
                .checkpoint_extraction(id, acquired.source.as_deref(), &acquired.text)
                .await?;
        }

        let mut fields = AnalysisFields {
            sharing_url: acquired.source,
            extracted_text: Some(acquired.text),
            ..Default::default()
        };
        let text = fields.extracted_text.as_deref().unwrap_or_default();

        let full = match self.summarizer.summarize(text).await {
            Ok(completion) => completion.text,
            Err(unavailable) => {
                fields.error_message =
                    Some(PipelineFailure::Summarization(unavailable).to_string());
                return Ok(fields);
            }
        };

        let pause = self.condenser.pause();
        if !pause.is_zero() {
            debug!(?pause, "Pausing before condensation");
            tokio::time::sleep(pause).await;
        }

        match self.condenser.condense(&full).await {
            Ok(completion) => fields.analysis_summary = Some(completion.text),
            Err(unavailable) => warn!(url, error = %unavailable, "Keeping analysis without digest"),
        }

        fields.analysis_result = Some(full);
        Ok(fields)
    }

    /// Process a video that is already claimed
    pub async fn process_item(&self, video: &Video) -> Result<ProcessedItem> {
        info!(video_id = %video.video_id, title = %video.title, "Processing video");

        let existing = self.db.get_analysis(&video.id).await?;
        let fields = self
            .run_stages(&video.url, existing.as_ref(), Some(&video.id))
            .await?;
        let status = self.db.complete(&video.id, &fields).await?;

        match status {
            Status::Analyzed => info!(video_id = %video.video_id, "Video analyzed"),
            _ => warn!(
                video_id = %video.video_id,
                error = fields.error_message.as_deref().unwrap_or_default(),
                "Video failed"
            ),
        }

        Ok(ProcessedItem {
            id: video.id.clone(),
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            status,
            has_summary: fields.analysis_summary.is_some(),
            error: fields.error_message,
        })
    }

    /// Process a claimed video, skipping it when the claim was lost.
    ///
    /// Only storage failures are returned as errors.
    async fn process_claimed(&self, video: &Video) -> Result<Option<ProcessedItem>> {
        match self.process_item(video).await {
            Ok(item) => Ok(Some(item)),
            Err(e) if e.is_claim_conflict() => {
                warn!(video_id = %video.video_id, error = %e, "Claim lost, skipping video");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Claim the oldest new video and process it
    pub async fn process_next(&self) -> Result<Option<ProcessedItem>> {
        match self.db.claim_next().await? {
            Some(video) => self.process_claimed(&video).await,
            None => {
                debug!("Queue is empty");
                Ok(None)
            }
        }
    }

    /// One scheduler cycle: retry errors, recover stale items, then process
    /// up to `max_items` videos. `on_item` sees each result as it lands.
    pub async fn run_cycle<F>(&self, max_items: usize, mut on_item: F) -> Result<CycleReport>
    where
        F: FnMut(&ProcessedItem),
    {
        let mut report = CycleReport {
            retried: self.db.retry_errors(self.queue.max_error_attempts).await?,
            recovered: self.db.recover_stale(self.queue.stale_minutes).await?,
            ..Default::default()
        };

        // Lost claims do not use up the item budget, but are bounded by it.
        while report.processed.len() < max_items && (report.lost as usize) <= max_items {
            let Some(video) = self.db.claim_next().await? else {
                debug!("Queue is empty");
                break;
            };
            match self.process_claimed(&video).await? {
                Some(item) => {
                    on_item(&item);
                    report.processed.push(item);
                }
                None => report.lost += 1,
            }
        }

        info!(
            retried = report.retried,
            recovered = report.recovered,
            lost = report.lost,
            analyzed = report.analyzed(),
            failed = report.failed(),
            "Cycle finished"
        );
        Ok(report)
    }

    /// Analyze a URL without touching the queue
    pub async fn analyze_url(&self, url: &str) -> Result<AnalysisFields> {
        self.run_stages(url, None, None).await
    }
}
