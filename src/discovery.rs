//! Candidate intake from the discovery side
//!
//! Discovery and filtering happen upstream. This module only defines the
//! record it hands over, the inclusion hook, and the submission step that
//! puts accepted records on the queue.

use crate::error::{Error, Result};
use crate::meta::{MetaDb, Submission, UpsertOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// A candidate video as produced by discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVideo {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub channel_title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub duration_secs: i64,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub subscribers: i64,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl RawVideo {
    pub fn new(video_id: &str, title: &str, url: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: title.to_string(),
            channel_title: None,
            url: url.to_string(),
            duration_secs: 0,
            views: 0,
            subscribers: 0,
            published_at: None,
            category: None,
        }
    }
}

/// Decides whether a candidate goes on the queue
pub trait InclusionPolicy: Send + Sync {
    fn should_include(&self, video: &RawVideo) -> bool;
}

/// Pass-through policy; filtering is expected to have happened upstream
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl InclusionPolicy for AcceptAll {
    fn should_include(&self, _video: &RawVideo) -> bool {
        true
    }
}

/// Counts from one submission batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmitReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub submission: Option<Submission>,
}

/// Upsert every included candidate and record the batch
pub async fn submit_candidates(
    db: &MetaDb,
    policy: &dyn InclusionPolicy,
    videos: &[RawVideo],
    kind: &str,
) -> Result<SubmitReport> {
    let mut report = SubmitReport::default();

    for video in videos {
        if video.video_id.trim().is_empty() {
            return Err(Error::Other(format!(
                "Candidate '{}' has an empty video_id",
                video.title
            )));
        }

        if !policy.should_include(video) {
            debug!(video_id = %video.video_id, "Excluded by policy");
            report.skipped += 1;
            continue;
        }

        match db.upsert_video(video).await? {
            UpsertOutcome::Inserted => report.added += 1,
            UpsertOutcome::Updated => report.updated += 1,
        }
    }

    report.submission = Some(
        db.record_submission(report.added, report.updated, kind)
            .await?,
    );

    info!(
        added = report.added,
        updated = report.updated,
        skipped = report.skipped,
        "Submitted candidates"
    );
    Ok(report)
}

/// Read a JSON array of candidates from a file
pub fn load_candidates(path: &Path) -> Result<Vec<RawVideo>> {
    let content = std::fs::read_to_string(path)?;
    let videos: Vec<RawVideo> = serde_json::from_str(&content)?;
    Ok(videos)
}
