//! Status, list and show commands

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::{MetaDb, QueueStats, Status, VideoWithAnalysis};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub direct_strategy: bool,
    pub session_strategy: bool,
    pub models_api_url: String,
    pub models_key_present: bool,
    pub summary_models: Vec<String>,
    pub queue: QueueStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusInfo> {
    info!("Getting status");

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        direct_strategy: config.acquisition.oauth_token().is_some(),
        session_strategy: config.acquisition.session_cookie().is_some(),
        models_api_url: config.models.api_url.clone(),
        models_key_present: config.models.api_key().is_some(),
        summary_models: config.models.summary_models.clone(),
        queue: db.get_stats().await?,
    })
}

/// Which videos `list` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Status(Status),
    /// Analyzed and carrying a result
    Analyzed,
}

pub async fn cmd_list(db: &MetaDb, filter: ListFilter, limit: i64) -> Result<Vec<VideoWithAnalysis>> {
    match filter {
        ListFilter::All => db.list_all(limit).await,
        ListFilter::Analyzed => db.list_analyzed(limit).await,
        ListFilter::Status(status) => db.list_by_status(status, limit).await,
    }
}

/// Look up one video by its platform id
pub async fn cmd_show(db: &MetaDb, video_id: &str) -> Result<VideoWithAnalysis> {
    db.find_with_analysis(video_id)
        .await?
        .ok_or_else(|| Error::VideoNotFound(video_id.to_string()))
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 tubedigest Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);

    println!("\nAcquisition:");
    println!("  {} Direct (OAuth token)", mark(status.direct_strategy));
    println!("  {} Session polling", mark(status.session_strategy));

    println!("\nModels:");
    println!("  API: {}", status.models_api_url);
    println!("  {} API key", mark(status.models_key_present));
    println!("  Summary models: {}", status.summary_models.join(", "));

    let q = &status.queue;
    println!("\nQueue:");
    println!("  Total: {}", q.total);
    println!("  New: {}", q.new);
    println!("  Processing: {}", q.processing);
    println!("  Analyzed: {} ({} with result)", q.analyzed, q.with_result);
    println!("  Error: {}", q.error);
    if let Some(last) = &q.last_update {
        println!("  Last update: {}", last);
    }
    if let Some(sub) = &q.last_submission {
        println!(
            "  Last submission: {} ({} added, {} updated, {})",
            sub.submitted_at, sub.videos_added, sub.videos_updated, sub.kind
        );
    }
}

/// Print a video list to console
pub fn print_videos(videos: &[VideoWithAnalysis]) {
    println!("\n🎬 Videos\n");

    if videos.is_empty() {
        println!("No videos. Use 'tubedigest submit' to queue some.");
        return;
    }

    for row in videos {
        let v = &row.video;
        println!("• {} [{}]", v.title, v.status);
        println!("  ID: {}", v.video_id);
        println!("  URL: {}", v.url);
        if v.attempts > 0 {
            println!("  Failed attempts: {}", v.attempts);
        }
        if let Some(summary) = &row.analysis_summary {
            println!("  Digest: {}", summary);
        }
        if let Some(err) = &row.error_message {
            println!("  Error: {}", err);
        }
        println!();
    }
}

/// Print one video with its artifact
pub fn print_video(row: &VideoWithAnalysis) {
    let v = &row.video;
    println!("\n🎬 {}\n", v.title);
    println!("ID: {}", v.video_id);
    println!("URL: {}", v.url);
    if let Some(channel) = &v.channel_title {
        println!("Channel: {}", channel);
    }
    println!("Status: {}", v.status);
    println!("Attempts: {}", v.attempts);
    println!("Created: {}", v.created_at);
    println!("Updated: {}", v.updated_at);

    if let Some(source) = &row.sharing_url {
        println!("Source: {}", source);
    }
    if let Some(err) = &row.error_message {
        println!("\n⚠ Error: {}", err);
    }
    if let Some(summary) = &row.analysis_summary {
        println!("\nDigest:\n{}", summary);
    }
    if let Some(result) = &row.analysis_result {
        println!("\nAnalysis:\n{}", result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::RawVideo;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_show_and_list() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        let db = MetaDb::connect(&config).await.unwrap();
        db.init_schema().await.unwrap();

        db.upsert_video(&RawVideo::new("abc", "ABC", "https://youtu.be/abc"))
            .await
            .unwrap();

        let row = cmd_show(&db, "abc").await.unwrap();
        assert_eq!(row.video.title, "ABC");
        assert!(matches!(
            cmd_show(&db, "missing").await.unwrap_err(),
            Error::VideoNotFound(_)
        ));

        assert_eq!(cmd_list(&db, ListFilter::All, 10).await.unwrap().len(), 1);
        assert_eq!(
            cmd_list(&db, ListFilter::Status(Status::New), 10)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(cmd_list(&db, ListFilter::Analyzed, 10)
            .await
            .unwrap()
            .is_empty());

        let status = cmd_status(&config, &db).await.unwrap();
        assert_eq!(status.queue.total, 1);
    }
}
