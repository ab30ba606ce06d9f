//! Metadata storage using SQLite
//!
//! This module is the persistence gateway of the pipeline:
//! - Videos (work items with a status-driven lifecycle)
//! - Analyses (the single live artifact per video, replaced on save)
//! - Submissions (history of discovery batches)
//!
//! Every status change happens here. Claims are a single conditional
//! `UPDATE ... RETURNING`, and every write that touches both an artifact and
//! a status runs in one transaction.

mod schema;
mod status;

pub use schema::*;
pub use status::*;

use crate::config::Config;
use crate::discovery::RawVideo;
use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Timestamp format used for every stored time.
///
/// Fixed precision keeps the strings lexicographically ordered, which the
/// stale sweep and the claim order rely on.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `now - span`, rejecting spans chrono cannot represent
fn cutoff_before(span: Option<TimeDelta>, what: &str) -> Result<DateTime<Utc>> {
    span.and_then(|span| Utc::now().checked_sub_signed(span))
        .ok_or_else(|| Error::Config(format!("{} is out of range", what)))
}

/// A queued video
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub video_id: String,
    pub title: String,
    pub channel_title: Option<String>,
    pub url: String,
    pub duration_secs: i64,
    pub views: i64,
    pub subscribers: i64,
    pub published_at: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub attempts: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Video {
    pub fn get_status(&self) -> Result<Status> {
        self.status.parse()
    }
}

/// A stored analysis artifact
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub video_id: String,
    pub sharing_url: Option<String>,
    pub extracted_text: Option<String>,
    pub analysis_result: Option<String>,
    pub analysis_summary: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// Artifact values produced by the pipeline for one video
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFields {
    pub sharing_url: Option<String>,
    pub extracted_text: Option<String>,
    pub analysis_result: Option<String>,
    pub analysis_summary: Option<String>,
    pub error_message: Option<String>,
}

impl AnalysisFields {
    pub fn has_result(&self) -> bool {
        self.analysis_result
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }

    pub fn has_extracted_text(&self) -> bool {
        self.extracted_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

impl From<Analysis> for AnalysisFields {
    fn from(a: Analysis) -> Self {
        Self {
            sharing_url: a.sharing_url,
            extracted_text: a.extracted_text,
            analysis_result: a.analysis_result,
            analysis_summary: a.analysis_summary,
            error_message: a.error_message,
        }
    }
}

/// A video joined with its artifact columns
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VideoWithAnalysis {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub video: Video,
    pub sharing_url: Option<String>,
    pub extracted_text: Option<String>,
    pub analysis_result: Option<String>,
    pub analysis_summary: Option<String>,
    pub error_message: Option<String>,
}

/// A recorded discovery batch
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub submitted_at: String,
    pub videos_added: i64,
    pub videos_updated: i64,
    pub kind: String,
}

/// Result of submitting one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Queue statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub new: usize,
    pub processing: usize,
    pub analyzed: usize,
    pub error: usize,
    pub with_result: usize,
    pub last_update: Option<String>,
    pub last_submission: Option<Submission>,
}

const JOINED_SELECT: &str = r#"
    SELECT v.*, a.sharing_url, a.extracted_text, a.analysis_result,
           a.analysis_summary, a.error_message
    FROM videos v
    LEFT JOIN analyses a ON a.video_id = v.id
"#;

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the database named by the config
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Open a database file, creating it if needed, and ensure the schema
    pub async fn new(db_path: &Path) -> Result<Self> {
        let db = Self::open(db_path).await?;
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }
        Ok(db)
    }

    async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(10))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='videos'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Video Operations =====

    /// Insert a video, or refresh the mutable fields of an existing one.
    ///
    /// The status and attempt counter of an existing row are left alone.
    pub async fn upsert_video(&self, raw: &RawVideo) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM videos WHERE video_id = ?")
                .bind(&raw.video_id)
                .fetch_optional(&mut *tx)
                .await?;

        let now = now_timestamp();
        sqlx::query(
            r#"
            INSERT INTO videos (id, video_id, title, channel_title, url, duration_secs, views,
                                subscribers, published_at, category, status, attempts,
                                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'new', 0, ?, ?)
            ON CONFLICT(video_id) DO UPDATE SET
                title = excluded.title,
                channel_title = excluded.channel_title,
                url = excluded.url,
                duration_secs = excluded.duration_secs,
                views = excluded.views,
                subscribers = excluded.subscribers,
                published_at = excluded.published_at,
                category = excluded.category,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&raw.video_id)
        .bind(&raw.title)
        .bind(&raw.channel_title)
        .bind(&raw.url)
        .bind(raw.duration_secs)
        .bind(raw.views)
        .bind(raw.subscribers)
        .bind(&raw.published_at)
        .bind(&raw.category)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Get video by internal ID
    pub async fn get_video(&self, id: &str) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    /// Get video by platform video ID
    pub async fn get_video_by_external_id(&self, video_id: &str) -> Result<Option<Video>> {
        let video = sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE video_id = ?")
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    /// Get a video and its artifact by platform video ID
    pub async fn find_with_analysis(&self, video_id: &str) -> Result<Option<VideoWithAnalysis>> {
        let row = sqlx::query_as::<_, VideoWithAnalysis>(&format!(
            "{} WHERE v.video_id = ?",
            JOINED_SELECT
        ))
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// List videos with a given status, newest first
    pub async fn list_by_status(
        &self,
        status: Status,
        limit: i64,
    ) -> Result<Vec<VideoWithAnalysis>> {
        let rows = sqlx::query_as::<_, VideoWithAnalysis>(&format!(
            "{} WHERE v.status = ? ORDER BY v.created_at DESC LIMIT ?",
            JOINED_SELECT
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// List analyzed videos that carry a result, most recent analysis first
    pub async fn list_analyzed(&self, limit: i64) -> Result<Vec<VideoWithAnalysis>> {
        let rows = sqlx::query_as::<_, VideoWithAnalysis>(&format!(
            "{} WHERE v.status = 'analyzed' AND a.analysis_result IS NOT NULL \
             ORDER BY a.created_at DESC LIMIT ?",
            JOINED_SELECT
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// List every video, newest first
    pub async fn list_all(&self, limit: i64) -> Result<Vec<VideoWithAnalysis>> {
        let rows = sqlx::query_as::<_, VideoWithAnalysis>(&format!(
            "{} ORDER BY v.created_at DESC LIMIT ?",
            JOINED_SELECT
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ===== Analysis Operations =====

    /// Get the live artifact for a video
    pub async fn get_analysis(&self, id: &str) -> Result<Option<Analysis>> {
        let analysis = sqlx::query_as::<_, Analysis>(
            "SELECT * FROM analyses WHERE video_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(analysis)
    }

    /// Count artifact rows for a video
    pub async fn count_analyses(&self, id: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analyses WHERE video_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    // ===== Lifecycle =====

    /// Claim the oldest new video and mark it processing.
    ///
    /// One statement, so two workers racing for the same row cannot both
    /// see it change.
    pub async fn claim_next(&self) -> Result<Option<Video>> {
        let claimed = sqlx::query_as::<_, Video>(
            r#"
            UPDATE videos SET status = 'processing', updated_at = ?
            WHERE id = (
                SELECT id FROM videos
                WHERE status = 'new'
                ORDER BY created_at ASC, rowid ASC
                LIMIT 1
            )
            AND status = 'new'
            RETURNING *
            "#,
        )
        .bind(now_timestamp())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ref video) = claimed {
            info!(video_id = %video.video_id, "Claimed video for processing");
        }
        Ok(claimed)
    }

    /// Store acquired text for a video that is still processing.
    ///
    /// Lets a recovered item skip acquisition on its next claim.
    pub async fn checkpoint_extraction(
        &self,
        id: &str,
        sharing_url: Option<&str>,
        extracted_text: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current = Self::status_in(&mut tx, id).await?;
        if current != Status::Processing {
            return Err(Error::ClaimLost {
                video: id.to_string(),
                status: current,
            });
        }

        sqlx::query("DELETE FROM analyses WHERE video_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO analyses (id, video_id, sharing_url, extracted_text, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(id)
        .bind(sharing_url)
        .bind(extracted_text)
        .bind(now_timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE videos SET updated_at = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(id, "Checkpointed extracted text");
        Ok(())
    }

    /// Replace the artifact of a video and commit its terminal status.
    ///
    /// The status is `analyzed` when the artifact carries a full result and
    /// `error` otherwise. Artifact replacement and status change commit
    /// together or not at all. Committing a video that is back in `new`
    /// fails with [`Error::ClaimLost`], since a sweep has already handed it
    /// to the next claimant. A terminal video only accepts a re-commit with
    /// the same outcome.
    pub async fn complete(&self, id: &str, fields: &AnalysisFields) -> Result<Status> {
        let mut tx = self.pool.begin().await?;

        let current = Self::status_in(&mut tx, id).await?;
        if current == Status::New {
            return Err(Error::ClaimLost {
                video: id.to_string(),
                status: current,
            });
        }
        let next = Status::for_commit(fields.has_result());
        if !current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                video: id.to_string(),
                from: current,
                to: next,
            });
        }

        let error_message = match (next, &fields.error_message) {
            (Status::Error, None) => Some("Analysis produced no result".to_string()),
            (_, message) => message.clone(),
        };

        sqlx::query("DELETE FROM analyses WHERE video_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO analyses (id, video_id, sharing_url, extracted_text, analysis_result,
                                  analysis_summary, error_message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(id)
        .bind(&fields.sharing_url)
        .bind(&fields.extracted_text)
        .bind(&fields.analysis_result)
        .bind(&fields.analysis_summary)
        .bind(&error_message)
        .bind(now_timestamp())
        .execute(&mut *tx)
        .await?;

        let attempts_delta: i64 = if next == Status::Error { 1 } else { 0 };
        let updated = sqlx::query(
            r#"
            UPDATE videos SET status = ?, attempts = attempts + ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(next.as_str())
        .bind(attempts_delta)
        .bind(now_timestamp())
        .bind(id)
        .bind(current.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(Error::ClaimLost {
                video: id.to_string(),
                status: current,
            });
        }

        tx.commit().await?;
        info!(id, status = %next, "Committed analysis");
        Ok(next)
    }

    /// Return processing videos untouched for `threshold_minutes` to `new`
    pub async fn recover_stale(&self, threshold_minutes: i64) -> Result<u64> {
        let cutoff = cutoff_before(TimeDelta::try_minutes(threshold_minutes), "stale threshold")?;
        self.recover_stale_before(cutoff).await
    }

    /// Return processing videos last updated before `cutoff` to `new`
    pub async fn recover_stale_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE videos SET status = 'new', updated_at = ?
            WHERE status = 'processing' AND updated_at < ?
            "#,
        )
        .bind(now_timestamp())
        .bind(format_timestamp(cutoff))
        .execute(&self.pool)
        .await?;

        let count = result.rows_affected();
        if count > 0 {
            info!(count, "Recovered stale processing videos");
        } else {
            debug!("No stale processing videos");
        }
        Ok(count)
    }

    /// Return errored videos to `new` and drop their artifacts.
    ///
    /// Only the artifacts of the rows being reset are deleted. With
    /// `max_attempts`, rows that already failed that many times stay put.
    pub async fn retry_errors(&self, max_attempts: Option<u32>) -> Result<u64> {
        let cap = max_attempts.map(i64::from);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM analyses WHERE video_id IN (
                SELECT id FROM videos
                WHERE status = 'error' AND (? IS NULL OR attempts < ?)
            )
            "#,
        )
        .bind(cap)
        .bind(cap)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE videos SET status = 'new', updated_at = ?
            WHERE status = 'error' AND (? IS NULL OR attempts < ?)
            "#,
        )
        .bind(now_timestamp())
        .bind(cap)
        .bind(cap)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let count = result.rows_affected();
        if count > 0 {
            info!(count, "Reset errored videos for retry");
        } else {
            debug!("No errored videos to retry");
        }
        Ok(count)
    }

    async fn status_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        id: &str,
    ) -> Result<Status> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        status
            .ok_or_else(|| Error::VideoNotFound(id.to_string()))?
            .parse()
    }

    // ===== Retention =====

    /// Delete videos (and artifacts) created more than `days` ago
    pub async fn cleanup_older_than(&self, days: i64) -> Result<u64> {
        let cutoff = cutoff_before(TimeDelta::try_days(days), "retention window")?;
        let cutoff = format_timestamp(cutoff);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM analyses WHERE video_id IN (SELECT id FROM videos WHERE created_at < ?)",
        )
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM videos WHERE created_at < ?")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(deleted = result.rows_affected(), days, "Cleaned up old videos");
        Ok(result.rows_affected())
    }

    /// Delete every video that is not analyzed
    pub async fn purge_unanalyzed(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM analyses WHERE video_id IN (SELECT id FROM videos WHERE status != 'analyzed')",
        )
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM videos WHERE status != 'analyzed'")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(deleted = result.rows_affected(), "Purged unanalyzed videos");
        Ok(result.rows_affected())
    }

    // ===== Submissions =====

    /// Record a discovery batch
    pub async fn record_submission(
        &self,
        videos_added: usize,
        videos_updated: usize,
        kind: &str,
    ) -> Result<Submission> {
        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            submitted_at: now_timestamp(),
            videos_added: videos_added as i64,
            videos_updated: videos_updated as i64,
            kind: kind.to_string(),
        };

        sqlx::query(
            r#"
            INSERT INTO submissions (id, submitted_at, videos_added, videos_updated, kind)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&submission.id)
        .bind(&submission.submitted_at)
        .bind(submission.videos_added)
        .bind(submission.videos_updated)
        .bind(&submission.kind)
        .execute(&self.pool)
        .await?;

        Ok(submission)
    }

    /// Most recent discovery batch
    pub async fn last_submission(&self) -> Result<Option<Submission>> {
        let submission = sqlx::query_as::<_, Submission>(
            "SELECT * FROM submissions ORDER BY submitted_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(submission)
    }

    // ===== Statistics =====

    /// Get queue statistics
    pub async fn get_stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats::default();

        let counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM videos GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        for (status, count) in counts {
            let count = count as usize;
            stats.total += count;
            match status.parse::<Status>() {
                Ok(Status::New) => stats.new = count,
                Ok(Status::Processing) => stats.processing = count,
                Ok(Status::Analyzed) => stats.analyzed = count,
                Ok(Status::Error) => stats.error = count,
                Err(_) => debug!(%status, "Ignoring unknown status in stats"),
            }
        }

        let with_result: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM videos v
            JOIN analyses a ON a.video_id = v.id
            WHERE a.analysis_result IS NOT NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        stats.with_result = with_result as usize;

        stats.last_update = sqlx::query_scalar("SELECT MAX(updated_at) FROM videos")
            .fetch_one(&self.pool)
            .await?;

        stats.last_submission = self.last_submission().await?;

        Ok(stats)
    }
}
