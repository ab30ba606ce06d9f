//! Queue sweeps and retention

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::Serialize;
use tracing::info;

/// Rows touched by a maintenance action
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub action: &'static str,
    pub affected: u64,
}

/// Return stuck processing videos to the queue
pub async fn cmd_recover_stale(
    config: &Config,
    db: &MetaDb,
    minutes: Option<i64>,
) -> Result<MaintenanceReport> {
    let minutes = minutes.unwrap_or(config.queue.stale_minutes);
    if minutes < 0 {
        return Err(Error::Config("minutes must not be negative".to_string()));
    }
    let affected = db.recover_stale(minutes).await?;
    Ok(MaintenanceReport {
        action: "recovered",
        affected,
    })
}

/// Return errored videos to the queue
pub async fn cmd_retry_errors(
    config: &Config,
    db: &MetaDb,
    max_attempts: Option<u32>,
) -> Result<MaintenanceReport> {
    let cap = max_attempts.or(config.queue.max_error_attempts);
    let affected = db.retry_errors(cap).await?;
    Ok(MaintenanceReport {
        action: "reset for retry",
        affected,
    })
}

/// Delete videos older than the retention window
pub async fn cmd_cleanup(
    config: &Config,
    db: &MetaDb,
    days: Option<i64>,
) -> Result<MaintenanceReport> {
    let days = days.unwrap_or(config.queue.retention_days);
    if days < 0 {
        return Err(Error::Config("days must not be negative".to_string()));
    }
    info!(days, "Cleaning up old videos");
    let affected = db.cleanup_older_than(days).await?;
    Ok(MaintenanceReport {
        action: "deleted",
        affected,
    })
}

/// Delete every video that has not been analyzed
pub async fn cmd_purge(db: &MetaDb, confirmed: bool) -> Result<MaintenanceReport> {
    if !confirmed {
        return Err(Error::Other(
            "Refusing to purge without --yes".to_string(),
        ));
    }
    let affected = db.purge_unanalyzed().await?;
    Ok(MaintenanceReport {
        action: "purged",
        affected,
    })
}

pub fn print_maintenance(report: &MaintenanceReport) {
    println!("✓ {} video(s) {}", report.affected, report.action);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::RawVideo;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_maintenance_commands() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        let db = MetaDb::connect(&config).await.unwrap();
        db.init_schema().await.unwrap();
        db.upsert_video(&RawVideo::new("a", "A", "https://youtu.be/a"))
            .await
            .unwrap();

        assert_eq!(cmd_recover_stale(&config, &db, None).await.unwrap().affected, 0);
        assert_eq!(cmd_retry_errors(&config, &db, None).await.unwrap().affected, 0);
        assert_eq!(cmd_cleanup(&config, &db, None).await.unwrap().affected, 0);
        assert!(cmd_cleanup(&config, &db, Some(-2)).await.is_err());
        assert!(cmd_cleanup(&config, &db, Some(10_000_000_000)).await.is_err());
        assert!(cmd_recover_stale(&config, &db, Some(i64::MAX / 2)).await.is_err());

        assert!(cmd_purge(&db, false).await.is_err());
        assert_eq!(cmd_purge(&db, true).await.unwrap().affected, 1);
    }
}
