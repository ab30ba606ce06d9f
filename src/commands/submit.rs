//! Submit command implementation

use crate::discovery::{load_candidates, submit_candidates, AcceptAll, RawVideo, SubmitReport};
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use std::path::PathBuf;

/// Where candidates come from
#[derive(Debug, Clone)]
pub enum SubmitInput {
    /// JSON array of candidate records
    File(PathBuf),
    /// One video given on the command line
    Single(RawVideo),
}

pub async fn cmd_submit(db: &MetaDb, input: SubmitInput) -> Result<SubmitReport> {
    let (videos, kind) = match input {
        SubmitInput::File(path) => {
            if !path.exists() {
                return Err(Error::Other(format!(
                    "Candidate file not found: {}",
                    path.display()
                )));
            }
            (load_candidates(&path)?, "file")
        }
        SubmitInput::Single(video) => (vec![video], "manual"),
    };

    submit_candidates(db, &AcceptAll, &videos, kind).await
}

pub fn print_submit_report(report: &SubmitReport) {
    println!("✓ Submission recorded");
    println!("  Added: {}", report.added);
    println!("  Updated: {}", report.updated);
    if report.skipped > 0 {
        println!("  Skipped: {}", report.skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_submit_single_and_file() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        let db = MetaDb::connect(&config).await.unwrap();
        db.init_schema().await.unwrap();

        let report = cmd_submit(
            &db,
            SubmitInput::Single(RawVideo::new("one", "One", "https://youtu.be/one")),
        )
        .await
        .unwrap();
        assert_eq!(report.added, 1);

        let file = tmp.path().join("batch.json");
        std::fs::write(
            &file,
            r#"[{"video_id": "one", "title": "One again", "url": "https://youtu.be/one"},
                {"video_id": "two", "title": "Two", "url": "https://youtu.be/two"}]"#,
        )
        .unwrap();
        let report = cmd_submit(&db, SubmitInput::File(file)).await.unwrap();
        assert_eq!((report.added, report.updated), (1, 1));
        assert_eq!(report.submission.unwrap().kind, "file");

        assert!(cmd_submit(&db, SubmitInput::File(tmp.path().join("missing.json")))
            .await
            .is_err());
    }
}
