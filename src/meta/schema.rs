//! SQLite schema definition

/// SQL schema for the video queue database
pub const SCHEMA_SQL: &str = r#"
-- Videos: one row per work item, keyed by the platform's video id
CREATE TABLE IF NOT EXISTS videos (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    channel_title TEXT,
    url TEXT NOT NULL,
    duration_secs INTEGER NOT NULL DEFAULT 0,
    views INTEGER NOT NULL DEFAULT 0,
    subscribers INTEGER NOT NULL DEFAULT 0,
    published_at TEXT,
    category TEXT,
    status TEXT NOT NULL DEFAULT 'new',
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Analyses: at most one live row per video, replaced on every save
CREATE TABLE IF NOT EXISTS analyses (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
    sharing_url TEXT,
    extracted_text TEXT,
    analysis_result TEXT,
    analysis_summary TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL
);

-- Submissions: history of candidate batches handed over by discovery
CREATE TABLE IF NOT EXISTS submissions (
    id TEXT PRIMARY KEY,
    submitted_at TEXT NOT NULL,
    videos_added INTEGER NOT NULL DEFAULT 0,
    videos_updated INTEGER NOT NULL DEFAULT 0,
    kind TEXT NOT NULL DEFAULT 'manual'
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_videos_status ON videos(status, created_at);
CREATE INDEX IF NOT EXISTS idx_videos_updated ON videos(updated_at);
CREATE INDEX IF NOT EXISTS idx_analyses_video ON analyses(video_id);
CREATE INDEX IF NOT EXISTS idx_submissions_time ON submissions(submitted_at);
"#;
