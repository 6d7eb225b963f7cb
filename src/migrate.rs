use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::store::StatementRunner;

const CREATE_CHANNELS: &str = r#"
CREATE TABLE IF NOT EXISTS youtube_channels (
    id TEXT PRIMARY KEY NOT NULL,
    uploads_playlist TEXT,
    favourites_playlist TEXT,
    likes_playlist TEXT,
    title TEXT,
    description TEXT NOT NULL DEFAULT '',
    published_at TEXT,
    thumbnail_default TEXT,
    thumbnail_high TEXT,
    thumbnail_medium TEXT
);
CREATE INDEX IF NOT EXISTS idx_youtube_channels_title ON youtube_channels(title);
"#;

/// Create the store schema. Safe to run repeatedly.
pub fn create_schema(runner: &StatementRunner) -> Result<()> {
    runner
        .execute_silent(CREATE_CHANNELS)
        .into_result()
        .context("Failed to create youtube_channels table")?;
    Ok(())
}

pub fn run_migrations(config: &Config) -> Result<()> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    create_schema(&StatementRunner::new(db_path))?;
    info!(path = %db_path.display(), "schema ready");
    Ok(())
}
