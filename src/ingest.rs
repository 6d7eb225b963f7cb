//! Batch ingestion.
//!
//! Turns a sequence of raw sources into channels, reports what went wrong,
//! and stores the usable ones:
//!
//! ```text
//! raw sources ─▶ builders ─▶ partition ─▶ report ─▶ clear ─▶ insert
//!                               │
//!                               └─▶ aborted (logged with payload, never stored)
//! ```
//!
//! Diagnostics are transient. They are summed into the [`BatchReport`] and
//! logged, then cleared on every usable entity before it is persisted.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{error, info, warn};

use crate::builder::RawSource;
use crate::channels::insert_channels;
use crate::coerce::json_kind;
use crate::config::Config;
use crate::models::Channel;
use crate::remote::{ChannelQuery, SaneClient};
use crate::store::StatementRunner;

/// Shape of the records in an ingest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SourceFormat {
    /// YouTube subscription or channel resources.
    #[default]
    Json,
    /// Arrays of strings in column order.
    List,
    /// Flat objects keyed by column name.
    Map,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbortedRecord {
    /// Position of the source in the batch.
    pub index: usize,
    pub reason: String,
    pub payload: Value,
}

/// Aggregate outcome of one batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub accepted: usize,
    pub aborted: Vec<AbortedRecord>,
    pub warnings: usize,
    pub errors: usize,
}

impl BatchReport {
    pub fn problems_suffix(&self) -> String {
        match (self.warnings, self.errors) {
            (0, 0) => String::new(),
            (w, 0) => format!(" with {} warnings", w),
            (0, e) => format!(" with {} errors", e),
            (w, e) => format!(" with {} warnings and {} errors", w, e),
        }
    }

    /// `Processing completed.` plus the problem counts, if any.
    pub fn status_line(&self) -> String {
        format!("Processing completed{}.", self.problems_suffix())
    }
}

/// Build one channel per source and split off the aborted ones.
///
/// Counts are summed over every entity, aborted or not. The returned
/// channels have had their diagnostics cleared.
pub fn build_batch(sources: &[RawSource]) -> (Vec<Channel>, BatchReport) {
    let mut report = BatchReport {
        processed: sources.len(),
        ..BatchReport::default()
    };
    let mut usable = Vec::with_capacity(sources.len());

    for (index, source) in sources.iter().enumerate() {
        let mut channel = source.build();
        report.warnings += channel.warnings().len();
        report.errors += channel.errors().len();

        if channel.was_aborted() {
            let reason = channel
                .diagnostics()
                .abort_reason()
                .unwrap_or("aborted")
                .to_string();
            let payload = source.payload();
            error!(index, reason = %reason, payload = %payload, "record aborted");
            report.aborted.push(AbortedRecord {
                index,
                reason,
                payload,
            });
            continue;
        }

        for warning in channel.warnings() {
            warn!(
                index,
                id = %channel.id(),
                payload = %warning.payload,
                "{}",
                warning.message
            );
        }
        channel.clear_errors_and_warnings();
        usable.push(channel);
    }

    report.accepted = usable.len();
    info!(
        processed = report.processed,
        accepted = report.accepted,
        aborted = report.aborted.len(),
        warnings = report.warnings,
        errors = report.errors,
        "batch built"
    );
    (usable, report)
}

/// Store already-built channels.
pub fn persist(runner: &StatementRunner, channels: &[Channel]) -> Result<()> {
    insert_channels(runner, channels)
        .into_result()
        .with_context(|| format!("Failed to store {} channels", channels.len()))?;
    Ok(())
}

/// Build, report, and persist one batch.
pub fn ingest(runner: &StatementRunner, sources: &[RawSource]) -> Result<BatchReport> {
    let (channels, report) = build_batch(sources);
    persist(runner, &channels)?;
    Ok(report)
}

/// Parse the text of an ingest file into raw sources.
///
/// `json` accepts a single resource, an array of them, or a list response
/// with an `items` array. `list` expects an array of arrays and `map` an
/// array of objects. Cells are handed to the builders untouched, so a cell
/// that cannot be read only affects its own record.
pub fn parse_sources(text: &str, format: SourceFormat) -> Result<Vec<RawSource>> {
    let value: Value = serde_json::from_str(text).context("Input is not valid JSON")?;

    match format {
        SourceFormat::Json => Ok(json_records(value).into_iter().map(RawSource::Json).collect()),
        SourceFormat::List => records(value)?
            .into_iter()
            .enumerate()
            .map(|(i, record)| list_record(i, record).map(RawSource::ValueList))
            .collect(),
        SourceFormat::Map => records(value)?
            .into_iter()
            .enumerate()
            .map(|(i, record)| map_record(i, record).map(RawSource::ValueMap))
            .collect(),
    }
}

fn json_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) if map.get("items").is_some_and(Value::is_array) => {
            match map.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        other => vec![other],
    }
}

fn records(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => bail!("Expected an array of records, found {}", json_kind(&other)),
    }
}

fn list_record(index: usize, record: Value) -> Result<Vec<Value>> {
    match record {
        Value::Array(cells) => Ok(cells),
        other => bail!("record {}: expected an array, found {}", index, json_kind(&other)),
    }
}

fn map_record(index: usize, record: Value) -> Result<BTreeMap<String, Value>> {
    match record {
        Value::Object(entries) => Ok(entries.into_iter().collect()),
        other => bail!("record {}: expected an object, found {}", index, json_kind(&other)),
    }
}

fn print_report(report: &BatchReport) {
    for aborted in &report.aborted {
        println!("  record {} aborted: {}", aborted.index, aborted.reason);
    }
    println!(
        "Stored {} of {} records.",
        report.accepted, report.processed
    );
    println!("{}", report.status_line());
}

/// CLI entry point for `sane ingest`.
pub fn run_ingest(config: &Config, file: &Path, format: SourceFormat) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read input file: {}", file.display()))?;
    let sources = parse_sources(&text, format)
        .with_context(|| format!("Failed to parse input file: {}", file.display()))?;

    let runner = StatementRunner::new(&config.db.path);
    let report = ingest(&runner, &sources)?;
    print_report(&report);
    Ok(())
}

/// CLI entry point for `sane sync`: pull every subscription from SaneAPI.
pub fn run_sync(config: &Config) -> Result<()> {
    let client = SaneClient::new(&config.remote)?;
    let subscriptions = client
        .fetch_subscriptions()
        .with_context(|| format!("Failed to fetch subscriptions from {}", config.remote.base_url))?;

    let sources: Vec<RawSource> = subscriptions.into_iter().map(RawSource::Json).collect();
    let runner = StatementRunner::new(&config.db.path);
    let report = ingest(&runner, &sources)?;
    print_report(&report);
    Ok(())
}

/// CLI entry point for `sane channel`: fetch, store, and print one channel.
pub fn run_channel(config: &Config, query: &ChannelQuery) -> Result<()> {
    let client = SaneClient::new(&config.remote)?;
    let resource = client
        .fetch_channel(query)
        .with_context(|| format!("Failed to fetch channel {:?}", query))?;

    let (channels, report) = build_batch(&[RawSource::Json(resource)]);
    let runner = StatementRunner::new(&config.db.path);
    persist(&runner, &channels)?;

    for channel in &channels {
        println!("{}", serde_json::to_string_pretty(channel)?);
    }
    print_report(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::create_schema;
    use serde_json::json;
    use tempfile::TempDir;

    fn report(warnings: usize, errors: usize) -> BatchReport {
        BatchReport {
            warnings,
            errors,
            ..BatchReport::default()
        }
    }

    #[test]
    fn test_status_line_without_problems() {
        assert_eq!(report(0, 0).status_line(), "Processing completed.");
    }

    #[test]
    fn test_status_line_warnings_only() {
        assert_eq!(
            report(2, 0).status_line(),
            "Processing completed with 2 warnings."
        );
    }

    #[test]
    fn test_status_line_errors_only() {
        assert_eq!(
            report(0, 1).status_line(),
            "Processing completed with 1 errors."
        );
    }

    #[test]
    fn test_status_line_both() {
        assert_eq!(
            report(1, 3).status_line(),
            "Processing completed with 1 warnings and 3 errors."
        );
    }

    #[test]
    fn test_build_batch_partitions_and_sums() {
        let sources = vec![
            RawSource::Json(json!({"id": "UCgood", "snippet": {"title": "Good"}})),
            RawSource::Json(json!({"snippet": {"title": "No id"}})),
            RawSource::Json(json!({
                "id": "UCwarn",
                "snippet": {"title": ["not", "text"], "publishedAt": "yesterday"}
            })),
        ];

        let (channels, report) = build_batch(&sources);
        assert_eq!(report.processed, 3);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.aborted.len(), 1);
        assert_eq!(report.aborted[0].index, 1);
        assert_eq!(report.aborted[0].payload, json!({"snippet": {"title": "No id"}}));
        assert_eq!(report.errors, 1);
        assert_eq!(report.warnings, 2);
        assert_eq!(
            report.status_line(),
            "Processing completed with 2 warnings and 1 errors."
        );

        for channel in &channels {
            assert!(channel.warnings().is_empty());
            assert!(channel.errors().is_empty());
        }
    }

    #[test]
    fn test_ingest_persists_only_usable() {
        let tmp = TempDir::new().unwrap();
        let runner = StatementRunner::new(tmp.path().join("sane.sqlite"));
        create_schema(&runner).unwrap();

        let sources = vec![
            RawSource::List(vec!["UCone".to_string(), "UUone".to_string()]),
            RawSource::List(vec![String::new(), "UUtwo".to_string()]),
        ];
        let report = ingest(&runner, &sources).unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(crate::channels::count_channels(&runner).unwrap(), 1);
    }

    #[test]
    fn test_ingest_store_failure_is_error() {
        let tmp = TempDir::new().unwrap();
        let runner = StatementRunner::new(tmp.path().join("no_schema.sqlite"));
        let sources = vec![RawSource::Json(json!({"id": "UC1"}))];
        assert!(ingest(&runner, &sources).is_err());
    }

    #[test]
    fn test_parse_json_shapes() {
        assert_eq!(parse_sources(r#"{"id": "UC1"}"#, SourceFormat::Json).unwrap().len(), 1);
        assert_eq!(
            parse_sources(r#"[{"id": "UC1"}, {"id": "UC2"}]"#, SourceFormat::Json)
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            parse_sources(r#"{"items": [{"id": "UC1"}]}"#, SourceFormat::Json)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_parse_list_and_map() {
        let lists = parse_sources(r#"[["UC1", null, 3]]"#, SourceFormat::List).unwrap();
        let channel = lists[0].build();
        assert_eq!(channel.id(), "UC1");
        assert!(!channel.has_uploads_playlist);
        assert!(channel.has_favourites_playlist);

        let maps = parse_sources(r#"[{"id": "UC1", "title": null}]"#, SourceFormat::Map).unwrap();
        match &maps[0] {
            RawSource::ValueMap(map) => assert_eq!(map.get("title"), Some(&Value::Null)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(maps[0].build().title, crate::coerce::MISSING_VALUE);
    }

    #[test]
    fn test_non_scalar_map_cells_stay_per_record() {
        let sources = parse_sources(
            r#"[{"id": "UC1", "title": {"x": 1}}, {"id": "UC2"}, {"id": {"x": 1}}]"#,
            SourceFormat::Map,
        )
        .unwrap();
        assert_eq!(sources.len(), 3);

        let (channels, report) = build_batch(&sources);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.aborted.len(), 1);
        assert_eq!(report.aborted[0].index, 2);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.errors, 1);
        let ids: Vec<&str> = channels.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["UC1", "UC2"]);
    }

    #[test]
    fn test_non_scalar_list_cells_stay_per_record() {
        let sources = parse_sources(
            r#"[["UC1", "UU1", "", ["x"]], [{"id": "UC2"}, "UU2"]]"#,
            SourceFormat::List,
        )
        .unwrap();
        let (channels, report) = build_batch(&sources);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.aborted[0].index, 1);
        assert_eq!(report.warnings, 1);
        assert!(channels[0].has_uploads_playlist);
        assert!(!channels[0].has_likes_playlist);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_sources("not json", SourceFormat::Json).is_err());
        assert!(parse_sources(r#"{"id": "UC1"}"#, SourceFormat::List).is_err());
        assert!(parse_sources(r#"["UC1"]"#, SourceFormat::List).is_err());
        assert!(parse_sources(r#"[["UC1"]]"#, SourceFormat::Map).is_err());
    }
}
