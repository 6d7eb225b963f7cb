//! Channel persistence on top of the [`StatementRunner`].
//!
//! Writes go through the silent consumer as a single multi-row
//! `INSERT OR REPLACE`. Reads use step functions, which see SQL NULL as
//! `None`, and rebuild entities with the list and map builders. Counting uses
//! the capture buffer.

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;
use crate::consumer::StepSignal;
use crate::models::{Channel, CHANNEL_FIELDS};
use crate::store::{sql_literal, StatementOutcome, StatementRunner};

const TABLE: &str = "youtube_channels";

fn column_list() -> String {
    CHANNEL_FIELDS.join(", ")
}

/// Build the `INSERT OR REPLACE` text for `channels`, or `None` if empty.
pub fn insert_statement(channels: &[Channel]) -> Option<String> {
    if channels.is_empty() {
        return None;
    }

    let tuples: Vec<String> = channels
        .iter()
        .map(|channel| {
            let cells: Vec<String> = channel
                .row_values()
                .iter()
                .map(|v| sql_literal(v.as_deref()))
                .collect();
            format!("({})", cells.join(", "))
        })
        .collect();

    Some(format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES {};",
        TABLE,
        column_list(),
        tuples.join(", ")
    ))
}

/// Store `channels`, replacing existing rows with the same id.
///
/// Aborted entities must be filtered out by the caller. An empty slice is a
/// no-op that never touches the store.
pub fn insert_channels(runner: &StatementRunner, channels: &[Channel]) -> StatementOutcome {
    match insert_statement(channels) {
        Some(sql) => {
            debug!(count = channels.len(), "inserting channels");
            runner.execute_silent(&sql)
        }
        None => StatementOutcome::ok(),
    }
}

/// Every stored channel, ordered by title then id.
pub fn list_channels(runner: &StatementRunner) -> Result<Vec<Channel>> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY title COLLATE NOCASE, id",
        column_list(),
        TABLE
    );

    let mut channels = Vec::new();
    runner
        .prepare_and_step(&sql, |cursor| {
            while cursor.step() == StepSignal::Row {
                channels.push(Channel::from_map(&cursor.row_map()));
            }
            cursor.last_signal().cloned().unwrap_or(StepSignal::Done)
        })
        .into_result()
        .context("Failed to list channels")?;

    Ok(channels)
}

/// Look up one channel by id.
pub fn get_channel(runner: &StatementRunner, id: &str) -> Result<Option<Channel>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = {}",
        column_list(),
        TABLE,
        sql_literal(Some(id))
    );

    let mut found = None;
    runner
        .prepare_and_step(&sql, |cursor| {
            if cursor.step() == StepSignal::Row {
                found = Some(Channel::from_string_list(cursor.row()));
            }
            while cursor.step() == StepSignal::Row {}
            cursor.last_signal().cloned().unwrap_or(StepSignal::Done)
        })
        .into_result()
        .with_context(|| format!("Failed to read channel {}", id))?;

    Ok(found)
}

/// Number of stored channels.
pub fn count_channels(runner: &StatementRunner) -> Result<usize> {
    let values = runner
        .execute_capture(&format!("SELECT COUNT(*) FROM {}", TABLE))
        .into_result()
        .context("Failed to count channels")?
        .unwrap_or_default();

    let count = values
        .first()
        .map(|v| v.parse::<usize>())
        .transpose()
        .context("Unexpected channel count")?;
    Ok(count.unwrap_or(0))
}

/// CLI entry point for `sane list`.
pub fn run_list(config: &Config) -> Result<()> {
    let runner = StatementRunner::new(&config.db.path);
    let channels = list_channels(&runner)?;

    if channels.is_empty() {
        println!("No channels stored.");
        return Ok(());
    }

    for channel in &channels {
        println!("{}  {}", channel.id(), channel.title);
    }
    println!();
    println!("{} channels", channels.len());
    Ok(())
}

/// CLI entry point for `sane get`.
pub fn run_get(config: &Config, id: &str) -> Result<()> {
    let runner = StatementRunner::new(&config.db.path);
    let channel = match get_channel(&runner, id)? {
        Some(c) => c,
        None => {
            eprintln!("Error: channel not found: {}", id);
            std::process::exit(1);
        }
    };

    println!("--- Channel ---");
    println!("id:                  {}", channel.id());
    println!("title:               {}", channel.title);
    println!("published_at:        {}", channel.published_at);
    print_playlist("uploads_playlist:    ", channel.uploads_playlist());
    print_playlist("favourites_playlist: ", channel.favourites_playlist());
    print_playlist("likes_playlist:      ", channel.likes_playlist());
    for (size, url) in &channel.thumbnails {
        println!("thumbnail_{:<10}{}", format!("{}:", size), url);
    }
    println!();
    println!("--- Description ---");
    println!("{}", channel.description);

    Ok(())
}

fn print_playlist(label: &str, playlist: Option<String>) {
    if let Some(p) = playlist {
        println!("{}{}", label, p);
    }
}
