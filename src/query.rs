//! Ad-hoc SQL against the store (`sane query`).

use anyhow::{Context, Result};
use std::io::Write;

use crate::coerce::NULL_MARKER;
use crate::config::Config;
use crate::consumer::RowConsumer;
use crate::store::StatementRunner;

/// Writes rows as tab-separated text, header first.
pub struct TsvWriter<W: Write> {
    out: W,
    header_written: bool,
    rows: usize,
    failed: Option<std::io::Error>,
}

impl<W: Write> TsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
            rows: 0,
            failed: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> std::io::Result<W> {
        match self.failed {
            Some(e) => Err(e),
            None => Ok(self.out),
        }
    }

    fn write_line(&mut self, cells: &[&str]) {
        if self.failed.is_some() {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", cells.join("\t")) {
            self.failed = Some(e);
        }
    }
}

impl<W: Write> RowConsumer for TsvWriter<W> {
    fn consume(&mut self, columns: &[String], row: &[Option<String>]) {
        if !self.header_written {
            let header: Vec<&str> = columns.iter().map(String::as_str).collect();
            self.write_line(&header);
            self.header_written = true;
        }
        let cells: Vec<&str> = row
            .iter()
            .map(|c| c.as_deref().unwrap_or(NULL_MARKER))
            .collect();
        self.write_line(&cells);
        self.rows += 1;
    }
}

/// CLI entry point for `sane query`.
pub fn run_query(config: &Config, sql: &str) -> Result<()> {
    let runner = StatementRunner::new(&config.db.path);
    let stdout = std::io::stdout();
    let mut writer = TsvWriter::new(stdout.lock());

    runner
        .execute(sql, &mut writer)
        .into_result()
        .context("Query failed")?;

    let rows = writer.rows();
    writer.finish().context("Failed to write query output")?;
    println!("({} rows)", rows);
    Ok(())
}
