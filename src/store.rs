//! Statement execution against the embedded SQLite store.
//!
//! Each call on [`StatementRunner`] is a self-contained unit: open the store
//! file, run one statement, hand result rows to a consumer, close. The handle
//! is owned by a guard that releases it on drop, so it is closed on every
//! exit path (success, SQL error, a step function that breaks its contract,
//! or a panic unwinding through the call).
//!
//! Failures are returned as a [`StatementOutcome`] instead of being raised,
//! so that callers such as batch ingestion can keep reporting.

use rusqlite::{Batch, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consumer::{read_cells, CaptureBuffer, RowConsumer, Silent, StepCursor, StepSignal};

/// Terminal status of one runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecStatus {
    Ok,
    CantOpen,
    SqlError,
    PrepareError,
    StepError,
}

/// Typed store failure, for callers that prefer `?` over inspecting a status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Can't open database: {0}")]
    Open(String),

    #[error("Error preparing statement: {0}")]
    Prepare(String),

    #[error("SQL error: {0}")]
    Execution(String),

    #[error("Step function did not finish with done: {0}")]
    StepContract(String),
}

/// Result of one runner invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementOutcome {
    pub status: ExecStatus,
    /// Store diagnostic text for failures, empty on success.
    pub message: String,
    /// Captured cells, only for [`StatementRunner::execute_capture`].
    pub rows: Option<Vec<String>>,
}

impl StatementOutcome {
    pub(crate) fn ok() -> Self {
        Self {
            status: ExecStatus::Ok,
            message: String::new(),
            rows: None,
        }
    }

    fn failed(status: ExecStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            rows: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExecStatus::Ok
    }

    pub fn into_result(self) -> Result<Option<Vec<String>>, StoreError> {
        match self.status {
            ExecStatus::Ok => Ok(self.rows),
            ExecStatus::CantOpen => Err(StoreError::Open(self.message)),
            ExecStatus::PrepareError => Err(StoreError::Prepare(self.message)),
            ExecStatus::SqlError => Err(StoreError::Execution(self.message)),
            ExecStatus::StepError => Err(StoreError::StepContract(self.message)),
        }
    }
}

/// Counts of store handles acquired and released by a runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    pub opened: usize,
    pub released: usize,
}

/// Opens the store for the duration of a single statement.
///
/// Not meant for concurrent use: callers serialize access to a store file.
#[derive(Debug)]
pub struct StatementRunner {
    path: PathBuf,
    opened: AtomicUsize,
    released: AtomicUsize,
}

/// Owns an open connection; dropping the guard closes it.
///
/// `conn` is only `None` inside `drop`.
struct StoreHandle<'r> {
    conn: Option<Connection>,
    runner: &'r StatementRunner,
}

impl StoreHandle<'_> {
    fn conn(&self) -> &Connection {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("store handle used after release"),
        }
    }
}

impl Drop for StoreHandle<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_conn, e)) = conn.close() {
                warn!(path = %self.runner.path.display(), error = %e, "store handle did not close cleanly");
            }
        }
        self.runner.released.fetch_add(1, Ordering::Relaxed);
        debug!(path = %self.runner.path.display(), "store handle released");
    }
}

impl StatementRunner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            opened: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle_stats(&self) -> HandleStats {
        HandleStats {
            opened: self.opened.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }

    fn open(&self) -> Result<StoreHandle<'_>, StatementOutcome> {
        match Connection::open(&self.path) {
            Ok(conn) => {
                self.opened.fetch_add(1, Ordering::Relaxed);
                debug!(path = %self.path.display(), "store handle opened");
                Ok(StoreHandle {
                    conn: Some(conn),
                    runner: self,
                })
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "can't open database");
                Err(StatementOutcome::failed(
                    ExecStatus::CantOpen,
                    format!("{}: {}", self.path.display(), e),
                ))
            }
        }
    }

    /// Direct-exec path: run every `;`-separated statement in `sql` and feed
    /// each result row to `consumer`, statement by statement.
    ///
    /// The first failing statement stops the run with [`ExecStatus::SqlError`];
    /// rows from earlier statements have already been consumed. A consumer
    /// that wants no rows (see [`Silent`]) gets the text run as a batch.
    pub fn execute(&self, sql: &str, consumer: &mut dyn RowConsumer) -> StatementOutcome {
        let handle = match self.open() {
            Ok(handle) => handle,
            Err(outcome) => return outcome,
        };

        let result = if consumer.wants_rows() {
            run_rows(handle.conn(), sql, consumer)
        } else {
            handle.conn().execute_batch(sql)
        };

        match result {
            Ok(()) => StatementOutcome::ok(),
            Err(e) => {
                warn!(error = %e, "SQL error");
                StatementOutcome::failed(ExecStatus::SqlError, e.to_string())
            }
        }
    }

    /// Fire-and-forget execution; result rows are ignored.
    pub fn execute_silent(&self, sql: &str) -> StatementOutcome {
        self.execute(sql, &mut Silent)
    }

    /// Execute and return every captured cell in the outcome's `rows`.
    pub fn execute_capture(&self, sql: &str) -> StatementOutcome {
        let mut buffer = CaptureBuffer::new();
        let mut outcome = self.execute(sql, &mut buffer);
        if outcome.is_ok() {
            outcome.rows = Some(buffer.drain());
        }
        outcome
    }

    /// Prepared-statement path.
    ///
    /// `sql` is compiled once and a [`StepCursor`] over it is handed to
    /// `step`, which advances through the rows itself and must return
    /// [`StepSignal::Done`]. Any other return value is reported as
    /// [`ExecStatus::StepError`].
    pub fn prepare_and_step<F>(&self, sql: &str, step: F) -> StatementOutcome
    where
        F: FnOnce(&mut StepCursor<'_>) -> StepSignal,
    {
        let handle = match self.open() {
            Ok(handle) => handle,
            Err(outcome) => return outcome,
        };

        let mut stmt = match handle.conn().prepare(sql) {
            Ok(stmt) => stmt,
            Err(e) => {
                warn!(error = %e, "error preparing statement");
                return StatementOutcome::failed(ExecStatus::PrepareError, e.to_string());
            }
        };
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let rows = match stmt.query([]) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "error preparing statement");
                return StatementOutcome::failed(ExecStatus::PrepareError, e.to_string());
            }
        };

        let mut cursor = StepCursor::new(rows, columns);
        let signal = step(&mut cursor);
        if let Some(StepSignal::Failed(message)) = cursor.last_signal() {
            warn!(error = %message, "stepping failed");
            return StatementOutcome::failed(ExecStatus::StepError, message.clone());
        }
        match signal {
            StepSignal::Done => StatementOutcome::ok(),
            StepSignal::Row => {
                warn!(rows_seen = cursor.rows_seen(), "step function stopped before done");
                StatementOutcome::failed(
                    ExecStatus::StepError,
                    format!(
                        "stepping stopped with rows remaining after {} rows",
                        cursor.rows_seen()
                    ),
                )
            }
            StepSignal::Failed(message) => {
                warn!(error = %message, "step function failed");
                StatementOutcome::failed(ExecStatus::StepError, message)
            }
        }
    }
}

fn run_rows(conn: &Connection, sql: &str, consumer: &mut dyn RowConsumer) -> rusqlite::Result<()> {
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next()? {
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let cells = read_cells(row, columns.len());
            consumer.consume(&columns, &cells);
        }
    }
    Ok(())
}

/// Render an optional value as an SQL literal: quoted text or `NULL`.
pub fn sql_literal(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("'{}'", v.replace('\0', "").replace('\'', "''")),
        None => "NULL".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner() -> (TempDir, StatementRunner) {
        let tmp = TempDir::new().unwrap();
        let runner = StatementRunner::new(tmp.path().join("store.sqlite"));
        let outcome = runner.execute_silent(
            "CREATE TABLE pairs (x TEXT, y TEXT); \
             INSERT INTO pairs VALUES ('a', 'b'); \
             INSERT INTO pairs VALUES (NULL, 'd');",
        );
        assert!(outcome.is_ok(), "{:?}", outcome);
        (tmp, runner)
    }

    fn assert_balanced(runner: &StatementRunner) {
        let stats = runner.handle_stats();
        assert_eq!(stats.opened, stats.released, "{:?}", stats);
    }

    #[test]
    fn test_capture_rows_in_order_with_null_marker() {
        let (_tmp, runner) = runner();
        let outcome = runner.execute_capture("SELECT x, y FROM pairs ORDER BY rowid");
        assert_eq!(outcome.status, ExecStatus::Ok);
        assert_eq!(
            outcome.rows.unwrap(),
            vec!["a".to_string(), "b".to_string(), "NULL".to_string(), "d".to_string()]
        );
        assert_balanced(&runner);
    }

    #[test]
    fn test_caller_owned_buffer_accumulates() {
        let (_tmp, runner) = runner();
        let mut buffer = CaptureBuffer::new();
        runner.execute("SELECT y FROM pairs ORDER BY rowid", &mut buffer);
        runner.execute("SELECT x FROM pairs ORDER BY rowid", &mut buffer);
        assert_eq!(buffer.values(), ["b", "d", "a", "NULL"]);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sql_error_releases_handle() {
        let (_tmp, runner) = runner();
        let outcome = runner.execute_capture("SELECT nope FROM missing_table");
        assert_eq!(outcome.status, ExecStatus::SqlError);
        assert!(outcome.message.contains("missing_table"));
        assert!(outcome.rows.is_none());
        assert_balanced(&runner);

        let outcome = runner.execute_silent("INSERT INTO missing_table VALUES (1)");
        assert_eq!(outcome.status, ExecStatus::SqlError);
        assert_balanced(&runner);
    }

    #[test]
    fn test_cant_open() {
        let tmp = TempDir::new().unwrap();
        let runner = StatementRunner::new(tmp.path().join("missing").join("store.sqlite"));
        let outcome = runner.execute_silent("SELECT 1");
        assert_eq!(outcome.status, ExecStatus::CantOpen);
        assert_eq!(runner.handle_stats(), HandleStats::default());
        assert!(matches!(outcome.into_result(), Err(StoreError::Open(_))));
    }

    #[test]
    fn test_step_function_done() {
        let (_tmp, runner) = runner();
        let mut seen = Vec::new();
        let outcome = runner.prepare_and_step("SELECT x, y FROM pairs ORDER BY rowid", |cursor| {
            while cursor.step() == StepSignal::Row {
                seen.push((
                    cursor.text(0).map(str::to_string),
                    cursor.text_by_name("y").map(str::to_string),
                ));
            }
            cursor.last_signal().cloned().unwrap_or(StepSignal::Done)
        });
        assert_eq!(outcome.status, ExecStatus::Ok);
        assert_eq!(
            seen,
            vec![
                (Some("a".to_string()), Some("b".to_string())),
                (None, Some("d".to_string())),
            ]
        );
        assert_balanced(&runner);
    }

    #[test]
    fn test_step_function_stopping_early_is_step_error() {
        let (_tmp, runner) = runner();
        let outcome = runner.prepare_and_step("SELECT x FROM pairs", |cursor| cursor.step());
        assert_eq!(outcome.status, ExecStatus::StepError);
        assert_balanced(&runner);
        assert!(matches!(
            outcome.into_result(),
            Err(StoreError::StepContract(_))
        ));
    }

    #[test]
    fn test_step_function_failure_message() {
        let (_tmp, runner) = runner();
        let outcome =
            runner.prepare_and_step("SELECT x FROM pairs", |_| StepSignal::Failed("gave up".into()));
        assert_eq!(outcome.status, ExecStatus::StepError);
        assert_eq!(outcome.message, "gave up");
        assert_balanced(&runner);
    }

    #[test]
    fn test_prepare_error() {
        let (_tmp, runner) = runner();
        let outcome = runner.prepare_and_step("SELEC broken", |_| StepSignal::Done);
        assert_eq!(outcome.status, ExecStatus::PrepareError);
        assert_balanced(&runner);
    }

    #[test]
    fn test_capture_runs_every_statement() {
        let (_tmp, runner) = runner();
        let outcome = runner.execute_capture("SELECT 1; SELECT y FROM pairs ORDER BY rowid;");
        assert_eq!(outcome.status, ExecStatus::Ok);
        assert_eq!(outcome.rows.unwrap(), vec!["1", "b", "d"]);
        assert_balanced(&runner);
    }

    #[test]
    fn test_failing_later_statement_is_sql_error() {
        let (_tmp, runner) = runner();
        let mut buffer = CaptureBuffer::new();
        let outcome = runner.execute("SELECT 1; SELECT nope FROM missing_table", &mut buffer);
        assert_eq!(outcome.status, ExecStatus::SqlError);
        assert!(outcome.message.contains("missing_table"));
        assert_eq!(buffer.values(), ["1"]);
        assert_balanced(&runner);
    }

    #[test]
    fn test_rows_path_runs_statements_without_rows() {
        let (_tmp, runner) = runner();
        let outcome = runner.execute_capture(
            "INSERT INTO pairs VALUES ('e', 'f'); SELECT COUNT(*) FROM pairs",
        );
        assert_eq!(outcome.rows.unwrap(), vec!["3"]);
    }

    // INT64_MIN built without a literal overflow; abs() of it fails at step time.
    const STEP_TIME_FAILURE: &str = "SELECT abs(-9223372036854775807 - 1)";

    #[test]
    fn test_step_failure_overrides_done() {
        let (_tmp, runner) = runner();
        let outcome = runner.prepare_and_step(STEP_TIME_FAILURE, |cursor| {
            while cursor.step() == StepSignal::Row {}
            StepSignal::Done
        });
        assert_eq!(outcome.status, ExecStatus::StepError);
        assert!(outcome.message.contains("overflow"), "{}", outcome.message);
        assert_balanced(&runner);
    }

    #[test]
    fn test_step_failure_in_direct_exec() {
        let (_tmp, runner) = runner();
        let outcome = runner.execute_capture(STEP_TIME_FAILURE);
        assert_eq!(outcome.status, ExecStatus::SqlError);
        assert_balanced(&runner);
    }

    #[test]
    fn test_handle_closed_after_call() {
        let (tmp, runner) = runner();
        runner.execute_capture("SELECT x FROM pairs");
        runner.prepare_and_step("SELECT x FROM pairs", |c| c.step());

        // No connection is left holding the file.
        let conn = Connection::open(tmp.path().join("store.sqlite")).unwrap();
        conn.execute_batch("BEGIN EXCLUSIVE; DELETE FROM pairs; COMMIT;")
            .unwrap();
        assert_balanced(&runner);
    }

    #[test]
    fn test_handle_released_once_per_call() {
        let (_tmp, runner) = runner();
        runner.execute_capture("SELECT 1");
        runner.prepare_and_step("SELECT 1", |c| {
            while c.step() == StepSignal::Row {}
            StepSignal::Done
        });
        let stats = runner.handle_stats();
        assert_eq!(stats.opened, 3);
        assert_eq!(stats.released, 3);
    }

    #[test]
    fn test_sql_literal() {
        assert_eq!(sql_literal(Some("it's")), "'it''s'");
        assert_eq!(sql_literal(None), "NULL");
    }
}
