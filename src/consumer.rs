//! Row consumption strategies plugged into the
//! [`StatementRunner`](crate::store::StatementRunner).
//!
//! | Strategy | Mode |
//! |----------|------|
//! | [`Silent`] | fire-and-forget; rows are never produced |
//! | [`CaptureBuffer`] | every cell appended as text to a caller-owned buffer |
//! | [`StepCursor`] | handed to a caller-supplied step function over a prepared statement |

use rusqlite::types::ValueRef;
use rusqlite::{Row, Rows};
use std::collections::BTreeMap;

use crate::coerce::NULL_MARKER;

/// Receives result rows from the direct-exec path, in store order.
pub trait RowConsumer {
    /// Called once per row. `row[i]` is `None` for SQL NULL.
    fn consume(&mut self, columns: &[String], row: &[Option<String>]);

    /// When `false` the runner executes the text as a batch and never
    /// materializes rows.
    fn wants_rows(&self) -> bool {
        true
    }
}

/// Ignores all rows. Used for DDL and bulk DML.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl RowConsumer for Silent {
    fn consume(&mut self, _columns: &[String], _row: &[Option<String>]) {}

    fn wants_rows(&self) -> bool {
        false
    }
}

/// Accumulates cells row-major, left to right, with `"NULL"` for absent data.
///
/// The buffer keeps growing across statements until the caller drains or
/// clears it.
#[derive(Debug, Default, Clone)]
pub struct CaptureBuffer {
    values: Vec<String>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take everything captured so far, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.values)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl RowConsumer for CaptureBuffer {
    fn consume(&mut self, _columns: &[String], row: &[Option<String>]) {
        self.values.extend(
            row.iter()
                .map(|cell| cell.clone().unwrap_or_else(|| NULL_MARKER.to_string())),
        );
    }
}

/// Text rendition of a single cell. Blobs are decoded lossily.
pub(crate) fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

pub(crate) fn read_cells(row: &Row<'_>, column_count: usize) -> Vec<Option<String>> {
    (0..column_count)
        .map(|i| row.get_ref(i).ok().and_then(cell_text))
        .collect()
}

/// Signal returned by [`StepCursor::step`] and, as the terminal value, by a
/// step function. A step function fulfills its contract only by returning
/// [`StepSignal::Done`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepSignal {
    /// A row is available through the cursor accessors.
    Row,
    /// The statement has no more rows.
    Done,
    /// Stepping failed, or the step function gave up.
    Failed(String),
}

/// Cursor over a prepared statement's result rows.
///
/// Only the current row is held; each call to [`step`](Self::step) replaces
/// it. Cells are exposed as text, the same rendition the capture buffer uses.
pub struct StepCursor<'stmt> {
    rows: Rows<'stmt>,
    columns: Vec<String>,
    current: Vec<Option<String>>,
    last: Option<StepSignal>,
    rows_seen: usize,
}

impl<'stmt> StepCursor<'stmt> {
    pub(crate) fn new(rows: Rows<'stmt>, columns: Vec<String>) -> Self {
        Self {
            rows,
            columns,
            current: Vec::new(),
            last: None,
            rows_seen: 0,
        }
    }

    /// Advance to the next row.
    ///
    /// Once `Done` or `Failed` has been returned, further calls keep
    /// returning it without touching the statement.
    pub fn step(&mut self) -> StepSignal {
        match &self.last {
            None | Some(StepSignal::Row) => {}
            Some(terminal) => return terminal.clone(),
        }

        let signal = match self.rows.next() {
            Ok(Some(row)) => {
                let cells = read_cells(row, self.columns.len());
                self.current = cells;
                self.rows_seen += 1;
                StepSignal::Row
            }
            Ok(None) => {
                self.current.clear();
                StepSignal::Done
            }
            Err(e) => {
                self.current.clear();
                StepSignal::Failed(e.to_string())
            }
        };
        self.last = Some(signal.clone());
        signal
    }

    /// The most recent signal returned by [`step`](Self::step).
    pub fn last_signal(&self) -> Option<&StepSignal> {
        self.last.as_ref()
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of the current row; empty before the first row and after `Done`.
    pub fn row(&self) -> &[Option<String>] {
        &self.current
    }

    /// Text of a cell in the current row. `None` for NULL or out of range.
    pub fn text(&self, index: usize) -> Option<&str> {
        self.current.get(index).and_then(|c| c.as_deref())
    }

    pub fn text_by_name(&self, name: &str) -> Option<&str> {
        self.column_index(name).and_then(|i| self.text(i))
    }

    /// The current row keyed by column name.
    pub fn row_map(&self) -> BTreeMap<String, Option<String>> {
        self.columns
            .iter()
            .cloned()
            .zip(self.current.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_capture_substitutes_null_marker() {
        let mut buf = CaptureBuffer::new();
        buf.consume(&cols(), &[Some("a".to_string()), Some("b".to_string())]);
        buf.consume(&cols(), &[None, Some("d".to_string())]);
        assert_eq!(buf.values(), ["a", "b", "NULL", "d"]);
    }

    #[test]
    fn test_capture_accumulates_until_drained() {
        let mut buf = CaptureBuffer::new();
        buf.consume(&cols(), &[Some("1".to_string()), None]);
        buf.consume(&cols(), &[Some("2".to_string()), None]);
        assert_eq!(buf.len(), 4);

        let drained = buf.drain();
        assert_eq!(drained, vec!["1", "NULL", "2", "NULL"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_capture_clear() {
        let mut buf = CaptureBuffer::new();
        buf.consume(&cols(), &[Some("x".to_string())]);
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_silent_wants_no_rows() {
        assert!(!Silent.wants_rows());
        assert!(CaptureBuffer::new().wants_rows());
    }

    #[test]
    fn test_cell_text_variants() {
        assert_eq!(cell_text(ValueRef::Null), None);
        assert_eq!(cell_text(ValueRef::Integer(7)).as_deref(), Some("7"));
        assert_eq!(cell_text(ValueRef::Real(1.5)).as_deref(), Some("1.5"));
        assert_eq!(cell_text(ValueRef::Text(b"hi")).as_deref(), Some("hi"));
    }
}
