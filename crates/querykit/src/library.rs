//! Execution facade.
//!
//! The query builder never talks to a database. [`Library`] is the seam between
//! rendered statements and whatever executes them; [`ResultSet`] is the cursor
//! over the rows of the last statement.

use crate::error::{DbError, DbResult};
use crate::ident::Delimiter;
use crate::query::Statement;
use crate::value::Value;

/// Something that executes `?`-placeholder SQL.
#[async_trait::async_trait]
pub trait Library: Send {
    /// Execute a single statement, `sql`, with `params` bound positionally.
    ///
    /// Rows produced by the statement are kept for [`Library::fetch`].
    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<()>;

    /// Execute a script of `;`-separated statements without parameters.
    ///
    /// No rows are kept.
    async fn execute_batch(&mut self, sql: &str) -> DbResult<()>;

    /// Execute a rendered statement.
    async fn run(&mut self, stmt: &Statement) -> DbResult<()> {
        self.execute(&stmt.sql, &stmt.params).await
    }

    /// Take the rows of the last executed statement.
    ///
    /// Empty when nothing was executed, the statement failed or the rows were
    /// already fetched.
    fn fetch(&mut self) -> ResultSet;

    async fn begin_transaction(&mut self) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn roll_back(&mut self) -> DbResult<()>;

    /// Delimiter for builders created on behalf of this library.
    fn delimiter(&self) -> Delimiter {
        Delimiter::default()
    }
}

/// The error recorded for the last failed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub sql: String,
    pub message: String,
}

/// One result row: column names and values in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Value of the named column.
    pub fn get(&self, column: &str) -> DbResult<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
            .ok_or_else(|| DbError::ColumnNotFound(column.to_string()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Cursor over fetched rows.
///
/// The cursor starts before the first row. Rows are numbered from 1; position
/// 0 is "before first" and `row_count() + 1` is "after last".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Record>,
    position: usize,
}

impl ResultSet {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows, position: 0 }
    }

    fn on_row(&self) -> bool {
        (1..=self.rows.len()).contains(&self.position)
    }

    /// Advance; true if the cursor now points at a row.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if self.position <= self.rows.len() {
            self.position += 1;
        }
        self.on_row()
    }

    /// Step back; true if the cursor now points at a row.
    pub fn prev(&mut self) -> bool {
        self.position = self.position.saturating_sub(1);
        self.on_row()
    }

    /// Jump to the 1-based row `n`. The cursor does not move if `n` is out of range.
    pub fn row(&mut self, n: usize) -> bool {
        if (1..=self.rows.len()).contains(&n) {
            self.position = n;
            true
        } else {
            false
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows, regardless of the cursor.
    pub fn results(&self) -> &[Record] {
        &self.rows
    }

    /// The row under the cursor.
    pub fn get(&self) -> DbResult<&Record> {
        if !self.on_row() {
            return Err(DbError::RowNotFound(self.position));
        }
        Ok(&self.rows[self.position - 1])
    }

    /// A column of the row under the cursor.
    pub fn column(&self, name: &str) -> DbResult<&Value> {
        self.get()?.get(name)
    }

    pub fn into_records(self) -> Vec<Record> {
        self.rows
    }
}

impl IntoIterator for ResultSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory library that records every call.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingLibrary {
        pub log: Vec<String>,
        pub executed: Vec<Statement>,
        pub rows: Vec<Record>,
        /// Statements containing this text fail.
        pub fail_on: Option<String>,
        pub fail_begin: bool,
    }

    impl RecordingLibrary {
        pub(crate) fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait::async_trait]
    impl Library for RecordingLibrary {
        async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<()> {
            if self.fail_on.as_deref().is_some_and(|needle| sql.contains(needle)) {
                self.log.push(format!("FAILED {sql}"));
                return Err(DbError::Other(format!("statement failed: {sql}")));
            }
            self.log.push(sql.to_string());
            self.executed.push(Statement::new(sql, params.to_vec()));
            Ok(())
        }

        async fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
            self.rows.clear();
            for stmt in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                self.execute(stmt, &[]).await?;
            }
            Ok(())
        }

        fn fetch(&mut self) -> ResultSet {
            ResultSet::new(std::mem::take(&mut self.rows))
        }

        async fn begin_transaction(&mut self) -> DbResult<()> {
            if self.fail_begin {
                return Err(DbError::Other("transactions unsupported".into()));
            }
            self.log.push("BEGIN".into());
            Ok(())
        }

        async fn commit(&mut self) -> DbResult<()> {
            self.log.push("COMMIT".into());
            Ok(())
        }

        async fn roll_back(&mut self) -> DbResult<()> {
            self.log.push("ROLLBACK".into());
            Ok(())
        }
    }
}
