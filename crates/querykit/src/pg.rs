//! PostgreSQL [`Library`] on top of tokio-postgres.
//!
//! Statements arrive with `?` placeholders and are renumbered to `$n` before
//! they are sent. Every result is decoded into [`Record`]s up front, so
//! [`Library::fetch`] never touches the connection.
//!
//! # Example
//!
//! ```ignore
//! use querykit::{Library, Operator, PgLibrary, WhereClause};
//!
//! let mut db = PgLibrary::connect(&config.database).await?;
//! db.builder().and_where("active", Operator::Equal, true);
//! let mut users = db.select("users", ["id", "name"]).await?;
//! while users.next() {
//!     println!("{:?}", users.column("name")?);
//! }
//! ```

use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use crate::ident::Delimiter;
use crate::library::{LastError, Library, Record, ResultSet};
use crate::query::{Builder, Column, number_placeholders};
use crate::value::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};

/// tokio-postgres backed library with an owned statement builder.
pub struct PgLibrary {
    client: Client,
    builder: Builder,
    rows: Vec<Record>,
    last_error: Option<LastError>,
}

impl PgLibrary {
    /// Connect using `config.url` and spawn the connection task.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let (client, connection) = tokio_postgres::connect(&config.url, NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(target: "querykit.sql", error = %err, "connection error");
            }
        });

        Ok(Self::from_client(client, config.delimiter))
    }

    /// Wrap an already connected client.
    pub fn from_client(client: Client, delimiter: Delimiter) -> Self {
        Self {
            client,
            builder: Builder::with_delimiter(delimiter),
            rows: Vec::new(),
            last_error: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The owned builder. WHERE, join and ordering calls made here apply to the
    /// next CRUD helper call. Set its table before adding join conditions.
    pub fn builder(&mut self) -> &mut Builder {
        &mut self.builder
    }

    /// Error of the last statement, or [`DbError::NoError`] if it succeeded.
    pub fn last_error(&self) -> DbResult<&LastError> {
        self.last_error.as_ref().ok_or(DbError::NoError)
    }

    pub async fn insert<I, K, V>(&mut self, table: &str, data: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let stmt = self.builder.table(table).insert(data)?;
        self.run(&stmt).await
    }

    /// Select from `table` and return the rows.
    pub async fn select<I, C>(&mut self, table: &str, cols: I) -> DbResult<ResultSet>
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let stmt = self.builder.table(table).select(cols)?;
        self.run(&stmt).await?;
        Ok(self.fetch())
    }

    pub async fn update<I, K, V>(&mut self, table: &str, data: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let stmt = self.builder.table(table).update(data)?;
        self.run(&stmt).await
    }

    pub async fn delete(&mut self, table: &str) -> DbResult<()> {
        let stmt = self.builder.table(table).delete()?;
        self.run(&stmt).await
    }

    async fn batch(&mut self, sql: &str) -> DbResult<()> {
        tracing::debug!(target: "querykit.sql", sql, "batch");
        match self.client.batch_execute(sql).await {
            Ok(()) => {
                self.last_error = None;
                Ok(())
            }
            Err(err) => Err(self.record_error(sql, err.into())),
        }
    }

    fn record_error(&mut self, sql: &str, err: DbError) -> DbError {
        self.last_error = Some(LastError {
            sql: sql.to_string(),
            message: err.to_string(),
        });
        err
    }
}

#[async_trait::async_trait]
impl Library for PgLibrary {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<()> {
        self.builder.reset();
        self.rows.clear();

        let numbered = number_placeholders(sql);
        tracing::debug!(
            target: "querykit.sql",
            param_count = params.len(),
            sql = %numbered,
            "execute"
        );

        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = match self.client.query(numbered.as_str(), &refs).await {
            Ok(rows) => rows,
            Err(err) => return Err(self.record_error(sql, err.into())),
        };
        match rows.iter().map(decode_row).collect::<DbResult<Vec<_>>>() {
            Ok(records) => {
                self.last_error = None;
                self.rows = records;
                Ok(())
            }
            Err(err) => Err(self.record_error(sql, err)),
        }
    }

    async fn execute_batch(&mut self, sql: &str) -> DbResult<()> {
        self.builder.reset();
        self.rows.clear();
        self.batch(sql).await
    }

    fn fetch(&mut self) -> ResultSet {
        ResultSet::new(std::mem::take(&mut self.rows))
    }

    async fn begin_transaction(&mut self) -> DbResult<()> {
        self.batch("BEGIN").await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.batch("COMMIT").await
    }

    async fn roll_back(&mut self) -> DbResult<()> {
        self.batch("ROLLBACK").await
    }

    fn delimiter(&self) -> Delimiter {
        self.builder.delimiter()
    }
}

fn decode_row(row: &Row) -> DbResult<Record> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            row.try_get::<_, Value>(i)
                .map(|v| (col.name().to_string(), v))
                .map_err(|e| DbError::decode(col.name(), e.to_string()))
        })
        .collect()
}
