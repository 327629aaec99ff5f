//! Migration trait and transactional execution.

use crate::error::DbResult;
use crate::library::{Library, ResultSet};
use crate::query::{Builder, Column, Statement};
use crate::value::Value;
use std::fmt;

/// Direction a migration is executed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    BringUp,
    TearDown,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::BringUp => "up",
            Mode::TearDown => "down",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reversible schema or data change.
///
/// Return `Ok(true)` to commit, `Ok(false)` to roll back.
///
/// ```ignore
/// use querykit::migrate::{Migration, MigrationContext};
/// use querykit::DbResult;
///
/// pub struct CreateUsers;
///
/// #[async_trait::async_trait]
/// impl Migration for CreateUsers {
///     async fn up(&self, ctx: &mut MigrationContext<'_>) -> DbResult<bool> {
///         ctx.run_script(
///             "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT);
///              CREATE INDEX users_name_idx ON users (name);",
///         )
///         .await?;
///         Ok(true)
///     }
///
///     async fn down(&self, ctx: &mut MigrationContext<'_>) -> DbResult<bool> {
///         ctx.run_sql("DROP TABLE users", &[]).await?;
///         Ok(true)
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    async fn up(&self, ctx: &mut MigrationContext<'_>) -> DbResult<bool>;

    async fn down(&self, ctx: &mut MigrationContext<'_>) -> DbResult<bool>;
}

/// What a migration gets to work with: a builder and the library.
///
/// Nothing is executed implicitly. Render a statement with [`builder`](Self::builder)
/// and pass it to [`run_query`](Self::run_query).
pub struct MigrationContext<'a> {
    db: &'a mut dyn Library,
    builder: Builder,
}

impl<'a> MigrationContext<'a> {
    pub fn new(db: &'a mut dyn Library) -> Self {
        let builder = Builder::with_delimiter(db.delimiter());
        Self { db, builder }
    }

    pub fn builder(&mut self) -> &mut Builder {
        &mut self.builder
    }

    pub async fn run_query(&mut self, stmt: &Statement) -> DbResult<()> {
        tracing::debug!(target: "querykit.migrate", sql = %stmt.sql, "migration statement");
        self.db.run(stmt).await
    }

    pub async fn run_sql(&mut self, sql: &str, params: &[Value]) -> DbResult<()> {
        tracing::debug!(target: "querykit.migrate", sql, "migration statement");
        self.db.execute(sql, params).await
    }

    /// Run several `;`-separated statements at once, e.g. a DDL script.
    pub async fn run_script(&mut self, sql: &str) -> DbResult<()> {
        tracing::debug!(target: "querykit.migrate", sql, "migration script");
        self.db.execute_batch(sql).await
    }

    /// Render a SELECT with the context builder, run it and return the rows.
    pub async fn select<I, C>(&mut self, cols: I) -> DbResult<ResultSet>
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let stmt = self.builder.select(cols)?;
        self.run_query(&stmt).await?;
        Ok(self.fetch())
    }

    pub fn fetch(&mut self) -> ResultSet {
        self.db.fetch()
    }
}

/// Run one migration in `mode` inside a transaction.
///
/// If the transaction cannot be started the migration still runs, without one.
/// Otherwise the transaction is committed on `Ok(true)` and rolled back on
/// anything else.
pub async fn execute_migration(
    migration: &dyn Migration,
    mode: Mode,
    db: &mut dyn Library,
) -> DbResult<bool> {
    let in_transaction = match db.begin_transaction().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                target: "querykit.migrate",
                error = %err,
                "unable to begin transaction, running migration without one"
            );
            false
        }
    };

    let result = {
        let mut ctx = MigrationContext::new(&mut *db);
        match mode {
            Mode::BringUp => migration.up(&mut ctx).await,
            Mode::TearDown => migration.down(&mut ctx).await,
        }
    };

    if in_transaction {
        if matches!(result, Ok(true)) {
            db.commit().await?;
        } else if let Err(err) = db.roll_back().await {
            tracing::error!(target: "querykit.migrate", error = %err, "rollback failed");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::library::testing::RecordingLibrary;
    use crate::query::{Operator, WhereClause};

    struct Seed {
        outcome: DbResult<bool>,
    }

    #[async_trait::async_trait]
    impl Migration for Seed {
        async fn up(&self, ctx: &mut MigrationContext<'_>) -> DbResult<bool> {
            let stmt = ctx.builder().table("users").insert([("name", "root")])?;
            ctx.run_query(&stmt).await?;
            match &self.outcome {
                Ok(v) => Ok(*v),
                Err(e) => Err(DbError::migration(e.to_string())),
            }
        }

        async fn down(&self, ctx: &mut MigrationContext<'_>) -> DbResult<bool> {
            ctx.builder()
                .table("users")
                .and_where("name", Operator::Equal, "root");
            let stmt = ctx.builder().delete()?;
            ctx.run_query(&stmt).await?;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let mut db = RecordingLibrary::new();
        let ok = execute_migration(&Seed { outcome: Ok(true) }, Mode::BringUp, &mut db)
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(
            db.log,
            vec![
                "BEGIN",
                "INSERT INTO \"users\" (\"name\") VALUES (?)",
                "COMMIT"
            ]
        );
        assert_eq!(db.executed[0].params, vec![Value::from("root")]);
    }

    #[tokio::test]
    async fn test_rollback_on_false() {
        let mut db = RecordingLibrary::new();
        let ok = execute_migration(&Seed { outcome: Ok(false) }, Mode::BringUp, &mut db)
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(db.log.last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_rollback_on_error() {
        let mut db = RecordingLibrary::new();
        let result = execute_migration(
            &Seed {
                outcome: Err(DbError::Other("boom".into())),
            },
            Mode::BringUp,
            &mut db,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(db.log.last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_runs_without_transaction() {
        let mut db = RecordingLibrary {
            fail_begin: true,
            ..RecordingLibrary::new()
        };
        let ok = execute_migration(&Seed { outcome: Ok(false) }, Mode::BringUp, &mut db)
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(db.log, vec!["INSERT INTO \"users\" (\"name\") VALUES (?)"]);
    }

    #[tokio::test]
    async fn test_tear_down() {
        let mut db = RecordingLibrary::new();
        execute_migration(&Seed { outcome: Ok(true) }, Mode::TearDown, &mut db)
            .await
            .unwrap();
        assert_eq!(
            db.log[1],
            "DELETE FROM \"users\" WHERE 1=1 AND (\"users\".\"name\" = ?)"
        );
    }

    #[tokio::test]
    async fn test_context_runs_script() {
        let mut db = RecordingLibrary::new();
        let mut ctx = MigrationContext::new(&mut db);
        ctx.run_script("CREATE TABLE a (id INT); CREATE TABLE b (id INT);")
            .await
            .unwrap();
        assert_eq!(db.log, vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]);
    }

    #[tokio::test]
    async fn test_context_select_fetches_rows() {
        let mut db = RecordingLibrary::new();
        db.rows = vec![crate::library::Record::from_iter([(
            "id".to_string(),
            Value::Int(1),
        )])];
        let mut ctx = MigrationContext::new(&mut db);
        ctx.builder().table("users");
        let rows = ctx.select(["id"]).await.unwrap();
        assert_eq!(rows.row_count(), 1);
    }
}
