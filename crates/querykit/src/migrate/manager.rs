//! Migration bookkeeping: create, run, revert and remove.

use crate::error::{DbError, DbResult};
use crate::library::Library;
use crate::migrate::migration::{Migration, Mode, execute_migration};
use crate::migrate::repository::{MigrationIndex, MigrationRecord, StatusRepository};
use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;

/// Resolves a migration name to an instance.
pub type MigrationLoader = Box<dyn Fn(&str) -> DbResult<Box<dyn Migration>> + Send + Sync>;

type Constructor = Box<dyn Fn() -> Box<dyn Migration> + Send + Sync>;

const NAME_PATTERN: &str = r"^[a-zA-Z]\w*$";

/// Name → constructor table, convertible into a [`MigrationLoader`].
#[derive(Default)]
pub struct MigrationRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M, F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        M: Migration + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.into(), Box::new(move || Box::new(ctor()) as Box<dyn Migration>));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn into_loader(self) -> MigrationLoader {
        Box::new(move |name: &str| {
            self.constructors
                .get(name)
                .map(|ctor| ctor())
                .ok_or_else(|| DbError::migration(format!("Migration '{name}' is not registered")))
        })
    }
}

/// Tracks migrations in a [`StatusRepository`] and executes them.
///
/// Status changes stay in memory until [`Manager::save`] is called.
pub struct Manager<R: StatusRepository> {
    repo: R,
    loader: MigrationLoader,
    index: MigrationIndex,
}

impl<R: StatusRepository> Manager<R> {
    pub fn new(repo: R, loader: MigrationLoader) -> DbResult<Self> {
        let index = repo.load()?;
        tracing::debug!(target: "querykit.migrate", migrations = index.len(), "loaded migration status");
        Ok(Self {
            repo,
            loader,
            index,
        })
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Known migrations in creation order.
    pub fn get(&self) -> &[MigrationRecord] {
        self.index.records()
    }

    /// Register a new migration and create its source file.
    ///
    /// Names start with a letter followed by letters, digits or underscores.
    pub fn create(&mut self, name: &str) -> DbResult<()> {
        let pattern = Regex::new(NAME_PATTERN).map_err(|e| DbError::Other(e.to_string()))?;
        if !pattern.is_match(name) {
            return Err(DbError::migration(format!(
                "Invalid migration name '{name}', it must match {NAME_PATTERN}"
            )));
        }
        if self.index.contains(name) {
            return Err(DbError::MigrationExists(name.to_string()));
        }

        self.repo.create_migration_file(name)?;
        self.index.push(name);
        tracing::info!(target: "querykit.migrate", migration = name, "created migration");
        Ok(())
    }

    /// Bring migrations up and return the names that failed.
    ///
    /// An empty `names` runs every known migration in creation order.
    /// Executed migrations are skipped unless `force` is set.
    pub async fn run(&mut self, names: &[&str], force: bool, db: &mut dyn Library) -> Vec<String> {
        let targets: Vec<String> = if names.is_empty() {
            self.index.names().map(String::from).collect()
        } else {
            names.iter().map(|n| n.to_string()).collect()
        };

        let mut failed = Vec::new();
        for name in targets {
            match self.index.get(&name) {
                None => {
                    tracing::warn!(target: "querykit.migrate", migration = %name, "unknown migration");
                    failed.push(name);
                    continue;
                }
                Some(record) if record.is_executed() && !force => {
                    tracing::debug!(target: "querykit.migrate", migration = %name, "already executed, skipping");
                    continue;
                }
                Some(_) => {}
            }

            if self.execute(&name, Mode::BringUp, db).await {
                self.index.mark_executed(&name, Utc::now());
            } else {
                failed.push(name);
            }
        }
        failed
    }

    /// Tear migrations down and return the names that failed.
    ///
    /// Migrations that were never executed are skipped unless `force` is set.
    pub async fn revert(
        &mut self,
        names: &[&str],
        force: bool,
        db: &mut dyn Library,
    ) -> DbResult<Vec<String>> {
        if names.is_empty() {
            return Err(DbError::migration("No migrations given to revert"));
        }

        let mut failed = Vec::new();
        for &name in names {
            match self.index.get(name) {
                None => {
                    tracing::warn!(target: "querykit.migrate", migration = name, "unknown migration");
                    failed.push(name.to_string());
                    continue;
                }
                Some(record) if !record.is_executed() && !force => {
                    tracing::debug!(target: "querykit.migrate", migration = name, "not executed, skipping");
                    continue;
                }
                Some(_) => {}
            }

            if self.execute(name, Mode::TearDown, db).await {
                self.index.mark_reverted(name);
            } else {
                failed.push(name.to_string());
            }
        }
        Ok(failed)
    }

    /// Forget a migration and delete its source file.
    ///
    /// With `revert`, an executed migration is torn down first; if that fails
    /// nothing is removed and `false` is returned. Unknown names return `false`.
    pub async fn remove(&mut self, name: &str, revert: bool, db: &mut dyn Library) -> DbResult<bool> {
        let Some(record) = self.index.get(name) else {
            tracing::warn!(target: "querykit.migrate", migration = name, "unknown migration");
            return Ok(false);
        };

        if revert && record.is_executed() {
            let failed = self.revert(&[name], false, db).await?;
            if !failed.is_empty() {
                tracing::error!(target: "querykit.migrate", migration = name, "revert failed, not removing");
                return Ok(false);
            }
        }

        self.repo.remove_migration_file(name)?;
        self.index.remove(name);
        tracing::info!(target: "querykit.migrate", migration = name, "removed migration");
        Ok(true)
    }

    /// Persist the current status.
    pub fn save(&self) -> DbResult<()> {
        self.repo.save(&self.index)
    }

    async fn execute(&self, name: &str, mode: Mode, db: &mut dyn Library) -> bool {
        let migration = match (self.loader)(name) {
            Ok(m) => m,
            Err(err) => {
                tracing::error!(target: "querykit.migrate", migration = name, error = %err, "unable to load migration");
                return false;
            }
        };

        tracing::info!(target: "querykit.migrate", migration = name, mode = %mode, "executing migration");
        match execute_migration(migration.as_ref(), mode, db).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(target: "querykit.migrate", migration = name, mode = %mode, "migration reported failure");
                false
            }
            Err(err) => {
                tracing::error!(target: "querykit.migrate", migration = name, mode = %mode, error = %err, "migration failed");
                false
            }
        }
    }
}
