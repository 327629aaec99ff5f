//! Migration status persistence.
//!
//! [`StatusRepository`] loads and saves a [`MigrationIndex`]: the ordered list
//! of known migrations with their execution time. [`JsonFileRepository`] keeps
//! it as two JSON files inside the migration directory:
//!
//! - `.migrations.json`: `["CreateUsers", "AddEmail"]`, in creation order
//! - `.executed.json`: `{"CreateUsers": 1700000000}`, unix seconds

use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MIGRATIONS_FILE: &str = ".migrations.json";
pub const EXECUTED_FILE: &str = ".executed.json";

/// One known migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub name: String,
    pub executed: Option<DateTime<Utc>>,
}

impl MigrationRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executed: None,
        }
    }

    pub fn is_executed(&self) -> bool {
        self.executed.is_some()
    }
}

/// Known migrations in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationIndex {
    records: Vec<MigrationRecord>,
}

impl MigrationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MigrationRecord] {
        &self.records
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&MigrationRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Append a not-yet-executed migration. False if the name is taken.
    pub fn push(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.records.push(MigrationRecord::new(name));
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<MigrationRecord> {
        let pos = self.records.iter().position(|r| r.name == name)?;
        Some(self.records.remove(pos))
    }

    pub fn mark_executed(&mut self, name: &str, at: DateTime<Utc>) {
        if let Some(r) = self.records.iter_mut().find(|r| r.name == name) {
            r.executed = Some(at);
        }
    }

    pub fn mark_reverted(&mut self, name: &str) {
        if let Some(r) = self.records.iter_mut().find(|r| r.name == name) {
            r.executed = None;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<MigrationRecord> for MigrationIndex {
    fn from_iter<T: IntoIterator<Item = MigrationRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Where migration status lives.
pub trait StatusRepository: Send {
    fn load(&self) -> DbResult<MigrationIndex>;

    fn save(&self, index: &MigrationIndex) -> DbResult<()>;

    /// Create the source file for a new migration.
    fn create_migration_file(&self, _name: &str) -> DbResult<()> {
        Ok(())
    }

    /// Delete the source file of a removed migration.
    fn remove_migration_file(&self, _name: &str) -> DbResult<()> {
        Ok(())
    }
}

/// Status files and migration sources in one directory.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    dir: PathBuf,
}

impl JsonFileRepository {
    /// Open `dir`, creating it and empty status files if missing.
    pub fn open(dir: impl Into<PathBuf>) -> DbResult<Self> {
        let dir = dir.into();
        check_directory(&dir)?;

        let repo = Self { dir };
        for (file, empty) in [(MIGRATIONS_FILE, "[]"), (EXECUTED_FILE, "{}")] {
            let path = repo.dir.join(file);
            if !path.exists() {
                write_file(&path, empty)?;
            }
        }
        Ok(repo)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Source file of a migration.
    pub fn migration_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.rs"))
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> DbResult<T> {
        let path = self.dir.join(file);
        let raw = fs::read_to_string(&path).map_err(|e| {
            DbError::repository(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            tracing::error!(target: "querykit.migrate", file = %path.display(), error = %e, "corrupted status file");
            DbError::repository("Migration file is corrupted!")
        })
    }
}

impl StatusRepository for JsonFileRepository {
    fn load(&self) -> DbResult<MigrationIndex> {
        let names: Vec<String> = self.read_json(MIGRATIONS_FILE)?;
        let mut executed: BTreeMap<String, i64> = self.read_json(EXECUTED_FILE)?;

        let index: MigrationIndex = names
            .into_iter()
            .map(|name| {
                let at = executed
                    .remove(&name)
                    .and_then(|secs| DateTime::from_timestamp(secs, 0));
                MigrationRecord { name, executed: at }
            })
            .collect();

        for orphan in executed.keys() {
            tracing::warn!(
                target: "querykit.migrate",
                migration = %orphan,
                "executed migration is not listed in {MIGRATIONS_FILE}, ignoring"
            );
        }
        Ok(index)
    }

    fn save(&self, index: &MigrationIndex) -> DbResult<()> {
        let names: Vec<&str> = index.names().collect();
        let executed: BTreeMap<&str, i64> = index
            .records()
            .iter()
            .filter_map(|r| r.executed.map(|at| (r.name.as_str(), at.timestamp())))
            .collect();

        write_file(&self.dir.join(MIGRATIONS_FILE), &serde_json::to_string_pretty(&names)?)?;
        write_file(&self.dir.join(EXECUTED_FILE), &serde_json::to_string_pretty(&executed)?)?;
        tracing::debug!(target: "querykit.migrate", migrations = names.len(), "saved migration status");
        Ok(())
    }

    fn create_migration_file(&self, name: &str) -> DbResult<()> {
        let path = self.migration_path(name);
        if path.exists() {
            return Err(DbError::MigrationExists(name.to_string()));
        }
        write_file(&path, &migration_template(name))?;
        tracing::info!(target: "querykit.migrate", path = %path.display(), "created migration file");
        Ok(())
    }

    fn remove_migration_file(&self, name: &str) -> DbResult<()> {
        let path = self.migration_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DbError::repository(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

fn check_directory(dir: &Path) -> DbResult<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir).map_err(|e| {
            DbError::repository(format!(
                "Unable to create migration repository {}: {e}",
                dir.display()
            ))
        });
    }

    if !dir.is_dir() {
        return Err(DbError::repository(
            "Received migration repository is not a directory!",
        ));
    }

    let readonly = fs::metadata(dir)
        .map(|m| m.permissions().readonly())
        .unwrap_or(true);
    if readonly {
        return Err(DbError::repository(
            "Received migration repository is not writable!",
        ));
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> DbResult<()> {
    fs::write(path, contents)
        .map_err(|e| DbError::repository(format!("failed to write {}: {e}", path.display())))
}

fn migration_template(name: &str) -> String {
    format!(
        "//! Migration: {name}\n\
         //! Created at: {} UTC\n\
         \n\
         use querykit::DbResult;\n\
         use querykit::migrate::{{Migration, MigrationContext}};\n\
         \n\
         pub struct {name};\n\
         \n\
         #[async_trait::async_trait]\n\
         impl Migration for {name} {{\n    \
             async fn up(&self, _ctx: &mut MigrationContext<'_>) -> DbResult<bool> {{\n        \
                 // Write your UP migration here.\n        \
                 Ok(true)\n    \
             }}\n\
         \n    \
             async fn down(&self, _ctx: &mut MigrationContext<'_>) -> DbResult<bool> {{\n        \
                 // Write your DOWN migration here.\n        \
                 Ok(true)\n    \
             }}\n\
         }}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_open_creates_directory_and_status_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("app/Migrations");
        let repo = JsonFileRepository::open(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_to_string(dir.join(MIGRATIONS_FILE)).unwrap(), "[]");
        assert_eq!(fs::read_to_string(dir.join(EXECUTED_FILE)).unwrap(), "{}");
        assert!(repo.load().unwrap().is_empty());
    }

    #[test]
    fn test_open_rejects_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        fs::write(&file, "").unwrap();

        let err = JsonFileRepository::open(&file).unwrap_err();
        assert_eq!(err.to_string(), "Received migration repository is not a directory!");
    }

    #[cfg(unix)]
    #[test]
    fn test_open_rejects_readonly_directory() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ro");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

        let err = JsonFileRepository::open(&dir).unwrap_err();
        assert_eq!(err.to_string(), "Received migration repository is not writable!");

        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_corrupted_status_file() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::open(tmp.path()).unwrap();
        fs::write(tmp.path().join(EXECUTED_FILE), "{not json").unwrap();

        let err = repo.load().unwrap_err();
        assert_eq!(err.to_string(), "Migration file is corrupted!");
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::open(tmp.path()).unwrap();
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let mut index = MigrationIndex::new();
        assert!(index.push("CreateUsers"));
        assert!(index.push("AddEmail"));
        assert!(!index.push("CreateUsers"));
        index.mark_executed("CreateUsers", at);
        repo.save(&index).unwrap();

        let executed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join(EXECUTED_FILE)).unwrap())
                .unwrap();
        assert_eq!(executed, serde_json::json!({"CreateUsers": 1_700_000_000}));

        let loaded = repo.load().unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["CreateUsers", "AddEmail"]);
        assert_eq!(loaded.get("CreateUsers").unwrap().executed, Some(at));
        assert!(!loaded.get("AddEmail").unwrap().is_executed());
    }

    #[test]
    fn test_unlisted_executed_entries_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::open(tmp.path()).unwrap();
        fs::write(tmp.path().join(MIGRATIONS_FILE), r#"["A"]"#).unwrap();
        fs::write(tmp.path().join(EXECUTED_FILE), r#"{"A": 10, "Gone": 20}"#).unwrap();

        let index = repo.load().unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get("A").unwrap().is_executed());
    }

    #[test]
    fn test_migration_file_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::open(tmp.path()).unwrap();

        repo.create_migration_file("CreateUsers").unwrap();
        let path = repo.migration_path("CreateUsers");
        let source = fs::read_to_string(&path).unwrap();
        assert!(source.contains("pub struct CreateUsers;"));
        assert!(source.contains("impl Migration for CreateUsers {"));

        assert!(repo.create_migration_file("CreateUsers").unwrap_err().is_migration_exists());

        repo.remove_migration_file("CreateUsers").unwrap();
        assert!(!path.exists());
        repo.remove_migration_file("CreateUsers").unwrap();
    }

    #[test]
    fn test_index_remove() {
        let mut index: MigrationIndex = ["A", "B"].into_iter().map(MigrationRecord::new).collect();
        assert_eq!(index.remove("A").map(|r| r.name), Some("A".to_string()));
        assert!(index.remove("A").is_none());
        assert_eq!(index.len(), 1);
    }
}
