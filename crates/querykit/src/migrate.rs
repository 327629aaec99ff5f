//! File-tracked migrations.
//!
//! Migrations are Rust types implementing [`Migration`]. A [`Manager`] keeps
//! their names and execution times in a [`StatusRepository`] and runs them
//! through a [`Library`](crate::Library), each inside its own transaction.
//!
//! # Example
//!
//! ```ignore
//! use querykit::migrate::{JsonFileRepository, Manager, MigrationRegistry};
//!
//! let mut registry = MigrationRegistry::new();
//! registry.register("CreateUsers", || CreateUsers);
//!
//! let repo = JsonFileRepository::open(config.migration_repository())?;
//! let mut manager = Manager::new(repo, registry.into_loader())?;
//!
//! let failed = manager.run(&[], false, &mut db).await;
//! manager.save()?;
//! ```

pub mod manager;
pub mod migration;
pub mod repository;

pub use manager::{Manager, MigrationLoader, MigrationRegistry};
pub use migration::{Migration, MigrationContext, Mode, execute_migration};
pub use repository::{
    EXECUTED_FILE, JsonFileRepository, MIGRATIONS_FILE, MigrationIndex, MigrationRecord,
    StatusRepository,
};
