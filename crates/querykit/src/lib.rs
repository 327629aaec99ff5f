//! # querykit
//!
//! A small SQL statement builder with nested predicate groups, and a
//! file-tracked migration manager.
//!
//! ## Features
//!
//! - **Placeholders only**: every value is bound as a `?` parameter, in order
//! - **Nested groups**: AND/OR trees of any depth, subqueries with spliced params
//! - **Reusable builder**: each terminal call drains the per-statement state
//! - **One delimiter**: `"` or `` ` `` quoting for every identifier
//! - **Migrations**: Rust migration types, JSON status files, one transaction each
//!
//! ## Query Builder
//!
//! ```ignore
//! use querykit::{Builder, Column, Operator, WhereClause};
//!
//! let mut b = Builder::new();
//! b.table("foos")
//!     .and_where("bar", Operator::Equal, "baz")
//!     .and_group(|g| {
//!         g.and_where("bar", Operator::Less, 10)
//!             .or_where("baz", Operator::Greater, 1);
//!     });
//!
//! let stmt = b.select([Column::new("foo"), Column::func("count", "id").alias("n")])?;
//! // SELECT "foos"."foo",COUNT("foos"."id") AS n FROM "foos"
//! //   WHERE 1=1 AND ("foos"."bar" = ? AND ("foos"."bar" < ? OR "foos"."baz" > ?))
//! assert_eq!(stmt.params.len(), 3);
//! ```
//!
//! ## Execution
//!
//! [`Library`] executes rendered statements; [`PgLibrary`] implements it on
//! tokio-postgres and renumbers placeholders to `$n`.

pub mod config;
pub mod error;
pub mod ident;
pub mod library;
pub mod migrate;
pub mod pg;
pub mod query;
pub mod value;

pub use config::{Config, DatabaseConfig, MigrationConfig};
pub use error::{BuildError, BuildResult, DbError, DbResult};
pub use ident::{Delimiter, Scope};
pub use library::{LastError, Library, Record, ResultSet};
pub use pg::PgLibrary;
pub use query::{
    Builder, Column, Connective, Direction, Group, JoinType, Operator, Predicate, PredicateValue,
    Statement, WhereClause, number_placeholders,
};
pub use value::Value;
