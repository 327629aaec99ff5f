//! SQL statement construction.
//!
//! Statements use `?` positional placeholders. [`Statement::params`] always
//! holds exactly one value per placeholder, in left-to-right order.
//!
//! - [`Predicate`]: one `column op value` term.
//! - [`Group`]: AND/OR-joined predicates and sub-groups.
//! - [`Builder`]: table, joins, ordering and the four statement kinds.

pub mod builder;
pub mod group;
pub mod predicate;


pub use builder::{Builder, Column, Direction, JoinType};
pub use group::{Connective, Group, WhereClause};
pub use predicate::{Operator, Predicate, PredicateValue};

use crate::value::Value;
use std::fmt;

/// A rendered statement and its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Number of `?` placeholders outside quoted sections.
    pub fn placeholder_count(&self) -> usize {
        let mut n = 0;
        scan_placeholders(&self.sql, |_| n += 1);
        n
    }

    /// SQL with `?` rewritten to PostgreSQL's `$1, $2, ...`.
    pub fn numbered_sql(&self) -> String {
        number_placeholders(&self.sql)
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Rewrite `?` placeholders as `$1, $2, ...`.
///
/// Question marks inside `'...'`, `"..."` or `` `...` `` are left alone.
pub fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0;
    let mut last = 0;
    scan_placeholders(sql, |pos| {
        n += 1;
        out.push_str(&sql[last..pos]);
        out.push('$');
        out.push_str(&n.to_string());
        last = pos + 1;
    });
    out.push_str(&sql[last..]);
    out
}

/// Call `f` with the byte offset of every unquoted `?`.
fn scan_placeholders(sql: &str, mut f: impl FnMut(usize)) {
    let mut quote: Option<char> = None;
    for (pos, c) in sql.char_indices() {
        match quote {
            // A doubled quote closes and immediately reopens, which is fine.
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => f(pos),
                _ => {}
            },
        }
    }
}
