//! Statement assembly.
//!
//! A [`Builder`] owns the primary table, delimiter, root WHERE group, joins,
//! grouping, ordering and limit. Configuration calls are chained on
//! `&mut self`; each terminal call (`select`, `insert`, `update`, `delete`)
//! renders one [`Statement`] and drains the per-statement state, so the same
//! builder can be reused for the next query. Table and delimiter survive.
//!
//! The delimiter is captured when `table()` or `join()` is called. Changing it
//! afterwards only affects tables set after the change.
//! Join conditions qualify their primary key with the primary table current
//! at the `join_cond` call, so the table has to be set first.
//!
//! # Example
//!
//! ```ignore
//! use querykit::{Builder, Direction, Operator, WhereClause};
//!
//! let mut b = Builder::new();
//! b.table("users")
//!     .and_where("status", Operator::Equal, "active")
//!     .or_group(|g| {
//!         g.and_where("role", Operator::In, ["admin", "owner"]);
//!     })
//!     .order_by("created_at", Direction::Desc)
//!     .limit(10, 20);
//! let stmt = b.select(["id", "name"])?;
//! ```

use crate::error::{BuildError, BuildResult};
use crate::ident::{Delimiter, Scope};
use crate::query::group::{Connective, Group, WhereClause};
use crate::query::predicate::{Operator, Predicate, PredicateValue};
use crate::query::Statement;
use crate::value::Value;
use std::fmt;
use std::mem;

/// A SELECT column: a plain column or `FUNC(column)`, optionally aliased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    func: Option<String>,
    alias: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            func: None,
            alias: None,
        }
    }

    /// `FUNC(column)`. The function name is upper-cased when rendered.
    pub fn func(func: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            func: Some(func.into()),
            alias: None,
        }
    }

    /// Add ` AS alias`. The alias is emitted verbatim.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn render(&self, scope: &Scope) -> String {
        let column = scope.column(&self.name);
        let mut out = match &self.func {
            Some(func) => format!("{}({column})", func.to_uppercase()),
            None => column,
        };
        if let Some(alias) = &self.alias {
            out.push_str(" AS ");
            out.push_str(alias);
        }
        out
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::new(name)
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::new(name)
    }
}

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT OUTER JOIN",
            JoinType::Right => "RIGHT OUTER JOIN",
            JoinType::Full => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinType,
    /// The joined table.
    scope: Scope,
    cond: Group,
    cols: Vec<Column>,
}

impl Join {
    fn render(&self, params: &mut Vec<Value>) -> BuildResult<String> {
        let table = self.scope.quoted_table().unwrap_or_default();
        if self.kind == JoinType::Cross {
            return Ok(format!("{} {table}", self.kind));
        }
        match self.cond.render(params)? {
            Some(body) => Ok(format!("{} {table} ON {body}", self.kind)),
            None => Err(BuildError::NoJoinCondition(
                self.scope.table_name().unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Per-statement state drained by every terminal call.
#[derive(Debug, Default)]
struct Pending {
    root: Group,
    joins: Vec<Join>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<(u64, u64)>,
}

impl Pending {
    fn push_where(&self, sql: &mut String, params: &mut Vec<Value>) -> BuildResult<()> {
        if let Some(body) = self.root.render(params)? {
            sql.push_str(" WHERE 1=1 ");
            sql.push_str(self.root.connective().as_sql());
            sql.push(' ');
            sql.push_str(&body);
        }
        Ok(())
    }
}

/// SQL statement builder.
#[derive(Debug)]
pub struct Builder {
    delim: Delimiter,
    scope: Scope,
    pending: Pending,
    params: Vec<Value>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Builder quoting identifiers with `"`.
    pub fn new() -> Self {
        Self::with_delimiter(Delimiter::default())
    }

    pub fn with_delimiter(delim: Delimiter) -> Self {
        let scope = Scope::bare(delim);
        Self {
            delim,
            pending: Pending {
                root: Group::with_scope(Connective::And, scope.clone()),
                ..Pending::default()
            },
            scope,
            params: Vec::new(),
        }
    }

    /// Set the quoting character for tables set from now on.
    pub fn set_delim(&mut self, delim: Delimiter) -> &mut Self {
        self.delim = delim;
        self
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delim
    }

    /// Set the primary table.
    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.scope = Scope::table(table, self.delim);
        self.pending.root.set_scope(self.scope.clone());
        self
    }

    /// Primary table name, if set.
    pub fn table_name(&self) -> Option<&str> {
        self.scope.table_name()
    }

    /// Parameters of the last rendered statement, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Discard WHERE conditions, joins, grouping, ordering, limit and params.
    pub fn reset(&mut self) -> &mut Self {
        self.take_pending();
        self.params.clear();
        self
    }

    // ==================== Joins ====================

    /// Add a join. Later join calls apply to the most recent one.
    pub fn join(&mut self, table: impl Into<String>, kind: JoinType) -> &mut Self {
        let scope = Scope::table(table, self.delim);
        self.pending.joins.push(Join {
            kind,
            cond: Group::with_scope(Connective::And, scope.clone()),
            scope,
            cols: Vec::new(),
        });
        self
    }

    pub fn inner_join(&mut self, table: impl Into<String>) -> &mut Self {
        self.join(table, JoinType::Inner)
    }

    pub fn left_join(&mut self, table: impl Into<String>) -> &mut Self {
        self.join(table, JoinType::Left)
    }

    pub fn right_join(&mut self, table: impl Into<String>) -> &mut Self {
        self.join(table, JoinType::Right)
    }

    pub fn full_join(&mut self, table: impl Into<String>) -> &mut Self {
        self.join(table, JoinType::Full)
    }

    pub fn cross_join(&mut self, table: impl Into<String>) -> &mut Self {
        self.join(table, JoinType::Cross)
    }

    /// `AND primary.primary_key op joined.foreign_key` on the latest join.
    pub fn join_cond(
        &mut self,
        primary_key: &str,
        foreign_key: &str,
        op: Operator,
    ) -> BuildResult<&mut Self> {
        self.push_join_cond(Connective::And, primary_key, foreign_key, op)
    }

    /// `OR primary.primary_key op joined.foreign_key` on the latest join.
    pub fn or_join_cond(
        &mut self,
        primary_key: &str,
        foreign_key: &str,
        op: Operator,
    ) -> BuildResult<&mut Self> {
        self.push_join_cond(Connective::Or, primary_key, foreign_key, op)
    }

    /// The primary table must already be set; a cross join takes no condition.
    fn push_join_cond(
        &mut self,
        connective: Connective,
        primary_key: &str,
        foreign_key: &str,
        op: Operator,
    ) -> BuildResult<&mut Self> {
        let join = self.pending.joins.last_mut().ok_or(BuildError::NoJoinTable)?;
        if join.kind == JoinType::Cross {
            return Err(BuildError::invalid_predicate(format!(
                "CROSS JOIN {} takes no join condition",
                join.scope.quoted_table().unwrap_or_default()
            )));
        }
        if self.scope.table_name().is_none() {
            return Err(BuildError::NoTable);
        }
        let mut predicate = Predicate::new(self.scope.column(primary_key));
        predicate
            .set_operator(op)
            .set_value(PredicateValue::Column(join.scope.column(foreign_key)));
        join.cond.push_predicate(connective, predicate);
        Ok(self)
    }

    /// Columns of the latest joined table to add to the SELECT list.
    pub fn join_cols<I, C>(&mut self, cols: I) -> BuildResult<&mut Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let join = self.pending.joins.last_mut().ok_or(BuildError::NoJoinTable)?;
        join.cols.extend(cols.into_iter().map(Into::into));
        Ok(self)
    }

    // ==================== Grouping / ordering ====================

    pub fn group_by(&mut self, column: &str) -> &mut Self {
        let column = self.scope.column(column);
        self.pending.group_by.push(column);
        self
    }

    pub fn order_by(&mut self, column: &str, direction: Direction) -> &mut Self {
        let column = self.scope.column(column);
        self.pending
            .order_by
            .push(format!("{column} {}", direction.as_sql()));
        self
    }

    /// `ORDER BY FUNC(column) direction`
    pub fn order_by_func(&mut self, column: &str, direction: Direction, func: &str) -> &mut Self {
        let column = self.scope.column(column);
        self.pending.order_by.push(format!(
            "{}({column}) {}",
            func.to_uppercase(),
            direction.as_sql()
        ));
        self
    }

    /// Set `LIMIT n`, with `OFFSET offset` when non-zero. Last call wins.
    pub fn limit(&mut self, n: u64, offset: u64) -> &mut Self {
        self.pending.limit = Some((n, offset));
        self
    }

    // ==================== Terminal calls ====================

    /// `SELECT cols FROM table [joins] WHERE 1=1 [...] [GROUP BY] [ORDER BY] [LIMIT]`
    ///
    /// An empty column list selects `*`.
    pub fn select<I, C>(&mut self, cols: I) -> BuildResult<Statement>
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        let pending = self.take_pending();
        let table = self.primary_table()?;
        let mut params = Vec::new();

        let mut columns: Vec<String> = cols
            .into_iter()
            .map(|c| Into::<Column>::into(c).render(&self.scope))
            .collect();
        for join in &pending.joins {
            columns.extend(join.cols.iter().map(|c| c.render(&join.scope)));
        }
        if columns.is_empty() {
            columns.push("*".to_string());
        }

        let mut sql = format!("SELECT {} FROM {table}", columns.join(","));
        for join in &pending.joins {
            sql.push(' ');
            sql.push_str(&join.render(&mut params)?);
        }

        sql.push_str(" WHERE 1=1");
        if let Some(body) = pending.root.render(&mut params)? {
            sql.push(' ');
            sql.push_str(pending.root.connective().as_sql());
            sql.push(' ');
            sql.push_str(&body);
        }

        if !pending.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&pending.group_by.join(","));
        }
        if !pending.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&pending.order_by.join(","));
        }
        if let Some((n, offset)) = pending.limit {
            sql.push_str(&format!(" LIMIT {n}"));
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        Ok(self.finish(sql, params))
    }

    /// `INSERT INTO table (cols) VALUES (?,...)`
    ///
    /// Column order and parameter order follow `data`.
    pub fn insert<I, K, V>(&mut self, data: I) -> BuildResult<Statement>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.take_pending();
        let table = self.primary_table()?;

        let delim = self.delim_of_table();
        let (columns, params): (Vec<String>, Vec<Value>) = data
            .into_iter()
            .map(|(k, v)| (delim.quote(k.as_ref()), v.into()))
            .unzip();
        if columns.is_empty() {
            return Err(BuildError::NoData("INSERT"));
        }

        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(","),
            vec!["?"; params.len()].join(",")
        );
        Ok(self.finish(sql, params))
    }

    /// `UPDATE table SET col=?,... [WHERE 1=1 ...]`
    ///
    /// SET values come first in the parameter list, then WHERE values.
    pub fn update<I, K, V>(&mut self, data: I) -> BuildResult<Statement>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let pending = self.take_pending();
        let table = self.primary_table()?;

        let delim = self.delim_of_table();
        let (assignments, mut params): (Vec<String>, Vec<Value>) = data
            .into_iter()
            .map(|(k, v)| (format!("{}=?", delim.quote(k.as_ref())), v.into()))
            .unzip();
        if assignments.is_empty() {
            return Err(BuildError::NoData("UPDATE"));
        }

        let mut sql = format!("UPDATE {table} SET {}", assignments.join(","));
        pending.push_where(&mut sql, &mut params)?;
        Ok(self.finish(sql, params))
    }

    /// `DELETE FROM table [WHERE 1=1 ...]`
    pub fn delete(&mut self) -> BuildResult<Statement> {
        let pending = self.take_pending();
        let table = self.primary_table()?;

        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {table}");
        pending.push_where(&mut sql, &mut params)?;
        Ok(self.finish(sql, params))
    }

    fn primary_table(&self) -> BuildResult<String> {
        self.scope.quoted_table().ok_or(BuildError::NoTable)
    }

    fn delim_of_table(&self) -> Delimiter {
        self.scope.delimiter()
    }

    fn take_pending(&mut self) -> Pending {
        self.params.clear();
        mem::replace(
            &mut self.pending,
            Pending {
                root: Group::with_scope(Connective::And, self.scope.clone()),
                ..Pending::default()
            },
        )
    }

    fn finish(&mut self, sql: String, params: Vec<Value>) -> Statement {
        tracing::trace!(
            target: "querykit.builder",
            sql = %sql,
            params = params.len(),
            "rendered statement"
        );
        self.params = params.clone();
        Statement::new(sql, params)
    }
}

impl WhereClause for Builder {
    fn where_group(&mut self) -> &mut Group {
        &mut self.pending.root
    }
}
