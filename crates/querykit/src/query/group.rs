//! Nested predicate groups.
//!
//! A [`Group`] is an ordered list of predicates and sub-groups, each attached
//! by an AND/OR connective. Rendering is recursive:
//!
//! ```text
//! (first CONN second CONN (nested ...))
//! ```
//!
//! The connective of the first rendered entry is dropped. Empty sub-groups are
//! skipped entirely so they never leave `()` behind.

use crate::error::{BuildError, BuildResult};
use crate::ident::{Delimiter, Scope};
use crate::query::builder::Builder;
use crate::query::predicate::{Operator, Predicate, PredicateValue};
use crate::query::Statement;
use crate::value::Value;
use std::fmt;

/// Logical connective joining an entry to the entries before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connective {
    #[default]
    And,
    Or,
}

impl Connective {
    pub fn as_sql(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Predicate(Predicate),
    Group(Group),
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    connective: Connective,
    item: Item,
}

/// Ordered collection of predicates and sub-groups.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    connective: Connective,
    scope: Scope,
    entries: Vec<Entry>,
    deferred: Option<BuildError>,
}

impl Group {
    /// A standalone group. Columns are emitted verbatim.
    pub fn new(connective: Connective) -> Self {
        Self::with_scope(connective, Scope::bare(Delimiter::None))
    }

    /// A group whose columns are qualified through `scope`.
    pub fn with_scope(connective: Connective, scope: Scope) -> Self {
        Self {
            connective,
            scope,
            entries: Vec::new(),
            deferred: None,
        }
    }

    /// Connective used as the prefix of [`Group::convert`].
    pub fn connective(&self) -> Connective {
        self.connective
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub(crate) fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    /// Number of direct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing would be rendered, including when every entry is
    /// itself an empty group.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| match &e.item {
            Item::Predicate(_) => false,
            Item::Group(g) => g.is_empty(),
        })
    }

    /// Append a pre-built predicate.
    pub fn push_predicate(&mut self, connective: Connective, predicate: Predicate) -> &mut Self {
        self.entries.push(Entry {
            connective,
            item: Item::Predicate(predicate),
        });
        self
    }

    /// Append a pre-built sub-group.
    pub fn push_group(&mut self, connective: Connective, group: Group) -> &mut Self {
        self.entries.push(Entry {
            connective,
            item: Item::Group(group),
        });
        self
    }

    /// Record an error to surface at render time.
    ///
    /// Only the first one is kept.
    pub(crate) fn defer(&mut self, err: BuildError) {
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
    }

    /// Render as `" {CONN} (...)"`, or `""` when the group is empty.
    ///
    /// Returns the SQL fragment and the bound values in placeholder order.
    pub fn convert(&self) -> BuildResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        let sql = match self.render(&mut params)? {
            Some(body) => format!(" {} {}", self.connective, body),
            None => String::new(),
        };
        Ok((sql, params))
    }

    /// Bound values of every entry, in render order.
    pub fn params(&self) -> BuildResult<Vec<Value>> {
        self.convert().map(|(_, params)| params)
    }

    /// Render the parenthesized body, appending bound values to `params`.
    ///
    /// `None` when there is nothing to render.
    pub(crate) fn render(&self, params: &mut Vec<Value>) -> BuildResult<Option<String>> {
        if let Some(err) = &self.deferred {
            return Err(err.clone());
        }

        let mut sql = String::new();
        for entry in &self.entries {
            let fragment = match &entry.item {
                Item::Predicate(p) => p.build(params)?,
                Item::Group(g) => match g.render(params)? {
                    Some(body) => body,
                    None => continue,
                },
            };
            if !sql.is_empty() {
                sql.push(' ');
                sql.push_str(entry.connective.as_sql());
                sql.push(' ');
            }
            sql.push_str(&fragment);
        }

        if sql.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("({sql})")))
        }
    }
}

/// Condition-building methods shared by [`Group`] and [`Builder`].
///
/// Implementors only expose the group that receives the conditions; every
/// other method is provided.
pub trait WhereClause {
    /// Group that receives new conditions.
    fn where_group(&mut self) -> &mut Group;

    /// Add `column op value` joined by `connective`.
    ///
    /// The column is qualified through the group's scope.
    fn filter(
        &mut self,
        connective: Connective,
        column: &str,
        op: Operator,
        value: impl Into<PredicateValue>,
    ) -> &mut Self {
        let group = self.where_group();
        let mut predicate = Predicate::new(group.scope().column(column));
        predicate.set_operator(op).set_value(value);
        group.push_predicate(connective, predicate);
        self
    }

    /// `AND column op value`
    fn and_where(&mut self, column: &str, op: Operator, value: impl Into<PredicateValue>) -> &mut Self {
        self.filter(Connective::And, column, op, value)
    }

    /// `OR column op value`
    fn or_where(&mut self, column: &str, op: Operator, value: impl Into<PredicateValue>) -> &mut Self {
        self.filter(Connective::Or, column, op, value)
    }

    /// Add a parenthesized sub-group populated by `f`.
    ///
    /// The sub-group inherits this group's scope. The closure's connective
    /// argument is how the sub-group attaches to its siblings; conditions
    /// inside it carry their own connectives.
    fn group_with<F>(&mut self, connective: Connective, f: F) -> &mut Self
    where
        F: FnOnce(&mut Group),
    {
        let group = self.where_group();
        let mut nested = Group::with_scope(connective, group.scope().clone());
        f(&mut nested);
        group.push_group(connective, nested);
        self
    }

    /// `AND (...)`
    fn and_group<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut Group),
    {
        self.group_with(Connective::And, f)
    }

    /// `OR (...)`
    fn or_group<F>(&mut self, f: F) -> &mut Self
    where
        F: FnOnce(&mut Group),
    {
        self.group_with(Connective::Or, f)
    }

    /// Compare `column` against a subquery built by `f`.
    ///
    /// `f` receives a fresh [`Builder`] with the same delimiter and returns
    /// its terminal statement. If it fails, the error is raised when the
    /// enclosing statement is rendered.
    fn nested_with<F>(&mut self, connective: Connective, column: &str, op: Operator, f: F) -> &mut Self
    where
        F: FnOnce(&mut Builder) -> BuildResult<Statement>,
    {
        let group = self.where_group();
        let mut sub = Builder::with_delimiter(group.scope().delimiter());
        match f(&mut sub) {
            Ok(stmt) => {
                let mut predicate = Predicate::new(group.scope().column(column));
                predicate.set_operator(op).set_value(stmt);
                group.push_predicate(connective, predicate);
            }
            Err(err) => group.defer(err),
        }
        self
    }

    /// `AND column op (SELECT ...)`
    fn and_nested<F>(&mut self, column: &str, op: Operator, f: F) -> &mut Self
    where
        F: FnOnce(&mut Builder) -> BuildResult<Statement>,
    {
        self.nested_with(Connective::And, column, op, f)
    }

    /// `OR column op (SELECT ...)`
    fn or_nested<F>(&mut self, column: &str, op: Operator, f: F) -> &mut Self
    where
        F: FnOnce(&mut Builder) -> BuildResult<Statement>,
    {
        self.nested_with(Connective::Or, column, op, f)
    }
}

impl WhereClause for Group {
    fn where_group(&mut self) -> &mut Group {
        self
    }
}
