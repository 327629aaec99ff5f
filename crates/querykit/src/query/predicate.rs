//! Single comparison term for WHERE and JOIN conditions.

use crate::error::{BuildError, BuildResult};
use crate::query::Statement;
use crate::value::Value;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    /// `=`
    #[default]
    Equal,
    /// `<>`
    Diff,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `>=`
    GreaterEq,
    /// `<=`
    LessEq,
    /// `IN (...)`
    In,
    /// `NOT IN (...)`
    NotIn,
    /// `LIKE`
    Like,
    /// `BETWEEN ? AND ?`
    Between,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// SQL spelling of the operator.
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::Diff => "<>",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::GreaterEq => ">=",
            Operator::LessEq => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::Between => "BETWEEN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// `IS NULL` / `IS NOT NULL`: these never bind a value.
    pub fn is_null_check(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Operator {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        let op = match normalized.as_str() {
            "=" => Operator::Equal,
            "<>" | "!=" => Operator::Diff,
            ">" => Operator::Greater,
            "<" => Operator::Less,
            ">=" => Operator::GreaterEq,
            "<=" => Operator::LessEq,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "LIKE" => Operator::Like,
            "BETWEEN" => Operator::Between,
            "IS NULL" => Operator::IsNull,
            "IS NOT NULL" => Operator::IsNotNull,
            _ => {
                return Err(BuildError::invalid_predicate(format!(
                    "unknown comparison operator '{s}'"
                )));
            }
        };
        Ok(op)
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    /// One bound value.
    Scalar(Value),
    /// Bound values for `IN`/`NOT IN`/`BETWEEN`.
    List(Vec<Value>),
    /// An already-quoted column reference. Rendered verbatim, never bound.
    Column(String),
    /// A rendered subquery. Its SQL is inlined in parentheses and its own
    /// parameters are spliced in at that position.
    Subquery(Statement),
}

impl PredicateValue {
    /// Whether this value forces the predicate to `IS NULL`.
    pub fn is_null_marker(&self) -> bool {
        matches!(self, PredicateValue::Scalar(v) if v.is_null_marker())
    }
}

macro_rules! impl_scalar_predicate_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for PredicateValue {
                fn from(v: $t) -> Self {
                    PredicateValue::Scalar(v.into())
                }
            }
        )*
    };
}

impl_scalar_predicate_value!(Value, bool, i16, i32, i64, u32, f32, f64, &str, String, NaiveDateTime);

impl<T: Into<Value>> From<Option<T>> for PredicateValue {
    fn from(v: Option<T>) -> Self {
        PredicateValue::Scalar(v.into())
    }
}

impl<T: Into<Value>> From<Vec<T>> for PredicateValue {
    fn from(v: Vec<T>) -> Self {
        PredicateValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for PredicateValue {
    fn from(v: [T; N]) -> Self {
        PredicateValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Statement> for PredicateValue {
    fn from(v: Statement) -> Self {
        PredicateValue::Subquery(v)
    }
}

/// A `column operator value` term.
///
/// The column is stored exactly as it will be rendered, so callers that build
/// predicates by hand pass an already-quoted reference. Parameters are derived
/// from the final operator/value state when the predicate is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    column: String,
    operator: Operator,
    value: PredicateValue,
}

impl Predicate {
    /// Create a `column IS NULL` predicate; set the rest with the setters.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::IsNull,
            value: PredicateValue::Scalar(Value::Null),
        }
    }

    /// Set the rendered column reference.
    pub fn set_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.column = column.into();
        self
    }

    /// Set the comparison operator.
    pub fn set_operator(&mut self, operator: Operator) -> &mut Self {
        self.operator = operator;
        self
    }

    /// Set the value.
    ///
    /// `NULL` (or the text `"null"`) forces the operator to `IS NULL` unless it
    /// already is a null check.
    pub fn set_value(&mut self, value: impl Into<PredicateValue>) -> &mut Self {
        let value = value.into();
        if value.is_null_marker() && !self.operator.is_null_check() {
            self.operator = Operator::IsNull;
        }
        self.value = value;
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &PredicateValue {
        &self.value
    }

    /// Bound values in the order their placeholders appear in [`Predicate::convert`].
    pub fn params(&self) -> Vec<Value> {
        if self.operator.is_null_check() {
            return Vec::new();
        }
        match &self.value {
            PredicateValue::Scalar(v) => vec![v.clone()],
            PredicateValue::List(values) => values.clone(),
            PredicateValue::Column(_) => Vec::new(),
            PredicateValue::Subquery(stmt) => stmt.params.clone(),
        }
    }

    /// Render to SQL, discarding parameters.
    pub fn convert(&self) -> BuildResult<String> {
        self.build(&mut Vec::new())
    }

    /// Render to SQL and append the bound values to `params`.
    pub fn build(&self, params: &mut Vec<Value>) -> BuildResult<String> {
        let col = &self.column;
        let op = self.operator;

        match op {
            Operator::IsNull | Operator::IsNotNull => Ok(format!("{col} {op}")),

            Operator::Between => match &self.value {
                PredicateValue::List(values) if values.len() == 2 => {
                    params.extend(values.iter().cloned());
                    Ok(format!("{col} BETWEEN ? AND ?"))
                }
                PredicateValue::List(values) => Err(BuildError::invalid_predicate(format!(
                    "BETWEEN on {col} needs exactly 2 values, got {}",
                    values.len()
                ))),
                _ => Err(BuildError::invalid_predicate(format!(
                    "BETWEEN on {col} needs a list of 2 values"
                ))),
            },

            Operator::In | Operator::NotIn => match &self.value {
                PredicateValue::List(values) if values.is_empty() => Err(
                    BuildError::invalid_predicate(format!("{op} on {col} needs at least one value")),
                ),
                PredicateValue::List(values) => {
                    params.extend(values.iter().cloned());
                    Ok(format!("{col} {op} ({})", placeholders(values.len())))
                }
                PredicateValue::Subquery(stmt) => {
                    params.extend(stmt.params.iter().cloned());
                    Ok(format!("{col} {op} ({})", stmt.sql))
                }
                _ => Err(BuildError::invalid_predicate(format!(
                    "{op} on {col} needs a list of values or a subquery"
                ))),
            },

            _ => match &self.value {
                PredicateValue::Scalar(v) => {
                    params.push(v.clone());
                    Ok(format!("{col} {op} ?"))
                }
                PredicateValue::Column(other) => Ok(format!("{col} {op} {other}")),
                PredicateValue::Subquery(stmt) => {
                    params.extend(stmt.params.iter().cloned());
                    Ok(format!("{col} {op} ({})", stmt.sql))
                }
                PredicateValue::List(_) => Err(BuildError::invalid_predicate(format!(
                    "{op} on {col} takes a single value, got a list"
                ))),
            },
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predicate() -> Predicate {
        Predicate::new("\"foo\".\"bar\"")
    }

    #[test]
    fn test_scalar() {
        let mut p = predicate();
        p.set_value(1).set_operator(Operator::Equal);
        let mut params = Vec::new();
        assert_eq!(p.build(&mut params).unwrap(), "\"foo\".\"bar\" = ?");
        assert_eq!(params, vec![Value::Int(1)]);

        p.set_value("foo").set_operator(Operator::Like);
        assert_eq!(p.convert().unwrap(), "\"foo\".\"bar\" LIKE ?");
        assert_eq!(p.params(), vec![Value::from("foo")]);
    }

    #[test]
    fn test_null_forces_is_null() {
        let mut p = predicate();
        p.set_value(5).set_value(Value::Null);
        assert_eq!(p.operator(), Operator::IsNull);
        assert_eq!(p.convert().unwrap(), "\"foo\".\"bar\" IS NULL");
        assert!(p.params().is_empty());

        let mut p = predicate();
        p.set_value("NULL");
        assert_eq!(p.operator(), Operator::IsNull);
        assert!(p.params().is_empty());
    }

    #[test]
    fn test_new_predicate_is_null_check() {
        let p = predicate();
        assert_eq!(p.operator(), Operator::IsNull);
        let mut params = Vec::new();
        assert_eq!(p.build(&mut params).unwrap(), "\"foo\".\"bar\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_null_keeps_is_not_null() {
        let mut p = predicate();
        p.set_operator(Operator::IsNotNull).set_value(Value::Null);
        assert_eq!(p.convert().unwrap(), "\"foo\".\"bar\" IS NOT NULL");
    }

    #[test]
    fn test_null_check_ignores_value() {
        let mut p = predicate();
        p.set_value(10).set_operator(Operator::IsNull);
        let mut params = Vec::new();
        assert_eq!(p.build(&mut params).unwrap(), "\"foo\".\"bar\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_between() {
        let mut p = predicate();
        p.set_value(vec![1, 100]).set_operator(Operator::Between);
        let mut params = Vec::new();
        assert_eq!(p.build(&mut params).unwrap(), "\"foo\".\"bar\" BETWEEN ? AND ?");
        assert_eq!(params, vec![Value::Int(1), Value::Int(100)]);
    }

    #[test]
    fn test_between_arity() {
        let mut p = predicate();
        p.set_value([1, 2, 3]).set_operator(Operator::Between);
        assert!(matches!(p.convert(), Err(BuildError::InvalidPredicate(_))));

        p.set_value(1);
        assert!(matches!(p.convert(), Err(BuildError::InvalidPredicate(_))));
    }

    #[test]
    fn test_in_list() {
        let mut p = predicate();
        p.set_value([1, 2, 3, 4]).set_operator(Operator::In);
        let mut params = Vec::new();
        assert_eq!(p.build(&mut params).unwrap(), "\"foo\".\"bar\" IN (?,?,?,?)");
        assert_eq!(params, (1..=4).map(Value::Int).collect::<Vec<_>>());

        p.set_operator(Operator::NotIn);
        assert_eq!(p.convert().unwrap(), "\"foo\".\"bar\" NOT IN (?,?,?,?)");
    }

    #[test]
    fn test_in_requires_list() {
        let mut p = predicate();
        p.set_value(1).set_operator(Operator::In);
        assert!(matches!(p.convert(), Err(BuildError::InvalidPredicate(_))));

        p.set_value(Vec::<i64>::new());
        assert!(matches!(p.convert(), Err(BuildError::InvalidPredicate(_))));
    }

    #[test]
    fn test_scalar_operator_rejects_list() {
        let mut p = predicate();
        p.set_value([1, 2]).set_operator(Operator::Greater);
        assert!(p.convert().is_err());
    }

    #[test]
    fn test_column_value_is_not_bound() {
        let mut p = Predicate::new("\"a\".\"id\"");
        p.set_operator(Operator::Equal)
            .set_value(PredicateValue::Column("\"b\".\"id\"".into()));
        let mut params = Vec::new();
        assert_eq!(p.build(&mut params).unwrap(), "\"a\".\"id\" = \"b\".\"id\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_subquery_params_spliced() {
        let sub = Statement::new("SELECT id FROM t WHERE x = ?", vec![Value::Int(3)]);
        let mut p = predicate();
        p.set_operator(Operator::In).set_value(sub);
        let mut params = vec![Value::from("before")];
        assert_eq!(
            p.build(&mut params).unwrap(),
            "\"foo\".\"bar\" IN (SELECT id FROM t WHERE x = ?)"
        );
        assert_eq!(params, vec![Value::from("before"), Value::Int(3)]);
    }

    #[test]
    fn test_placeholder_count_matches_params() {
        for value in [Value::Int(1), Value::from("x"), Value::Float(1.5), Value::Bool(false)] {
            let mut p = predicate();
            p.set_operator(Operator::Equal).set_value(value);
            let sql = p.convert().unwrap();
            assert_eq!(sql.matches('?').count(), 1);
            assert_eq!(sql.matches('?').count(), p.params().len());
        }
    }

    #[test]
    fn test_operator_from_str() {
        assert_eq!("not  in".parse::<Operator>().unwrap(), Operator::NotIn);
        assert_eq!("is not null".parse::<Operator>().unwrap(), Operator::IsNotNull);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::Diff);
        assert!("~~".parse::<Operator>().is_err());
    }
}
