//! SQL identifier quoting.
//!
//! Every table and column name that the builder emits is wrapped in a single
//! configurable [`Delimiter`]. An embedded delimiter character is escaped by
//! doubling it (`"a""b"`), so any name survives quoting.
//!
//! [`Scope`] captures a table and the delimiter in effect at the time it was
//! created. Predicates qualify their columns through the scope they were added
//! in, which is why changing the delimiter later does not re-quote fragments
//! that already exist.

use serde::Deserialize;

/// Identifier quoting character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Delimiter {
    /// `"name"`: ANSI / PostgreSQL / SQLite.
    #[default]
    #[serde(rename = "\"")]
    DoubleQuote,
    /// `` `name` ``: MySQL.
    #[serde(rename = "`")]
    Backtick,
    /// Identifiers are emitted verbatim.
    #[serde(skip)]
    None,
}

impl Delimiter {
    /// The quoting character, if any.
    pub fn as_char(self) -> Option<char> {
        match self {
            Delimiter::DoubleQuote => Some('"'),
            Delimiter::Backtick => Some('`'),
            Delimiter::None => None,
        }
    }

    /// Parse from the configured character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '"' => Some(Delimiter::DoubleQuote),
            '`' => Some(Delimiter::Backtick),
            _ => None,
        }
    }

    /// Quote a single identifier.
    pub fn quote(self, name: &str) -> String {
        let Some(d) = self.as_char() else {
            return name.to_string();
        };
        let mut out = String::with_capacity(name.len() + 2);
        out.push(d);
        for c in name.chars() {
            if c == d {
                out.push(d);
            }
            out.push(c);
        }
        out.push(d);
        out
    }

    /// Quote `table.column`.
    pub fn qualify(self, table: &str, column: &str) -> String {
        format!("{}.{}", self.quote(table), self.quote(column))
    }
}

/// A table plus the delimiter that was active when it was captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    table: Option<String>,
    delim: Delimiter,
}

impl Scope {
    /// A scope without a table; columns are only quoted.
    pub fn bare(delim: Delimiter) -> Self {
        Self { table: None, delim }
    }

    /// A scope that qualifies columns with `table`.
    pub fn table(table: impl Into<String>, delim: Delimiter) -> Self {
        Self {
            table: Some(table.into()),
            delim,
        }
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delim
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Quoted table name, if the scope has one.
    pub fn quoted_table(&self) -> Option<String> {
        self.table.as_deref().map(|t| self.delim.quote(t))
    }

    /// Render a column reference in this scope.
    pub fn column(&self, column: &str) -> String {
        match &self.table {
            Some(table) => self.delim.qualify(table, column),
            None => self.delim.quote(column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(Delimiter::DoubleQuote.quote("users"), "\"users\"");
        assert_eq!(Delimiter::Backtick.quote("users"), "`users`");
        assert_eq!(Delimiter::None.quote("users"), "users");
    }

    #[test]
    fn test_quote_escapes_delimiter() {
        assert_eq!(Delimiter::DoubleQuote.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(Delimiter::Backtick.quote("a`b"), "`a``b`");
        // The other delimiter is left alone.
        assert_eq!(Delimiter::Backtick.quote("a\"b"), "`a\"b`");
    }

    #[test]
    fn test_scope_column() {
        let scope = Scope::table("foos", Delimiter::DoubleQuote);
        assert_eq!(scope.column("bar"), "\"foos\".\"bar\"");
        assert_eq!(scope.quoted_table().as_deref(), Some("\"foos\""));

        let bare = Scope::bare(Delimiter::None);
        assert_eq!(bare.column("bar"), "bar");
        assert_eq!(bare.quoted_table(), None);
    }

    #[test]
    fn test_from_char() {
        assert_eq!(Delimiter::from_char('`'), Some(Delimiter::Backtick));
        assert_eq!(Delimiter::from_char('\''), None);
    }
}
