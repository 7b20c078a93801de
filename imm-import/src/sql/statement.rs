//! Parameterized statements and the builders that assemble them

use super::SqlDialect;
use crate::value::Value;

/// SQL text with `?` placeholders plus the values bound to them, in order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a bound parameter
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Render the statement with its parameters inlined as literals
    ///
    /// Used for script output and log lines, never for execution.
    pub fn render(&self, dialect: SqlDialect) -> String {
        let mut out = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut params = self.params.iter();
        let mut in_quote = false;

        for ch in self.sql.chars() {
            match ch {
                '\'' => {
                    in_quote = !in_quote;
                    out.push(ch);
                }
                '?' if !in_quote => match params.next() {
                    Some(value) => out.push_str(&literal(value, dialect)),
                    None => out.push(ch),
                },
                _ => out.push(ch),
            }
        }

        out
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render(SqlDialect::Mssql))
    }
}

/// Format a value as an SQL literal
///
/// Strings are single-quoted with embedded quotes doubled; line breaks are
/// joined with the dialect's concatenation idiom; dates use `YYYY-MM-DD`.
/// Non-finite floats render as `NULL`.
pub fn literal(value: &Value, dialect: SqlDialect) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        // NaN and infinities have no SQL literal
        Value::Float(_) => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
        Value::String(s) => {
            let normalized = s.replace("\r\n", "\n").replace('\r', "\n");
            normalized
                .split('\n')
                .map(|line| format!("'{}'", line.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(dialect.newline_concat())
        }
    }
}

/// Builder for `INSERT INTO table (cols) VALUES (?, ...)`
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl InsertBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Set a column value, replacing any earlier value for the same column
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.columns.iter().position(|c| c == column) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.columns.push(column.to_string());
                self.values.push(value);
            }
        }
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn build(&self) -> Statement {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                self.columns.join(", "),
                placeholders
            ),
            params: self.values.clone(),
        }
    }
}

/// Builder for `UPDATE table SET col = ?, ... WHERE key = ?`
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: String,
    assignments: Vec<(String, Value)>,
    key: (String, Value),
}

impl UpdateBuilder {
    pub fn new(table: impl Into<String>, key_column: &str, key: impl Into<Value>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            key: (key_column.to_string(), key.into()),
        }
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.assignments.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => self.assignments.push((column.to_string(), value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn build(&self) -> Statement {
        let sets = self
            .assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<Value> = self.assignments.iter().map(|(_, v)| v.clone()).collect();
        params.push(self.key.1.clone());

        Statement {
            sql: format!("UPDATE {} SET {} WHERE {} = ?", self.table, sets, self.key.0),
            params,
        }
    }
}
