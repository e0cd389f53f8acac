//! Conditions of masking exceptions.

use super::expr::{self, AND};

const INSTANCE_ID: &str = "resource.instance_id";
const DATABASE_NAME: &str = "resource.database_name";
const SCHEMA_NAME: &str = "resource.schema_name";
const TABLE_NAME: &str = "resource.table_name";
const COLUMN_NAME: &str = "resource.column_name";

/// The column a masking exception applies to, plus an optional expiration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionCondition {
    /// Instance id (not the full instance name).
    pub instance_id: Option<String>,
    /// Database name within the instance.
    pub database_name: Option<String>,
    /// Schema name.
    pub schema_name: Option<String>,
    /// Table name.
    pub table_name: Option<String>,
    /// Column name.
    pub column_name: Option<String>,
    /// RFC 3339 expiration.
    pub expire_timestamp: Option<String>,
}

impl ExceptionCondition {
    /// Compile to the server's expression language.
    pub fn compile(&self) -> String {
        let mut clauses = Vec::new();
        let fields = [
            (INSTANCE_ID, &self.instance_id),
            (DATABASE_NAME, &self.database_name),
            (SCHEMA_NAME, &self.schema_name),
            (TABLE_NAME, &self.table_name),
            (COLUMN_NAME, &self.column_name),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                clauses.push(format!("{} == {}", field, expr::quote(value)));
            }
        }
        if let Some(expire) = &self.expire_timestamp {
            clauses.push(expr::expiration(expire));
        }
        clauses.join(AND)
    }

    /// Decompile. Unrecognised clauses are dropped.
    pub fn parse(expression: &str) -> Self {
        let mut condition = Self::default();
        for clause in expr::split_conjunction(expression) {
            if let Some(v) = expr::match_equals(clause, INSTANCE_ID) {
                condition.instance_id = Some(v);
            } else if let Some(v) = expr::match_equals(clause, DATABASE_NAME) {
                condition.database_name = Some(v);
            } else if let Some(v) = expr::match_equals(clause, SCHEMA_NAME) {
                condition.schema_name = Some(v);
            } else if let Some(v) = expr::match_equals(clause, TABLE_NAME) {
                condition.table_name = Some(v);
            } else if let Some(v) = expr::match_equals(clause, COLUMN_NAME) {
                condition.column_name = Some(v);
            } else if let Some(v) = expr::match_expiration(clause) {
                condition.expire_timestamp = Some(v);
            } else {
                tracing::debug!(clause, "ignoring unrecognized masking exception clause");
            }
        }
        condition
    }
}
