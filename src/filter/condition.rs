//! IAM binding conditions.
//!
//! A structured condition compiles to a conjunction in canonical clause
//! order: database, schema, tables, row limit, expiration. Parsing is
//! prefix matching on each clause, so only expressions in that shape are
//! recovered exactly; anything else is kept aside in
//! [`ParsedCondition::unrecognized`].

use serde::{Deserialize, Serialize};

use super::expr::{self, AND};

const DATABASE: &str = "resource.database";
const SCHEMA: &str = "resource.schema";
const TABLE: &str = "resource.table";
const ROW_LIMIT: &str = "request.row_limit";

/// The structured form of an IAM binding condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamCondition {
    /// Full database name, `instances/{i}/databases/{d}`.
    pub database: Option<String>,
    /// Schema name within the database.
    pub schema: Option<String>,
    /// Table names.
    pub tables: Vec<String>,
    /// Maximum number of rows a query may return.
    pub row_limit: Option<i64>,
    /// RFC 3339 timestamp after which the binding no longer applies.
    pub expire_timestamp: Option<String>,
}

impl IamCondition {
    /// True when no clause is set.
    pub fn is_empty(&self) -> bool {
        self.database.is_none()
            && self.schema.is_none()
            && self.tables.is_empty()
            && self.row_limit.is_none()
            && self.expire_timestamp.is_none()
    }

    /// Compile to the server's expression language.
    pub fn compile(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(database) = &self.database {
            clauses.push(format!("{} == {}", DATABASE, expr::quote(database)));
        }
        if let Some(schema) = &self.schema {
            clauses.push(format!("{} == {}", SCHEMA, expr::quote(schema)));
        }
        if !self.tables.is_empty() {
            clauses.push(format!("{} in {}", TABLE, expr::string_list(&self.tables, ",")));
        }
        if let Some(limit) = self.row_limit {
            clauses.push(format!("{} <= {}", ROW_LIMIT, limit));
        }
        if let Some(expire) = &self.expire_timestamp {
            clauses.push(expr::expiration(expire));
        }
        clauses.join(AND)
    }
}

/// Result of decompiling an expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCondition {
    /// The clauses that were recognised.
    pub condition: IamCondition,
    /// Clauses that did not match any known shape, in source order.
    pub unrecognized: Vec<String>,
}

impl ParsedCondition {
    /// True when every clause of the source expression was recognised.
    pub fn is_exact(&self) -> bool {
        self.unrecognized.is_empty()
    }
}

/// Decompile an expression produced by [`IamCondition::compile`] (or by the server).
pub fn parse(expression: &str) -> ParsedCondition {
    let mut parsed = ParsedCondition::default();
    for clause in expr::split_conjunction(expression) {
        let condition = &mut parsed.condition;
        if let Some(database) = expr::match_equals(clause, DATABASE) {
            condition.database = Some(database);
        } else if let Some(schema) = expr::match_equals(clause, SCHEMA) {
            condition.schema = Some(schema);
        } else if let Some(tables) = expr::match_in(clause, TABLE) {
            condition.tables = tables;
        } else if let Some(limit) = match_row_limit(clause) {
            condition.row_limit = Some(limit);
        } else if let Some(expire) = expr::match_expiration(clause) {
            condition.expire_timestamp = Some(expire);
        } else {
            parsed.unrecognized.push(clause.to_string());
        }
    }
    parsed
}

fn match_row_limit(clause: &str) -> Option<i64> {
    let rest = clause.strip_prefix(ROW_LIMIT)?.trim_start();
    rest.strip_prefix("<=")?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> IamCondition {
        IamCondition {
            database: Some("instances/i/databases/d".to_string()),
            schema: None,
            tables: vec!["t1".to_string(), "t2".to_string()],
            row_limit: Some(100),
            expire_timestamp: Some("2030-01-02T03:04:05Z".to_string()),
        }
    }

    #[test]
    fn test_compile_canonical_order() {
        assert_eq!(
            full().compile(),
            "resource.database == \"instances/i/databases/d\" && resource.table in [\"t1\",\"t2\"] && request.row_limit <= 100 && request.time < timestamp(\"2030-01-02T03:04:05Z\")"
        );
    }

    #[test]
    fn test_round_trip() {
        let condition = full();
        let parsed = parse(&condition.compile());
        assert!(parsed.is_exact());
        assert_eq!(parsed.condition, condition);
    }

    #[test]
    fn test_schema_round_trip() {
        let condition = IamCondition {
            database: Some("instances/i/databases/d".to_string()),
            schema: Some("public".to_string()),
            ..Default::default()
        };
        assert_eq!(parse(&condition.compile()).condition, condition);
    }

    #[test]
    fn test_empty() {
        assert_eq!(IamCondition::default().compile(), "");
        let parsed = parse("");
        assert!(parsed.condition.is_empty());
        assert!(parsed.is_exact());
    }

    #[test]
    fn test_unrecognized_clauses_are_kept_aside() {
        let parsed = parse(
            "resource.database == \"instances/i/databases/d\" && resource.environment_id == \"prod\"",
        );
        assert_eq!(
            parsed.condition.database.as_deref(),
            Some("instances/i/databases/d")
        );
        assert_eq!(parsed.unrecognized, vec!["resource.environment_id == \"prod\""]);
        assert!(!parsed.is_exact());
    }

    #[test]
    fn test_parse_tolerates_spacing() {
        let parsed = parse("request.row_limit<=5&&resource.table in [ \"a\" ]");
        assert_eq!(parsed.condition.row_limit, Some(5));
        assert_eq!(parsed.condition.tables, vec!["a"]);
    }
}
