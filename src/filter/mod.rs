//! Filter compiler.
//!
//! List requests accept a `filter` string in the server's CEL-shaped
//! expression language. [`Filter`] is the typed form; [`Filter::compile`]
//! emits one clause per populated field, in declaration order, joined with
//! ` && `, so the wire form is deterministic.
//!
//! ```
//! use terraform_provider_bytebase::filter::{Filter, Label};
//!
//! let filter = Filter {
//!     project: Some("projects/p".to_string()),
//!     engines: vec!["POSTGRES".to_string(), "MYSQL".to_string()],
//!     labels: vec![Label::new("env", "prod"), Label::new("env", "stg")],
//!     ..Default::default()
//! };
//! assert_eq!(
//!     filter.compile(),
//!     r#"project == "projects/p" && engine in ["POSTGRES", "MYSQL"] && label == "env:prod,stg""#
//! );
//! ```

pub mod condition;
pub mod expr;
pub mod masking;

use serde::{Deserialize, Serialize};

use self::expr::{quote, string_list, AND};

/// Fields matched by a free-text query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryFields {
    /// `name.matches(q)`
    #[default]
    Name,
    /// `(title.matches(q) || email.matches(q))`, used by groups.
    TitleOrEmail,
    /// `(name.matches(q) || email.matches(q))`, used by users.
    NameOrEmail,
}

/// Lifecycle state used in list filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateFilter {
    /// Only live resources (server default).
    #[default]
    Active,
    /// Only soft-deleted resources.
    Deleted,
}

impl StateFilter {
    /// Parse the attribute value, accepting an empty string as `Active`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "ACTIVE" => Some(Self::Active),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One `key:value` label constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label key.
    pub key: String,
    /// Label value.
    pub value: String,
}

impl Label {
    /// Create a label constraint.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Typed list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Free-text query, matched case-insensitively.
    pub query: Option<String>,
    /// Which fields `query` is matched against.
    pub query_fields: QueryFields,
    /// Project name.
    pub project: Option<String>,
    /// Environment name.
    pub environment: Option<String>,
    /// Instance name.
    pub instance: Option<String>,
    /// Database engines.
    pub engines: Vec<String>,
    /// Label constraints; values sharing a key are OR-ed by the server.
    pub labels: Vec<Label>,
    /// Skip databases not assigned to any project.
    pub exclude_unassigned: bool,
    /// Lifecycle state.
    pub state: StateFilter,
    /// User types (`USER`, `SERVICE_ACCOUNT`, ...).
    pub user_types: Vec<String>,
}

impl Filter {
    /// Compile to the server's expression language. Empty filters compile to
    /// the empty string.
    pub fn compile(&self) -> String {
        let mut clauses = Vec::new();

        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            let q = quote(&query.to_lowercase());
            clauses.push(match self.query_fields {
                QueryFields::Name => format!("name.matches({})", q),
                QueryFields::TitleOrEmail => {
                    format!("(title.matches({}) || email.matches({}))", q, q)
                },
                QueryFields::NameOrEmail => {
                    format!("(name.matches({}) || email.matches({}))", q, q)
                },
            });
        }
        for (field, value) in [
            ("project", &self.project),
            ("environment", &self.environment),
            ("instance", &self.instance),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                clauses.push(format!("{} == {}", field, quote(value)));
            }
        }
        if !self.engines.is_empty() {
            clauses.push(format!("engine in {}", string_list(&self.engines, ", ")));
        }
        for (key, values) in group_labels(&self.labels) {
            clauses.push(format!(
                "label == {}",
                quote(&format!("{}:{}", key, values.join(",")))
            ));
        }
        if self.exclude_unassigned {
            clauses.push("exclude_unassigned == true".to_string());
        }
        if self.state == StateFilter::Deleted {
            clauses.push(format!("state == {}", quote("DELETED")));
        }
        if !self.user_types.is_empty() {
            clauses.push(format!("user_type in {}", string_list(&self.user_types, ", ")));
        }

        clauses.join(AND)
    }

    /// Whether the list request must ask for soft-deleted resources.
    pub fn show_deleted(&self) -> bool {
        self.state == StateFilter::Deleted
    }
}

/// Group label values by key, keeping first-seen key order and dropping
/// duplicate values.
fn group_labels(labels: &[Label]) -> Vec<(&str, Vec<&str>)> {
    let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
    for label in labels {
        match grouped.iter_mut().find(|(key, _)| *key == label.key) {
            Some((_, values)) => {
                if !values.contains(&label.value.as_str()) {
                    values.push(&label.value);
                }
            },
            None => grouped.push((&label.key, vec![&label.value])),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter() {
        assert_eq!(Filter::default().compile(), "");
        assert!(!Filter::default().show_deleted());
    }

    #[test]
    fn test_database_filter() {
        let filter = Filter {
            project: Some("projects/p".to_string()),
            engines: vec!["POSTGRES".to_string(), "MYSQL".to_string()],
            labels: vec![Label::new("env", "prod"), Label::new("env", "stg")],
            ..Default::default()
        };
        assert_eq!(
            filter.compile(),
            "project == \"projects/p\" && engine in [\"POSTGRES\", \"MYSQL\"] && label == \"env:prod,stg\""
        );
    }

    #[test]
    fn test_query_is_lowercased() {
        let filter = Filter {
            query: Some("Acme".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.compile(), "name.matches(\"acme\")");

        let groups = Filter {
            query: Some("DBA".to_string()),
            query_fields: QueryFields::TitleOrEmail,
            ..Default::default()
        };
        assert_eq!(
            groups.compile(),
            "(title.matches(\"dba\") || email.matches(\"dba\"))"
        );
    }

    #[test]
    fn test_declaration_order() {
        let filter = Filter {
            user_types: vec!["SERVICE_ACCOUNT".to_string()],
            state: StateFilter::Deleted,
            exclude_unassigned: true,
            instance: Some("instances/i".to_string()),
            environment: Some("environments/prod".to_string()),
            query: Some("x".to_string()),
            ..Default::default()
        };
        assert_eq!(
            filter.compile(),
            "name.matches(\"x\") && environment == \"environments/prod\" && instance == \"instances/i\" && exclude_unassigned == true && state == \"DELETED\" && user_type in [\"SERVICE_ACCOUNT\"]"
        );
        assert!(filter.show_deleted());
    }

    #[test]
    fn test_labels_grouped_by_key() {
        let filter = Filter {
            labels: vec![
                Label::new("env", "prod"),
                Label::new("tier", "gold"),
                Label::new("env", "stg"),
                Label::new("env", "prod"),
            ],
            ..Default::default()
        };
        assert_eq!(
            filter.compile(),
            "label == \"env:prod,stg\" && label == \"tier:gold\""
        );
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let filter = Filter {
            query: Some(String::new()),
            project: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(filter.compile(), "");
    }

    #[test]
    fn test_state_filter_parse() {
        assert_eq!(StateFilter::parse(""), Some(StateFilter::Active));
        assert_eq!(StateFilter::parse("DELETED"), Some(StateFilter::Deleted));
        assert_eq!(StateFilter::parse("GONE"), None);
    }
}
