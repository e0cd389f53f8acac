//! Attribute tree validation.
//!
//! Checks a `serde_json::Value` against a [`Schema`] before any API call is
//! made: presence of required attributes, value types, nested block
//! cardinality and every [`Validator`] declared on an attribute.
//!
//! # Example
//!
//! ```
//! use terraform_provider_bytebase::schema::{Attribute, Schema, Validator};
//! use terraform_provider_bytebase::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute(
//!         "resource_id",
//!         Attribute::required_string().with_validator(Validator::ResourceId),
//!     )
//!     .with_attribute("title", Attribute::optional_string());
//!
//! assert!(validate(&schema, &json!({"resource_id": "acme", "title": "Acme"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"resource_id": "Acme"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("resource_id".to_string()));
//! ```

use serde_json::Value;

use crate::names;
use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, NestedBlock,
    Schema, Validator,
};

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - Declared validators run against every present string or integer,
///   and against each element of string lists and sets
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            // Only run validators against well-typed values.
            if diagnostics.len() == before {
                run_validators(&attr.validators, v, path, diagnostics);
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                diagnostics.push(type_error(path, expected, value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
    }
}

fn run_validators(
    validators: &[Validator],
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if validators.is_empty() {
        return;
    }
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                run_validators(validators, item, &item_path, diagnostics);
            }
        },
        Value::String(s) => {
            for validator in validators {
                if let Err(detail) = check_string(validator, s) {
                    diagnostics.push(invalid_value(path, detail));
                }
            }
        },
        Value::Number(n) => {
            let Some(n) = n.as_i64() else { return };
            for validator in validators {
                if let Validator::IntRange(min, max) = validator {
                    if n < *min || n > *max {
                        diagnostics.push(invalid_value(
                            path,
                            format!("expected a value between {} and {}, got {}", min, max, n),
                        ));
                    }
                }
            }
        },
        _ => {},
    }
}

fn check_string(validator: &Validator, value: &str) -> Result<(), String> {
    match validator {
        Validator::ResourceId => names::validate_resource_id(value).map_err(|e| e.message().to_string()),
        Validator::NonEmpty => {
            if value.is_empty() {
                Err("value must not be empty".to_string())
            } else {
                Ok(())
            }
        },
        Validator::OneOf(allowed) => {
            if allowed.iter().any(|a| a == value) {
                Ok(())
            } else {
                Err(format!("expected one of {:?}, got {:?}", allowed, value))
            }
        },
        Validator::Prefix(prefix) => {
            if value.starts_with(prefix.as_str()) {
                Ok(())
            } else {
                Err(format!("{:?} must start with {:?}", value, prefix))
            }
        },
        Validator::NamePattern(patterns) => {
            names::validate_name_patterns(value, patterns).map_err(|e| e.message().to_string())
        },
        Validator::Rfc3339 => chrono::DateTime::parse_from_rfc3339(value)
            .map(|_| ())
            .map_err(|e| format!("{:?} is not an RFC 3339 timestamp: {}", value, e)),
        Validator::IntRange(..) => Ok(()),
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match nested.nesting_mode {
        BlockNestingMode::Single => validate_single_block(nested, value, path, diagnostics),
        BlockNestingMode::List | BlockNestingMode::Set => {
            validate_list_block(nested, value, path, diagnostics)
        },
    }
}

fn validate_single_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required block '{}'", path))
                        .with_detail("At least one block is required")
                        .with_attribute(path),
                );
            }
        },
        // Hosts encode single blocks as a one-element list as often as a bare object.
        Some(Value::Array(arr)) if arr.len() <= 1 => {
            if let Some(item) = arr.first() {
                validate_block(&nested.block, item, path, diagnostics);
            }
        },
        Some(v) => validate_block(&nested.block, v, path, diagnostics),
    }
}

fn validate_list_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        Some(Value::Array(arr)) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

fn invalid_value(path: &str, detail: String) -> Diagnostic {
    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
        .with_detail(detail)
        .with_attribute(path)
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("title", Attribute::required_string());

        assert!(validate(&schema, &json!({"title": "Acme"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("title".to_string()));

        assert_eq!(validate(&schema, &json!({"title": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"title": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("port", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"port": 5432})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"port": null})).is_empty());
        assert_eq!(validate(&schema, &json!({"port": "5432"})).len(), 1);
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("name", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"name": 123})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("row_limit", Attribute::required_int64());

        assert!(validate(&schema, &json!({"row_limit": 42})).is_empty());
        assert!(validate(&schema, &json!({"row_limit": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"row_limit": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"row_limit": "42"})).len(), 1);
    }

    #[test]
    fn test_validate_list_element_paths() {
        let schema = Schema::v0().with_attribute(
            "tables",
            Attribute::string_list(AttributeFlags::required()),
        );

        assert!(validate(&schema, &json!({"tables": ["a", "b"]})).is_empty());
        assert!(validate(&schema, &json!({"tables": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"tables": ["a", 123, "c"]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tables.1".to_string()));

        assert_eq!(validate(&schema, &json!({"tables": "a"})).len(), 1);
    }

    #[test]
    fn test_validate_map() {
        let schema = Schema::v0().with_attribute(
            "labels",
            Attribute::new(
                AttributeType::map(AttributeType::String),
                AttributeFlags::optional(),
            ),
        );

        assert!(validate(&schema, &json!({"labels": {"env": "prod"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"labels": {"env": "prod", "tier": 1}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("labels.tier".to_string()));
    }

    #[test]
    fn test_validate_nested_block_list() {
        let schema = Schema::v0().with_block(
            "steps",
            NestedBlock::list(Block::new().with_attribute("role", Attribute::required_string()))
                .with_min_items(1)
                .with_max_items(3),
        );

        assert!(validate(&schema, &json!({"steps": [{"role": "roles/dba"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({"steps": []}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(
            &schema,
            &json!({"steps": [{"role": "a"}, {"role": "b"}, {"role": "c"}, {"role": "d"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 3"));

        let diagnostics = validate(&schema, &json!({"steps": [{"role": 1}]}));
        assert_eq!(diagnostics[0].attribute, Some("steps.0.role".to_string()));
    }

    #[test]
    fn test_validate_single_block_accepts_one_element_list() {
        let schema = Schema::v0().with_block(
            "condition",
            NestedBlock::single(Block::new().with_attribute("row_limit", Attribute::optional_int64())),
        );

        assert!(validate(&schema, &json!({"condition": {"row_limit": 1}})).is_empty());
        assert!(validate(&schema, &json!({"condition": [{"row_limit": 1}]})).is_empty());

        let diagnostics = validate(&schema, &json!({"condition": [{"row_limit": "x"}]}));
        assert_eq!(diagnostics[0].attribute, Some("condition.row_limit".to_string()));
    }

    #[test]
    fn test_validators_on_strings() {
        let schema = Schema::v0()
            .with_attribute(
                "resource_id",
                Attribute::required_string().with_validator(Validator::ResourceId),
            )
            .with_attribute(
                "workflow",
                Attribute::optional_string().with_validator(Validator::one_of(&["UI", "VCS"])),
            )
            .with_attribute(
                "expire_timestamp",
                Attribute::optional_string().with_validator(Validator::Rfc3339),
            );

        assert!(validate(
            &schema,
            &json!({"resource_id": "acme", "workflow": "UI", "expire_timestamp": "2030-01-02T03:04:05Z"})
        )
        .is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"resource_id": "Acme", "workflow": "GIT", "expire_timestamp": "tomorrow"}),
        );
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics.iter().all(|d| d.summary.contains("Invalid value")));
    }

    #[test]
    fn test_prefix_validator_on_set_elements() {
        let schema = Schema::v0().with_attribute(
            "permissions",
            Attribute::string_set(AttributeFlags::required())
                .with_validator(Validator::Prefix("bb.".to_string())),
        );

        let diagnostics = validate(&schema, &json!({"permissions": ["bb.issue.create", "oops"]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("permissions.1".to_string()));
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("bb."));
    }

    #[test]
    fn test_int_range_validator() {
        let schema = Schema::v0().with_attribute(
            "level",
            Attribute::required_int64().with_validator(Validator::IntRange(0, 3)),
        );
        assert!(is_valid(&schema, &json!({"level": 2})));
        assert!(!is_valid(&schema, &json!({"level": 4})));
    }

    #[test]
    fn test_validators_skip_wrongly_typed_values() {
        let schema = Schema::v0().with_attribute(
            "resource_id",
            Attribute::required_string().with_validator(Validator::ResourceId),
        );
        assert_eq!(validate(&schema, &json!({"resource_id": 5})).len(), 1);
    }

    #[test]
    fn test_validate_result_helper() {
        let schema = Schema::v0().with_attribute("title", Attribute::required_string());

        assert!(validate_result(&schema, &json!({"title": "Acme"})).is_ok());
        let result = validate_result(&schema, &json!({}));
        assert_eq!(result.unwrap_err().len(), 1);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = Schema::v0().with_attribute("title", Attribute::required_string());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
