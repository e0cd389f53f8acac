//! Attribute tree ↔ protocol message mapping.
//!
//! Resources convert their own messages with small converters built from
//! the helpers here: typed field readers for nested block elements,
//! oneof selection, condition blocks and the zero-fill used by list
//! projections. Set identity lives in [`hash`], field masks in [`mask`].

pub mod hash;
pub mod mask;

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::api::setting::{
    FullMask, InnerOuterMask, MaskAlgorithm, Md5Mask, RangeMask, RangeSlice,
};
use crate::error::ProviderError;
use crate::filter::condition::{self, IamCondition};
use crate::schema::{AttributeType, Block, BlockNestingMode};

// =============================================================================
// Element readers
// =============================================================================

/// String field of a block element, empty when unset.
pub fn str_of(element: &Value, key: &str) -> String {
    element
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Integer field of a block element, accepting numeric strings.
pub fn i64_of(element: &Value, key: &str) -> Option<i64> {
    match element.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Boolean field of a block element, `false` when unset.
pub fn bool_of(element: &Value, key: &str) -> bool {
    element.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// String items of a list or set field.
pub fn str_list_of(element: &Value, key: &str) -> Vec<String> {
    element
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// String map field.
pub fn str_map_of(element: &Value, key: &str) -> BTreeMap<String, String> {
    element
        .get(key)
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// A single nested block, encoded as an object or a one-element list.
pub fn block_of<'a>(element: &'a Value, key: &str) -> Option<&'a Value> {
    match element.get(key)? {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

/// Elements of a list or set block.
pub fn blocks_of<'a>(element: &'a Value, key: &str) -> Vec<&'a Value> {
    match element.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v @ Value::Object(_)) => vec![v],
        _ => Vec::new(),
    }
}

/// Render a string map as an attribute value.
pub fn map_value(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Wrap a single nested block the way the host encodes it.
pub fn single_block(value: Value) -> Value {
    Value::Array(vec![value])
}

/// Render seconds as a protobuf JSON duration; zero and below are unset.
pub fn duration_string(seconds: i64) -> String {
    if seconds <= 0 {
        String::new()
    } else {
        format!("{}s", seconds)
    }
}

/// Whole seconds of a protobuf JSON duration such as `3600s` or `1.5s`.
pub fn duration_seconds(duration: &str) -> i64 {
    duration
        .strip_suffix('s')
        .and_then(|s| s.parse::<f64>().ok())
        .map(|s| s as i64)
        .unwrap_or_default()
}

// =============================================================================
// Oneof selection
// =============================================================================

/// Pick the one branch of a oneof block that is set.
///
/// Exactly one of `branches` must be present; anything else is an
/// `InvalidArgument` naming `what`.
pub fn one_of<'a>(
    what: &str,
    block: &'a Value,
    branches: &[&'static str],
) -> Result<(&'static str, &'a Value), ProviderError> {
    let present: Vec<(&'static str, &'a Value)> = branches
        .iter()
        .filter_map(|branch| block_of(block, branch).map(|value| (*branch, value)))
        .collect();
    match present.as_slice() {
        [only] => Ok(*only),
        [] => Err(ProviderError::invalid(format!(
            "{} requires exactly one of {:?}, none set",
            what, branches
        ))),
        _ => Err(ProviderError::invalid(format!(
            "{} requires exactly one of {:?}, got {:?}",
            what,
            branches,
            present.iter().map(|(b, _)| *b).collect::<Vec<_>>()
        ))),
    }
}

// =============================================================================
// Masking algorithms
// =============================================================================

/// Branches of the masking algorithm block.
pub const ALGORITHM_BRANCHES: [&str; 4] = ["full_mask", "range_mask", "md5_mask", "inner_outer_mask"];

/// Expand a masking algorithm block.
pub fn algorithm_from_block(block: &Value) -> Result<MaskAlgorithm, ProviderError> {
    let (branch, value) = one_of("algorithm", block, &ALGORITHM_BRANCHES)?;
    Ok(match branch {
        "full_mask" => MaskAlgorithm::FullMask(FullMask {
            substitution: str_of(value, "substitution"),
        }),
        "range_mask" => MaskAlgorithm::RangeMask(RangeMask {
            slices: blocks_of(value, "slices")
                .into_iter()
                .map(|slice| RangeSlice {
                    start: i64_of(slice, "start").unwrap_or_default(),
                    end: i64_of(slice, "end").unwrap_or_default(),
                    substitution: str_of(slice, "substitution"),
                })
                .collect(),
        }),
        "md5_mask" => MaskAlgorithm::Md5Mask(Md5Mask {
            salt: str_of(value, "salt"),
        }),
        _ => MaskAlgorithm::InnerOuterMask(InnerOuterMask {
            prefix_len: i64_of(value, "prefix_len").unwrap_or_default(),
            suffix_len: i64_of(value, "suffix_len").unwrap_or_default(),
            kind: str_of(value, "type"),
            substitution: str_of(value, "substitution"),
        }),
    })
}

/// Flatten a masking algorithm; only the present branch is populated.
pub fn algorithm_to_block(algorithm: &MaskAlgorithm) -> Value {
    let mut block = Map::new();
    let (branch, value) = match algorithm {
        MaskAlgorithm::FullMask(mask) => ("full_mask", json!({"substitution": mask.substitution})),
        MaskAlgorithm::RangeMask(mask) => (
            "range_mask",
            json!({
                "slices": mask.slices.iter().map(|s| json!({
                    "start": s.start,
                    "end": s.end,
                    "substitution": s.substitution,
                })).collect::<Vec<_>>()
            }),
        ),
        MaskAlgorithm::Md5Mask(mask) => ("md5_mask", json!({"salt": mask.salt})),
        MaskAlgorithm::InnerOuterMask(mask) => (
            "inner_outer_mask",
            json!({
                "prefix_len": mask.prefix_len,
                "suffix_len": mask.suffix_len,
                "type": mask.kind,
                "substitution": mask.substitution,
            }),
        ),
    };
    for name in ALGORITHM_BRANCHES {
        block.insert(name.to_string(), Value::Array(Vec::new()));
    }
    block.insert(branch.to_string(), single_block(value));
    Value::Object(block)
}

// =============================================================================
// IAM conditions
// =============================================================================

/// Structured condition of a binding element's `condition` block.
pub fn condition_from_block(block: Option<&Value>) -> IamCondition {
    let Some(block) = block else {
        return IamCondition::default();
    };
    let non_empty = |key: &str| Some(str_of(block, key)).filter(|s| !s.is_empty());
    IamCondition {
        database: non_empty("database"),
        schema: non_empty("schema"),
        tables: str_list_of(block, "tables"),
        // 0 is the block's zero value and means no limit; the state of an
        // unlimited condition carries 0.
        row_limit: i64_of(block, "row_limit").filter(|limit| *limit > 0),
        expire_timestamp: non_empty("expire_timestamp"),
    }
}

/// Condition block of a structured condition; `None` when empty.
pub fn condition_to_block(condition: &IamCondition) -> Option<Value> {
    if condition.is_empty() {
        return None;
    }
    Some(json!({
        "database": condition.database.clone().unwrap_or_default(),
        "schema": condition.schema.clone().unwrap_or_default(),
        "tables": condition.tables,
        "row_limit": condition.row_limit.unwrap_or_default(),
        "expire_timestamp": condition.expire_timestamp.clone().unwrap_or_default(),
    }))
}

/// Compiled condition of a binding element.
///
/// The structured block is authoritative. `raw_expression` only carries
/// clauses the structured block cannot express and never takes part.
pub fn condition_expression(element: &Value) -> String {
    condition_from_block(block_of(element, "condition")).compile()
}

/// Expression to send for a binding element.
///
/// When the element still carries a server expression whose recognised
/// part equals the desired condition, the server expression is sent back
/// unchanged so unrecognised clauses survive the round trip.
pub fn binding_expression(element: &Value) -> String {
    let desired = condition_from_block(block_of(element, "condition"));
    let raw = str_of(element, "raw_expression");
    if !raw.is_empty() {
        let parsed = condition::parse(&raw);
        if !parsed.is_exact() && parsed.condition == desired {
            return raw;
        }
    }
    desired.compile()
}

// =============================================================================
// Projection
// =============================================================================

/// Zero value of an attribute type.
pub fn zero_value(attr_type: &AttributeType) -> Value {
    match attr_type {
        AttributeType::String => Value::String(String::new()),
        AttributeType::Int64 => json!(0),
        AttributeType::Bool => Value::Bool(false),
        AttributeType::List(_) | AttributeType::Set(_) => Value::Array(Vec::new()),
        AttributeType::Map(_) => Value::Object(Map::new()),
    }
}

/// Give every attribute declared by `block` a defined value, recursing
/// into nested block elements.
pub fn zero_fill(block: &Block, object: &mut Map<String, Value>) {
    for (name, attr) in &block.attributes {
        match object.get(name) {
            None | Some(Value::Null) => {
                object.insert(name.clone(), zero_value(&attr.attr_type));
            },
            _ => {},
        }
    }
    for (name, nested) in &block.blocks {
        let entry = object
            .entry(name.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(map) = item {
                        zero_fill(&nested.block, map);
                    }
                }
            },
            Value::Object(map) if nested.nesting_mode == BlockNestingMode::Single => {
                zero_fill(&nested.block, map);
            },
            other => *other = Value::Array(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, NestedBlock};

    #[test]
    fn test_one_of_requires_exactly_one() {
        let block = json!({"full_mask": [{"substitution": "*"}], "md5_mask": []});
        let (branch, value) = one_of("algorithm", &block, &ALGORITHM_BRANCHES).unwrap();
        assert_eq!(branch, "full_mask");
        assert_eq!(value["substitution"], "*");

        let none = json!({});
        assert!(one_of("algorithm", &none, &ALGORITHM_BRANCHES).is_err());

        let two = json!({"full_mask": {"substitution": "*"}, "md5_mask": {"salt": "s"}});
        let err = one_of("algorithm", &two, &ALGORITHM_BRANCHES).unwrap_err();
        assert!(err.message().contains("md5_mask"));
    }

    #[test]
    fn test_algorithm_round_trip() {
        let block = json!({
            "inner_outer_mask": [{"prefix_len": 2, "suffix_len": 3, "type": "INNER", "substitution": "#"}]
        });
        let algorithm = algorithm_from_block(&block).unwrap();
        assert_eq!(
            algorithm,
            MaskAlgorithm::InnerOuterMask(InnerOuterMask {
                prefix_len: 2,
                suffix_len: 3,
                kind: "INNER".to_string(),
                substitution: "#".to_string(),
            })
        );
        let flattened = algorithm_to_block(&algorithm);
        assert_eq!(flattened["full_mask"], json!([]));
        assert_eq!(flattened["inner_outer_mask"][0]["suffix_len"], 3);
        assert_eq!(algorithm_from_block(&flattened).unwrap(), algorithm);
    }

    #[test]
    fn test_condition_block_round_trip() {
        let element = json!({
            "role": "roles/sqlEditorUser",
            "members": ["users/a@x.com"],
            "condition": [{
                "database": "instances/i/databases/d",
                "tables": ["t1", "t2"],
                "row_limit": 100,
                "expire_timestamp": "2030-01-02T03:04:05Z"
            }]
        });
        let expression = condition_expression(&element);
        assert_eq!(
            expression,
            "resource.database == \"instances/i/databases/d\" && resource.table in [\"t1\",\"t2\"] && request.row_limit <= 100 && request.time < timestamp(\"2030-01-02T03:04:05Z\")"
        );
        let parsed = condition::parse(&expression).condition;
        let block = condition_to_block(&parsed).unwrap();
        assert_eq!(condition_from_block(Some(&block)), parsed);
        assert!(condition_to_block(&IamCondition::default()).is_none());
    }

    #[test]
    fn test_zero_row_limit_means_unlimited() {
        let element = json!({
            "condition": [{"database": "instances/i/databases/d", "row_limit": 0}]
        });
        let expression = condition_expression(&element);
        assert_eq!(expression, "resource.database == \"instances/i/databases/d\"");

        let block = condition_to_block(&condition::parse(&expression).condition).unwrap();
        assert_eq!(block["row_limit"], 0);
        assert_eq!(condition_from_block(Some(&block)).row_limit, None);
    }

    #[test]
    fn test_binding_expression_keeps_unrecognized_clauses() {
        let raw = "resource.database == \"instances/i/databases/d\" && resource.environment_id == \"prod\"";
        let element = json!({
            "condition": [{"database": "instances/i/databases/d"}],
            "raw_expression": raw
        });
        assert_eq!(binding_expression(&element), raw);

        let changed = json!({
            "condition": [{"database": "instances/i/databases/other"}],
            "raw_expression": raw
        });
        assert_eq!(
            binding_expression(&changed),
            "resource.database == \"instances/i/databases/other\""
        );
    }

    #[test]
    fn test_durations() {
        assert_eq!(duration_string(3600), "3600s");
        assert_eq!(duration_string(0), "");
        assert_eq!(duration_seconds("86400s"), 86400);
        assert_eq!(duration_seconds("1.5s"), 1);
        assert_eq!(duration_seconds(""), 0);
    }

    #[test]
    fn test_zero_fill() {
        let block = Block::new()
            .with_attribute("title", Attribute::computed_string())
            .with_attribute("port", Attribute::computed_int64())
            .with_attribute("labels", Attribute::string_map(AttributeFlags::computed()))
            .with_block(
                "data_sources",
                NestedBlock::list(Block::new().with_attribute("host", Attribute::computed_string())),
            );
        let mut object = Map::new();
        object.insert("title".to_string(), json!("Prod"));
        object.insert("data_sources".to_string(), json!([{}]));
        zero_fill(&block, &mut object);
        assert_eq!(
            Value::Object(object),
            json!({
                "title": "Prod",
                "port": 0,
                "labels": {},
                "data_sources": [{"host": ""}]
            })
        );
    }
}
