//! Set element identity.
//!
//! Hosts diff `set` blocks by element hash. Hashes are sha256 over the
//! semantic fields of an element, rendered in a declared order and
//! separated by `-`, so they stay stable across process restarts.
//! Server-computed attributes never take part.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::filter::expr::{split_conjunction, AND};
use crate::schema::{Block, BlockNestingMode, SetIdentity};

/// Hex sha256 of a string. Also used for password state.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Hash rendered field values in order.
pub fn hash_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_ref().as_bytes());
        hasher.update(b"-");
    }
    hex::encode(hasher.finalize())
}

/// Identity of one IAM binding: role, sorted members and the canonical
/// condition expression.
pub fn iam_binding_hash(role: &str, members: &[String], condition: &str) -> String {
    let mut sorted: Vec<&str> = members.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let members = sorted.join(",");
    let condition = canonical_expression(condition);
    hash_fields(&[role, members.as_str(), condition.as_str()])
}

/// Normalise spacing around `&&` so equivalent conjunctions compare equal.
pub fn canonical_expression(expression: &str) -> String {
    split_conjunction(expression).join(AND)
}

/// Hash one element of a set-nested block.
///
/// Without a declared identity every user-controllable attribute of the
/// block takes part, in name order.
pub fn element_hash(identity: Option<&SetIdentity>, block: &Block, element: &Value) -> String {
    match identity {
        Some(SetIdentity::Fields(fields)) => {
            let rendered: Vec<String> = fields.iter().map(|f| render(element.get(f))).collect();
            hash_fields(&rendered)
        },
        Some(SetIdentity::IamBinding) => {
            let role = element.get("role").and_then(Value::as_str).unwrap_or_default();
            let members = string_items(element.get("members"));
            let condition = super::condition_expression(element);
            iam_binding_hash(role, &members, &condition)
        },
        None => {
            let mut rendered = Vec::new();
            for (name, attr) in &block.attributes {
                if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
                    continue;
                }
                rendered.push(render(element.get(name)));
            }
            for (name, nested) in &block.blocks {
                let value = element.get(name).unwrap_or(&Value::Null);
                rendered.push(match value {
                    Value::Array(items) if nested.nesting_mode == BlockNestingMode::Set => {
                        let mut hashes: Vec<String> = items
                            .iter()
                            .map(|item| element_hash(nested.identity.as_ref(), &nested.block, item))
                            .collect();
                        hashes.sort_unstable();
                        hashes.join(",")
                    },
                    other => render(Some(other)),
                });
            }
            hash_fields(&rendered)
        },
    }
}

fn string_items(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Render a leaf for hashing. Null and absent render as the empty string;
/// arrays render sorted so primitive sets hash independently of order.
fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Array(items)) => {
            let mut parts: Vec<String> = items.iter().map(|v| render(Some(v))).collect();
            parts.sort_unstable();
            parts.join(",")
        },
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }

    #[test]
    fn test_field_identity_ignores_other_fields() {
        let identity = SetIdentity::fields(&["id", "type"]);
        let block = Block::new();
        let a = json!({"id": "admin", "type": "ADMIN", "password": "x"});
        let b = json!({"id": "admin", "type": "ADMIN", "password": "y"});
        let c = json!({"id": "ro", "type": "READ_ONLY"});
        assert_eq!(
            element_hash(Some(&identity), &block, &a),
            element_hash(Some(&identity), &block, &b)
        );
        assert_ne!(
            element_hash(Some(&identity), &block, &a),
            element_hash(Some(&identity), &block, &c)
        );
    }

    #[test]
    fn test_default_identity_skips_computed() {
        let block = Block::new()
            .with_attribute("member", Attribute::required_string())
            .with_attribute("source", Attribute::computed_string());
        let a = json!({"member": "users/a@x.com", "source": "LDAP"});
        let b = json!({"member": "users/a@x.com"});
        assert_eq!(element_hash(None, &block, &a), element_hash(None, &block, &b));
    }

    #[test]
    fn test_iam_binding_hash_is_order_independent() {
        let a = iam_binding_hash(
            "roles/dba",
            &["users/b@x.com".to_string(), "users/a@x.com".to_string()],
            "resource.database == \"d\"&&request.row_limit <= 5",
        );
        let b = iam_binding_hash(
            "roles/dba",
            &["users/a@x.com".to_string(), "users/b@x.com".to_string()],
            "resource.database == \"d\" && request.row_limit <= 5",
        );
        assert_eq!(a, b);

        let c = iam_binding_hash("roles/dba", &["users/a@x.com".to_string()], "");
        assert_ne!(a, c);
    }

    #[test]
    fn test_primitive_arrays_hash_sorted() {
        assert_eq!(render(Some(&json!(["b", "a"]))), "a,b");
        assert_eq!(render(Some(&json!(5))), "5");
        assert_eq!(render(None), "");
    }
}
