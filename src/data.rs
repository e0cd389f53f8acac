//! Resource data accessor.
//!
//! [`ResourceData`] is what a handler sees of one resource instance: the
//! prior state, the desired attribute tree and the state being written
//! back. Reads come from the desired tree; writes go to the output state.
//! Change detection follows the schema, so sets compare by element hash
//! and then attribute by attribute within matching elements, hashed
//! attributes compare by digest and optional+computed attributes
//! left unset never count as changed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::mapper::hash::{canonical_expression, element_hash, sha256_hex};
use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, DiffSuppress, NestedBlock, Schema,
};
use crate::types::AttributeChange;

/// Key holding the canonical name in state.
pub const ID_KEY: &str = "id";

/// Prior, desired and output state of one resource instance.
#[derive(Debug, Clone)]
pub struct ResourceData {
    schema: Arc<Schema>,
    prior: Value,
    desired: Value,
    state: Map<String, Value>,
    id: Option<String>,
}

impl ResourceData {
    /// Build from the host's view of an instance. `prior` is `None` when
    /// the instance is being created.
    pub fn new(schema: Arc<Schema>, prior: Option<Value>, desired: Value) -> Self {
        let prior = prior.unwrap_or(Value::Null);
        let id = prior
            .get(ID_KEY)
            .or_else(|| desired.get(ID_KEY))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let state = match &desired {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        Self {
            schema,
            prior,
            desired,
            state,
            id,
        }
    }

    /// Data for an existing instance whose state is both prior and desired.
    pub fn from_state(schema: Arc<Schema>, state: Value) -> Self {
        Self::new(schema, Some(state.clone()), state)
    }

    /// Fresh data over the same schema with nothing declared. Flattening a
    /// message into it yields the attribute tree of that message alone.
    pub fn scratch(&self) -> Self {
        Self::new(Arc::clone(&self.schema), None, Value::Object(Map::new()))
    }

    /// The schema of this instance.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Canonical name of the handle, if one is recorded.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Record the canonical name.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Clear the handle. The host forgets the instance.
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// True when there is no prior state.
    pub fn is_new(&self) -> bool {
        self.prior.is_null()
    }

    /// Prior state.
    pub fn prior(&self) -> &Value {
        &self.prior
    }

    /// Desired attribute tree.
    pub fn desired(&self) -> &Value {
        &self.desired
    }

    /// Replace the prior state, e.g. with the flattened form of an object
    /// found on the server during an upsert.
    pub fn rebase(&mut self, prior: Value) {
        self.prior = prior;
    }

    /// Write an attribute to the output state.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.state.insert(key.to_string(), value.into());
    }

    /// Value already written to the output state.
    pub fn state_value(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// The output state, `None` when the handle is cleared.
    pub fn state(&self) -> Option<Value> {
        let id = self.id.as_ref()?;
        let mut state = self.state.clone();
        state.insert(ID_KEY.to_string(), Value::String(id.clone()));
        Some(Value::Object(state))
    }

    /// The attributes written so far, without the id.
    pub fn attributes(&self) -> Value {
        let mut state = self.state.clone();
        state.remove(ID_KEY);
        Value::Object(state)
    }

    // =========================================================================
    // Getters (desired tree)
    // =========================================================================

    /// Raw desired value at a dotted path. Null counts as absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        value_at(&self.desired, path).filter(|v| !v.is_null())
    }

    /// Raw prior value at a dotted path.
    pub fn get_prior(&self, path: &str) -> Option<&Value> {
        value_at(&self.prior, path).filter(|v| !v.is_null())
    }

    /// Non-empty string at `path`.
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// String at `path`, empty when unset.
    pub fn get_string(&self, path: &str) -> String {
        self.get_str(path).unwrap_or_default().to_string()
    }

    /// Integer at `path`.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(as_i64)
    }

    /// Boolean at `path`, `false` when unset.
    pub fn get_bool(&self, path: &str) -> bool {
        self.get_bool_opt(path).unwrap_or(false)
    }

    /// Boolean at `path` if set.
    pub fn get_bool_opt(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// Strings of a list or set attribute, in declared order.
    pub fn get_str_list(&self, path: &str) -> Vec<String> {
        str_items(self.get(path))
    }

    /// String map attribute.
    pub fn get_str_map(&self, path: &str) -> Vec<(String, String)> {
        self.get(path)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A single nested block, whether encoded as an object or a
    /// one-element list.
    pub fn get_block(&self, path: &str) -> Option<&Value> {
        single(self.get(path)?)
    }

    /// Elements of a list or set block.
    pub fn get_blocks(&self, path: &str) -> Vec<&Value> {
        match self.get(path) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(v @ Value::Object(_)) => vec![v],
            _ => Vec::new(),
        }
    }

    /// Elements of a list or set block in prior state.
    pub fn get_prior_blocks(&self, path: &str) -> Vec<&Value> {
        match self.get_prior(path) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(v @ Value::Object(_)) => vec![v],
            _ => Vec::new(),
        }
    }

    /// Strings of a list or set attribute in prior state.
    pub fn get_prior_str_list(&self, path: &str) -> Vec<String> {
        str_items(self.get_prior(path))
    }

    // =========================================================================
    // Change detection
    // =========================================================================

    /// Whether the attribute or block at `path` differs between prior and
    /// desired state.
    pub fn has_change(&self, path: &str) -> bool {
        let old = value_at(&self.prior, path);
        let new = value_at(&self.desired, path);
        match lookup(&self.schema.block, path) {
            Some(Node::Attribute(attr)) => attribute_changed(attr, old, new),
            Some(Node::Block(nested)) => nested_changed(nested, old, new),
            None => normalize(old) != normalize(new),
        }
    }

    /// Every top-level attribute or block that changed, in schema order.
    pub fn changes(&self) -> Vec<AttributeChange> {
        let block = &self.schema.block;
        block
            .attributes
            .keys()
            .chain(block.blocks.keys())
            .filter(|name| self.has_change(name))
            .map(|name| {
                AttributeChange::new(
                    name.clone(),
                    self.get_prior(name).cloned(),
                    self.get(name).cloned(),
                )
            })
            .collect()
    }
}

enum Node<'a> {
    Attribute(&'a Attribute),
    Block(&'a NestedBlock),
}

fn lookup<'a>(block: &'a Block, path: &str) -> Option<Node<'a>> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    match rest {
        None => block
            .attributes
            .get(head)
            .map(Node::Attribute)
            .or_else(|| block.blocks.get(head).map(Node::Block)),
        Some(rest) => {
            let nested = block.blocks.get(head)?;
            match nested.nesting_mode {
                BlockNestingMode::Single => lookup(&nested.block, rest),
                _ => None,
            }
        },
    }
}

/// Navigate a dotted path through objects; single blocks encoded as
/// one-element lists are unwrapped.
pub(crate) fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = single(current)?.get(segment)?;
    }
    Some(current)
}

fn single(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) if items.len() <= 1 => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn str_items(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Empty strings and collections are indistinguishable from unset.
fn normalize(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::Null,
        Some(Value::String(s)) if s.is_empty() => Value::Null,
        Some(Value::Array(items)) if items.is_empty() => Value::Null,
        Some(Value::Object(map)) if map.is_empty() => Value::Null,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Value::from(i),
            None => Value::Number(n.clone()),
        },
        Some(other) => other.clone(),
    }
}

fn attribute_changed(attr: &Attribute, old: Option<&Value>, new: Option<&Value>) -> bool {
    let new_norm = normalize(new);
    if new_norm.is_null() && attr.flags.computed {
        return false;
    }
    match attr.diff_suppress {
        Some(DiffSuppress::Hashed) => match new_norm.as_str() {
            Some(plain) => {
                let old = old.and_then(Value::as_str);
                old != Some(sha256_hex(plain).as_str()) && old != Some(plain)
            },
            None => false,
        },
        Some(DiffSuppress::CaseInsensitive) => {
            let lower = |v: Value| v.as_str().map(str::to_lowercase);
            lower(normalize(old)) != lower(new_norm)
        },
        Some(DiffSuppress::ConditionExpression) => {
            let canonical = |v: Value| v.as_str().map(canonical_expression);
            canonical(normalize(old)) != canonical(new_norm)
        },
        None => match attr.attr_type {
            AttributeType::Set(_) => sorted_items(old) != sorted_items(new),
            _ => normalize(old) != new_norm,
        },
    }
}

fn sorted_items(value: Option<&Value>) -> Vec<String> {
    let mut items: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().map(|v| v.to_string()).collect(),
        _ => Vec::new(),
    };
    items.sort_unstable();
    items.dedup();
    items
}

fn nested_changed(nested: &NestedBlock, old: Option<&Value>, new: Option<&Value>) -> bool {
    match nested.nesting_mode {
        BlockNestingMode::Set => {
            let keyed = |v: Option<&Value>| -> BTreeMap<String, Value> {
                let mut elements = BTreeMap::new();
                if let Some(Value::Array(items)) = v {
                    for item in items {
                        let hash = element_hash(nested.identity.as_ref(), &nested.block, item);
                        elements.entry(hash).or_insert_with(|| item.clone());
                    }
                }
                elements
            };
            let (old, new) = (keyed(old), keyed(new));
            if !old.keys().eq(new.keys()) {
                return true;
            }
            // Same identities: attributes outside the identity, such as
            // secrets, can still change in place.
            old.iter()
                .zip(new.values())
                .any(|((_, o), n)| block_changed(&nested.block, o, n))
        },
        BlockNestingMode::List => {
            let items = |v: Option<&Value>| match v {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            let (old, new) = (items(old), items(new));
            old.len() != new.len()
                || old
                    .iter()
                    .zip(new.iter())
                    .any(|(o, n)| block_changed(&nested.block, o, n))
        },
        BlockNestingMode::Single => {
            let old = old.and_then(single).cloned().unwrap_or(Value::Null);
            let new = new.and_then(single).cloned().unwrap_or(Value::Null);
            block_changed(&nested.block, &old, &new)
        },
    }
}

/// Zero scalars read back from the server are indistinguishable from
/// attributes left out of a nested block's configuration.
fn zero_as_unset(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(Value::Bool(false)) => None,
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => None,
        other => other,
    }
}

fn block_changed(block: &Block, old: &Value, new: &Value) -> bool {
    block
        .attributes
        .iter()
        .any(|(name, attr)| {
            attribute_changed(attr, zero_as_unset(old.get(name)), zero_as_unset(new.get(name)))
        })
        || block
            .blocks
            .iter()
            .any(|(name, nested)| nested_changed(nested, old.get(name), new.get(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, SetIdentity};
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::v0()
                .with_attribute("title", Attribute::required_string())
                .with_attribute("key", Attribute::optional_computed_string())
                .with_attribute("permissions", Attribute::string_set(AttributeFlags::required()))
                .with_attribute(
                    "engine",
                    Attribute::required_string().with_diff_suppress(DiffSuppress::CaseInsensitive),
                )
                .with_attribute(
                    "password",
                    Attribute::optional_string()
                        .sensitive()
                        .with_diff_suppress(DiffSuppress::Hashed),
                )
                .with_block(
                    "profile",
                    NestedBlock::single(
                        Block::new()
                            .with_attribute("external_url", Attribute::optional_string())
                            .with_attribute("token_duration", Attribute::optional_int64()),
                    ),
                )
                .with_block(
                    "data_sources",
                    NestedBlock::set(
                        Block::new()
                            .with_attribute("id", Attribute::required_string())
                            .with_attribute("host", Attribute::optional_string()),
                    )
                    .with_identity(SetIdentity::fields(&["id"])),
                ),
        )
    }

    #[test]
    fn test_id_from_prior() {
        let data = ResourceData::new(schema(), Some(json!({"id": "projects/acme"})), json!({}));
        assert_eq!(data.id(), Some("projects/acme"));
        assert!(!data.is_new());

        let mut fresh = ResourceData::new(schema(), None, json!({"title": "Acme"}));
        assert!(fresh.is_new());
        assert!(fresh.state().is_none());
        fresh.set_id("projects/acme");
        fresh.set("title", "Acme");
        assert_eq!(fresh.state().unwrap(), json!({"id": "projects/acme", "title": "Acme"}));
        fresh.clear_id();
        assert!(fresh.state().is_none());
    }

    #[test]
    fn test_getters() {
        let data = ResourceData::new(
            schema(),
            None,
            json!({
                "title": "Acme",
                "key": "",
                "permissions": ["bb.a", "bb.b"],
                "profile": [{"external_url": "https://bb.example.com", "token_duration": "60"}]
            }),
        );
        assert_eq!(data.get_str("title"), Some("Acme"));
        assert_eq!(data.get_str("key"), None);
        assert_eq!(data.get_string("missing"), "");
        assert_eq!(data.get_str_list("permissions"), vec!["bb.a", "bb.b"]);
        assert_eq!(data.get_str("profile.external_url"), Some("https://bb.example.com"));
        assert_eq!(data.get_i64("profile.token_duration"), Some(60));
        assert!(data.get_block("profile").is_some());
        assert!(!data.get_bool("missing"));
    }

    #[test]
    fn test_set_changes_ignore_order() {
        let data = ResourceData::new(
            schema(),
            Some(json!({"permissions": ["bb.a", "bb.b"]})),
            json!({"permissions": ["bb.b", "bb.a"]}),
        );
        assert!(!data.has_change("permissions"));

        let data = ResourceData::new(
            schema(),
            Some(json!({"permissions": ["bb.a"]})),
            json!({"permissions": ["bb.a", "bb.c"]}),
        );
        assert!(data.has_change("permissions"));
    }

    #[test]
    fn test_set_block_identity() {
        let prior = json!({"data_sources": [{"id": "admin", "host": "a"}, {"id": "ro", "host": "b"}]});
        let data = ResourceData::new(
            schema(),
            Some(prior.clone()),
            json!({"data_sources": [{"id": "ro", "host": "b"}, {"id": "admin", "host": "a"}]}),
        );
        assert!(!data.has_change("data_sources"));

        // Same identity, different attribute outside it.
        let data = ResourceData::new(
            schema(),
            Some(prior),
            json!({"data_sources": [{"id": "ro", "host": "b"}, {"id": "admin", "host": "c"}]}),
        );
        assert!(data.has_change("data_sources"));

        let data = ResourceData::new(
            schema(),
            Some(json!({"data_sources": [{"id": "admin"}]})),
            json!({"data_sources": [{"id": "admin"}, {"id": "ro"}]}),
        );
        assert!(data.has_change("data_sources"));
    }

    #[test]
    fn test_set_element_zero_values_match_unset() {
        let schema = Arc::new(
            Schema::v0().with_block(
                "data_sources",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("id", Attribute::required_string())
                        .with_attribute("use_ssl", Attribute::optional_bool())
                        .with_attribute("password", Attribute::optional_string().sensitive()),
                )
                .with_identity(SetIdentity::fields(&["id"])),
            ),
        );
        let prior = json!({"data_sources": [{"id": "admin", "use_ssl": false, "password": "pw1"}]});
        let unchanged = ResourceData::new(
            Arc::clone(&schema),
            Some(prior.clone()),
            json!({"data_sources": [{"id": "admin", "password": "pw1"}]}),
        );
        assert!(!unchanged.has_change("data_sources"));

        let rotated = ResourceData::new(
            Arc::clone(&schema),
            Some(prior.clone()),
            json!({"data_sources": [{"id": "admin", "password": "pw2"}]}),
        );
        assert!(rotated.has_change("data_sources"));

        let ssl = ResourceData::new(
            schema,
            Some(prior),
            json!({"data_sources": [{"id": "admin", "use_ssl": true, "password": "pw1"}]}),
        );
        assert!(ssl.has_change("data_sources"));
    }

    #[test]
    fn test_optional_computed_unset_is_unchanged() {
        let data = ResourceData::new(schema(), Some(json!({"key": "SRV"})), json!({"title": "x"}));
        assert!(!data.has_change("key"));

        let data = ResourceData::new(schema(), Some(json!({"key": "SRV"})), json!({"key": "NEW"}));
        assert!(data.has_change("key"));
    }

    #[test]
    fn test_case_insensitive_and_hashed() {
        let prior = json!({"engine": "POSTGRES", "password": sha256_hex("secret")});
        let data = ResourceData::new(schema(), Some(prior.clone()), json!({"engine": "postgres", "password": "secret"}));
        assert!(!data.has_change("engine"));
        assert!(!data.has_change("password"));

        let data = ResourceData::new(schema(), Some(prior.clone()), json!({"engine": "MYSQL", "password": "other"}));
        assert!(data.has_change("engine"));
        assert!(data.has_change("password"));

        // Undeclared password never changes.
        let data = ResourceData::new(schema(), Some(prior), json!({"engine": "POSTGRES"}));
        assert!(!data.has_change("password"));
    }

    #[test]
    fn test_nested_single_block_paths() {
        let data = ResourceData::new(
            schema(),
            Some(json!({"profile": {"external_url": "https://a", "token_duration": 60}})),
            json!({"profile": [{"external_url": "https://b", "token_duration": 60}]}),
        );
        assert!(data.has_change("profile"));
        assert!(data.has_change("profile.external_url"));
        assert!(!data.has_change("profile.token_duration"));
    }

    #[test]
    fn test_changes_lists_top_level_paths() {
        let data = ResourceData::new(
            schema(),
            Some(json!({"title": "Old", "engine": "MYSQL"})),
            json!({"title": "New", "engine": "MYSQL"}),
        );
        let changes = data.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "title");
        assert_eq!(changes[0].before, Some(json!("Old")));
    }

    #[test]
    fn test_rebase() {
        let mut data = ResourceData::new(schema(), None, json!({"title": "Acme"}));
        assert!(data.has_change("title"));
        data.rebase(json!({"title": "Acme"}));
        assert!(!data.has_change("title"));
    }
}
