//! Field masks and immutability.

use crate::data::ResourceData;
use crate::error::ProviderError;
use crate::schema::{Block, BlockNestingMode};

/// Server paths of every changed attribute, in schema order, without
/// duplicates.
///
/// Attributes and blocks without an `update_path` are never sent. A
/// single block without its own path is descended into, so nested
/// attributes can name finer-grained paths.
pub fn field_mask(data: &ResourceData) -> Vec<String> {
    let mut paths = Vec::new();
    walk(data, &data.schema().block, "", &mut paths);
    let mut seen = std::collections::HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
    paths
}

fn walk(data: &ResourceData, block: &Block, prefix: &str, paths: &mut Vec<String>) {
    for (name, attr) in &block.attributes {
        if let Some(path) = &attr.update_path {
            if data.has_change(&format!("{}{}", prefix, name)) {
                paths.push(path.clone());
            }
        }
    }
    for (name, nested) in &block.blocks {
        let key = format!("{}{}", prefix, name);
        match &nested.update_path {
            Some(path) => {
                if data.has_change(&key) {
                    paths.push(path.clone());
                }
            },
            None if nested.nesting_mode == BlockNestingMode::Single => {
                walk(data, &nested.block, &format!("{}.", key), paths);
            },
            None => {},
        }
    }
}

/// Fail with `InvalidArgument` when an immutable attribute or block of an
/// existing object would change.
pub fn check_immutable(data: &ResourceData) -> Result<(), ProviderError> {
    if data.is_new() {
        return Ok(());
    }
    let block = &data.schema().block;
    let attributes = block
        .attributes
        .iter()
        .filter(|(_, attr)| attr.immutable)
        .map(|(name, _)| name);
    let blocks = block
        .blocks
        .iter()
        .filter(|(_, nested)| nested.immutable)
        .map(|(name, _)| name);
    for name in attributes.chain(blocks) {
        // Nothing fixed yet on the server side.
        if is_unset(data.get_prior(name)) {
            continue;
        }
        if data.has_change(name) {
            return Err(ProviderError::invalid(format!(
                "{} cannot be changed after creation (current {}, desired {})",
                name,
                render(data.get_prior(name)),
                render(data.get(name)),
            )));
        }
    }
    Ok(())
}

fn is_unset(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.is_empty(),
        Some(serde_json::Value::Array(items)) => items.is_empty(),
        Some(serde_json::Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}

fn render(value: Option<&serde_json::Value>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "unset".to_string())
}
