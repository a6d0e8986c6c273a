//! Ingestion of the remote definitions and hierarchy maps into tree indexes.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;
use shared::{
    domain::CategoryId,
    error::LoadError,
    protocol::{CategoryDefinition, TaxonomyResource},
};
use tracing::warn;

/// Sort key for ordering keys that do not parse as numbers.
const NON_NUMERIC_ORDER: u64 = u64::MAX;

/// Parent/child indexes over the forest, written once per load.
#[derive(Debug, Default)]
pub(crate) struct TreeIndex {
    pub(crate) definitions: HashMap<CategoryId, CategoryDefinition>,
    pub(crate) children_of: HashMap<CategoryId, Vec<CategoryId>>,
    pub(crate) parent_of: HashMap<CategoryId, CategoryId>,
    pub(crate) roots: Vec<CategoryId>,
    /// Every registered id in depth-first source order.
    pub(crate) order: Vec<CategoryId>,
    pub(crate) known: HashSet<CategoryId>,
}

impl TreeIndex {
    pub(crate) fn build(definitions: &Value, hierarchy: &Value) -> Result<Self, LoadError> {
        let definitions = parse_definitions(definitions)?;
        let Some(root_entries) = ordered_entries(hierarchy) else {
            return Err(LoadError::Shape {
                resource: TaxonomyResource::Hierarchy,
                found: value_kind(hierarchy),
            });
        };

        let mut index = TreeIndex {
            definitions,
            ..TreeIndex::default()
        };
        for entry in root_entries {
            index.register(entry, None);
        }
        Ok(index)
    }

    fn register(&mut self, entry: &Value, parent: Option<&CategoryId>) {
        let Some(id) = entry.get("id").and_then(Value::as_str) else {
            warn!(
                parent = parent.map(CategoryId::as_str),
                "taxonomy: skipping hierarchy entry without a string id"
            );
            return;
        };
        let id = CategoryId::from(id);

        if !self.known.insert(id.clone()) {
            warn!(
                id = %id,
                parent = parent.map(CategoryId::as_str),
                "taxonomy: skipping duplicate hierarchy id"
            );
            return;
        }
        self.order.push(id.clone());

        match parent {
            Some(parent) => {
                self.parent_of.insert(id.clone(), parent.clone());
                self.children_of
                    .entry(parent.clone())
                    .or_default()
                    .push(id.clone());
            }
            None => self.roots.push(id.clone()),
        }

        match entry.get("sub") {
            None | Some(Value::Null) => {}
            Some(sub) => match ordered_entries(sub) {
                Some(children) => {
                    for child in children {
                        self.register(child, Some(&id));
                    }
                }
                None => warn!(
                    id = %id,
                    found = value_kind(sub),
                    "taxonomy: ignoring sub entry that is not a mapping"
                ),
            },
        }
    }
}

fn parse_definitions(value: &Value) -> Result<HashMap<CategoryId, CategoryDefinition>, LoadError> {
    let Value::Object(entries) = value else {
        return Err(LoadError::Shape {
            resource: TaxonomyResource::Definitions,
            found: value_kind(value),
        });
    };

    let mut definitions = HashMap::with_capacity(entries.len());
    for (id, raw) in entries {
        match CategoryDefinition::deserialize(raw) {
            Ok(definition) => {
                definitions.insert(CategoryId::from(id.as_str()), definition);
            }
            Err(err) => warn!(id = %id, "taxonomy: skipping unreadable definition: {err}"),
        }
    }
    Ok(definitions)
}

/// Sibling entries of a hierarchy level in display order.
///
/// Mapping keys are compared numerically; keys that are not numbers sort
/// after all numeric keys. Arrays (how the REST API returns dense numeric
/// keys) use their index as the key and drop `null` holes.
pub(crate) fn ordered_entries(value: &Value) -> Option<Vec<&Value>> {
    match value {
        Value::Object(map) => {
            let mut keyed: Vec<(u64, &str, &Value)> = map
                .iter()
                .map(|(key, entry)| (ordering_key(key), key.as_str(), entry))
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
            Some(keyed.into_iter().map(|(_, _, entry)| entry).collect())
        }
        Value::Array(items) => Some(items.iter().filter(|entry| !entry.is_null()).collect()),
        _ => None,
    }
}

pub(crate) fn ordering_key(key: &str) -> u64 {
    key.trim().parse::<u64>().unwrap_or(NON_NUMERIC_ORDER)
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "tests/hierarchy_tests.rs"]
mod tests;
