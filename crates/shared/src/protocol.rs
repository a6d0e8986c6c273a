use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// The two remote reads a taxonomy load depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyResource {
    Definitions,
    Hierarchy,
}

impl TaxonomyResource {
    /// Path of the resource below the realtime database root.
    pub fn remote_path(self) -> &'static str {
        match self {
            TaxonomyResource::Definitions => "AppData/Ranko/CategoryData/Definitions",
            TaxonomyResource::Hierarchy => "AppData/Ranko/CategoryData/Hierarchy",
        }
    }
}

impl fmt::Display for TaxonomyResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonomyResource::Definitions => f.write_str("definitions"),
            TaxonomyResource::Hierarchy => f.write_str("hierarchy"),
        }
    }
}

/// One entry of the flat definitions map, keyed by category id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, alias = "color")]
    pub colour: Option<String>,
    #[serde(default, deserialize_with = "deserialize_synonyms")]
    pub synonyms: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSynonyms {
    List(Vec<String>),
    Text(String),
}

fn deserialize_synonyms<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawSynonyms>::deserialize(deserializer)?;
    let synonyms = match raw {
        None => Vec::new(),
        Some(RawSynonyms::List(items)) => items,
        Some(RawSynonyms::Text(text)) => text.split(',').map(str::to_string).collect(),
    };
    Ok(synonyms
        .into_iter()
        .map(|synonym| synonym.trim().to_string())
        .filter(|synonym| !synonym.is_empty())
        .collect())
}

/// On-disk bundle of both remote reads, used by file-backed sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyDocument {
    pub definitions: serde_json::Value,
    pub hierarchy: serde_json::Value,
}
