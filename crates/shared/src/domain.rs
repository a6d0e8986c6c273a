use std::fmt;

use serde::{Deserialize, Serialize};

/// Dash-delimited taxonomy id that embeds the node's lineage.
///
/// Roots look like `food-food`, their children `food-dairy`, grandchildren
/// `food-dairy-milk` and so on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

impl CategoryId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('-')
    }

    pub fn last_segment(&self) -> &str {
        self.0.rsplit('-').next().unwrap_or(&self.0)
    }

    /// Display name used when the definitions table has no entry for this id.
    pub fn fallback_name(&self) -> String {
        self.last_segment()
            .replace('_', " ")
            .split_whitespace()
            .map(title_case_word)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Ids a scripted walk has to tap, root first, to reach this id.
    ///
    /// Computed from the id text alone so a walk can be planned before the
    /// tree is loaded: `food-dairy-milk` yields `food-food`, `food-dairy`,
    /// `food-dairy-milk`.
    pub fn tap_sequence(&self) -> Vec<CategoryId> {
        if self.0.is_empty() {
            return Vec::new();
        }

        let segments: Vec<&str> = self.segments().collect();
        let mut sequence: Vec<CategoryId> = Vec::with_capacity(segments.len());
        sequence.push(CategoryId(format!("{0}-{0}", segments[0])));

        for end in 1..segments.len() {
            let next = CategoryId(segments[..=end].join("-"));
            if sequence.last() != Some(&next) {
                sequence.push(next);
            }
        }

        sequence
    }
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CategoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A node as seen from one call site. `level` is supplied by whoever asked
/// for the view, not stored on the canonical node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: CategoryId,
    pub name: String,
    pub icon: Option<String>,
    pub colour: Option<String>,
    pub synonyms: Vec<String>,
    pub level: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Name,
    Description,
    Category,
    Layout,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Name,
        WizardStep::Description,
        WizardStep::Category,
        WizardStep::Layout,
    ];

    pub fn next(self) -> Option<WizardStep> {
        match self {
            WizardStep::Name => Some(WizardStep::Description),
            WizardStep::Description => Some(WizardStep::Category),
            WizardStep::Category => Some(WizardStep::Layout),
            WizardStep::Layout => None,
        }
    }

    pub fn previous(self) -> Option<WizardStep> {
        match self {
            WizardStep::Name => None,
            WizardStep::Description => Some(WizardStep::Name),
            WizardStep::Category => Some(WizardStep::Description),
            WizardStep::Layout => Some(WizardStep::Category),
        }
    }

    pub fn index(self) -> usize {
        match self {
            WizardStep::Name => 0,
            WizardStep::Description => 1,
            WizardStep::Category => 2,
            WizardStep::Layout => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Name => "Name",
            WizardStep::Description => "Description",
            WizardStep::Category => "Category",
            WizardStep::Layout => "Layout",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Form fields that can be nudged when a step advance is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Description,
    Category,
    Layout,
}

/// Free-text buffers that scripted typing can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Name,
    Description,
}

impl From<TextField> for Field {
    fn from(value: TextField) -> Self {
        match value {
            TextField::Name => Field::Name,
            TextField::Description => Field::Description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub group: &'static str,
    pub disabled: bool,
}

impl LayoutTemplate {
    pub fn find(name: &str) -> Option<&'static LayoutTemplate> {
        LAYOUT_TEMPLATES
            .iter()
            .find(|template| template.name.eq_ignore_ascii_case(name))
    }

    pub fn available() -> impl Iterator<Item = &'static LayoutTemplate> {
        LAYOUT_TEMPLATES.iter().filter(|template| !template.disabled)
    }
}

pub const DEFAULT_LAYOUT: &str = "Default List";

pub const LAYOUT_TEMPLATES: &[LayoutTemplate] = &[
    LayoutTemplate {
        name: "Default List",
        description: "Standard list layout",
        group: "Popular",
        disabled: false,
    },
    LayoutTemplate {
        name: "Group List",
        description: "Grouped items layout",
        group: "Popular",
        disabled: false,
    },
    LayoutTemplate {
        name: "Tier List",
        description: "Rank items into tiers",
        group: "Popular",
        disabled: true,
    },
    LayoutTemplate {
        name: "Grid Layout",
        description: "Display rankings with no words",
        group: "Popular",
        disabled: true,
    },
    LayoutTemplate {
        name: "Podium Layout",
        description: "Put rankings on a podium",
        group: "Other",
        disabled: true,
    },
    LayoutTemplate {
        name: "Bracket Layout",
        description: "Display rankings in 1v1s",
        group: "Other",
        disabled: true,
    },
    LayoutTemplate {
        name: "Football Lineup",
        description: "Set up a team formation",
        group: "Sports",
        disabled: true,
    },
    LayoutTemplate {
        name: "World Map",
        description: "Rank countries",
        group: "Geography",
        disabled: true,
    },
];

/// The finished wizard output handed to whoever persists rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankoDraft {
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub category: CategoryNode,
    pub category_path: Vec<CategoryId>,
    pub layout: String,
}
