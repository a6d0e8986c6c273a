use thiserror::Error;

use crate::{
    domain::{CategoryId, Field, WizardStep},
    protocol::TaxonomyResource,
};

/// Taxonomy load failure. The tree stays empty and `load()` may be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to fetch taxonomy {resource}: {cause}")]
    Fetch {
        resource: TaxonomyResource,
        cause: String,
    },
    #[error("taxonomy {resource} is not a mapping (found {found})")]
    Shape {
        resource: TaxonomyResource,
        found: &'static str,
    },
}

impl LoadError {
    pub fn resource(&self) -> TaxonomyResource {
        match self {
            LoadError::Fetch { resource, .. } | LoadError::Shape { resource, .. } => *resource,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("category tree is not loaded yet; cannot resolve {0}")]
    NotReady(CategoryId),
    #[error("unknown category {0}")]
    UnknownNode(CategoryId),
}

/// A blocked step advance, with one nudge per missing field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot leave {step} step: missing {missing:?}")]
pub struct ValidationFailure {
    pub step: WizardStep,
    pub missing: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("unknown layout {0:?}")]
    Unknown(String),
    #[error("layout {0:?} is not available yet")]
    Disabled(String),
}
