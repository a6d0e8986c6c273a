//! Selection path and expansion state over the category tree.
//!
//! Every tap, human or scripted, goes through [`SelectionController::tap`].
//! The controller keeps two invariants:
//!
//! * the path is empty or a root-to-node chain of the tree;
//! * when `expanded_sub` is set, `expanded_parent` is its parent.

use serde::Deserialize;
use shared::{
    domain::{CategoryId, CategoryNode},
    error::SelectionError,
};
use taxonomy::CategoryTree;

/// What to do with a tapped id the tree cannot resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownIdPolicy {
    /// Treat the id as a lone root (`ancestors == [id]`).
    #[default]
    Degrade,
    /// Refuse the tap and leave the state untouched.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Selected { depth: usize },
    Deselected { depth: usize },
}

#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    path: Vec<CategoryId>,
    expanded_parent: Option<CategoryId>,
    expanded_sub: Option<CategoryId>,
    current: Option<CategoryNode>,
    unknown_ids: UnknownIdPolicy,
}

impl SelectionController {
    pub fn new(unknown_ids: UnknownIdPolicy) -> Self {
        Self {
            unknown_ids,
            ..Self::default()
        }
    }

    pub fn path(&self) -> &[CategoryId] {
        &self.path
    }

    pub fn current(&self) -> Option<&CategoryNode> {
        self.current.as_ref()
    }

    pub fn expanded_parent(&self) -> Option<&CategoryId> {
        self.expanded_parent.as_ref()
    }

    pub fn expanded_sub(&self) -> Option<&CategoryId> {
        self.expanded_sub.as_ref()
    }

    pub fn unknown_ids(&self) -> UnknownIdPolicy {
        self.unknown_ids
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Path membership, which is what highlights a row.
    pub fn is_selected(&self, id: &CategoryId) -> bool {
        self.path.contains(id)
    }

    pub fn reset(&mut self) {
        self.path.clear();
        self.current = None;
        self.collapse();
    }

    /// Clears both expansion slots, keeping the path.
    pub fn collapse(&mut self) {
        self.expanded_parent = None;
        self.expanded_sub = None;
    }

    pub fn tap(
        &mut self,
        tree: &CategoryTree,
        id: &CategoryId,
    ) -> Result<TapOutcome, SelectionError> {
        let ancestors = self.resolve(tree, id)?;
        let depth = ancestors.len().saturating_sub(1);

        match self.path.iter().position(|selected| selected == id) {
            Some(position) => {
                self.deselect(tree, id, position, depth);
                Ok(TapOutcome::Deselected { depth })
            }
            None => {
                self.select(tree, id, ancestors, depth);
                Ok(TapOutcome::Selected { depth })
            }
        }
    }

    fn resolve(
        &self,
        tree: &CategoryTree,
        id: &CategoryId,
    ) -> Result<Vec<CategoryId>, SelectionError> {
        match self.unknown_ids {
            UnknownIdPolicy::Degrade => Ok(tree.ancestors_of(id)),
            UnknownIdPolicy::Reject => tree.try_ancestors_of(id).ok_or_else(|| {
                if tree.is_loaded() {
                    SelectionError::UnknownNode(id.clone())
                } else {
                    SelectionError::NotReady(id.clone())
                }
            }),
        }
    }

    fn deselect(&mut self, tree: &CategoryTree, id: &CategoryId, position: usize, depth: usize) {
        self.path.truncate(position);
        self.current = self
            .path
            .last()
            .map(|last| tree.node_view(last, self.path.len() - 1));

        match depth {
            0 => self.collapse(),
            1 => {
                if self.expanded_sub.as_ref() == Some(id) {
                    self.expanded_sub = None;
                }
            }
            _ => {}
        }
    }

    fn select(
        &mut self,
        tree: &CategoryTree,
        id: &CategoryId,
        ancestors: Vec<CategoryId>,
        depth: usize,
    ) {
        self.current = Some(tree.node_view(id, depth));

        match depth {
            0 => {
                if self.expanded_parent.as_ref() == Some(id) {
                    self.collapse();
                } else {
                    self.expanded_parent = Some(id.clone());
                    self.expanded_sub = None;
                }
            }
            1 => {
                let root = &ancestors[0];
                if self.expanded_parent.as_ref() != Some(root) {
                    self.expanded_parent = Some(root.clone());
                    self.expanded_sub = None;
                }
                self.expanded_sub = if self.expanded_sub.as_ref() == Some(id) {
                    None
                } else {
                    Some(id.clone())
                };
            }
            _ => {
                self.expanded_parent = Some(ancestors[0].clone());
                self.expanded_sub = Some(ancestors[1].clone());
            }
        }

        self.path = ancestors;
    }

    /// The flat row list a renderer shows: roots, the expanded root's
    /// children under it, and the expanded child's children under that.
    pub fn visible_rows(&self, tree: &CategoryTree) -> Vec<CategoryNode> {
        let mut rows = Vec::new();
        for root in tree.root_ids() {
            rows.push(tree.node_view(root, 0));
            if self.expanded_parent.as_ref() != Some(root) {
                continue;
            }
            for child in tree.child_ids(root) {
                rows.push(tree.node_view(child, 1));
                if self.expanded_sub.as_ref() == Some(child) {
                    rows.extend(tree.children_of(child, 1));
                }
            }
        }
        rows
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
