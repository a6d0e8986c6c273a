//! Lazily loaded category forest keyed by lineage-encoding ids.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use shared::{
    domain::{CategoryId, CategoryNode},
    error::LoadError,
    protocol::TaxonomyResource,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

mod hierarchy;
pub mod source;

use hierarchy::TreeIndex;
pub use source::{HttpTaxonomySource, MissingTaxonomySource, StaticTaxonomySource, TaxonomySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub nodes: usize,
    pub roots: usize,
    pub max_depth: usize,
}

type LoadAttempt = Shared<BoxFuture<'static, Result<Arc<TreeIndex>, LoadError>>>;

/// The category forest. Empty until the first successful [`CategoryTree::load`],
/// read-only afterwards.
pub struct CategoryTree {
    source: Arc<dyn TaxonomySource>,
    index: OnceCell<Arc<TreeIndex>>,
    in_flight: Mutex<Option<LoadAttempt>>,
}

impl CategoryTree {
    pub fn new(source: Arc<dyn TaxonomySource>) -> Self {
        Self {
            source,
            index: OnceCell::new(),
            in_flight: Mutex::new(None),
        }
    }

    /// A tree with no backing source; every load fails and every query
    /// answers as for an empty forest.
    pub fn unloaded() -> Self {
        Self::new(Arc::new(MissingTaxonomySource))
    }

    /// Fetches and indexes the taxonomy once.
    ///
    /// Concurrent callers share a single in-flight attempt and all observe
    /// its outcome, success or failure. Once loaded, further calls return
    /// immediately without touching the source. A failed attempt leaves the
    /// tree empty so the next call retries.
    pub async fn load(&self) -> Result<(), LoadError> {
        if self.index.initialized() {
            debug!("taxonomy: already loaded, skipping fetch");
            return Ok(());
        }

        let attempt = self.join_or_start_attempt();
        let result = attempt.clone().await;
        if let Ok(index) = &result {
            let _ = self.index.set(Arc::clone(index));
        }

        // The slot is cleared only after the index is set, so a caller
        // arriving in between joins the settled attempt instead of refetching.
        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&attempt)) {
            *slot = None;
        }
        result.map(|_| ())
    }

    fn join_or_start_attempt(&self) -> LoadAttempt {
        let mut slot = self.in_flight.lock();
        if let Some(attempt) = slot.as_ref() {
            debug!("taxonomy: joining in-flight load");
            return attempt.clone();
        }
        let attempt = fetch_and_index(Arc::clone(&self.source)).boxed().shared();
        *slot = Some(attempt.clone());
        attempt
    }

    fn index(&self) -> Option<&TreeIndex> {
        self.index.get().map(Arc::as_ref)
    }

    pub fn is_loaded(&self) -> bool {
        self.index.initialized()
    }

    pub fn has_roots(&self) -> bool {
        self.index().is_some_and(|index| !index.roots.is_empty())
    }

    pub fn contains(&self, id: &CategoryId) -> bool {
        self.index().is_some_and(|index| index.known.contains(id))
    }

    pub fn root_ids(&self) -> &[CategoryId] {
        self.index()
            .map(|index| index.roots.as_slice())
            .unwrap_or(&[])
    }

    pub fn roots(&self) -> Vec<CategoryNode> {
        self.root_ids()
            .iter()
            .map(|id| self.node_view(id, 0))
            .collect()
    }

    pub fn child_ids(&self, id: &CategoryId) -> &[CategoryId] {
        self.index()
            .and_then(|index| index.children_of.get(id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, id: &CategoryId) -> Option<&CategoryId> {
        self.index().and_then(|index| index.parent_of.get(id))
    }

    pub fn has_children(&self, id: &CategoryId) -> bool {
        !self.child_ids(id).is_empty()
    }

    /// Metadata for `id` as seen at `level`. Never fails: ids without a
    /// definition get a name derived from the id itself.
    pub fn node_view(&self, id: &CategoryId, level: usize) -> CategoryNode {
        let definition = self.index().and_then(|index| index.definitions.get(id));
        let name = definition
            .and_then(|definition| definition.name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| id.fallback_name(), str::to_string);

        CategoryNode {
            id: id.clone(),
            name,
            icon: definition.and_then(|definition| definition.icon.clone()),
            colour: definition.and_then(|definition| definition.colour.clone()),
            synonyms: definition
                .map(|definition| definition.synonyms.clone())
                .unwrap_or_default(),
            level,
        }
    }

    pub fn children_of(&self, id: &CategoryId, parent_level: usize) -> Vec<CategoryNode> {
        self.child_ids(id)
            .iter()
            .map(|child| self.node_view(child, parent_level + 1))
            .collect()
    }

    /// Root-to-`id` chain, or `None` when `id` is not in the loaded tree.
    pub fn try_ancestors_of(&self, id: &CategoryId) -> Option<Vec<CategoryId>> {
        let index = self.index()?;
        if !index.known.contains(id) {
            return None;
        }

        let mut chain = vec![id.clone()];
        let mut current = id;
        while let Some(parent) = index.parent_of.get(current) {
            if chain.len() > index.known.len() {
                warn!(id = %id, "taxonomy: parent chain does not terminate");
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain.reverse();
        Some(chain)
    }

    /// Root-to-`id` chain. Unknown ids degrade to `[id]`.
    pub fn ancestors_of(&self, id: &CategoryId) -> Vec<CategoryId> {
        self.try_ancestors_of(id).unwrap_or_else(|| vec![id.clone()])
    }

    pub fn depth_of(&self, id: &CategoryId) -> usize {
        self.ancestors_of(id).len().saturating_sub(1)
    }

    /// Case-insensitive match on name, synonyms and last id segment, in
    /// tree order.
    pub fn search(&self, query: &str) -> Vec<CategoryNode> {
        let needle = query.trim().to_lowercase();
        let Some(index) = self.index() else {
            return Vec::new();
        };
        if needle.is_empty() {
            return Vec::new();
        }

        index
            .order
            .iter()
            .map(|id| self.node_view(id, self.depth_of(id)))
            .filter(|node| {
                node.name.to_lowercase().contains(&needle)
                    || node.id.last_segment().to_lowercase().contains(&needle)
                    || node
                        .synonyms
                        .iter()
                        .any(|synonym| synonym.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn stats(&self) -> TreeStats {
        let Some(index) = self.index() else {
            return TreeStats::default();
        };
        TreeStats {
            nodes: index.order.len(),
            roots: index.roots.len(),
            max_depth: index
                .order
                .iter()
                .map(|id| self.depth_of(id))
                .max()
                .unwrap_or_default(),
        }
    }
}

async fn fetch_and_index(source: Arc<dyn TaxonomySource>) -> Result<Arc<TreeIndex>, LoadError> {
    let fetched = tokio::try_join!(
        fetch(source.as_ref(), TaxonomyResource::Definitions),
        fetch(source.as_ref(), TaxonomyResource::Hierarchy),
    );
    let built = fetched
        .and_then(|(definitions, hierarchy)| TreeIndex::build(&definitions, &hierarchy));
    match built {
        Ok(index) => {
            info!(
                nodes = index.order.len(),
                roots = index.roots.len(),
                definitions = index.definitions.len(),
                "taxonomy: category tree loaded"
            );
            Ok(Arc::new(index))
        }
        Err(err) => {
            warn!(resource = %err.resource(), "taxonomy: load failed: {err}");
            Err(err)
        }
    }
}

async fn fetch(
    source: &dyn TaxonomySource,
    resource: TaxonomyResource,
) -> Result<Value, LoadError> {
    source.fetch(resource).await.map_err(|err| LoadError::Fetch {
        resource,
        cause: format!("{err:#}"),
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
