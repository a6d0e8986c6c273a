use super::*;

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;

const FIXTURE: &str = include_str!("../../../../fixtures/taxonomy.json");

fn id(raw: &str) -> CategoryId {
    CategoryId::from(raw)
}

fn ids(list: &[CategoryId]) -> Vec<&str> {
    list.iter().map(CategoryId::as_str).collect()
}

async fn fixture_tree() -> CategoryTree {
    let source = StaticTaxonomySource::from_json_str(FIXTURE).expect("fixture");
    let tree = CategoryTree::new(Arc::new(source));
    tree.load().await.expect("load fixture");
    tree
}

/// Counts fetches and optionally fails the first `failures` of them.
struct CountingSource {
    inner: StaticTaxonomySource,
    fetches: Arc<AtomicUsize>,
    failures: usize,
    delay: Duration,
}

impl CountingSource {
    fn new(fetches: Arc<AtomicUsize>) -> Self {
        Self {
            inner: StaticTaxonomySource::from_json_str(FIXTURE).expect("fixture"),
            fetches,
            failures: 0,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl TaxonomySource for CountingSource {
    async fn fetch(&self, resource: TaxonomyResource) -> anyhow::Result<Value> {
        let attempt = self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if attempt < self.failures {
            return Err(anyhow!("connection reset"));
        }
        self.inner.fetch(resource).await
    }
}

#[tokio::test]
async fn load_exposes_roots_in_source_order() {
    let tree = fixture_tree().await;
    assert!(tree.is_loaded());
    assert!(tree.has_roots());
    assert_eq!(
        ids(tree.root_ids()),
        vec![
            "food-food",
            "music-music",
            "sports-sports",
            "geography-geography",
            "entertainment-entertainment",
        ]
    );
    assert!(tree.roots().iter().all(|node| node.level == 0));
}

#[tokio::test]
async fn children_follow_numeric_ordering_keys() {
    let tree = fixture_tree().await;
    let children = tree.children_of(&id("food-food"), 0);
    let names: Vec<&str> = children.iter().map(|node| node.name.as_str()).collect();
    assert_eq!(names, vec!["Dairy", "Fruit", "Snacks", "Drinks"]);
    assert!(children.iter().all(|node| node.level == 1));
    assert!(tree.children_of(&id("food-dairy-milk"), 2).is_empty());
    assert!(tree.children_of(&id("nope-nope"), 0).is_empty());
}

#[tokio::test]
async fn node_view_uses_definitions_or_fallback_name() {
    let tree = fixture_tree().await;

    let milk = tree.node_view(&id("food-dairy-milk"), 2);
    assert_eq!(milk.name, "Milk");
    assert_eq!(milk.level, 2);
    assert_eq!(milk.icon.as_deref(), Some("drop.fill"));
    assert_eq!(milk.synonyms, vec!["moo juice", "cow milk"]);

    let hip_hop = tree.node_view(&id("music-genres-hip_hop"), 2);
    assert_eq!(hip_hop.name, "Hip Hop");
    assert_eq!(hip_hop.icon, None);

    let unknown = tree.node_view(&id("made-up-space_opera"), 7);
    assert_eq!(unknown.name, "Space Opera");
    assert_eq!(unknown.level, 7);
}

#[tokio::test]
async fn ancestors_walk_from_root_to_node() {
    let tree = fixture_tree().await;
    assert_eq!(
        ids(&tree.ancestors_of(&id("food-dairy-milk"))),
        vec!["food-food", "food-dairy", "food-dairy-milk"]
    );
    assert_eq!(ids(&tree.ancestors_of(&id("food-food"))), vec!["food-food"]);
    assert_eq!(tree.depth_of(&id("food-dairy")), 1);
}

#[tokio::test]
async fn unknown_ids_degrade_to_single_element_chain() {
    let tree = fixture_tree().await;
    assert_eq!(ids(&tree.ancestors_of(&id("ghost-ghost"))), vec!["ghost-ghost"]);
    assert_eq!(tree.try_ancestors_of(&id("ghost-ghost")), None);

    let empty = CategoryTree::unloaded();
    assert_eq!(ids(&empty.ancestors_of(&id("food-food"))), vec!["food-food"]);
    assert!(!empty.has_roots());
    assert!(!empty.contains(&id("food-food")));
}

#[tokio::test]
async fn has_children_and_parent_queries() {
    let tree = fixture_tree().await;
    assert!(tree.has_children(&id("food-dairy")));
    assert!(!tree.has_children(&id("food-dairy-milk")));
    assert_eq!(tree.parent_of(&id("food-dairy")), Some(&id("food-food")));
    assert_eq!(tree.parent_of(&id("food-food")), None);
}

#[tokio::test]
async fn search_matches_names_synonyms_and_segments() {
    let tree = fixture_tree().await;

    let soccer: Vec<String> = tree
        .search("SOCCER")
        .into_iter()
        .map(|node| node.id.0)
        .collect();
    assert_eq!(soccer, vec!["sports-football"]);

    let crisps = tree.search("crisps");
    assert_eq!(crisps.len(), 1);
    assert_eq!(crisps[0].id, id("food-snacks-chips"));
    assert_eq!(crisps[0].level, 2);

    assert_eq!(tree.search("hip_hop")[0].id, id("music-genres-hip_hop"));
    assert!(tree.search("   ").is_empty());
}

#[tokio::test]
async fn stats_count_nodes_and_depth() {
    let tree = fixture_tree().await;
    let stats = tree.stats();
    assert_eq!(stats.roots, 5);
    assert_eq!(stats.max_depth, 2);
    assert_eq!(stats.nodes, 37);
    assert_eq!(CategoryTree::unloaded().stats(), TreeStats::default());
}

#[tokio::test]
async fn repeated_load_does_not_refetch() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let tree = CategoryTree::new(Arc::new(CountingSource::new(Arc::clone(&fetches))));

    tree.load().await.expect("first load");
    tree.load().await.expect("second load");

    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_loads_collapse_to_one_attempt() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut source = CountingSource::new(Arc::clone(&fetches));
    source.delay = Duration::from_millis(200);
    let tree = Arc::new(CategoryTree::new(Arc::new(source)));

    let loads = (0..8).map(|_| {
        let tree = Arc::clone(&tree);
        async move { tree.load().await }
    });
    let results = futures::future::join_all(loads).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert!(tree.has_roots());
}

#[tokio::test]
async fn failed_load_leaves_tree_empty_and_can_retry() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut source = CountingSource::new(Arc::clone(&fetches));
    source.failures = 1;
    let tree = CategoryTree::new(Arc::new(source));

    let err = tree.load().await.expect_err("first load fails");
    assert!(matches!(err, LoadError::Fetch { .. }));
    assert!(err.to_string().contains("connection reset"));
    assert!(!tree.is_loaded());
    assert!(tree.roots().is_empty());
    // try_join! stops at the first failed fetch
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    tree.load().await.expect("retry succeeds");
    assert!(tree.has_roots());
    assert_eq!(fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn concurrent_failing_loads_share_one_attempt() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let mut source = CountingSource::new(Arc::clone(&fetches));
    source.failures = usize::MAX;
    source.delay = Duration::from_millis(200);
    let tree = Arc::new(CategoryTree::new(Arc::new(source)));

    let started = tokio::time::Instant::now();
    let loads = (0..8).map(|_| {
        let tree = Arc::clone(&tree);
        async move { tree.load().await }
    });
    let results = futures::future::join_all(loads).await;

    assert_eq!(results.len(), 8);
    for result in &results {
        let err = result.as_ref().expect_err("source always fails");
        assert!(err.to_string().contains("connection reset"));
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(!tree.is_loaded());

    // a later call starts a fresh attempt
    tree.load().await.expect_err("still failing");
    assert_eq!(fetches.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn shape_errors_name_the_resource() {
    let tree = CategoryTree::new(Arc::new(StaticTaxonomySource::new(
        json!({}),
        json!(42),
    )));
    let err = tree.load().await.expect_err("number hierarchy");
    assert_eq!(
        err,
        LoadError::Shape {
            resource: TaxonomyResource::Hierarchy,
            found: "number",
        }
    );
    assert!(!tree.is_loaded());
}

#[tokio::test]
async fn missing_source_reports_fetch_error() {
    let err = CategoryTree::unloaded().load().await.expect_err("no source");
    assert!(matches!(err, LoadError::Fetch { .. }));
    assert!(err.to_string().contains("no taxonomy source configured"));
}
