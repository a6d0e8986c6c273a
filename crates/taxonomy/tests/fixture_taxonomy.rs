use std::sync::Arc;

use shared::domain::CategoryId;
use taxonomy::{CategoryTree, StaticTaxonomySource};

const FIXTURE: &str = include_str!("../../../fixtures/taxonomy.json");

async fn load_fixture() -> CategoryTree {
    let source = StaticTaxonomySource::from_json_str(FIXTURE).expect("fixture parses");
    let tree = CategoryTree::new(Arc::new(source));
    tree.load().await.expect("fixture loads");
    tree
}

fn all_ids(tree: &CategoryTree) -> Vec<CategoryId> {
    let mut pending: Vec<CategoryId> = tree.root_ids().iter().rev().cloned().collect();
    let mut out = Vec::new();
    while let Some(id) = pending.pop() {
        pending.extend(tree.child_ids(&id).iter().rev().cloned());
        out.push(id);
    }
    out
}

#[tokio::test]
async fn ancestors_match_planned_tap_sequence_prefixes() {
    let tree = load_fixture().await;

    for leaf in all_ids(&tree) {
        let plan = leaf.tap_sequence();
        for (position, step) in plan.iter().enumerate() {
            assert_eq!(
                tree.ancestors_of(step),
                plan[..=position].to_vec(),
                "ancestors of {step} disagree with tap sequence of {leaf}"
            );
        }
    }
}

#[tokio::test]
async fn indexes_form_a_forest() {
    let tree = load_fixture().await;
    let ids = all_ids(&tree);

    for id in &ids {
        match tree.parent_of(id) {
            Some(parent) => assert!(tree.child_ids(parent).contains(id)),
            None => assert!(tree.root_ids().contains(id)),
        }
        for child in tree.child_ids(id) {
            assert_eq!(tree.parent_of(child), Some(id));
        }
    }

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}
