//! Scenario tests for the aggregation engine.
//!
//! Exercises: registration, upward propagation and its pruning, pending
//! handling, bulk write collection under both policies, and reset.

use revtree_core::{
    BulkPolicy, CheckState, EngineError, LeafState, LeafWrite, NodePresentation, NodeRef,
    TreeSession,
};

#[test]
fn partial_directory_becomes_checked_visiting_only_its_ancestors() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (d, _) = tree.register_aggregate(root, "src").unwrap();
    let (_f1, _) = tree.register_leaf(d, "src/a.rs", LeafState::Checked).unwrap();
    let (f2, _) = tree.register_leaf(d, "src/b.rs", LeafState::Unchecked).unwrap();

    assert_eq!(tree.aggregate(d).unwrap().check_state(), CheckState::Partial);
    assert_eq!(tree.aggregate(root).unwrap().check_state(), CheckState::Partial);
    assert_eq!(tree.aggregate(d).unwrap().child_count(), 2);

    let propagation = tree.update_leaf(f2, true).unwrap();

    assert_eq!(propagation.visited, vec![d, root]);
    assert_eq!(tree.aggregate(d).unwrap().check_state(), CheckState::Checked);
    assert_eq!(tree.aggregate(root).unwrap().check_state(), CheckState::Checked);
    assert!(propagation.writes.is_empty());
}

#[test]
fn resolving_the_only_pending_leaf_clears_pending_up_to_the_root() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (d2, _) = tree.register_aggregate(root, "docs").unwrap();
    let (f3, _) = tree.register_leaf(d2, "docs/guide.md", LeafState::Unknown).unwrap();

    assert!(tree.aggregate(d2).unwrap().is_pending());
    assert!(tree.aggregate(root).unwrap().is_pending());
    assert_eq!(tree.aggregate(d2).unwrap().pending_count(), 1);

    let propagation = tree.resolve_leaf(f3, false).unwrap();

    assert_eq!(propagation.visited, vec![d2, root]);
    assert!(!tree.aggregate(d2).unwrap().is_pending());
    assert!(!tree.aggregate(root).unwrap().is_pending());
    assert_eq!(tree.aggregate(d2).unwrap().check_state(), CheckState::Unchecked);
    assert_eq!(tree.leaf(f3).unwrap().state(), LeafState::Unchecked);
}

#[test]
fn propagation_stops_at_the_first_stable_ancestor() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (a, _) = tree.register_aggregate(root, "a").unwrap();
    let (b, _) = tree.register_aggregate(a, "b").unwrap();
    tree.register_leaf(b, "a/b/x", LeafState::Checked).unwrap();
    tree.register_leaf(b, "a/b/y", LeafState::Unchecked).unwrap();
    let (z, _) = tree.register_leaf(b, "a/b/z", LeafState::Unchecked).unwrap();

    let propagation = tree.update_leaf(z, true).unwrap();

    // b goes from 1/3 to 2/3 reviewed: still partial, so nothing above it moves.
    assert_eq!(propagation.visited, vec![b]);
    assert_eq!(tree.aggregate(b).unwrap().check_state(), CheckState::Partial);
    assert_eq!(tree.aggregate(b).unwrap().child_state_total(), 4);
    assert_eq!(tree.aggregate(a).unwrap().check_state(), CheckState::Partial);
    assert_eq!(
        propagation.updates.iter().map(|u| u.node).collect::<Vec<_>>(),
        vec![NodeRef::Leaf(z)]
    );
}

#[test]
fn repeating_a_report_changes_nothing() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (leaf, _) = tree.register_leaf(root, "README.md", LeafState::Checked).unwrap();
    let total_before = tree.aggregate(root).unwrap().child_state_total();

    let propagation = tree.update_leaf(leaf, true).unwrap();

    assert!(propagation.is_empty());
    assert_eq!(tree.aggregate(root).unwrap().child_state_total(), total_before);
    assert_eq!(tree.aggregate(root).unwrap().check_state(), CheckState::Checked);
}

#[test]
fn attaching_a_child_can_demote_a_checked_parent() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (d, _) = tree.register_aggregate(root, "src").unwrap();
    tree.register_leaf(d, "src/lib.rs", LeafState::Checked).unwrap();
    assert_eq!(tree.aggregate(root).unwrap().check_state(), CheckState::Checked);

    let (_, propagation) = tree.register_aggregate(root, "tests").unwrap();

    assert_eq!(propagation.visited, vec![root]);
    assert_eq!(tree.aggregate(root).unwrap().check_state(), CheckState::Partial);
    assert!(!tree.aggregate(root).unwrap().is_pending());
}

#[test]
fn partial_aggregates_present_as_unchecked_with_a_partial_marker() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    tree.register_leaf(root, "a", LeafState::Checked).unwrap();
    tree.register_leaf(root, "b", LeafState::Unknown).unwrap();

    assert_eq!(
        tree.presentation(root.into()),
        Some(NodePresentation { checked: false, partial: true, pending: true })
    );
}

#[test]
fn registration_errors_are_structural() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    assert!(matches!(
        tree.register_root("again"),
        Err(EngineError::StructuralViolation { .. })
    ));

    let mut other = TreeSession::default();
    other.reset();
    let (foreign_root, _) = other.register_root("elsewhere").unwrap();
    assert_ne!(foreign_root, root);
    assert!(matches!(
        tree.register_leaf(foreign_root, "x", LeafState::Checked),
        Err(EngineError::StructuralViolation { .. })
    ));
}

#[test]
fn resolving_twice_is_rejected() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (leaf, _) = tree.register_leaf(root, "a", LeafState::Unknown).unwrap();

    tree.resolve_leaf(leaf, true).unwrap();

    assert_eq!(tree.resolve_leaf(leaf, false), Err(EngineError::RedundantResolution { leaf }));
    assert_eq!(tree.leaf(leaf).unwrap().state(), LeafState::Checked);
}

#[test]
fn update_on_a_pending_leaf_resolves_it() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (leaf, _) = tree.register_leaf(root, "a", LeafState::Unknown).unwrap();

    tree.update_leaf(leaf, true).unwrap();

    assert_eq!(tree.leaf(leaf).unwrap().state(), LeafState::Checked);
    assert!(!tree.aggregate(root).unwrap().is_pending());
    assert_eq!(tree.aggregate(root).unwrap().check_state(), CheckState::Checked);
}

#[test]
fn bulk_collects_writes_for_differing_leaves_nested_directories_first() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (top, _) = tree.register_leaf(root, "Cargo.toml", LeafState::Unchecked).unwrap();
    let (src, _) = tree.register_aggregate(root, "src").unwrap();
    let (done, _) = tree.register_leaf(src, "src/done.rs", LeafState::Checked).unwrap();
    let (todo, _) = tree.register_leaf(src, "src/todo.rs", LeafState::Unchecked).unwrap();

    let propagation = tree.apply_to_subtree(root, true).unwrap();

    assert_eq!(
        propagation.writes,
        vec![
            LeafWrite { leaf: todo, key: "src/todo.rs".to_owned(), checked: true },
            LeafWrite { leaf: top, key: "Cargo.toml".to_owned(), checked: true },
        ]
    );
    // Nothing moves until the source confirms.
    assert_eq!(tree.aggregate(root).unwrap().check_state(), CheckState::Partial);
    assert_eq!(tree.leaf(done).unwrap().state(), LeafState::Checked);
}

#[test]
fn deferred_bulk_value_is_written_once_the_leaf_resolves() {
    let mut tree = TreeSession::new(BulkPolicy::Defer);
    let (root, _) = tree.register_root("All Files").unwrap();
    let (late, _) = tree.register_leaf(root, "late.rs", LeafState::Unknown).unwrap();
    let (agrees, _) = tree.register_leaf(root, "agrees.rs", LeafState::Unknown).unwrap();

    let bulk = tree.apply_to_subtree(root, true).unwrap();
    assert!(bulk.writes.is_empty());
    assert_eq!(tree.leaf(late).unwrap().deferred(), Some(true));

    let resolved = tree.resolve_leaf(late, false).unwrap();
    assert_eq!(
        resolved.writes,
        vec![LeafWrite { leaf: late, key: "late.rs".to_owned(), checked: true }]
    );
    assert_eq!(tree.leaf(late).unwrap().deferred(), None);

    let resolved = tree.resolve_leaf(agrees, true).unwrap();
    assert!(resolved.writes.is_empty());
}

#[test]
fn reject_policy_refuses_pending_targets() {
    let mut tree = TreeSession::new(BulkPolicy::Reject);
    let (root, _) = tree.register_root("All Files").unwrap();
    let (pending, _) = tree.register_leaf(root, "a", LeafState::Unknown).unwrap();
    tree.register_leaf(root, "b", LeafState::Unchecked).unwrap();

    assert_eq!(
        tree.apply_to_subtree(root, true),
        Err(EngineError::PendingTarget { node: root.into() })
    );
    assert_eq!(
        tree.request_leaf(pending, true),
        Err(EngineError::PendingTarget { node: pending.into() })
    );
    assert_eq!(tree.leaf(pending).unwrap().deferred(), None);

    tree.resolve_leaf(pending, false).unwrap();
    assert_eq!(tree.apply_to_subtree(root, true).unwrap().writes.len(), 2);
}

#[test]
fn reset_forgets_every_previous_id() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (leaf, _) = tree.register_leaf(root, "a", LeafState::Unchecked).unwrap();

    tree.reset();

    assert!(tree.leaf(leaf).is_none());
    assert!(tree.aggregate(root).is_none());
    assert!(!tree.contains(leaf.into()));
    assert_eq!(tree.leaf_count(), 0);
    assert_eq!(tree.root(), None);
    assert_eq!(
        tree.update_leaf(leaf, true),
        Err(EngineError::UnknownNodeReference { node: leaf.into() })
    );

    // Indices restart, identities do not.
    let (new_root, _) = tree.register_root("All Files").unwrap();
    let (new_leaf, _) = tree.register_leaf(new_root, "a", LeafState::Unchecked).unwrap();
    assert_eq!(new_leaf.index(), leaf.index());
    assert_ne!(new_leaf, leaf);
    assert!(tree.leaf(leaf).is_none());
}

#[test]
fn walk_lists_directories_before_files() {
    let mut tree = TreeSession::default();
    let (root, _) = tree.register_root("All Files").unwrap();
    let (readme, _) = tree.register_leaf(root, "README.md", LeafState::Unchecked).unwrap();
    let (src, _) = tree.register_aggregate(root, "src").unwrap();
    let (lib, _) = tree.register_leaf(src, "src/lib.rs", LeafState::Unchecked).unwrap();

    assert_eq!(
        tree.walk(),
        vec![
            (NodeRef::Aggregate(root), 0),
            (NodeRef::Aggregate(src), 1),
            (NodeRef::Leaf(lib), 2),
            (NodeRef::Leaf(readme), 1),
        ]
    );
}
