//! Dispatcher tests: commands against an in-memory source, confirmation
//! ordering, and session boundaries.

use revtree_core::{
    AggregateId, BulkPolicy, CheckState, Dispatcher, EngineError, LeafId, LeafState,
    LeafStateSource, LeafWrite, MemorySource, NodeRef, NodeUpdate, Outcome, PresentationSink,
    Registration, TreeEvent, WriteOutcome,
};

type MemoryDispatcher = Dispatcher<MemorySource, Vec<NodeUpdate>>;

fn register_root(d: &mut MemoryDispatcher) -> AggregateId {
    match d
        .dispatch(TreeEvent::NodeRegistered(Registration::Root { label: "All Files".into() }))
        .unwrap()
    {
        Outcome::Registered { node: NodeRef::Aggregate(id), .. } => id,
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn register_dir(d: &mut MemoryDispatcher, parent: AggregateId, label: &str) -> AggregateId {
    match d
        .dispatch(TreeEvent::NodeRegistered(Registration::Aggregate {
            parent,
            label: label.into(),
        }))
        .unwrap()
    {
        Outcome::Registered { node: NodeRef::Aggregate(id), .. } => id,
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn register_file(
    d: &mut MemoryDispatcher,
    parent: AggregateId,
    key: &str,
    initial: LeafState,
) -> LeafId {
    match d
        .dispatch(TreeEvent::NodeRegistered(Registration::Leaf {
            parent,
            key: key.into(),
            initial,
        }))
        .unwrap()
    {
        Outcome::Registered { node: NodeRef::Leaf(id), .. } => id,
        other => panic!("unexpected outcome {other:?}"),
    }
}

fn dispatcher(policy: BulkPolicy) -> MemoryDispatcher {
    Dispatcher::new(policy, MemorySource::new(), Vec::new())
}

#[test]
fn bulk_check_settles_the_subtree_within_one_dispatch() {
    let mut d = dispatcher(BulkPolicy::Defer);
    let root = register_root(&mut d);
    let src = register_dir(&mut d, root, "src");
    let a = register_file(&mut d, src, "src/a.rs", LeafState::Checked);
    let b = register_file(&mut d, src, "src/b.rs", LeafState::Unchecked);
    let c = register_file(&mut d, root, "c.rs", LeafState::Unchecked);

    let outcome = d
        .dispatch(TreeEvent::BulkSetRequested { aggregate: root, checked: true })
        .unwrap();

    assert_eq!(outcome, Outcome::Propagated { visited: vec![], writes: 2 });
    assert_eq!(d.source().write_count(), 2);
    assert_eq!(d.source().read("src/b.rs"), Some(true));
    assert_eq!(d.source().read("c.rs"), Some(true));
    for leaf in [a, b, c] {
        assert_eq!(d.session().leaf(leaf).unwrap().state(), LeafState::Checked);
    }
    assert_eq!(d.session().aggregate(src).unwrap().check_state(), CheckState::Checked);
    assert_eq!(d.session().aggregate(root).unwrap().check_state(), CheckState::Checked);

    let last_root_update = d
        .sink()
        .iter()
        .rev()
        .find(|u| u.node == NodeRef::Aggregate(root))
        .unwrap();
    assert!(last_root_update.presentation.checked);
    assert!(!last_root_update.presentation.partial);
}

#[test]
fn single_leaf_request_goes_through_the_source() {
    let mut d = dispatcher(BulkPolicy::Defer);
    let root = register_root(&mut d);
    let leaf = register_file(&mut d, root, "a.rs", LeafState::Unchecked);

    d.dispatch(TreeEvent::LeafSetRequested { leaf, checked: true }).unwrap();
    assert_eq!(d.source().read("a.rs"), Some(true));
    assert_eq!(d.session().leaf(leaf).unwrap().state(), LeafState::Checked);

    // Asking for the value it already has writes nothing.
    d.dispatch(TreeEvent::LeafSetRequested { leaf, checked: true }).unwrap();
    assert_eq!(d.source().write_count(), 1);
}

#[test]
fn deferred_bulk_value_is_confirmed_on_resolution() {
    let mut d = dispatcher(BulkPolicy::Defer);
    let root = register_root(&mut d);
    let pending = register_file(&mut d, root, "slow.rs", LeafState::Unknown);

    d.dispatch(TreeEvent::BulkSetRequested { aggregate: root, checked: true }).unwrap();
    assert_eq!(d.source().write_count(), 0);
    assert!(d.session().aggregate(root).unwrap().is_pending());

    d.dispatch(TreeEvent::LeafResolved { leaf: pending, checked: false }).unwrap();

    assert_eq!(d.source().read("slow.rs"), Some(true));
    assert_eq!(d.session().leaf(pending).unwrap().state(), LeafState::Checked);
    assert_eq!(d.session().aggregate(root).unwrap().check_state(), CheckState::Checked);
    assert!(!d.session().aggregate(root).unwrap().is_pending());
}

#[test]
fn reject_policy_surfaces_the_refusal() {
    let mut d = dispatcher(BulkPolicy::Reject);
    let root = register_root(&mut d);
    register_file(&mut d, root, "slow.rs", LeafState::Unknown);

    let err = d
        .dispatch(TreeEvent::BulkSetRequested { aggregate: root, checked: true })
        .unwrap_err();
    assert_eq!(err, EngineError::PendingTarget { node: root.into() });
    assert_eq!(d.source().write_count(), 0);
}

#[test]
fn redundant_resolution_is_returned_and_harmless() {
    let mut d = dispatcher(BulkPolicy::Defer);
    let root = register_root(&mut d);
    let leaf = register_file(&mut d, root, "a.rs", LeafState::Unknown);

    d.dispatch(TreeEvent::LeafResolved { leaf, checked: true }).unwrap();
    let err = d.dispatch(TreeEvent::LeafResolved { leaf, checked: false }).unwrap_err();

    assert_eq!(err, EngineError::RedundantResolution { leaf });
    assert_eq!(d.session().leaf(leaf).unwrap().state(), LeafState::Checked);
}

#[test]
fn same_identity_keeps_the_session() {
    let mut d = dispatcher(BulkPolicy::Defer);
    assert!(matches!(
        d.dispatch(TreeEvent::SessionStarted { identity: "repo#staged".into() }),
        Ok(Outcome::SessionChanged { .. })
    ));
    let root = register_root(&mut d);

    assert_eq!(
        d.dispatch(TreeEvent::SessionStarted { identity: "repo#staged".into() }),
        Ok(Outcome::Ignored)
    );
    assert!(d.session().aggregate(root).is_some());
    assert_eq!(d.identity(), Some("repo#staged"));
}

#[test]
fn new_identity_drops_the_tree_and_stale_events() {
    let mut d = dispatcher(BulkPolicy::Defer);
    d.dispatch(TreeEvent::SessionStarted { identity: "repo#staged".into() }).unwrap();
    let root = register_root(&mut d);
    let leaf = register_file(&mut d, root, "a.rs", LeafState::Unchecked);
    let epoch = d.session().epoch();

    let outcome = d
        .dispatch(TreeEvent::SessionStarted { identity: "repo#unstaged".into() })
        .unwrap();
    assert_eq!(outcome, Outcome::SessionChanged { epoch: d.session().epoch() });
    assert_ne!(d.session().epoch(), epoch);
    assert_eq!(d.session().leaf_count(), 0);

    let err = d.dispatch(TreeEvent::LeafChanged { leaf, checked: true }).unwrap_err();
    assert!(err.is_stale_reference());
    let err = d
        .dispatch(TreeEvent::BulkSetRequested { aggregate: root, checked: true })
        .unwrap_err();
    assert!(err.is_stale_reference());
    assert_eq!(d.source().write_count(), 0);

    d.dispatch(TreeEvent::SessionReset).unwrap();
    assert_eq!(d.identity(), None);
}

/// Source that only records writes; confirmations arrive later as events.
#[derive(Default)]
struct DeferredSource {
    queued: Vec<LeafWrite>,
}

impl LeafStateSource for DeferredSource {
    fn read(&self, _key: &str) -> Option<bool> {
        None
    }

    fn write(&mut self, write: &LeafWrite) -> WriteOutcome {
        self.queued.push(write.clone());
        WriteOutcome::Queued
    }
}

#[derive(Default)]
struct CountingSink(usize);

impl PresentationSink for CountingSink {
    fn present(&mut self, _update: NodeUpdate) {
        self.0 += 1;
    }
}

#[test]
fn queued_writes_wait_for_the_source_to_report_back() {
    let mut d = Dispatcher::new(BulkPolicy::Defer, DeferredSource::default(), CountingSink::default());
    let root = match d
        .dispatch(TreeEvent::NodeRegistered(Registration::Root { label: "All Files".into() }))
        .unwrap()
    {
        Outcome::Registered { node: NodeRef::Aggregate(id), .. } => id,
        other => panic!("unexpected outcome {other:?}"),
    };
    let leaf = match d
        .dispatch(TreeEvent::NodeRegistered(Registration::Leaf {
            parent: root,
            key: "a.rs".into(),
            initial: LeafState::Unchecked,
        }))
        .unwrap()
    {
        Outcome::Registered { node: NodeRef::Leaf(id), .. } => id,
        other => panic!("unexpected outcome {other:?}"),
    };

    d.dispatch(TreeEvent::BulkSetRequested { aggregate: root, checked: true }).unwrap();
    assert_eq!(d.source().queued.len(), 1);
    assert_eq!(d.session().leaf(leaf).unwrap().state(), LeafState::Unchecked);

    let write = d.source_mut().queued.remove(0);
    let before = d.sink().0;
    d.dispatch(TreeEvent::LeafChanged { leaf: write.leaf, checked: write.checked }).unwrap();

    assert_eq!(d.session().leaf(leaf).unwrap().state(), LeafState::Checked);
    assert_eq!(d.session().aggregate(root).unwrap().check_state(), CheckState::Checked);
    assert!(d.sink().0 > before);
}
