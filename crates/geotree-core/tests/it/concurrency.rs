use crate::helpers::{assert_consistent, fixture, fixture_in, init_tracing};
use geotree_core::store::{CommitError, Versioned, WriteBatch, WriteOp};
use geotree_core::{
    DocumentStore, EngineConfig, GeoError, Hierarchy, Level, MemoryStore, NodeId, NodeUpdate,
    Result,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn patient() -> Hierarchy {
    Hierarchy::with_config(MemoryStore::new(), EngineConfig { max_retries: u32::MAX })
}

#[test]
fn concurrent_creates_under_one_parent_are_all_listed() {
    let f = fixture();
    let h = &f.h;
    let lagos = &f.lagos.id;

    let created: Vec<NodeId> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|w| {
                s.spawn(move || {
                    (0..25)
                        .map(|i| h.create(Level::City, &format!("City {w}-{i}"), Some(lagos)).unwrap().id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
    });

    let parent = h.get(Level::State, lagos).unwrap();
    assert_eq!(parent.child_count(), created.len() + 1);
    for id in &created {
        assert!(parent.lists_child(id), "lost update for {id}");
    }
    assert_consistent(h);
}

#[test]
fn creates_ignore_the_retry_bound() {
    let f = fixture_in(Hierarchy::with_config(
        MemoryStore::new(),
        EngineConfig { max_retries: 0 },
    ));
    let h = &f.h;
    let nigeria = &f.nigeria.id;

    let (created, conflicts) = std::thread::scope(|s| {
        let workers: Vec<_> = (0..16)
            .map(|w| {
                s.spawn(move || {
                    let mut ok = Vec::new();
                    let mut conflicts = 0;
                    for i in 0..50 {
                        match h.create(Level::Region, &format!("Zone {w}-{i}"), Some(nigeria)) {
                            Ok(node) => ok.push(node.id),
                            Err(GeoError::Conflict(_)) => conflicts += 1,
                            Err(other) => panic!("unexpected {other}"),
                        }
                    }
                    (ok, conflicts)
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .fold((Vec::new(), 0), |(mut ids, n), (ok, c)| {
                ids.extend(ok);
                (ids, n + c)
            })
    });

    assert_eq!(conflicts, 0);
    assert_eq!(created.len(), 16 * 50);
    let parent = h.get(Level::Country, nigeria).unwrap();
    for id in &created {
        assert!(parent.lists_child(id), "lost update for {id}");
    }
    assert_consistent(h);
}

#[test]
fn two_creates_under_same_parent_both_win() {
    let f = fixture();
    let h = &f.h;
    let ogun = &f.ogun.id;
    let (a, b) = std::thread::scope(|s| {
        let a = s.spawn(|| h.create(Level::City, "Abeokuta", Some(ogun)));
        let b = s.spawn(|| h.create(Level::City, "Ijebu Ode", Some(ogun)));
        (a.join().unwrap().unwrap(), b.join().unwrap().unwrap())
    });
    let parent = h.get(Level::State, ogun).unwrap();
    assert!(parent.lists_child(&a.id) && parent.lists_child(&b.id));
}

#[test]
fn racing_reparents_of_one_node_stay_consistent() {
    for _ in 0..20 {
        let f = fixture();
        let h = &f.h;
        let ikeja = &f.ikeja.id;
        let targets = [f.ogun.id.clone(), f.rivers.id.clone()];

        let results: Vec<Result<_>> = std::thread::scope(|s| {
            let handles: Vec<_> = targets
                .iter()
                .map(|t| s.spawn(move || h.update(Level::City, ikeja, NodeUpdate::reparent(t.clone()))))
                .collect();
            handles.into_iter().map(|j| j.join().unwrap()).collect()
        });

        assert!(results.iter().any(|r| r.is_ok()), "at least one reparent wins");
        for r in &results {
            if let Err(e) = r {
                assert!(matches!(e, GeoError::Conflict(_)), "loser must see Conflict, got {e}");
            }
        }

        let city = h.get(Level::City, ikeja).unwrap();
        let owner = city.parent.clone().unwrap();
        let listing: Vec<&NodeId> = [&f.lagos.id, &f.ogun.id, &f.rivers.id]
            .into_iter()
            .filter(|s| h.get(Level::State, s).unwrap().lists_child(ikeja))
            .collect();
        assert_eq!(listing, [&owner]);
        assert_consistent(h);
    }
}

#[test]
fn readers_never_see_a_node_in_both_or_neither_parent() {
    let f = fixture_in(patient());
    let h = &f.h;
    let city = f.port_harcourt.id.clone();
    let (a, b) = (f.rivers.id.clone(), f.lagos.id.clone());
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                let to = if i % 2 == 0 { &b } else { &a };
                h.update(Level::City, &city, NodeUpdate::reparent(to.clone())).unwrap();
            }
            done.store(true, Ordering::Release);
        });
        s.spawn(|| {
            let keys = [(Level::State, a.clone()), (Level::State, b.clone())];
            while !done.load(Ordering::Acquire) {
                let docs = h.store().get_many(&keys).unwrap();
                let owners = docs
                    .iter()
                    .flatten()
                    .filter(|v| v.node.lists_child(&city))
                    .count();
                assert_eq!(owners, 1, "city must be listed by exactly one state");
            }
        });
    });
    assert_consistent(h);
}

/// Store that silently drops every write to one document, to simulate a
/// backend losing part of a batch.
struct LossyStore {
    inner: MemoryStore,
    victim: std::sync::Mutex<Option<NodeId>>,
}

impl DocumentStore for LossyStore {
    fn get(&self, level: Level, id: &NodeId) -> Result<Option<Versioned>> {
        self.inner.get(level, id)
    }

    fn get_many(&self, keys: &[(Level, NodeId)]) -> Result<Vec<Option<Versioned>>> {
        self.inner.get_many(keys)
    }

    fn scan(&self, level: Level) -> Result<Vec<Versioned>> {
        self.inner.scan(level)
    }

    fn commit(&self, batch: WriteBatch) -> std::result::Result<(), CommitError> {
        let victim = self.victim.lock().unwrap().clone();
        let mut kept = WriteBatch::new();
        for op in batch.into_ops() {
            if Some(op.id()) == victim.as_ref() {
                continue;
            }
            match op {
                WriteOp::Insert(node) => kept.insert(node),
                WriteOp::Replace { node, expected } => kept.replace(node, expected),
                WriteOp::Remove { level, id, expected } => kept.remove(level, id, expected),
            };
        }
        self.inner.commit(kept)
    }
}

#[test]
fn lost_parent_write_is_reported_as_inconsistent() {
    init_tracing();
    let h = Hierarchy::new(LossyStore {
        inner: MemoryStore::new(),
        victim: Default::default(),
    });
    let ng = h.create(Level::Country, "Nigeria", None).unwrap();
    *h.store().victim.lock().unwrap() = Some(ng.id.clone());

    let err = h.create(Level::Region, "South-West", Some(&ng.id)).unwrap_err();
    match err {
        GeoError::Inconsistent { level, id, .. } => {
            assert_eq!(level, Level::Region);
            assert_ne!(id, ng.id);
        }
        other => panic!("expected Inconsistent, got {other}"),
    }
    assert!(!h.audit().unwrap().is_clean());
}

#[test]
fn lost_node_write_during_reparent_is_reported() {
    let store = Arc::new(LossyStore {
        inner: MemoryStore::new(),
        victim: Default::default(),
    });
    let h = Hierarchy::new(Arc::clone(&store));
    let ng = h.create(Level::Country, "Nigeria", None).unwrap();
    let sw = h.create(Level::Region, "South-West", Some(&ng.id)).unwrap();
    let ss = h.create(Level::Region, "South-South", Some(&ng.id)).unwrap();
    let lagos = h.create(Level::State, "Lagos", Some(&sw.id)).unwrap();

    // Both parents are rewritten, the node's own parent reference is not.
    *store.victim.lock().unwrap() = Some(lagos.id.clone());
    let err = h
        .update(Level::State, &lagos.id, NodeUpdate::reparent(ss.id.clone()))
        .unwrap_err();
    assert!(matches!(err, GeoError::Inconsistent { .. }), "{err}");

    let owners: BTreeSet<NodeId> = h
        .list(Level::Region)
        .unwrap()
        .into_iter()
        .filter(|r| r.lists_child(&lagos.id))
        .map(|r| r.id)
        .collect();
    assert_eq!(owners, BTreeSet::from([ss.id.clone()]));
    assert_eq!(h.get(Level::State, &lagos.id).unwrap().parent, Some(sw.id));
}
