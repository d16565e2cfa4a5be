use crate::helpers::init_tracing;
use geotree_core::{Hierarchy, Level, NodeUpdate};
use proptest::prelude::*;
use proptest::sample::Index;

#[derive(Debug, Clone)]
enum Op {
    Create { level: Level, parent: Index },
    Reparent { level: Level, node: Index, to: Index },
    Rename { level: Level, node: Index, name: String },
    Delete { level: Level, node: Index },
}

fn level() -> impl Strategy<Value = Level> {
    prop::sample::select(Level::ALL.to_vec())
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (level(), any::<Index>()).prop_map(|(level, parent)| Op::Create { level, parent }),
        2 => (level(), any::<Index>(), any::<Index>())
            .prop_map(|(level, node, to)| Op::Reparent { level, node, to }),
        1 => (level(), any::<Index>(), "[A-Z][a-z]{2,8}")
            .prop_map(|(level, node, name)| Op::Rename { level, node, name }),
        1 => (level(), any::<Index>()).prop_map(|(level, node)| Op::Delete { level, node }),
    ]
}

/// Applies one operation, picking nodes by index. Rejected operations are
/// part of the exercise; only the tree's shape afterwards matters.
fn apply(h: &Hierarchy, op: &Op, serial: usize) {
    let pick = |level: Level, idx: &Index| {
        let nodes = h.list(level).unwrap();
        (!nodes.is_empty()).then(|| nodes[idx.index(nodes.len())].id.clone())
    };
    let _ = match op {
        Op::Create { level, parent } => match level.parent() {
            None => h.create(*level, &format!("Country {serial}"), None).map(drop),
            Some(above) => match pick(above, parent) {
                Some(p) => h.create(*level, &format!("{level} {serial}"), Some(&p)).map(drop),
                None => Ok(()),
            },
        },
        Op::Reparent { level, node, to } => match (pick(*level, node), level.parent()) {
            (Some(id), Some(above)) => match pick(above, to) {
                Some(p) => h.update(*level, &id, NodeUpdate::reparent(p)).map(drop),
                None => Ok(()),
            },
            _ => Ok(()),
        },
        Op::Rename { level, node, name } => match pick(*level, node) {
            Some(id) => h.update(*level, &id, NodeUpdate::rename(format!("{name} {serial}"))).map(drop),
            None => Ok(()),
        },
        Op::Delete { level, node } => match pick(*level, node) {
            Some(id) => h.delete(*level, &id).map(drop),
            None => Ok(()),
        },
    };
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any sequence of operations leaves every link bidirectional and every
    /// denormalized ancestor list matching the real path.
    #[test]
    fn links_stay_bidirectional(ops in prop::collection::vec(op(), 1..60)) {
        init_tracing();
        let h = Hierarchy::in_memory();
        for (serial, op) in ops.iter().enumerate() {
            apply(&h, op, serial);
        }

        let report = h.audit().unwrap();
        prop_assert!(report.is_clean(), "{:?}", report.violations);

        for level in Level::ALL {
            for node in h.list(level).unwrap() {
                let path = h.path(level, &node.id).unwrap();
                prop_assert_eq!(path.len(), level.depth() + 1);
                for ancestor in &path[..path.len() - 1] {
                    prop_assert_eq!(node.ancestors.get(ancestor.level), Some(&ancestor.id));
                }
            }
        }
    }
}
