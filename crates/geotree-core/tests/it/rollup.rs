use crate::helpers::fixture;
use geotree_core::{EntityCatalog, EntityKind, Level, NodeUpdate, RollupScope};

const CATALOG: &str = r#"{
    "stores": [
        { "id": "s1", "state": "Lagos" },
        { "id": "s2", "state": "lagos" },
        { "id": "s3", "state": "Ogun" },
        { "id": "s4", "state": "Rivers" }
    ],
    "orders": [
        { "id": "o1", "storeId": "s1" },
        { "id": "o2", "storeId": "s4" },
        { "id": "o3", "storeId": "s4" }
    ],
    "products": [
        { "id": "p1", "store_id": "s3" }
    ],
    "customers": [
        { "id": "c1", "state": "Rivers" },
        { "id": "c2", "state": "Kano" }
    ]
}"#;

fn catalog() -> EntityCatalog {
    serde_json::from_str(CATALOG).unwrap()
}

#[test]
fn country_totals_cover_every_state() {
    let f = fixture();
    let rollup = f.h.rollup(Level::Country, &f.nigeria.id, &catalog()).unwrap();
    assert_eq!(rollup.scope, RollupScope::Subtree);
    assert_eq!(rollup.counts.get(EntityKind::Stores), 4);
    assert_eq!(rollup.counts.get(EntityKind::Orders), 3);
    assert_eq!(rollup.counts.get(EntityKind::Products), 1);
    // Kano is not part of the tree.
    assert_eq!(rollup.counts.get(EntityKind::Customers), 1);
}

#[test]
fn street_reports_its_enclosing_state() {
    let f = fixture();
    let rollup = f.h.rollup(Level::Street, &f.allen_avenue.id, &catalog()).unwrap();
    assert_eq!(rollup.scope, RollupScope::AncestorState);
    assert_eq!(rollup.states.iter().collect::<Vec<_>>(), ["lagos"]);
    assert_eq!(rollup.counts.stores, 2);
    assert_eq!(rollup.counts.orders, 1);
}

#[test]
fn rollup_follows_a_reparent() {
    let f = fixture();
    let catalog = catalog();
    let before = f.h.rollup(Level::Region, &f.south_south.id, &catalog).unwrap();
    assert_eq!(before.counts.stores, 1);

    f.h.update(Level::State, &f.ogun.id, NodeUpdate::reparent(f.south_south.id.clone()))
        .unwrap();
    let after = f.h.rollup(Level::Region, &f.south_south.id, &catalog).unwrap();
    assert_eq!(after.counts.stores, 2);
    assert_eq!(after.counts.products, 1);
}
