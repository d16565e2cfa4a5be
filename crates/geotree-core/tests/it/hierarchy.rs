use crate::helpers::{assert_consistent, child_names, fixture, init_tracing};
use geotree_core::{GeoError, Hierarchy, Level, NodeId, NodeUpdate};

#[test]
fn nigeria_delete_is_refused_until_descendants_are_gone() {
    init_tracing();
    let h = Hierarchy::in_memory();
    let ng = h.create(Level::Country, "Nigeria", None).unwrap();
    let sw = h.create(Level::Region, "South-West", Some(&ng.id)).unwrap();
    let lagos = h.create(Level::State, "Lagos", Some(&sw.id)).unwrap();

    let before = h.snapshot().unwrap();
    assert!(matches!(
        h.delete(Level::Country, &ng.id),
        Err(GeoError::Conflict(_))
    ));
    assert!(matches!(
        h.delete(Level::Region, &sw.id),
        Err(GeoError::Conflict(_))
    ));
    assert_eq!(h.snapshot().unwrap(), before, "a refused delete must not change anything");

    h.delete(Level::State, &lagos.id).unwrap();
    h.delete(Level::Region, &sw.id).unwrap();
    h.delete(Level::Country, &ng.id).unwrap();
    assert_eq!(h.stats().unwrap().total(), 0);
}

#[test]
fn created_child_stays_listed_after_unrelated_mutations() {
    let f = fixture();
    let h = &f.h;
    h.create(Level::City, "Abeokuta", Some(&f.ogun.id)).unwrap();
    h.update(Level::State, &f.rivers.id, NodeUpdate::rename("Rivers State")).unwrap();
    h.delete(Level::Street, &f.allen_avenue.id).unwrap();

    assert!(h.get(Level::State, &f.lagos.id).unwrap().lists_child(&f.ikeja.id));
    assert!(h.get(Level::Region, &f.south_south.id).unwrap().lists_child(&f.rivers.id));
    assert_consistent(h);
}

#[test]
fn children_are_sorted_by_name() {
    let f = fixture();
    f.h.create(Level::Region, "North-Central", Some(&f.nigeria.id)).unwrap();
    assert_eq!(
        child_names(&f.h, Level::Country, &f.nigeria.id),
        ["North-Central", "South-South", "South-West"]
    );
    assert!(f.h.children(Level::Country, &f.ghana.id).unwrap().is_empty());
}

#[test]
fn asking_a_street_for_children_is_invalid_level() {
    let f = fixture();
    assert!(matches!(
        f.h.children(Level::Street, &f.allen_avenue.id),
        Err(GeoError::InvalidLevel(_))
    ));
}

#[test]
fn create_validates_parent() {
    let f = fixture();
    let h = &f.h;
    let missing = NodeId::generate();
    assert!(matches!(
        h.create(Level::State, "Oyo", Some(&missing)),
        Err(GeoError::NotFound { level: Level::Region, .. })
    ));
    // A city directly under a region skips a level.
    assert!(matches!(
        h.create(Level::City, "Ibadan", Some(&f.south_west.id)),
        Err(GeoError::InvalidLevel(_))
    ));
    assert!(matches!(
        h.create(Level::Region, "Ashanti", None),
        Err(GeoError::InvalidLevel(_))
    ));
    assert!(matches!(
        h.create(Level::Country, "Benin", Some(&f.nigeria.id)),
        Err(GeoError::InvalidLevel(_))
    ));
    assert!(matches!(
        h.create(Level::Country, "  nigeria ", None),
        Err(GeoError::Conflict(_))
    ));
    assert_consistent(h);
}

#[test]
fn reparent_moves_the_whole_subtree() {
    let f = fixture();
    let h = &f.h;

    // Move Lagos from South-West to South-South.
    let moved = h
        .update(Level::State, &f.lagos.id, NodeUpdate::reparent(f.south_south.id.clone()))
        .unwrap();
    assert_eq!(moved.parent.as_ref(), Some(&f.south_south.id));

    assert_eq!(child_names(h, Level::Region, &f.south_west.id), ["Ogun"]);
    assert_eq!(child_names(h, Level::Region, &f.south_south.id), ["Lagos", "Rivers"]);

    let street = h.get(Level::Street, &f.allen_avenue.id).unwrap();
    assert_eq!(street.ancestors.region.as_ref(), Some(&f.south_south.id));
    assert_eq!(street.ancestors.state.as_ref(), Some(&f.lagos.id));
    assert_eq!(street.ancestors.city.as_ref(), Some(&f.ikeja.id));
    assert_consistent(h);
}

#[test]
fn reparent_to_bad_parent_changes_nothing() {
    let f = fixture();
    let h = &f.h;
    let before = h.snapshot().unwrap();

    assert!(matches!(
        h.update(Level::City, &f.ikeja.id, NodeUpdate::reparent(NodeId::generate())),
        Err(GeoError::NotFound { .. })
    ));
    // A region id where a state is expected.
    assert!(matches!(
        h.update(Level::City, &f.ikeja.id, NodeUpdate::reparent(f.south_south.id.clone())),
        Err(GeoError::InvalidLevel(_))
    ));
    assert_eq!(h.snapshot().unwrap(), before);
}

#[test]
fn reparent_to_current_parent_is_a_plain_update() {
    let f = fixture();
    let update = NodeUpdate {
        name: Some("Ikeja GRA".into()),
        parent: Some(f.lagos.id.clone()),
    };
    let node = f.h.update(Level::City, &f.ikeja.id, update).unwrap();
    assert_eq!(node.name, "Ikeja GRA");
    assert_eq!(child_names(&f.h, Level::State, &f.lagos.id), ["Ikeja GRA"]);
}

#[test]
fn path_and_view_resolve_the_chain() {
    let f = fixture();
    let names: Vec<String> = f
        .h
        .path(Level::Street, &f.allen_avenue.id)
        .unwrap()
        .into_iter()
        .map(|n| n.name)
        .collect();
    assert_eq!(names, ["Nigeria", "South-West", "Lagos", "Ikeja", "Allen Avenue"]);

    let view = f.h.view(Level::State, &f.rivers.id).unwrap();
    assert_eq!(view.parent_id.as_ref(), Some(&f.south_south.id));
    assert_eq!(view.children.len(), 1);
    assert_eq!(view.children[0].id, f.port_harcourt.id);
}

#[test]
fn find_by_name_folds_accents_and_case() {
    let f = fixture();
    let ci = f.h.create(Level::Country, "Côte d'Ivoire", None).unwrap();
    let hits = f.h.find_by_name(Level::Country, "cote d'ivoire").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, ci.id);
}

#[test]
fn stats_count_every_record_set() {
    let f = fixture();
    let stats = f.h.stats().unwrap();
    assert_eq!(stats.countries, 2);
    assert_eq!(stats.regions, 2);
    assert_eq!(stats.states, 3);
    assert_eq!(stats.cities, 2);
    assert_eq!(stats.streets, 1);
    assert_eq!(stats.total(), 10);
}
