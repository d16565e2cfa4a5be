use crate::helpers::{assert_consistent, fixture};
use geotree_core::{GeoError, Hierarchy, Level};
use tempfile::TempDir;

#[test]
fn binary_snapshot_round_trips() {
    let f = fixture();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(Hierarchy::default_dataset_filename());

    f.h.save_to_path(&path).unwrap();
    assert!(!dir.path().join("geotree.bin.tmp").exists());

    let loaded = Hierarchy::load_from_path(&path).unwrap();
    assert_eq!(loaded.snapshot().unwrap(), f.h.snapshot().unwrap());
    assert_consistent(&loaded);

    // The loaded tree is fully writable.
    let abeokuta = loaded.create(Level::City, "Abeokuta", Some(&f.ogun.id)).unwrap();
    assert!(loaded.get(Level::State, &f.ogun.id).unwrap().lists_child(&abeokuta.id));
}

#[test]
fn saving_over_an_existing_snapshot_replaces_it() {
    let f = fixture();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tree.bin");

    f.h.save_to_path(&path).unwrap();
    f.h.delete(Level::Street, &f.allen_avenue.id).unwrap();
    f.h.save_to_path(&path).unwrap();

    let loaded = Hierarchy::load_from_path(&path).unwrap();
    assert_eq!(loaded.stats().unwrap().streets, 0);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Hierarchy::load_from_path(dir.path().join("absent.bin")),
        Err(GeoError::Io(_))
    ));
}

#[test]
fn garbage_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.bin");
    std::fs::write(&path, b"definitely not a snapshot").unwrap();
    assert!(Hierarchy::load_from_path(&path).is_err());
}

#[cfg(feature = "json")]
mod json {
    use super::*;

    #[test]
    fn json_snapshot_round_trips() {
        let f = fixture();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tree.json");
        f.h.save_to_path(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["countries"].as_array().unwrap().len(), 2);

        let loaded = Hierarchy::load_from_path(&path).unwrap();
        assert_eq!(loaded.snapshot().unwrap(), f.h.snapshot().unwrap());
    }

    #[test]
    fn snapshot_with_one_sided_link_is_refused() {
        let f = fixture();
        let mut snapshot = f.h.snapshot().unwrap();
        // Lagos forgets Ikeja, Ikeja still points at Lagos.
        let lagos = snapshot
            .states
            .iter_mut()
            .find(|s| s.id == f.lagos.id)
            .unwrap();
        lagos.children.clear();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        match Hierarchy::load_from_path(&path) {
            Err(GeoError::Inconsistent { id, .. }) => assert_eq!(id, f.ikeja.id),
            other => panic!("expected Inconsistent, got {other:?}"),
        }
    }
}
