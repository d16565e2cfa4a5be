//! Basic usage example for geotree-rs
//!
//! This example demonstrates how to:
//! - Build a small hierarchy and keep it consistent
//! - Move a state to another region
//! - See a delete refused while children remain
//! - Compute entity rollups per node

use geotree_rs::prelude::*;
use geotree_rs::rollup::{OrderRecord, StoreRecord};
use geotree_rs::EntityCatalog;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("geotree_core=info"))
        .init();

    println!("=== geotree-rs Basic Usage Example ===\n");

    // Example 1: Build the tree
    println!("--- Example 1: Create Nigeria down to a street ---");
    let h = Hierarchy::in_memory();
    let nigeria = h.create(Level::Country, "Nigeria", None)?;
    let south_west = h.create(Level::Region, "South-West", Some(&nigeria.id))?;
    let south_south = h.create(Level::Region, "South-South", Some(&nigeria.id))?;
    let lagos = h.create(Level::State, "Lagos", Some(&south_west.id))?;
    let ogun = h.create(Level::State, "Ogun", Some(&south_west.id))?;
    let ikeja = h.create(Level::City, "Ikeja", Some(&lagos.id))?;
    let street = h.create(Level::Street, "Allen Avenue", Some(&ikeja.id))?;
    let path: Vec<String> = h.path(Level::Street, &street.id)?.into_iter().map(|n| n.name).collect();
    println!("{}\n", path.join(" → "));

    // Example 2: Delete with children is refused
    println!("--- Example 2: Delete Nigeria while it has regions ---");
    match h.delete(Level::Country, &nigeria.id) {
        Err(e @ GeoError::Conflict(_)) => println!("refused: {e}\n"),
        other => println!("unexpected: {other:?}\n"),
    }

    // Example 3: Reparent
    println!("--- Example 3: Move Ogun to South-South ---");
    h.update(Level::State, &ogun.id, NodeUpdate::reparent(south_south.id.clone()))?;
    for region in [&south_west, &south_south] {
        let names: Vec<String> = h
            .children(Level::Region, &region.id)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        println!("{}: {}", region.name, names.join(", "));
    }
    println!();

    // Example 4: Rollups
    println!("--- Example 4: Store and order totals ---");
    let catalog = EntityCatalog {
        stores: vec![
            StoreRecord { id: "s1".into(), state: "Lagos".into() },
            StoreRecord { id: "s2".into(), state: "Ogun".into() },
        ],
        orders: vec![
            OrderRecord { id: "o1".into(), store_id: "s1".into() },
            OrderRecord { id: "o2".into(), store_id: "s2".into() },
            OrderRecord { id: "o3".into(), store_id: "s2".into() },
        ],
        ..Default::default()
    };
    for (level, id, name) in [
        (Level::Country, &nigeria.id, &nigeria.name),
        (Level::Region, &south_south.id, &south_south.name),
        (Level::City, &ikeja.id, &ikeja.name),
    ] {
        let rollup = h.rollup(level, id, &catalog)?;
        println!(
            "{name}: {} stores, {} orders ({:?})",
            rollup.counts.stores, rollup.counts.orders, rollup.scope
        );
    }
    println!();

    // Example 5: Audit
    println!("--- Example 5: Audit ---");
    let report = h.audit()?;
    println!("{} nodes, clean: {}", report.stats.total(), report.is_clean());

    Ok(())
}
