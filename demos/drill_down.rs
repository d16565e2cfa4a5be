//! Cascading selector example for geotree-rs
//!
//! This example demonstrates how to:
//! - Drill down country → region → state → city
//! - Jump back with a breadcrumb
//! - Watch a late response get discarded

use geotree_rs::prelude::*;
use geotree_rs::ApplyOutcome;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("geotree_core=debug"))
        .init();

    let h = Hierarchy::in_memory();
    let ng = h.create(Level::Country, "Nigeria", None)?;
    let gh = h.create(Level::Country, "Ghana", None)?;
    let sw = h.create(Level::Region, "South-West", Some(&ng.id))?;
    h.create(Level::Region, "Ashanti", Some(&gh.id))?;
    let lagos = h.create(Level::State, "Lagos", Some(&sw.id))?;
    for city in ["Ikeja", "Epe", "Badagry"] {
        h.create(Level::City, city, Some(&lagos.id))?;
    }

    println!("=== geotree-rs Cascading Selector Example ===\n");
    let mut selector = CascadingSelector::default();
    selector.refresh_countries(&h).await;
    print_level(&selector, Level::Country);

    for (level, id) in [(Level::Country, &ng.id), (Level::Region, &sw.id), (Level::State, &lagos.id)] {
        selector.select_and_fetch(&h, level, id).await?;
        print_level(&selector, selector.focus_level());
    }

    println!("--- Breadcrumb back to the country ---");
    let refetch = selector.breadcrumb(Some(Level::Country))?;
    println!("re-fetch needed: {}", refetch.is_some());
    print_level(&selector, selector.focus_level());

    println!("--- Switch countries before the first answer lands ---");
    let slow = selector.select(Level::Country, &ng.id)?;
    let fast = selector.select(Level::Country, &gh.id)?;
    let fast = fast.run(&h).await;
    let slow = slow.run(&h).await;
    assert_eq!(selector.apply(fast), ApplyOutcome::Applied);
    assert_eq!(selector.apply(slow), ApplyOutcome::Stale);
    print_level(&selector, Level::Region);

    Ok(())
}

fn print_level(selector: &CascadingSelector, level: Level) {
    let names: Vec<&str> = selector.items(level).iter().map(|c| c.name.as_str()).collect();
    println!("{}: {}\n", level.collection(), names.join(", "));
}
