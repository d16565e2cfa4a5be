//! Integration tests for geotree-core.
//!
//! One test binary with a module per area:
//! - hierarchy: create / update / delete / reads against a seeded tree
//! - concurrency: racing writers and snapshot readers
//! - properties: random operation sequences keep every link bidirectional
//! - rollup: entity totals per node
//! - selector: the cascading selector against real and misbehaving fetchers
//! - snapshot: persistence round trips and refusal of broken snapshots

mod concurrency;
mod hierarchy;
mod properties;
mod rollup;
mod snapshot;
