//! geotree: command-line interface for geotree-core
//!
//! Loads a hierarchy snapshot, runs one command against it and, when the
//! command changed the tree, writes the snapshot back.
//!
//! Usage examples
//! --------------
//!
//! - Start a tree and add to it
//!   $ geotree create country Nigeria
//!   $ geotree create region South-West --parent <nigeria-id>
//!
//! - Browse
//!   $ geotree list countries
//!   $ geotree children country <nigeria-id>
//!   $ geotree drill Nigeria South-West Lagos
//!
//! - Move a state to another region
//!   $ geotree update state <lagos-id> --parent <region-id>
//!
//! - Totals per node from an entity export
//!   $ geotree rollup region <id> --entities entities.json
//!
//! Data source
//! -----------
//!
//! `--data <path>` (or `GEOTREE_DATA`) names the snapshot; it defaults to
//! `geotree.bin` in the current directory. A missing file starts an empty
//! tree. `RUST_LOG` controls log output, which goes to stderr.
mod args;

use crate::args::{CliArgs, Commands};
use anyhow::Context;
use clap::Parser;
use geotree_core::prelude::*;
use geotree_core::{
    ApiResponse, CreateRequest, EngineConfig, EntityCatalog, SelectorConfig, UpdateRequest,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// What a command produced: a JSON payload plus its human rendering.
struct Report {
    data: Value,
    text: String,
}

impl Report {
    fn new<T: Serialize>(data: &T, text: String) -> Self {
        Self {
            data: serde_json::to_value(data).unwrap_or(Value::Null),
            text,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("geotree_core=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let data_path = args
        .data
        .clone()
        .unwrap_or_else(|| PathBuf::from(Hierarchy::default_dataset_filename()));
    let mut config = EngineConfig::default();
    if let Some(n) = args.max_retries {
        config.max_retries = n;
    }
    let h = open(&data_path, config)?;

    let mutates = args.command.mutates();
    let result = run(&h, &args);
    if args.json {
        let response = envelope(&args.command, result);
        println!("{}", serde_json::to_string_pretty(&response)?);
        if !response.success {
            std::process::exit(1);
        }
    } else {
        println!("{}", result?.text);
    }

    if mutates {
        h.save_to_path(&data_path)
            .with_context(|| format!("saving snapshot to {}", data_path.display()))?;
    }
    Ok(())
}

fn open(path: &Path, config: EngineConfig) -> anyhow::Result<Hierarchy> {
    if !path.exists() {
        warn!(path = %path.display(), "no snapshot found, starting an empty tree");
        return Ok(Hierarchy::with_config(Default::default(), config));
    }
    let loaded = Hierarchy::load_from_path(path)
        .with_context(|| format!("loading snapshot from {}", path.display()))?;
    Ok(Hierarchy::with_config(loaded.into_store(), config))
}

fn run(h: &Hierarchy, args: &CliArgs) -> geotree_core::Result<Report> {
    match &args.command {
        Commands::Stats => {
            let stats = h.stats()?;
            let mut text = String::from("Hierarchy statistics:");
            for level in Level::ALL {
                text.push_str(&format!("\n  {:<10} {}", level.collection(), stats.get(level)));
            }
            Ok(Report::new(&stats, text))
        }

        Commands::List { level, name } => {
            let nodes = match name {
                Some(q) => h
                    .list(*level)?
                    .into_iter()
                    .filter(|n| n.name_contains(q))
                    .collect(),
                None => h.list(*level)?,
            };
            let text = nodes
                .iter()
                .map(|n| format!("{}  {}", n.id, n.name))
                .collect::<Vec<_>>()
                .join("\n");
            let summaries: Vec<ChildSummary> = nodes.iter().map(ChildSummary::from).collect();
            Ok(Report::new(&summaries, text))
        }

        Commands::Children { level, id } => {
            let children = h.children(*level, id)?;
            Ok(Report::new(&children, render_summaries(&children)))
        }

        Commands::Show { level, id } => {
            let view = h.view(*level, id)?;
            let path = h
                .path(*level, id)?
                .iter()
                .map(|n| n.name.as_str())
                .collect::<Vec<_>>()
                .join(" → ");
            let mut text = format!("{} {}\n  id: {}\n  path: {path}", view.level, view.name, view.id);
            if let Some(child_level) = level.child() {
                text.push_str(&format!("\n  {}: {}", child_level.collection(), view.children.len()));
                for c in &view.children {
                    text.push_str(&format!("\n    - {} ({})", c.name, c.id));
                }
            }
            Ok(Report::new(&view, text))
        }

        Commands::Create { level, name, parent } => {
            let node = h.create_from(CreateRequest {
                level: *level,
                name: name.clone(),
                parent_id: parent.clone(),
            })?;
            let text = format!("created {} {} ({})", node.level, node.name, node.id);
            Ok(Report::new(&node, text))
        }

        Commands::Update {
            level,
            id,
            name,
            parent,
        } => {
            let update = UpdateRequest {
                name: name.clone(),
                parent_id: parent.clone(),
            };
            let node = h.update(*level, id, update.into())?;
            let text = format!("updated {} {} ({})", node.level, node.name, node.id);
            Ok(Report::new(&node, text))
        }

        Commands::Delete { level, id } => {
            let node = h.delete(*level, id)?;
            let text = format!("deleted {} {} ({})", node.level, node.name, node.id);
            Ok(Report::new(&node, text))
        }

        Commands::Rollup {
            level,
            id,
            entities,
            kind,
        } => {
            let catalog = read_catalog(entities)?;
            let rollup = h.rollup(*level, id, &catalog)?;
            let text = match kind {
                Some(kind) => format!("{kind}: {}", rollup.counts.get(*kind)),
                None => geotree_core::EntityKind::ALL
                    .iter()
                    .map(|k| format!("{k}: {}", rollup.counts.get(*k)))
                    .collect::<Vec<_>>()
                    .join("\n"),
            };
            Ok(Report::new(&rollup, text))
        }

        Commands::Audit => {
            let report = h.audit()?;
            let text = if report.is_clean() {
                format!("ok: {} nodes, every link is bidirectional", report.stats.total())
            } else {
                report
                    .violations
                    .iter()
                    .map(|v| format!("violation: {v}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let violations: Vec<String> = report.violations.iter().map(ToString::to_string).collect();
            Ok(Report::new(&violations, text))
        }

        Commands::Drill { names } => {
            let mut selector_config = SelectorConfig::default();
            if let Some(ms) = args.fetch_timeout_ms {
                selector_config.fetch_timeout = Duration::from_millis(ms);
            }
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            let selector = runtime.block_on(drill(h, names, selector_config))?;
            let path: Vec<&ChildSummary> = selector.selection().path();
            let focus = selector.focus_level();
            let mut text = path
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(" → ");
            text.push_str(&format!("\n{}:\n{}", focus.collection(), render_summaries(selector.items(focus))));
            let data = serde_json::json!({
                "path": path,
                "level": focus,
                "items": selector.items(focus),
            });
            Ok(Report { data, text })
        }
    }
}

/// Wraps a command's outcome in the JSON envelope; a successful create
/// reports 201.
fn envelope(command: &Commands, result: geotree_core::Result<Report>) -> ApiResponse<Value> {
    let result = result.map(|r| r.data);
    match command {
        Commands::Create { .. } => ApiResponse::from_created(result),
        _ => result.into(),
    }
}

/// Selects each name in turn, starting from the country list.
async fn drill(
    h: &Hierarchy,
    names: &[String],
    config: SelectorConfig,
) -> geotree_core::Result<CascadingSelector> {
    let mut selector = CascadingSelector::new(config);
    selector.refresh_countries(h).await;
    for name in names {
        if let Some((level, msg)) = selector.error() {
            return Err(GeoError::Fetch(format!("loading {}: {msg}", level.collection())));
        }
        let level = selector.focus_level();
        let id = selector
            .items(level)
            .iter()
            .find(|c| c.is_named(name))
            .map(|c| c.id.clone())
            .ok_or_else(|| GeoError::Validation(format!("no {level} named {name:?}")))?;
        selector.select_and_fetch(h, level, &id).await?;
        info!(kind = %level, %name, "selected");
    }
    if let Some((level, msg)) = selector.error() {
        return Err(GeoError::Fetch(format!("loading {}: {msg}", level.collection())));
    }
    Ok(selector)
}

fn read_catalog(path: &Path) -> geotree_core::Result<EntityCatalog> {
    let raw = std::fs::read(path)?;
    serde_json::from_slice(&raw)
        .map_err(|e| GeoError::Validation(format!("{}: {e}", path.display())))
}

fn render_summaries(items: &[ChildSummary]) -> String {
    if items.is_empty() {
        return "(none)".to_owned();
    }
    items
        .iter()
        .map(|c| format!("{}  {} [{}]", c.id, c.name, c.child_count))
        .collect::<Vec<_>>()
        .join("\n")
}
