// crates/geotree-core/src/loader/mod.rs

//! # Snapshot Loader
//!
//! Handles the physical layer (files, compression) and delegates the payload
//! to bincode or, with the `json` feature, to serde_json.
//!
//! A snapshot is the five record sets as plain node lists. Loading one
//! rebuilds a [`MemoryStore`] and audits it; a snapshot whose links disagree
//! is refused with `Inconsistent` rather than repaired.

use crate::common::Level;
use crate::engine::Hierarchy;
use crate::error::{GeoError, Result};
use crate::model::Node;
use crate::store::MemoryStore;
use crate::traits::DocumentStore;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{error, info};

/// Persisted form of the hierarchy, one list per record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub countries: Vec<Node>,
    pub regions: Vec<Node>,
    pub states: Vec<Node>,
    pub cities: Vec<Node>,
    pub streets: Vec<Node>,
}

impl Snapshot {
    pub fn nodes(&self, level: Level) -> &[Node] {
        match level {
            Level::Country => &self.countries,
            Level::Region => &self.regions,
            Level::State => &self.states,
            Level::City => &self.cities,
            Level::Street => &self.streets,
        }
    }

    pub fn nodes_mut(&mut self, level: Level) -> &mut Vec<Node> {
        match level {
            Level::Country => &mut self.countries,
            Level::Region => &mut self.regions,
            Level::State => &mut self.states,
            Level::City => &mut self.cities,
            Level::Street => &mut self.streets,
        }
    }

    pub fn len(&self) -> usize {
        Level::ALL.into_iter().map(|l| self.nodes(l).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every node, with its level checked against the list it was found in.
    fn into_nodes(self) -> Result<Vec<Node>> {
        let mut out = Vec::with_capacity(self.len());
        for (level, nodes) in [
            (Level::Country, self.countries),
            (Level::Region, self.regions),
            (Level::State, self.states),
            (Level::City, self.cities),
            (Level::Street, self.streets),
        ] {
            if let Some(node) = nodes.iter().find(|n| n.level != level) {
                return Err(GeoError::Inconsistent {
                    level: node.level,
                    id: node.id.clone(),
                    detail: format!("stored in the {} record set", level.collection()),
                });
            }
            out.extend(nodes);
        }
        Ok(out)
    }
}

/// On-disk payload encoding, picked from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Binary,
    #[cfg(feature = "json")]
    Json,
}

impl Encoding {
    fn of(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match name.ends_with(".json") || name.ends_with(".json.gz") {
            #[cfg(feature = "json")]
            true => Encoding::Json,
            #[cfg(not(feature = "json"))]
            true => {
                tracing::warn!(path = %path.display(), "json snapshots need the `json` feature; using the binary format");
                Encoding::Binary
            }
            false => Encoding::Binary,
        }
    }
}

/// Binary snapshots are gzipped whenever `compact` is on; JSON only when
/// the file name asks for it.
fn is_compressed(path: &Path, encoding: Encoding) -> bool {
    let gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    match encoding {
        Encoding::Binary => cfg!(feature = "compact") || gz,
        #[cfg(feature = "json")]
        Encoding::Json => gz,
    }
}

impl Hierarchy<MemoryStore> {
    pub fn default_dataset_filename() -> &'static str {
        "geotree.bin"
    }

    /// Builds an in-memory hierarchy from a snapshot and audits it.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let store = MemoryStore::from_nodes(snapshot.into_nodes()?)?;
        let hierarchy = Hierarchy::new(store);
        let report = hierarchy.audit()?;
        if !report.is_clean() {
            error!(
                violations = report.violations.len(),
                "refusing snapshot with broken links"
            );
        }
        report.into_result()?;
        Ok(hierarchy)
    }

    /// Loads a snapshot written by [`Hierarchy::save_to_path`].
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = read_snapshot(path)?;
        let hierarchy = Self::from_snapshot(snapshot)?;
        info!(path = %path.display(), nodes = hierarchy.stats()?.total(), "snapshot loaded");
        Ok(hierarchy)
    }
}

impl<S: DocumentStore> Hierarchy<S> {
    /// Copies every record set, each ordered by id.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();
        for level in Level::ALL {
            let mut nodes: Vec<Node> = self.store().scan(level)?.into_iter().map(|v| v.node).collect();
            nodes.sort_by(|a, b| a.id.cmp(&b.id));
            *snapshot.nodes_mut(level) = nodes;
        }
        Ok(snapshot)
    }

    /// Writes a snapshot next to `path` and renames it into place, so a
    /// reader never sees a half-written file.
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot()?;
        let file_name = path
            .file_name()
            .ok_or_else(|| GeoError::Validation(format!("{} is not a file path", path.display())))?;
        let tmp = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));

        write_snapshot(&tmp, &snapshot).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), nodes = snapshot.len(), "snapshot saved");
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let encoding = Encoding::of(path);
    let mut reader = open_stream(path, is_compressed(path, encoding))?;
    match encoding {
        Encoding::Binary => Ok(bincode::deserialize_from(&mut reader)?),
        #[cfg(feature = "json")]
        Encoding::Json => Ok(serde_json::from_reader(reader)?),
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let encoding = Encoding::of(path);
    let mut writer = create_stream(path, is_compressed(path, encoding))?;
    match encoding {
        Encoding::Binary => bincode::serialize_into(&mut writer, snapshot)?,
        #[cfg(feature = "json")]
        Encoding::Json => serde_json::to_writer(&mut writer, snapshot)?,
    }
    writer.finish()
}

/// Opens a file, buffers it, and wraps it in a gzip decoder when asked to.
fn open_stream(path: &Path, compressed: bool) -> Result<Box<dyn Read>> {
    let reader = BufReader::new(File::open(path)?);
    if !compressed {
        return Ok(Box::new(reader));
    }

    #[cfg(feature = "compact")]
    {
        use flate2::read::GzDecoder;
        Ok(Box::new(GzDecoder::new(reader)))
    }

    #[cfg(not(feature = "compact"))]
    {
        Err(GeoError::Validation(format!(
            "{} is gzipped; enable the `compact` feature to read it",
            path.display()
        )))
    }
}

/// Write side of [`open_stream`]; `finish` flushes every layer.
enum SnapshotWriter {
    Plain(BufWriter<File>),
    #[cfg(feature = "compact")]
    Gzip(flate2::write::GzEncoder<BufWriter<File>>),
}

impl SnapshotWriter {
    fn finish(self) -> Result<()> {
        let file = match self {
            SnapshotWriter::Plain(w) => w.into_inner().map_err(|e| e.into_error())?,
            #[cfg(feature = "compact")]
            SnapshotWriter::Gzip(w) => w.finish()?.into_inner().map_err(|e| e.into_error())?,
        };
        file.sync_all()?;
        Ok(())
    }
}

impl Write for SnapshotWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            SnapshotWriter::Plain(w) => w.write(buf),
            #[cfg(feature = "compact")]
            SnapshotWriter::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            SnapshotWriter::Plain(w) => w.flush(),
            #[cfg(feature = "compact")]
            SnapshotWriter::Gzip(w) => w.flush(),
        }
    }
}

fn create_stream(path: &Path, compressed: bool) -> Result<SnapshotWriter> {
    let writer = BufWriter::new(File::create(path)?);
    if !compressed {
        return Ok(SnapshotWriter::Plain(writer));
    }

    #[cfg(feature = "compact")]
    {
        use flate2::{write::GzEncoder, Compression};
        Ok(SnapshotWriter::Gzip(GzEncoder::new(writer, Compression::default())))
    }

    #[cfg(not(feature = "compact"))]
    {
        Err(GeoError::Validation(format!(
            "{} asks for gzip; enable the `compact` feature to write it",
            path.display()
        )))
    }
}
