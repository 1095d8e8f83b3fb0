use anyhow::{Context, Result};
use gitpulse_core::domain::{Event, EventId, RepoId};
use gitpulse_core::ports::{Snapshot, SnapshotEntry, SnapshotStore};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File-based snapshot store that implements SnapshotStore.
///
/// The file is a JSON array of `[repository, [event, ...]]` pairs, least
/// recently touched repository first, events oldest first.
pub struct FileSnapshotStore {
    snapshot_path: PathBuf,
}

impl FileSnapshotStore {
    pub fn with_path<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .snapshot_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.snapshot_path.with_file_name(name)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Snapshot> {
        let contents = match fs::read_to_string(&self.snapshot_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", self.snapshot_path.display());
                return Ok(Snapshot::default());
            }
            Err(e) => {
                warn!("Failed to read snapshot {}: {}", self.snapshot_path.display(), e);
                return Ok(Snapshot::default());
            }
        };

        let raw: Value = match serde_json::from_str(&contents) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to parse snapshot {}: {}", self.snapshot_path.display(), e);
                return Ok(Snapshot::default());
            }
        };

        Ok(decode_snapshot(raw))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.snapshot_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .context("Failed to create snapshot directory")?;
            }
        }

        let entries: Vec<(&str, &[Event])> = snapshot
            .repositories
            .iter()
            .map(|entry| (entry.repo.as_str(), entry.events.as_slice()))
            .collect();
        let contents = serde_json::to_string(&entries)
            .context("Failed to serialize snapshot")?;

        // Write beside the target and rename so a crash never leaves half a file
        let temp_path = self.temp_path();
        fs::write(&temp_path, contents)
            .with_context(|| format!("Failed to write snapshot file: {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.snapshot_path)
            .with_context(|| format!("Failed to replace snapshot file: {}", self.snapshot_path.display()))?;

        Ok(())
    }
}

fn decode_snapshot(raw: Value) -> Snapshot {
    let Value::Array(entries) = raw else {
        warn!("Snapshot is not a list of repositories, ignoring it");
        return Snapshot::default();
    };

    let mut snapshot = Snapshot::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match decode_entry(entry) {
            Some(entry) => snapshot.repositories.push(entry),
            None => warn!("Invalid format for snapshot entry {}, skipping it", index),
        }
    }
    snapshot
}

fn decode_entry(entry: Value) -> Option<SnapshotEntry> {
    let Value::Array(pair) = entry else {
        return None;
    };
    let [Value::String(name), Value::Array(records)] = <[Value; 2]>::try_from(pair).ok()? else {
        return None;
    };
    let repo = RepoId::parse(&name).ok()?;

    let mut seen: HashSet<EventId> = HashSet::new();
    let mut events = Vec::with_capacity(records.len());
    for record in records {
        match serde_json::from_value::<Event>(record) {
            Ok(event) if seen.insert(event.id.clone()) => events.push(event),
            Ok(event) => warn!("Duplicate event {} for repository {}, skipping it", event.id, repo),
            Err(e) => warn!("Invalid event record for repository {}: {}", repo, e),
        }
    }

    Some(SnapshotEntry { repo, events })
}
