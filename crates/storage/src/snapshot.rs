// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic compaction of the materialized state to disk, so a restart
//! doesn't have to replay the WAL from the beginning of time. The snapshot
//! carries a schema version header that [`crate::migration::MigrationRegistry`]
//! upgrades before the state is deserialized.

use crate::migration::MigrationRegistry;
use crate::state::{MaterializedState, CURRENT_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migration(#[from] crate::migration::MigrationError),
}

#[derive(Debug, Deserialize)]
struct SnapshotHeader {
    #[allow(dead_code)]
    v: u32,
    seq: u64,
    state: MaterializedState,
}

#[derive(Debug, Serialize)]
struct SnapshotHeaderRef<'a> {
    v: u32,
    seq: u64,
    state: &'a MaterializedState,
}

pub fn save(path: impl AsRef<Path>, state: &MaterializedState, processed_seq: u64) -> Result<(), SnapshotError> {
    let header = SnapshotHeaderRef { v: CURRENT_SCHEMA_VERSION, seq: processed_seq, state };
    let tmp = path.as_ref().with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(&header)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a snapshot, migrating it to [`CURRENT_SCHEMA_VERSION`] if it was
/// written by an older version. Returns `None` if no snapshot exists yet.
pub fn load(path: impl AsRef<Path>, registry: &MigrationRegistry) -> Result<Option<(MaterializedState, u64)>, SnapshotError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(path)?)?;
    let migrated = registry.migrate_to(raw, CURRENT_SCHEMA_VERSION)?;
    let header: SnapshotHeader = serde_json::from_value(migrated)?;
    Ok(Some((header.state, header.seq)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips_state_and_seq() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let state = MaterializedState::new();
        save(&path, &state, 42).unwrap();

        let registry = MigrationRegistry::new();
        let (_loaded, seq) = load(&path, &registry).unwrap().unwrap();
        assert_eq!(seq, 42);
    }

    #[test]
    fn load_missing_snapshot_returns_none() {
        let dir = tempdir().unwrap();
        let registry = MigrationRegistry::new();
        assert!(load(dir.path().join("absent.json"), &registry).unwrap().is_none());
    }
}
