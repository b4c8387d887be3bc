// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered, idempotent schema-version upgrades applied to a persisted
//! snapshot (spec.md §4.A's `Migrate`/`schema_migrations`, reimagined over
//! a JSON document rather than SQL files).

use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than the highest known version {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
}

/// One version-to-version upgrade step.
pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

/// Ordered registry of migrations, applied as a chain from a snapshot's
/// recorded version up to a target version.
#[derive(Default)]
pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
    }

    /// Walk `snapshot`'s recorded `v` field forward to `target_version`,
    /// applying each matching migration in registration order. A no-op
    /// when already at the target version.
    pub fn migrate_to(&self, mut snapshot: Value, target_version: u32) -> Result<Value, MigrationError> {
        let current = snapshot.get("v").and_then(Value::as_u64).unwrap_or(0) as u32;
        if current == target_version {
            return Ok(snapshot);
        }
        if current > target_version {
            return Err(MigrationError::TooNew(current, target_version));
        }

        let mut version = current;
        while version < target_version {
            let step = self.migrations.iter().find(|m| m.source_version() == version);
            match step {
                Some(m) => {
                    m.migrate(&mut snapshot)?;
                    version = m.target_version();
                    if let Some(obj) = snapshot.as_object_mut() {
                        obj.insert("v".into(), version.into());
                    }
                }
                None => return Err(MigrationError::NoPath(version, target_version)),
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
