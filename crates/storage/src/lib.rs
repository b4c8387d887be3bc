// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistent store: a write-ahead log of [`op::StoreOp`]s replayed
//! into a [`state::MaterializedState`], exposed through the transactional
//! [`store::Store`] façade. Implements spec.md §4.A's row-store contract
//! without committing to a specific SQL engine.
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod migration;
pub mod op;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod wal;

pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use op::StoreOp;
pub use state::MaterializedState;
pub use store::Store;
pub use wal::{Wal, WalEntry, WalError};
