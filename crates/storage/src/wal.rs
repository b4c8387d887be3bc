// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of typed store operations, replayed into a
//! [`crate::state::MaterializedState`] on startup.
//!
//! One JSON object per line. A line that fails to parse (truncated write,
//! binary garbage from a crashed process) ends replay at that point rather
//! than erroring the whole log; the corrupt tail is rotated out to a
//! `.bak` file so the next open starts clean.

use crate::op::StoreOp;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const FLUSH_THRESHOLD: usize = 100;
const MAX_BACKUPS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub op: StoreOp,
}

/// An append-only log of [`StoreOp`]s plus a processed-sequence watermark.
pub struct Wal {
    path: PathBuf,
    file: BufWriter<File>,
    write_seq: u64,
    processed_seq: u64,
    /// Sequence the reader cursor for `next_unprocessed` has reached.
    read_cursor: u64,
    unflushed_count: usize,
}

impl Wal {
    /// Open (creating if absent) the log at `path`. `processed_seq` comes
    /// from the last snapshot so replay resumes after it. Corrupt trailing
    /// bytes are rotated to `.bak` (keeping up to [`MAX_BACKUPS`]).
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let (valid_entries, had_corruption) = Self::read_valid_entries(&path)?;
        if had_corruption {
            Self::rotate_backups(&path)?;
            Self::rewrite_clean(&path, &valid_entries)?;
        }

        let write_seq = valid_entries.last().map(|e| e.seq).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: BufWriter::new(file),
            write_seq,
            processed_seq,
            read_cursor: processed_seq,
            unflushed_count: 0,
        })
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn append(&mut self, op: &StoreOp) -> Result<u64, WalError> {
        self.write_seq += 1;
        let entry = WalEntry { seq: self.write_seq, op: op.clone() };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{line}")?;
        self.unflushed_count += 1;
        Ok(entry.seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.unflushed_count = 0;
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.unflushed_count >= FLUSH_THRESHOLD
    }

    /// Read the next entry past the read cursor (which starts at
    /// `processed_seq`), advancing the cursor whether or not the entry was
    /// valid. Returns `None` at EOF or on hitting a corrupt/binary line.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        let (entries, _) = Self::read_valid_entries(&self.path)?;
        let next = entries.iter().find(|e| e.seq > self.read_cursor).cloned();
        if let Some(ref entry) = next {
            self.read_cursor = entry.seq;
        }
        Ok(next)
    }

    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// All valid entries with `seq > after`, stopping at the first corrupt
    /// or binary line.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let (entries, _) = Self::read_valid_entries(&self.path)?;
        Ok(entries.into_iter().filter(|e| e.seq > after).collect())
    }

    /// Drop entries with `seq < keep_from` by rewriting the file.
    pub fn truncate_before(&mut self, keep_from: u64) -> Result<(), WalError> {
        self.flush()?;
        let (entries, _) = Self::read_valid_entries(&self.path)?;
        let kept: Vec<_> = entries.into_iter().filter(|e| e.seq >= keep_from).collect();
        Self::rewrite_clean(&self.path, &kept)?;
        self.file = BufWriter::new(OpenOptions::new().create(true).append(true).open(&self.path)?);
        Ok(())
    }

    fn read_valid_entries(path: &Path) -> Result<(Vec<WalEntry>, bool), WalError> {
        if !path.exists() {
            File::create(path)?;
            return Ok((Vec::new(), false));
        }
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut had_corruption = false;
        loop {
            let mut raw = Vec::new();
            let start = reader.stream_position()?;
            let n = reader.read_until(b'\n', &mut raw)?;
            if n == 0 {
                break;
            }
            let line = match std::str::from_utf8(&raw) {
                Ok(s) => s.trim_end(),
                Err(_) => {
                    had_corruption = true;
                    reader.seek(SeekFrom::Start(start))?;
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(_) => {
                    had_corruption = true;
                    break;
                }
            }
        }
        Ok((entries, had_corruption))
    }

    fn rewrite_clean(path: &Path, entries: &[WalEntry]) -> Result<(), WalError> {
        let tmp = path.with_extension("tmp");
        {
            let mut f = BufWriter::new(File::create(&tmp)?);
            for entry in entries {
                writeln!(f, "{}", serde_json::to_string(entry)?)?;
            }
            f.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Shift `.bak`, `.bak.2`, ... out by one slot (dropping the oldest
    /// beyond [`MAX_BACKUPS`]), then copy the current file into `.bak`.
    fn rotate_backups(path: &Path) -> Result<(), WalError> {
        for i in (1..MAX_BACKUPS).rev() {
            let from = if i == 1 { path.with_extension("bak") } else { path.with_extension(format!("bak.{i}")) };
            let to = path.with_extension(format!("bak.{}", i + 1));
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }
        if path.exists() {
            std::fs::copy(path, path.with_extension("bak"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
