// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin Unix-socket client: one request in, one response out, with a
//! readable error for "the daemon isn't running" and "wrong response shape".

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use ctrlscan_wire::{read_message, write_message, Request, Response};
use tokio::net::UnixStream;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DaemonClient {
    stream: UnixStream,
}

/// Mirrors `ctrlscan-daemon`'s own state-dir resolution
/// (`CTRLSCAN_STATE_DIR` > `XDG_STATE_HOME/ctrlscan` > `~/.local/state/ctrlscan`)
/// so the CLI and daemon always agree on where the socket lives.
pub fn socket_path() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CTRLSCAN_STATE_DIR") {
        return Ok(PathBuf::from(dir).join("daemon.sock"));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ctrlscan").join("daemon.sock"));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("could not resolve a home directory"))?;
    Ok(home.join(".local/state/ctrlscan").join("daemon.sock"))
}

impl DaemonClient {
    pub async fn connect() -> Result<Self> {
        let path = socket_path()?;
        let stream = UnixStream::connect(&path).await.map_err(|e| anyhow!("could not reach ctrlscand at {}: {e}\n(is it running? try `ctrlscand &`)", path.display()))?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, request: &Request) -> Result<Response> {
        let payload = ctrlscan_wire::encode(request)?;
        tokio::time::timeout(DEFAULT_TIMEOUT, write_message(&mut self.stream, &payload)).await.map_err(|_| anyhow!("timed out sending request"))??;
        let response_bytes = tokio::time::timeout(DEFAULT_TIMEOUT, read_message(&mut self.stream)).await.map_err(|_| anyhow!("timed out waiting for a response"))??;
        let response: Response = ctrlscan_wire::decode(&response_bytes)?;
        if let Response::Error { message } = &response {
            return Err(anyhow!("{message}"));
        }
        Ok(response)
    }
}
