// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared subprocess plumbing for the real scanner adapters: binary/docker
//! availability probes and a capture-stdout-or-error run helper.

use std::path::Path;
use std::process::Output;
use tokio::process::Command;

/// True if `bin` resolves on `PATH` and can be invoked with `--version`
/// (or an equivalent no-op flag) without erroring.
pub async fn binary_available(bin: &str, probe_args: &[&str]) -> bool {
    Command::new(bin).args(probe_args).kill_on_drop(true).output().await.map(|o| o.status.success()).unwrap_or(false)
}

/// True if the `docker` CLI itself is callable. Adapters that want to run
/// via Docker still need their own image to exist, but pulling happens at
/// `docker run` time, so this only checks the daemon is reachable.
pub async fn docker_available() -> bool {
    Command::new("docker").arg("info").kill_on_drop(true).output().await.map(|o| o.status.success()).unwrap_or(false)
}

/// Run `bin args...` in `cwd`, returning captured output regardless of exit
/// code — callers decide what a nonzero status means for their scanner.
pub async fn run_capture(bin: &str, args: &[&str], cwd: &Path) -> std::io::Result<Output> {
    Command::new(bin).args(args).current_dir(cwd).kill_on_drop(true).output().await
}

/// Run the adapter's image via `docker run --rm -v cwd:/src <image> args...`,
/// mounting the checkout read-write so scanners that write cache files
/// alongside their report don't fail.
pub async fn run_docker_capture(image: &str, args: &[&str], cwd: &Path) -> std::io::Result<Output> {
    let mount = format!("{}:/src", cwd.display());
    let mut full_args = vec!["run", "--rm", "-v", mount.as_str(), "-w", "/src", image];
    full_args.extend_from_slice(args);
    Command::new("docker").args(full_args).kill_on_drop(true).output().await
}
