//! Location of the node's `debug.log`.
//!
//! The node keeps its data under `$HDDCOIN_ROOT`, defaulting to
//! `~/.hddcoin/mainnet`, and writes its log to `<root>/log/debug.log`.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

/// Environment variable the node itself honours for its root directory.
pub const ROOT_ENV: &str = "HDDCOIN_ROOT";

const CLIENT_DIR: &str = ".hddcoin";
const NETWORK: &str = "mainnet";

/// Default `debug.log` path for this user.
pub fn default_log_path() -> PathBuf {
    log_path_in(&default_root())
}

/// `<root>/log/debug.log`
pub fn log_path_in(root: &Path) -> PathBuf {
    root.join("log").join("debug.log")
}

/// Resolve the node root from the environment.
pub fn default_root() -> PathBuf {
    let env_root = std::env::var(ROOT_ENV).ok();
    resolve_root(env_root.as_deref(), home_dir().as_deref())
}

/// Pure resolution step, split out so it can be tested without touching the
/// process environment.
fn resolve_root(env_root: Option<&str>, home: Option<&Path>) -> PathBuf {
    let home = home.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    match env_root.map(str::trim).filter(|s| !s.is_empty()) {
        Some(root) => expand_tilde(root, &home),
        None => home.join(CLIENT_DIR).join(NETWORK),
    }
}

fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// `USERPROFILE` on Windows, `HOME` elsewhere, then the platform lookup.
fn home_dir() -> Option<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| BaseDirs::new().map(|b| b.home_dir().to_path_buf()))
}
