//! Purpose: Shared data-directory resolution for the CLI, server and `LocalClient`.
//! Exports: `default_data_dir`.
//! Invariants: Default data directory remains `~/.starnotary`.

use std::path::PathBuf;

pub fn default_data_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".starnotary")
}
