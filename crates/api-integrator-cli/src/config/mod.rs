//! Configuration loading and resolution.

use std::path::PathBuf;

/// Environment variable naming the state directory.
pub const STATE_DIR_ENV: &str = "API_INTEGRATOR_DIR";

const LOCAL_STATE_DIR: &str = ".api-integrator";

/// Resolve the directory holding persisted sources, mappings and order.
///
/// Explicit flag, then `API_INTEGRATOR_DIR`, then an existing
/// `./.api-integrator`, then `~/.api-integrator`.
pub fn resolve_state_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(STATE_DIR_ENV) {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }

    let cwd_state = PathBuf::from(LOCAL_STATE_DIR);
    if cwd_state.is_dir() {
        return cwd_state;
    }

    resolve_default_state_dir()
}

fn resolve_default_state_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(home).join(LOCAL_STATE_DIR)
}
