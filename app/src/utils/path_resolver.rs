use anyhow::Result;
use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "callout-wizard";
pub const LOG_DIR_NAME: &str = "CalloutWizard_Log";
pub const CONFIG_FILE_NAME: &str = "callout-wizard.toml";

/// Resolve deployment folder (absolute path)
pub fn resolve_deployment_folder() -> PathBuf {
    // Prefer the folder where the EXE is running from
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(dir) = exe_path.parent() {
            return dir.to_path_buf();
        }
    }

    // Fallback: current working directory
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve log folder (absolute path), creating it if needed.
///
/// Order: explicit override, an existing `CalloutWizard_Log/` in the working directory or one
/// of its parents, the platform's local data directory, then the deployment folder.
pub fn resolve_log_folder(override_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return ensure_dir(dir.to_path_buf());
    }

    if let Ok(cwd) = std::env::current_dir() {
        if let Some(found) = find_upwards(&cwd, LOG_DIR_NAME, 12) {
            return Ok(found);
        }
    }

    if let Some(base) = dirs::data_local_dir() {
        return ensure_dir(base.join(APP_DIR_NAME).join("logs"));
    }

    ensure_dir(resolve_deployment_folder().join(LOG_DIR_NAME))
}

/// Default folder for saved callouts.
pub fn default_data_folder() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME).join("callouts"))
        .unwrap_or_else(|| resolve_deployment_folder().join("callouts"))
}

/// Config file candidates, most specific first: working directory, then the platform config
/// directory.
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        out.push(cwd.join(CONFIG_FILE_NAME));
    }
    if let Some(cfg) = dirs::config_dir() {
        out.push(cfg.join(APP_DIR_NAME).join("config.toml"));
    }
    out
}

fn find_upwards(start: &Path, name: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    for _ in 0..max_depth {
        let candidate = dir.join(name);
        if candidate.is_dir() {
            return Some(candidate);
        }
        dir = dir.parent()?.to_path_buf();
    }
    None
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create folder {:?}: {}", dir, e))?;
    Ok(dir)
}
