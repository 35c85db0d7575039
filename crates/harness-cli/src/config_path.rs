use anyhow::Context;
use harness_core::config::{HarnessConfig, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};

/// Resolve the harness config file.
///
/// Priority:
/// 1. `--config` flag / `HARNESS_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `gameapi-harness.yaml`
/// 3. None: built-in defaults apply
pub fn resolve_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd)
}

fn find_upward(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}

/// Load the resolved config, or defaults when no file was found. An explicit
/// path that cannot be read is an error.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<(HarnessConfig, Option<PathBuf>)> {
    match resolve_config(explicit) {
        Some(path) => {
            let config = HarnessConfig::load(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            Ok((config, Some(path)))
        }
        None => Ok((HarnessConfig::default(), None)),
    }
}
