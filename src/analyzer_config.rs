//! Process-wide configuration for the external palette analyzer (spec.md §9
//! "Global state"). Parsed once, re-parsed only when `wallust.toml`'s mtime
//! changes, guarded by double-checked locking.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

use serde::Deserialize;

/// Settings read from `wallust.toml` that affect how the analyzer is
/// invoked and how its cache is resolved.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub backend: String,
    pub palette_kind: String,
    pub saturation: Option<u8>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            backend: "wal".to_string(),
            palette_kind: "dark16".to_string(),
            saturation: None,
            cache_dir: None,
        }
    }
}

struct Cached {
    config: AnalyzerConfig,
    source_mtime: Option<SystemTime>,
}

static STATE: OnceLock<Mutex<Option<Cached>>> = OnceLock::new();

/// Returns the current analyzer config, re-parsing `path` if its mtime has
/// advanced since the last call (or if this is the first call).
pub fn get(path: &Path) -> AnalyzerConfig {
    let state = STATE.get_or_init(|| Mutex::new(None));
    let current_mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();

    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    let needs_reload = match guard.as_ref() {
        Some(cached) => cached.source_mtime != current_mtime,
        None => true,
    };

    if needs_reload {
        let parsed = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default();
        *guard = Some(Cached {
            config: parsed,
            source_mtime: current_mtime,
        });
    }

    guard.as_ref().unwrap().config.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default_config() {
        let config = get(Path::new("/does/not/exist/wallust.toml"));
        assert_eq!(config.backend, "wal");
    }

    #[test]
    fn parses_declared_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallust.toml");
        std::fs::write(&path, "backend = \"resize\"\npalette_kind = \"light16\"\n").unwrap();
        let config = get(&path);
        assert_eq!(config.backend, "resize");
        assert_eq!(config.palette_kind, "light16");
    }
}
