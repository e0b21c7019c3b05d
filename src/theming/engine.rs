//! Template registry, palette lookup, atomic writes, debounced apply, and
//! reload-command dispatch (spec.md §4.7).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime};

use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::db::ImageDatabase;
use crate::error::ThemeError;
use crate::model::PaletteRecord;
use crate::theming::filters;
use crate::theming::template::{self, Segment, Template};

const RELOAD_TIMEOUT: Duration = Duration::from_secs(5);
const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(100);

/// One entry in the template registry: a named source/target pair plus an
/// optional reload command, as parsed from the `[templates]` TOML table.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateEntry {
    pub template: PathBuf,
    pub target: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub reload_command: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    templates: HashMap<String, TemplateEntry>,
}

/// Overlay shape from spec.md §6: `{enabled?, templates?: {name: bool},
/// reload_commands?: {name: command}}`.
#[derive(Debug, Default, Deserialize)]
struct OverlayFile {
    enabled: Option<bool>,
    #[serde(default)]
    templates: HashMap<String, bool>,
    #[serde(default)]
    reload_commands: HashMap<String, String>,
}

struct CachedTemplate {
    parsed: Template,
    mtime: Option<SystemTime>,
}

struct LoadedRegistry {
    entries: HashMap<String, TemplateEntry>,
    registry_mtime: Option<SystemTime>,
    overlay_mtime: Option<SystemTime>,
}

struct DebounceState {
    generation: u64,
    pending_path: Option<String>,
}

pub struct ThemingEngine<'a> {
    db: &'a ImageDatabase,
    registry_path: PathBuf,
    overlay_path: Option<PathBuf>,
    registry: Mutex<Option<LoadedRegistry>>,
    template_cache: Mutex<HashMap<PathBuf, CachedTemplate>>,
    debounce: Arc<(Mutex<DebounceState>, Condvar)>,
}

impl<'a> ThemingEngine<'a> {
    pub fn new(db: &'a ImageDatabase, registry_path: PathBuf, overlay_path: Option<PathBuf>) -> Self {
        Self {
            db,
            registry_path,
            overlay_path,
            registry: Mutex::new(None),
            template_cache: Mutex::new(HashMap::new()),
            debounce: Arc::new((
                Mutex::new(DebounceState {
                    generation: 0,
                    pending_path: None,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Looks up the palette for `image_path`. If absent, this is a no-op
    /// success per spec.md §4.7 step 1.
    pub fn apply(&self, image_path: &str) -> Result<(), ThemeError> {
        let Some(palette) = self.db.get_palette(image_path).ok().flatten() else {
            return Ok(());
        };

        let entries = self.load_registry()?;
        let mut rewritten_reload_commands = Vec::new();

        for entry in entries.values().filter(|e| e.enabled) {
            match self.render_one(entry, &palette) {
                Ok(()) => {
                    if let Some(cmd) = &entry.reload_command {
                        rewritten_reload_commands.push(cmd.clone());
                    }
                }
                Err(e) => {
                    tracing::warn!(template = %entry.template.display(), error = %e, "template write failed");
                }
            }
        }

        for cmd in rewritten_reload_commands {
            if let Err(e) = run_reload_command(&cmd) {
                tracing::warn!(command = %cmd, error = %e, "reload command failed");
            }
        }

        Ok(())
    }

    /// Coalesces rapid calls: cancels any pending timer and reschedules a
    /// fresh one `DEBOUNCE_INTERVAL` out with the latest path. Only the
    /// last call in a burst actually themes (spec.md §4.7 "Debounce").
    pub fn apply_debounced(self: &Arc<Self>, image_path: &str) {
        let (lock, cvar) = &*self.debounce;
        let my_generation = {
            let mut state = lock.lock().unwrap_or_else(|e| e.into_inner());
            state.generation += 1;
            state.pending_path = Some(image_path.to_string());
            state.generation
        };
        cvar.notify_all();

        let engine = Arc::clone(self);
        std::thread::spawn(move || {
            let (lock, cvar) = &*engine.debounce;
            let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            let (mut guard, timeout_result) = cvar
                .wait_timeout_while(guard, DEBOUNCE_INTERVAL, |state| {
                    state.generation == my_generation
                })
                .unwrap_or_else(|e| e.into_inner());

            if timeout_result.timed_out() && guard.generation == my_generation {
                if let Some(path) = guard.pending_path.take() {
                    drop(guard);
                    if let Err(e) = engine.apply(&path) {
                        tracing::warn!(error = %e, "debounced theme apply failed");
                    }
                }
            }
        });
    }

    /// Cancels any pending debounce timer and clears the pending slot.
    pub fn close(&self) {
        let (lock, cvar) = &*self.debounce;
        let mut state = lock.lock().unwrap_or_else(|e| e.into_inner());
        state.generation += 1;
        state.pending_path = None;
        cvar.notify_all();
    }

    fn render_one(&self, entry: &TemplateEntry, palette: &PaletteRecord) -> Result<(), ThemeError> {
        let template = self.cached_template(&entry.template)?;
        let rendered = render(&template, palette);

        if let Some(parent) = entry.target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let parent = entry
            .target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut tmp = NamedTempFile::new_in(&parent)?;
        use std::io::Write;
        tmp.write_all(rendered.as_bytes())?;
        tmp.persist(&entry.target)
            .map_err(|e| ThemeError::Io(e.error))?;

        Ok(())
    }

    fn cached_template(&self, path: &Path) -> Result<Template, ThemeError> {
        let mtime = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        let mut cache = self.template_cache.lock().unwrap_or_else(|e| e.into_inner());

        let needs_reload = match cache.get(path) {
            Some(cached) => cached.mtime != mtime,
            None => true,
        };

        if needs_reload {
            let source = std::fs::read_to_string(path)?;
            let parsed = template::parse(&source);
            cache.insert(
                path.to_path_buf(),
                CachedTemplate { parsed, mtime },
            );
        }

        Ok(cache.get(path).unwrap().parsed.clone())
    }

    fn load_registry(&self) -> Result<HashMap<String, TemplateEntry>, ThemeError> {
        let registry_mtime = std::fs::metadata(&self.registry_path)
            .and_then(|m| m.modified())
            .ok();
        let overlay_mtime = self
            .overlay_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok());

        let mut guard = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let needs_reload = match guard.as_ref() {
            Some(loaded) => {
                loaded.registry_mtime != registry_mtime || loaded.overlay_mtime != overlay_mtime
            }
            None => true,
        };

        if needs_reload {
            let mut entries = if self.registry_path.exists() {
                let content = std::fs::read_to_string(&self.registry_path)?;
                let parsed: RegistryFile = toml::from_str(&content)
                    .map_err(|e| ThemeError::OverlayParse(e.to_string()))?;
                parsed.templates
            } else {
                HashMap::new()
            };

            let mut globally_enabled = true;
            if let Some(overlay_path) = &self.overlay_path {
                if overlay_path.exists() {
                    let content = std::fs::read_to_string(overlay_path)?;
                    let overlay: OverlayFile = serde_json::from_str(&content)
                        .map_err(|e| ThemeError::OverlayParse(e.to_string()))?;
                    if let Some(enabled) = overlay.enabled {
                        globally_enabled = enabled;
                    }
                    for (name, enabled) in overlay.templates {
                        if let Some(entry) = entries.get_mut(&name) {
                            entry.enabled = enabled;
                        }
                    }
                    for (name, command) in overlay.reload_commands {
                        if let Some(entry) = entries.get_mut(&name) {
                            entry.reload_command = Some(command);
                        }
                    }
                }
            }

            if !globally_enabled {
                for entry in entries.values_mut() {
                    entry.enabled = false;
                }
            }

            *guard = Some(LoadedRegistry {
                entries,
                registry_mtime,
                overlay_mtime,
            });
        }

        Ok(guard.as_ref().unwrap().entries.clone())
    }
}

/// Renders `template` against `palette`, resolving missing identifiers
/// per spec.md §4.7's fallback rule (`color7 → foreground`,
/// `cursor → foreground`, any other `colorN → background`).
fn render(template: &Template, palette: &PaletteRecord) -> String {
    let lookup = |identifier: &str| resolve(identifier, palette);

    let mut out = String::new();
    for segment in &template.segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Variable { identifier, filters: chain } => {
                let value = lookup(identifier);
                out.push_str(&filters::apply(&value, chain, &lookup));
            }
        }
    }
    out
}

fn resolve(identifier: &str, palette: &PaletteRecord) -> String {
    if identifier == "background" {
        return palette.background.clone();
    }
    if identifier == "foreground" {
        return palette.foreground.clone();
    }
    if identifier == "cursor" {
        return palette.cursor.clone();
    }
    if let Some(index) = identifier.strip_prefix("color").and_then(|n| n.parse::<usize>().ok()) {
        if index == 7 {
            return palette.foreground.clone();
        }
        if let Some(color) = palette.color(index) {
            return color.to_string();
        }
    }
    palette.background.clone()
}

fn run_reload_command(command: &str) -> Result<(), ThemeError> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return Ok(());
    };
    let child = Command::new(program)
        .args(parts)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let status = wait_bounded(child, RELOAD_TIMEOUT)?;
    if !status.success() {
        return Err(ThemeError::ReloadCommandFailed {
            name: command.to_string(),
            message: format!("exited with status {:?}", status.code()),
        });
    }
    Ok(())
}

fn wait_bounded(mut child: Child, timeout: Duration) -> Result<std::process::ExitStatus, ThemeError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ThemeError::ReloadCommandFailed {
                name: "reload".to_string(),
                message: "timed out".to_string(),
            });
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
