//! Ruleset driver API consumed by the host (`spec.md` §6 "Ruleset driver
//! API"): `load_config`, `dispatch`, `request_reload`. Owns the single
//! mutable `EngineState` (`spec.md` §9 "Global mutable state") and the
//! collaborators the core consumes but does not implement.

use crate::collaborators::{CommandRunner, EventSource};
use anyhow::{Context, Result};
use mkhd_parser::keys::KeycodeMap;
use mkhd_parser::model::KeyEvent;
use mkhd_parser::EngineState;
use rustc_hash::FxHashMap as HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Daemon {
    state: EngineState,
    config_path: PathBuf,
    keycode_map: Box<dyn KeycodeMap>,
    command_runner: Box<dyn CommandRunner>,
    event_source: Option<Box<dyn EventSource>>,
    reload_requested: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(
        config_path: PathBuf,
        keycode_map: Box<dyn KeycodeMap>,
        command_runner: Box<dyn CommandRunner>,
    ) -> Result<Self> {
        let mut daemon = Self {
            state: empty_state(keycode_map.as_ref()),
            config_path,
            keycode_map,
            command_runner,
            event_source: None,
            reload_requested: Arc::new(AtomicBool::new(false)),
        };
        daemon.load_config()?;
        Ok(daemon)
    }

    /// Attaches the collaborator that delivers `{event, focused_process_name}`
    /// tuples (`spec.md` §6). Not required for `--key`/`--text`/`--observe`
    /// one-shot CLI modes, which never call `next_event`.
    pub fn with_event_source(mut self, source: Box<dyn EventSource>) -> Self {
        self.event_source = Some(source);
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Blocks on the attached `event_source` until an event or end-of-stream
    /// arrives. Panics if no event source was attached via
    /// `with_event_source` — a programmer error, not a runtime condition.
    pub fn next_event(&mut self) -> Option<(KeyEvent, String)> {
        self.event_source
            .as_mut()
            .expect("next_event called without an attached event source")
            .next_event()
    }

    /// A handle external callers (the `SIGUSR1` handler, the file watcher)
    /// can set without touching `EngineState` directly. `spec.md` §5
    /// "Shared resource discipline".
    pub fn reload_handle(&self) -> Arc<AtomicBool> {
        self.reload_requested.clone()
    }

    /// Idempotent. `spec.md` §6 `request_reload()`.
    pub fn request_reload(&self) {
        self.reload_requested.store(true, Ordering::SeqCst);
    }

    pub fn take_reload_request(&self) -> bool {
        self.reload_requested.swap(false, Ordering::SeqCst)
    }

    /// `spec.md` §6 `load_config(path) -> Result`: replace active state
    /// with a freshly parsed config read from `self.config_path`. On parse
    /// or I/O error for the root file, `self.state` is left untouched.
    pub fn load_config(&mut self) -> Result<()> {
        let path = self.config_path.clone();
        let root_source = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let root_dir = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

        let mut dirs: HashMap<String, PathBuf> = HashMap::default();
        dirs.insert("<root>".to_string(), root_dir.clone());

        let keycode_map = self.keycode_map.as_ref();
        let new_state = EngineState::load(&root_source, keycode_map, |current_id, raw_path| {
            let base = dirs.get(current_id).cloned().unwrap_or_else(|| root_dir.clone());
            let candidate = PathBuf::from(raw_path);
            let resolved = if candidate.is_absolute() { candidate } else { base.join(candidate) };
            match std::fs::read_to_string(&resolved) {
                Ok(content) => {
                    let id = resolved.to_string_lossy().to_string();
                    let dir = resolved.parent().map(PathBuf::from).unwrap_or_else(|| base.clone());
                    dirs.insert(id.clone(), dir);
                    Some((id, content))
                }
                Err(e) => {
                    log::warn!("skipping unreadable '.load' target {}: {e}", resolved.display());
                    None
                }
            }
        })
        .map_err(|e| e.with_source(path.display().to_string(), &root_source))?;

        self.state = new_state;
        log::info!("loaded configuration from {}", path.display());
        Ok(())
    }

    /// `spec.md` §6 `dispatch(event, process_name) -> bool`. The blocklist
    /// short-circuit named in `spec.md` §4.D happens here, before the
    /// dispatcher ever sees the event.
    pub fn dispatch(&mut self, event: KeyEvent, process_name: &str) -> bool {
        if self.state.blocklist.contains(&process_name.to_lowercase()) {
            return false;
        }
        crate::engine::dispatch(&mut self.state, event, process_name, self.command_runner.as_ref())
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }
}

/// A placeholder state for the brief window between `Daemon` construction
/// and the first successful `load_config`; never dispatched against.
fn empty_state(keycode_map: &dyn KeycodeMap) -> EngineState {
    EngineState::load("", keycode_map, |_, _| None).expect("empty source always parses")
}
