//! Collaborator interfaces the core consumes but does not implement
//! (`spec.md` §6 "Collaborator interfaces the core consumes"). Production
//! implementations live in `cmd.rs` (command runner) and `file_watcher.rs`
//! (file watcher); the OS event tap and keyboard layout are host-provided
//! and out of this crate's scope per `spec.md` §1's non-goals.

use mkhd_parser::model::KeyEvent;

/// `command_runner.run(string)` — fires-and-forgets. `spec.md` §6.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str);
}

/// A `CommandRunner` that does nothing, for tests and `--key`/`--text`
/// one-shot invocations that never trigger a `Command` action.
pub struct NullCommandRunner;

impl CommandRunner for NullCommandRunner {
    fn run(&self, _command: &str) {}
}

/// `event_source` — delivers `{event, focused_process_name}` tuples.
/// `spec.md` §6.
pub trait EventSource {
    /// Blocks until the next event is available, or returns `None` once the
    /// source is exhausted (used by `--observe`/one-shot CLI modes; the
    /// live daemon's source never returns `None`).
    fn next_event(&mut self) -> Option<(KeyEvent, String)>;
}

/// `file_watcher` — optionally notifies of config file changes. `spec.md`
/// §6. Feature-gated by `watch`; when disabled, only `request_reload()` via
/// `SIGUSR1` is available.
pub trait FileWatcher {
    /// Non-blocking: `true` iff a watched path has changed since the last
    /// call.
    fn poll_changed(&mut self) -> bool;
}
