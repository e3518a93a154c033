//! Hot-reload file watcher (`spec.md` §6 `file_watcher`), an ambient
//! convenience layered on top of the core's `request_reload` oracle —
//! `spec.md` §1 explicitly scopes "file-watching / hot-reload plumbing"
//! out of the core, so this is purposefully thin: it only ever sets the
//! same `reload_requested` flag a `SIGUSR1` does, never touching
//! `EngineState` directly (`spec.md` §5 "Shared resource discipline").
//!
//! Polls `mtime` rather than using a platform notification API — the
//! teacher's `notify_debouncer_mini`-based watcher (`src/file_watcher.rs`)
//! is unneeded machinery here since mkhd only ever watches a handful of
//! config files, not a directory tree.

use crate::collaborators::FileWatcher;
use std::path::PathBuf;
use std::time::SystemTime;

pub struct PollingFileWatcher {
    paths: Vec<PathBuf>,
    last_seen: Vec<Option<SystemTime>>,
}

impl PollingFileWatcher {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let last_seen = paths.iter().map(|p| mtime(p)).collect();
        Self { paths, last_seen }
    }
}

fn mtime(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl FileWatcher for PollingFileWatcher {
    fn poll_changed(&mut self) -> bool {
        let mut changed = false;
        for (path, last) in self.paths.iter().zip(self.last_seen.iter_mut()) {
            let current = mtime(path);
            if current != *last {
                changed = true;
                *last = current;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_a_touched_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mkhdrc");
        std::fs::write(&path, "cmd - 0x04 : echo hi").unwrap();

        let mut watcher = PollingFileWatcher::new(vec![path.clone()]);
        assert!(!watcher.poll_changed());

        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(&path, "cmd - 0x04 : echo changed").unwrap();
        assert!(watcher.poll_changed());
        assert!(!watcher.poll_changed());
    }
}
