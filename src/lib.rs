//! mkhd: a user-space keyboard remapping and hotkey daemon built around a
//! stack of named layers (`spec.md` §1). This crate is the driver: it owns
//! I/O, collaborators, and the CLI; all parsing and config-format semantics
//! live in `mkhd_parser`, and all layer-stack dispatch semantics live in
//! `engine`.

pub mod cmd;
pub mod collaborators;
pub mod config_paths;
pub mod daemon;
pub mod engine;
pub mod event_source;
pub mod keymap;
pub mod pidfile;

#[cfg(feature = "watch")]
pub mod file_watcher;

pub use cmd::ShellCommandRunner;
pub use collaborators::{CommandRunner, EventSource, FileWatcher, NullCommandRunner};
pub use daemon::Daemon;
pub use event_source::StdinEventSource;
pub use keymap::AsciiKeycodeMap;
pub use pidfile::PidFile;

#[cfg(feature = "watch")]
pub use file_watcher::PollingFileWatcher;
