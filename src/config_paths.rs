//! Config-file discovery (`spec.md` §6 "Config-file discovery order"):
//! `$XDG_CONFIG_HOME/mkhd/mkhdrc`, `$HOME/.config/mkhd/mkhdrc`,
//! `$HOME/.mkhdrc`, in that order. Grounded on the teacher's
//! `default_cfg()` (`src/lib.rs`), which walks a similarly-ordered
//! candidate list and keeps the first that exists.

use std::env;
use std::path::PathBuf;

/// The first candidate that exists on disk, or `None` if none do.
pub fn discover() -> Option<PathBuf> {
    candidates().into_iter().find(|p| p.is_file())
}

/// All candidates in priority order, whether or not they exist — used by
/// `--config` error messages and tests.
pub fn candidates() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            out.push(PathBuf::from(xdg).join("mkhd").join("mkhdrc"));
        }
    }
    if let Ok(home) = env::var("HOME") {
        out.push(PathBuf::from(&home).join(".config").join("mkhd").join("mkhdrc"));
        out.push(PathBuf::from(&home).join(".mkhdrc"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_order_matches_spec() {
        let cands = candidates();
        if cands.len() == 3 {
            assert!(cands[0].ends_with("mkhd/mkhdrc"));
            assert!(cands[1].ends_with(".config/mkhd/mkhdrc"));
            assert!(cands[2].ends_with(".mkhdrc"));
        }
    }
}
