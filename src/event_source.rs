//! A stdin-driven `EventSource` standing in for the OS event tap (`spec.md`
//! §1 explicitly scopes "the OS event-tap machinery" out of this crate).
//! Grounded on the teacher's `src/filesim.rs` helper binary, which also
//! drives the dispatch engine from a text description of key events rather
//! than a real platform hook; simplified here to one line per event.
//!
//! Each input line is `<key combination> <focused process name>`, e.g.
//! `cmd - a Terminal`. A blank line or EOF ends the stream.

use crate::collaborators::EventSource;
use anyhow::Result;
use mkhd_parser::keys::KeycodeMap;
use mkhd_parser::model::KeyEvent;
use std::io::BufRead;

pub struct StdinEventSource {
    lines: std::io::Lines<std::io::StdinLock<'static>>,
    keycode_map: Box<dyn KeycodeMap>,
}

impl StdinEventSource {
    pub fn new(keycode_map: Box<dyn KeycodeMap>) -> Self {
        Self { lines: std::io::stdin().lines(), keycode_map }
    }

    fn parse_line(&self, line: &str) -> Result<Option<(KeyEvent, String)>> {
        let Some((combo, process_name)) = line.rsplit_once(char::is_whitespace) else {
            return Ok(None);
        };
        let event =
            mkhd_parser::parse::parse_standalone_key_combination(combo, self.keycode_map.as_ref())?;
        Ok(Some((event, process_name.to_string())))
    }
}

impl EventSource for StdinEventSource {
    fn next_event(&mut self) -> Option<(KeyEvent, String)> {
        loop {
            let line = self.lines.next()?.ok()?;
            if line.trim().is_empty() {
                return None;
            }
            match self.parse_line(&line) {
                Ok(Some(parsed)) => return Some(parsed),
                Ok(None) => {
                    log::warn!("ignoring malformed event line: {line:?}");
                }
                Err(e) => {
                    log::warn!("ignoring unparseable event line {line:?}: {e}");
                }
            }
        }
    }
}
