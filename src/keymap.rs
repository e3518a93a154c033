//! A trivial default `KeycodeMap` (`spec.md` §6's host-provided "keyboard
//! layout" collaborator is explicitly out of this crate's scope). Maps each
//! ASCII character to its own code point, so config files that spell keys
//! as plain letters (`cmd - a : ...`) parse and dispatch end-to-end without
//! requiring a real platform layout lookup to be wired in first.
//!
//! A host that cares about non-US layouts supplies its own `KeycodeMap`
//! impl to `Daemon::new` instead of this one.

use mkhd_parser::keys::KeycodeMap;

pub struct AsciiKeycodeMap;

impl KeycodeMap for AsciiKeycodeMap {
    fn keycode_for_char(&self, c: char) -> Option<u32> {
        if c.is_ascii() {
            Some(c as u32)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_chars_map_to_themselves() {
        assert_eq!(AsciiKeycodeMap.keycode_for_char('a'), Some('a' as u32));
    }

    #[test]
    fn non_ascii_is_unmapped() {
        assert_eq!(AsciiKeycodeMap.keycode_for_char('é'), None);
    }
}
