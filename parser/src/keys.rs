//! Name tables consulted by the tokenizer: modifier names and literal key
//! names (`spec.md` §4.A), plus the `char -> keycode` collaborator interface
//! (`spec.md` §6) the core consumes but does not implement.

use crate::model::ModFlags;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap as HashMap;

/// Resolved once at config-load time from the active keyboard layout; the
/// core treats it as an opaque collaborator (`spec.md` §6).
pub trait KeycodeMap {
    fn keycode_for_char(&self, c: char) -> Option<u32>;
}

/// A `KeycodeMap` for hosts/tests that only need raw keycodes, never
/// layout-dependent single-char lookups.
#[derive(Default)]
pub struct NullKeycodeMap;

impl KeycodeMap for NullKeycodeMap {
    fn keycode_for_char(&self, _c: char) -> Option<u32> {
        None
    }
}

/// Exact-match modifier family names. `spec.md` §4.A.
pub static MODIFIER_NAMES: Lazy<HashMap<&'static str, ModFlags>> = Lazy::new(|| {
    use ModFlags as M;
    [
        ("alt", M::ALT), ("lalt", M::LALT), ("ralt", M::RALT),
        ("shift", M::SHIFT), ("lshift", M::LSHIFT), ("rshift", M::RSHIFT),
        ("cmd", M::CMD), ("lcmd", M::LCMD), ("rcmd", M::RCMD),
        ("ctrl", M::CTRL), ("lctrl", M::LCTRL), ("rctrl", M::RCTRL),
        ("fn", M::FN), ("nx", M::NX),
    ]
    .into_iter()
    .collect()
});

/// Literal key names that tokenize as `Token::Literal` rather than falling
/// through to `Token::Identifier`. `spec.md` §4.A; names carried over from
/// the original implementation's `tokenize.h` `literal_keycode_str` table
/// plus the arrows/media keys `spec.md` calls out by name.
pub static LITERAL_KEYS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    let names: &[&str] = &[
        "return", "tab", "space", "backspace", "escape", "delete",
        "home", "end", "pageup", "pagedown", "insert",
        "left", "right", "up", "down",
        "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10",
        "f11", "f12", "f13", "f14", "f15", "f16", "f17", "f18", "f19", "f20",
        "sound_up", "sound_down", "mute", "play", "previous", "next", "rewind", "fast",
        "brightness_up", "brightness_down", "illumination_up", "illumination_down",
        "caps_lock",
    ];
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, 0x8000_0000u32 + i as u32))
        .collect()
});

pub fn lookup_modifier(name: &str) -> Option<ModFlags> {
    MODIFIER_NAMES.get(name).copied()
}

pub fn lookup_literal_key(name: &str) -> Option<u32> {
    LITERAL_KEYS.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_table_has_all_twelve_plus_fn_nx() {
        for name in [
            "alt", "lalt", "ralt", "shift", "lshift", "rshift", "cmd", "lcmd", "rcmd", "ctrl",
            "lctrl", "rctrl", "fn", "nx",
        ] {
            assert!(lookup_modifier(name).is_some(), "missing modifier {name}");
        }
    }

    #[test]
    fn literal_keys_are_distinct_codes() {
        let a = lookup_literal_key("return").unwrap();
        let b = lookup_literal_key("space").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_name_is_neither() {
        assert!(lookup_modifier("bogus").is_none());
        assert!(lookup_literal_key("bogus").is_none());
    }
}
