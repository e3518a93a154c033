//! `EngineState`: the runtime ruleset plus the active layer stack. `spec.md`
//! §3 `EngineState`, §4.D/§4.E consume it; this module only builds and
//! validates it (no dispatch logic, which lives in the `mkhd` crate's
//! `engine` module per `SPEC_FULL.md` §0's crate split).

use crate::alloc::Arena;
use crate::error::ParseError;
use crate::keys::KeycodeMap;
use crate::model::{Hotkey, Layer, LayerStackFrame, DEFAULT_LAYER, LAYERSTACK_MAX};
use crate::parse::EngineStateBuilder;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// `spec.md` §3 `EngineState`.
pub struct EngineState {
    pub layers: HashMap<String, Layer>,
    pub blocklist: HashSet<String>,
    pub aliases: HashMap<String, crate::model::KeyEvent>,
    pub arena: Arena<Hotkey>,
    pub stack: Vec<LayerStackFrame>,
}

impl EngineState {
    /// Parse `source` (plus, transitively, every `.load` target `resolve_load`
    /// can resolve to another source string) into a fresh `EngineState`
    /// seeded with `[{layer: "default", oneshot: false}]`. `spec.md` §4.B
    /// "Load directives ... recursion is permitted; cycles are the user's
    /// responsibility" — callers control termination via `resolve_load`
    /// (e.g. by refusing to re-open a path), this function does not impose
    /// its own cycle guard.
    ///
    /// `resolve_load` maps a raw `.load` argument (as written in the
    /// including file) plus that file's own identifier to `(new_identifier,
    /// source_text)`, or `None` to skip it (I/O error; `spec.md` §7 "warn
    /// and skip that file").
    pub fn load<F>(
        root_source: &str,
        keycode_map: &dyn KeycodeMap,
        mut resolve_load: F,
    ) -> Result<EngineState, ParseError>
    where
        F: FnMut(&str, &str) -> Option<(String, String)>,
    {
        let mut builder = EngineStateBuilder::new();
        let mut queue: Vec<(String, String)> = vec![("<root>".to_string(), root_source.to_string())];
        let mut i = 0;
        while i < queue.len() {
            let (current_id, current_source) = queue[i].clone();
            let loads = builder.load_into(&current_source, keycode_map)?;
            for raw_path in loads {
                if let Some((next_id, next_source)) = resolve_load(&current_id, &raw_path) {
                    queue.push((next_id, next_source));
                }
            }
            i += 1;
        }

        Ok(EngineState {
            layers: builder.layers,
            blocklist: builder.blocklist,
            aliases: builder.aliases,
            arena: builder.arena,
            stack: vec![LayerStackFrame { layer_name: DEFAULT_LAYER.to_string(), oneshot: false }],
        })
    }

    pub fn stack_count(&self) -> usize {
        self.stack.len()
    }

    pub fn top(&self) -> &LayerStackFrame {
        self.stack.last().expect("stack is never empty")
    }

    pub fn top_index(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Layer names in no particular order; used by `--observe` and tests.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    /// `spec.md` §3 invariants: `1 <= stack_count <= LAYERSTACK_MAX`,
    /// `stack[0].name == "default"`. Checked in tests and available for
    /// debug assertions at call sites that mutate the stack.
    pub fn check_invariants(&self) -> bool {
        !self.stack.is_empty()
            && self.stack.len() <= LAYERSTACK_MAX
            && self.stack[0].layer_name == DEFAULT_LAYER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `NullKeycodeMap` always returns `None` for a char lookup, so these
    /// tests use hex keycodes to stay independent of a real keyboard layout.
    struct FixedKeycodeMap;
    impl KeycodeMap for FixedKeycodeMap {
        fn keycode_for_char(&self, c: char) -> Option<u32> {
            Some(c as u32)
        }
    }

    #[test]
    fn fresh_state_has_default_layer_and_satisfies_invariants() {
        let state = EngineState::load("cmd - 0x04 : echo hi", &FixedKeycodeMap, |_, _| None).unwrap();
        assert!(state.check_invariants());
        assert_eq!(state.stack_count(), 1);
        assert_eq!(state.top().layer_name, DEFAULT_LAYER);
        assert!(state.layer(DEFAULT_LAYER).is_some());
    }

    #[test]
    fn load_directive_is_resolved_by_caller_and_merged() {
        let mut files = HashMap::default();
        files.insert("extra.mkhdrc".to_string(), "cmd - 0x05 : echo from_extra".to_string());

        let state = EngineState::load(".load \"extra.mkhdrc\"", &FixedKeycodeMap, |_current, path| {
            files.get(path).map(|src| (path.to_string(), src.clone()))
        })
        .unwrap();

        let default = state.layer(DEFAULT_LAYER).unwrap();
        assert_eq!(default.rule_count(), 3 + 1); // 3 pseudo rules + the loaded one
    }

    #[test]
    fn skipped_load_retains_partial_state() {
        let state = EngineState::load(
            ".load \"missing.mkhdrc\"\ncmd - 0x04 : echo hi",
            &FixedKeycodeMap,
            |_, _| None,
        )
        .unwrap();
        assert!(state.layer(DEFAULT_LAYER).is_some());
    }
}
