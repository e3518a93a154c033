//! Event dispatch engine (Component D, `spec.md` §4.D): resolves one key
//! event against the layer stack top-down and selects the action to run.
//! Blocklist short-circuiting happens in the caller (`spec.md` §4.D: "If
//! `process_name` is in `blocklist`, return release immediately (handled by
//! the caller before invoking dispatch)") — see `crate::daemon::Daemon::dispatch`.

use crate::collaborators::CommandRunner;
use crate::engine::interpreter::execute_action;
use mkhd_parser::model::{Action, EventType, KeyEvent};
use mkhd_parser::EngineState;

/// Returns `true` iff `event` should be consumed (hidden from `process_name`).
pub fn dispatch(state: &mut EngineState, event: KeyEvent, process_name: &str, runner: &dyn CommandRunner) -> bool {
    let top_idx = state.top_index();
    let top_oneshot = state.top().oneshot;

    let (action, cursor) = resolve_action(state, event, process_name, top_idx);

    let pop_oneshot = top_oneshot && matches!(event.kind, EventType::Key | EventType::KeyUp);
    let mut popped = None;
    if pop_oneshot {
        popped = state.stack.pop();
    }

    let capture = execute_action(state, &action, cursor, process_name, runner);

    if let Some(frame) = popped {
        crate::engine::interpreter::fire_pseudo(state, &frame.layer_name, EventType::ExitLayer, process_name, runner);
    }

    capture
}

/// Steps 1–3 of `spec.md` §4.D: walk the stack top-down, following
/// `Fallthrough` down to lower layers, and return the resolved action plus
/// the stack index it came from (`in_layer` for the interpreter).
fn resolve_action(
    state: &EngineState,
    event: KeyEvent,
    process_name: &str,
    top_idx: usize,
) -> (Action, usize) {
    let mut cursor = top_idx;
    loop {
        let layer_name = &state.stack[cursor].layer_name;
        let layer = state.layers.get(layer_name).expect("every stack frame names a live layer");

        let action = match layer.lookup(&event).and_then(|id| state.arena.get(id)) {
            Some(hotkey) => hotkey.resolve(process_name).cloned().unwrap_or(Action::Nocapture),
            None if event.kind == EventType::KeyDown => Action::Fallthrough,
            None => layer
                .lookup(&KeyEvent::pseudo(EventType::Unmatched))
                .and_then(|id| state.arena.get(id))
                .and_then(|hk| hk.resolve(process_name).cloned())
                .unwrap_or(Action::Fallthrough),
        };

        if action == Action::Fallthrough {
            if cursor == 0 {
                return (Action::Nocapture, cursor);
            }
            cursor -= 1;
            continue;
        }
        return (action, cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NullCommandRunner;
    use mkhd_parser::keys::NullKeycodeMap;
    use mkhd_parser::model::ModFlags;

    fn event(kind: EventType, flags: ModFlags, key: u32) -> KeyEvent {
        KeyEvent::new(kind, flags, key)
    }

    #[test]
    fn simple_command_hotkey_captures_and_runs() {
        use std::sync::{Arc, Mutex};
        struct Recording(Arc<Mutex<Vec<String>>>);
        impl CommandRunner for Recording {
            fn run(&self, command: &str) {
                self.0.lock().unwrap().push(command.to_string());
            }
        }
        let mut state = EngineState::load("cmd - 0x04 : echo hi", &NullKeycodeMap, |_, _| None).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = Recording(log.clone());
        let captured = dispatch(&mut state, event(EventType::Key, ModFlags::CMD, 0x04), "any", &runner);
        assert!(captured);
        assert_eq!(log.lock().unwrap().as_slice(), ["echo hi"]);
    }

    #[test]
    fn push_then_rule_in_new_layer_fires() {
        let mut state = EngineState::load(
            "|mylayer\ncmd - 0x02 : echo b\n\ncmd - 0x0d : .activate |mylayer",
            &NullKeycodeMap,
            |_, _| None,
        )
        .unwrap();
        let runner = NullCommandRunner;
        assert!(dispatch(&mut state, event(EventType::Key, ModFlags::CMD, 0x0d), "any", &runner));
        assert_eq!(state.stack.len(), 2);
        assert_eq!(state.top().layer_name, "mylayer");
        assert!(dispatch(&mut state, event(EventType::Key, ModFlags::CMD, 0x02), "any", &runner));
    }

    #[test]
    fn oneshot_layer_pops_after_one_non_keydown_event() {
        let mut state = EngineState::load(
            "|l\n0x42 : echo b\n\n0x58 : .oneshot |l",
            &NullKeycodeMap,
            |_, _| None,
        )
        .unwrap();
        let runner = NullCommandRunner;
        assert!(dispatch(&mut state, event(EventType::Key, ModFlags::empty(), 0x58), "any", &runner));
        assert_eq!(state.stack.len(), 2);
        assert!(state.top().oneshot);

        assert!(dispatch(&mut state, event(EventType::Key, ModFlags::empty(), 0x42), "any", &runner));
        assert_eq!(state.stack.len(), 1);

        let released = dispatch(&mut state, event(EventType::Key, ModFlags::empty(), 0x42), "any", &runner);
        assert!(!released);
    }

    #[test]
    fn blocklisted_process_check_is_caller_responsibility() {
        let state = EngineState::load(".blocklist [\"terminal\"]", &NullKeycodeMap, |_, _| None).unwrap();
        assert!(state.blocklist.contains("terminal"));
    }

    #[test]
    fn redefinition_wins_by_replacement() {
        let mut state = EngineState::load(
            "cmd - 0x04 : echo 1\ncmd - 0x04 [ \"app\" : echo 2\n * : echo 3 ]",
            &NullKeycodeMap,
            |_, _| None,
        )
        .unwrap();
        use std::sync::{Arc, Mutex};
        struct Recording(Arc<Mutex<Vec<String>>>);
        impl CommandRunner for Recording {
            fn run(&self, command: &str) {
                self.0.lock().unwrap().push(command.to_string());
            }
        }
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = Recording(log.clone());
        dispatch(&mut state, event(EventType::Key, ModFlags::CMD, 0x04), "other", &runner);
        assert_eq!(log.lock().unwrap().as_slice(), ["echo 3"]);
    }

    #[test]
    fn distinct_flag_rules_on_the_same_key_coexist() {
        let mut state = EngineState::load(
            "cmd - 0x04 : echo cmd-a\nshift - 0x04 : echo shift-a",
            &NullKeycodeMap,
            |_, _| None,
        )
        .unwrap();
        use std::sync::{Arc, Mutex};
        struct Recording(Arc<Mutex<Vec<String>>>);
        impl CommandRunner for Recording {
            fn run(&self, command: &str) {
                self.0.lock().unwrap().push(command.to_string());
            }
        }
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = Recording(log.clone());
        dispatch(&mut state, event(EventType::Key, ModFlags::CMD, 0x04), "any", &runner);
        dispatch(&mut state, event(EventType::Key, ModFlags::SHIFT, 0x04), "any", &runner);
        assert_eq!(log.lock().unwrap().as_slice(), ["echo cmd-a", "echo shift-a"]);
    }

    #[test]
    fn side_specific_modifier_rejects_bare_and_opposite_side() {
        let mut state =
            EngineState::load("lcmd - 0x0c : echo lcmd-q", &NullKeycodeMap, |_, _| None).unwrap();
        let runner = NullCommandRunner;
        assert!(!dispatch(&mut state, event(EventType::Key, ModFlags::empty(), 0x0c), "any", &runner));
        assert!(!dispatch(&mut state, event(EventType::Key, ModFlags::RCMD, 0x0c), "any", &runner));
        assert!(dispatch(&mut state, event(EventType::Key, ModFlags::LCMD, 0x0c), "any", &runner));
    }

    #[test]
    fn keydown_never_fires_unmatched_and_falls_through_to_release() {
        let mut state = EngineState::load("|l\ncmd - 0x10 : .oneshot |l", &NullKeycodeMap, |_, _| None).unwrap();
        let runner = NullCommandRunner;
        let released = dispatch(&mut state, event(EventType::KeyDown, ModFlags::empty(), 0x99), "any", &runner);
        assert!(!released);
    }
}
