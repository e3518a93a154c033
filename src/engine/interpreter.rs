//! Action interpreter (Component E, `spec.md` §4.E): mutates the layer
//! stack, invokes the command runner, and reports capture/no-capture.
//! Pseudo-events (`@enter_layer`, `@exit_layer`) execute through the same
//! `execute_action` entry point the dispatcher uses for ordinary hotkeys.

use crate::collaborators::CommandRunner;
use mkhd_parser::model::{EventType, KeyEvent, LayerStackFrame, LAYERSTACK_MAX};
use mkhd_parser::{Action, EngineState};

/// Run `action`, which was found attached to the frame at stack index
/// `in_layer` (possibly already popped off the stack by a oneshot, in which
/// case `in_layer` may be `>= state.stack.len()` — every helper below treats
/// that as "nothing left above it to pop", which is exactly right).
/// `process_name` is the focused application at the time of the triggering
/// event; pseudo-events fired as a side effect reuse it.
pub fn execute_action(
    state: &mut EngineState,
    action: &Action,
    in_layer: usize,
    process_name: &str,
    runner: &dyn CommandRunner,
) -> bool {
    match action {
        Action::NoOp => true,
        Action::Command(cmd) => {
            runner.run(cmd);
            true
        }
        Action::Nocapture => false,
        Action::PushLayer(name) => push_layer(state, name, false, in_layer, process_name, runner),
        Action::PushLayerOneshot(name) => push_layer(state, name, true, in_layer, process_name, runner),
        Action::PopLayer => pop_layer(state, in_layer, process_name, runner),
        Action::Fallthrough => {
            log::error!("fallthrough reached the interpreter; the dispatcher should have resolved it");
            false
        }
    }
}

/// `PushLayer`/`PushLayerOneshot` step 1: pop every frame strictly above
/// `in_layer`, firing `@exit_layer` for each as it goes.
fn pop_frames_strictly_above(
    state: &mut EngineState,
    in_layer: usize,
    process_name: &str,
    runner: &dyn CommandRunner,
) {
    while state.stack.len() > 1 && state.stack.len() - 1 > in_layer {
        let frame = state.stack.pop().expect("loop guard ensures non-empty");
        fire_pseudo(state, &frame.layer_name, EventType::ExitLayer, process_name, runner);
    }
}

fn push_layer(
    state: &mut EngineState,
    name: &str,
    oneshot: bool,
    in_layer: usize,
    process_name: &str,
    runner: &dyn CommandRunner,
) -> bool {
    pop_frames_strictly_above(state, in_layer, process_name, runner);

    if state.stack.len() >= LAYERSTACK_MAX {
        log::warn!("layer stack overflow: refusing to push '{name}' past {LAYERSTACK_MAX} layers");
        return false;
    }
    if !state.layers.contains_key(name) {
        log::warn!("push to undefined layer '{name}'");
        return false;
    }

    state.stack.push(LayerStackFrame { layer_name: name.to_string(), oneshot });
    fire_pseudo(state, name, EventType::EnterLayer, process_name, runner);
    true
}

/// `PopLayer`: pop every frame strictly above AND including `in_layer`. If
/// `in_layer == 0` this would remove the base frame, which is refused
/// outright (nothing is popped), but the action still captures. `spec.md`
/// §4.E.
fn pop_layer(state: &mut EngineState, in_layer: usize, process_name: &str, runner: &dyn CommandRunner) -> bool {
    if in_layer == 0 {
        log::warn!("refusing to pop the base layer");
        return true;
    }
    pop_frames_strictly_above(state, in_layer - 1, process_name, runner);
    true
}

/// Look up and run a layer's pseudo-event action (`@enter_layer` /
/// `@exit_layer`), ignoring the outcome's capture-ness — these are internal
/// side effects, not something the OS event can be released/consumed for.
pub(crate) fn fire_pseudo(
    state: &mut EngineState,
    layer_name: &str,
    kind: EventType,
    process_name: &str,
    runner: &dyn CommandRunner,
) {
    let Some(layer) = state.layers.get(layer_name) else { return };
    let Some(id) = layer.lookup(&KeyEvent::pseudo(kind)) else { return };
    let Some(action) = state.arena.get(id).and_then(|hk| hk.resolve(process_name)).cloned() else {
        return;
    };
    let in_layer = state.top_index();
    execute_action(state, &action, in_layer, process_name, runner);
}
