//! Data model shared by the tokenizer, parser and dispatch engine: `KeyEvent`,
//! `Action`, `Hotkey` and `Layer`. See `spec.md` §3.

use rustc_hash::FxHashMap as HashMap;

/// Sentinel used when a rule specifies only a pseudo-event or bare
/// modifiers, with no physical key.
pub const INVALID_KEY: u32 = u32::MAX;

bitflags::bitflags! {
    /// Modifier bitmask. For each of Alt/Shift/Cmd/Ctrl there is a
    /// side-agnostic ("generic") bit and two side-specific bits. A rule sets
    /// at most one of the three per modifier family; see `KeyEvent::matches`
    /// for the asymmetric left/right matching rule this enables.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ModFlags: u16 {
        const ALT    = 1 << 0;
        const LALT   = 1 << 1;
        const RALT   = 1 << 2;
        const SHIFT  = 1 << 3;
        const LSHIFT = 1 << 4;
        const RSHIFT = 1 << 5;
        const CMD    = 1 << 6;
        const LCMD   = 1 << 7;
        const RCMD   = 1 << 8;
        const CTRL   = 1 << 9;
        const LCTRL  = 1 << 10;
        const RCTRL  = 1 << 11;
        const FN     = 1 << 12;
        const NX     = 1 << 13;
    }
}

/// One (generic, left, right) bit triple for a modifier family.
struct ModFamily {
    generic: ModFlags,
    left: ModFlags,
    right: ModFlags,
}

const FAMILIES: [ModFamily; 4] = [
    ModFamily { generic: ModFlags::ALT, left: ModFlags::LALT, right: ModFlags::RALT },
    ModFamily { generic: ModFlags::SHIFT, left: ModFlags::LSHIFT, right: ModFlags::RSHIFT },
    ModFamily { generic: ModFlags::CMD, left: ModFlags::LCMD, right: ModFlags::RCMD },
    ModFamily { generic: ModFlags::CTRL, left: ModFlags::LCTRL, right: ModFlags::RCTRL },
];

impl ModFlags {
    /// Asymmetric match used when comparing a rule's flags (`self`) against
    /// an observed event's flags (`other`): `spec.md` §4.C.
    ///
    /// - If `self` sets a family's generic bit, `other` matches if it has
    ///   any of {generic, left, right} for that family.
    /// - Otherwise `other` must carry exactly the same side-specific bits
    ///   `self` has for that family.
    ///
    /// `Fn`/`NX` have no side variants and always require an exact match.
    pub fn rule_matches_event(self, other: ModFlags) -> bool {
        for fam in &FAMILIES {
            let rule_bits = self & (fam.generic | fam.left | fam.right);
            let event_bits = other & (fam.generic | fam.left | fam.right);
            if rule_bits.contains(fam.generic) {
                if event_bits.is_empty() {
                    return false;
                }
            } else if rule_bits != event_bits {
                return false;
            }
        }
        let rest = ModFlags::FN | ModFlags::NX;
        (self & rest) == (other & rest)
    }
}

/// `KeyEvent.type`: `spec.md` §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Matches either edge of the physical key.
    Key,
    KeyDown,
    KeyUp,
    /// Pseudo-events, produced by the engine rather than the OS.
    Unmatched,
    EnterLayer,
    ExitLayer,
}

impl EventType {
    pub fn is_pseudo(self) -> bool {
        matches!(self, EventType::Unmatched | EventType::EnterLayer | EventType::ExitLayer)
    }
}

/// A physical or pseudo key event: `spec.md` §3.
///
/// `Hash`/`Eq` intentionally only consider `(type, key)` — the lookup key
/// for `Layer::rules` — never the modifier flags. Precise, asymmetric flag
/// matching is done by `matches`, walked over the hash chain by the caller.
/// This is `spec.md` §9's "asymmetric key-event equality" design note.
#[derive(Clone, Copy, Debug)]
pub struct KeyEvent {
    pub kind: EventType,
    pub flags: ModFlags,
    pub key: u32,
}

impl KeyEvent {
    pub fn new(kind: EventType, flags: ModFlags, key: u32) -> Self {
        Self { kind, flags, key }
    }

    pub fn pseudo(kind: EventType) -> Self {
        debug_assert!(kind.is_pseudo());
        Self { kind, flags: ModFlags::empty(), key: INVALID_KEY }
    }

    /// Is `self` (the rule) satisfied by `event` (an observed `KeyEvent`)?
    /// See `spec.md` §4.C.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.kind == event.kind
            && self.key == event.key
            && self.flags.rule_matches_event(event.flags)
    }
}

impl PartialEq for KeyEvent {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.key == other.key
    }
}
impl Eq for KeyEvent {}
impl std::hash::Hash for KeyEvent {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.key.hash(state);
    }
}

/// `spec.md` §3 `Action`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Command(String),
    Nocapture,
    PushLayer(String),
    PushLayerOneshot(String),
    PopLayer,
    /// Not directly executable by the interpreter; resolved by the
    /// dispatcher (`spec.md` §4.D/§4.E).
    Fallthrough,
}

impl Action {
    /// Whether executing this action, on its own, hides the event from the
    /// focused application.
    pub fn is_capture(&self) -> bool {
        !matches!(self, Action::Nocapture)
    }
}

/// `spec.md` §3 `Hotkey`. `process_names[i]` binds to `per_process_actions[i]`.
#[derive(Clone, Debug, Default)]
pub struct Hotkey {
    pub process_names: Vec<String>,
    pub per_process_actions: Vec<Action>,
    pub default_action: Option<Action>,
}

impl Hotkey {
    pub fn with_default(action: Action) -> Self {
        Self { process_names: Vec::new(), per_process_actions: Vec::new(), default_action: Some(action) }
    }

    /// `find_process_action`: `spec.md` §4.D.c — a case-insensitive linear
    /// scan, falling back to `default_action`.
    pub fn resolve<'a>(&'a self, process_name: &str) -> Option<&'a Action> {
        for (name, action) in self.process_names.iter().zip(self.per_process_actions.iter()) {
            if name.eq_ignore_ascii_case(process_name) {
                return Some(action);
            }
        }
        self.default_action.as_ref()
    }
}

/// A named bundle of key -> hotkey rules. `spec.md` §3 `Layer`.
///
/// Rules are keyed by `(type, key)` only — `spec.md` §9's "asymmetric
/// key-event equality" — with every rule registered against that key kept
/// in a chain, since distinct modifier flags on the same physical key are
/// distinct rules, not a collision (`cmd - a` and `shift - a` must both
/// survive). Dispatch (`KeyEvent::matches`/`ModFlags::rule_matches_event`)
/// walks the chain for the first rule whose flags match the observed
/// event. Rules are stored indirectly via `ArenaId` into the shared
/// `Arena<Hotkey>` so that replacing a rule with identical flags (e.g. a
/// later `cmd - a` definition overriding an earlier one, `spec.md` §8
/// scenario 5) frees the superseded `Hotkey` rather than leaking it — see
/// `parser::alloc`.
#[derive(Clone, Debug)]
pub struct Layer {
    pub name: String,
    pub rules: HashMap<(EventType, u32), Vec<(ModFlags, crate::alloc::ArenaId)>>,
}

impl Layer {
    /// A fresh layer with the three auto-inserted pseudo rules:
    /// `Unmatched -> Fallthrough`, `EnterLayer -> NoOp`, `ExitLayer -> NoOp`.
    /// `spec.md` §3.
    pub fn new(name: impl Into<String>, arena: &mut crate::alloc::Arena<Hotkey>) -> Self {
        let mut layer = Self { name: name.into(), rules: HashMap::default() };
        layer.insert_rule(
            KeyEvent::pseudo(EventType::Unmatched),
            arena.alloc(Hotkey::with_default(Action::Fallthrough)).expect("fresh arena has room"),
        );
        layer.insert_rule(
            KeyEvent::pseudo(EventType::EnterLayer),
            arena.alloc(Hotkey::with_default(Action::NoOp)).expect("fresh arena has room"),
        );
        layer.insert_rule(
            KeyEvent::pseudo(EventType::ExitLayer),
            arena.alloc(Hotkey::with_default(Action::NoOp)).expect("fresh arena has room"),
        );
        layer
    }

    /// Register `id` for `event`. A rule already registered for the same
    /// `(type, key, flags)` is replaced (its old `ArenaId` is returned for
    /// the caller to free, `spec.md` §8 scenario 5); a rule for the same
    /// `(type, key)` but different flags is appended to the chain rather
    /// than replacing it, since the two are distinct rules (e.g. `cmd - a`
    /// and `shift - a` both bind the key `a`).
    pub fn insert_rule(&mut self, event: KeyEvent, id: crate::alloc::ArenaId) -> Option<crate::alloc::ArenaId> {
        let chain = self.rules.entry((event.kind, event.key)).or_default();
        if let Some(slot) = chain.iter_mut().find(|(flags, _)| *flags == event.flags) {
            Some(std::mem::replace(&mut slot.1, id))
        } else {
            chain.push((event.flags, id));
            None
        }
    }

    /// Find the rule whose `(type, key)` matches `event` and whose flags
    /// accept it under `spec.md` §4.C's asymmetric left/right matching.
    /// First match in registration order wins.
    pub fn lookup(&self, event: &KeyEvent) -> Option<crate::alloc::ArenaId> {
        self.rules
            .get(&(event.kind, event.key))?
            .iter()
            .find(|(flags, _)| flags.rule_matches_event(event.flags))
            .map(|(_, id)| *id)
    }

    /// Total number of registered rules, across every flag-chain. Distinct
    /// from `rules.len()`, which only counts distinct `(type, key)` keys.
    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

/// One frame of the runtime layer stack. `spec.md` §3 `LayerStackFrame`.
#[derive(Clone, Debug)]
pub struct LayerStackFrame {
    pub layer_name: String,
    pub oneshot: bool,
}

pub const LAYERSTACK_MAX: usize = 5;
pub const DEFAULT_LAYER: &str = "default";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_rule_matches_either_side() {
        let rule = KeyEvent::new(EventType::Key, ModFlags::CMD, 12);
        let left = KeyEvent::new(EventType::Key, ModFlags::LCMD, 12);
        let right = KeyEvent::new(EventType::Key, ModFlags::RCMD, 12);
        assert!(rule.matches(&left));
        assert!(rule.matches(&right));
    }

    #[test]
    fn side_specific_rule_matches_only_that_side() {
        let rule = KeyEvent::new(EventType::Key, ModFlags::LCMD, 12);
        let left = KeyEvent::new(EventType::Key, ModFlags::LCMD, 12);
        let right = KeyEvent::new(EventType::Key, ModFlags::RCMD, 12);
        assert!(rule.matches(&left));
        assert!(!rule.matches(&right));
    }

    #[test]
    fn no_modifier_rule_matches_only_bare_event() {
        let rule = KeyEvent::new(EventType::Key, ModFlags::empty(), 5);
        let bare = KeyEvent::new(EventType::Key, ModFlags::empty(), 5);
        let modded = KeyEvent::new(EventType::Key, ModFlags::SHIFT, 5);
        assert!(rule.matches(&bare));
        assert!(!rule.matches(&modded));
    }

    #[test]
    fn hash_key_ignores_flags() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let a = KeyEvent::new(EventType::Key, ModFlags::CMD, 5);
        let b = KeyEvent::new(EventType::Key, ModFlags::LCTRL, 5);
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
        assert_eq!(a, b);
    }
}
