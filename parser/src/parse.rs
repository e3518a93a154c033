//! Recursive-descent parser (Component B, `spec.md` §4.B) over the token
//! stream produced by `token::Tokenizer`. Builds hotkeys into a
//! `store::EngineStateBuilder`, mutating its `layers` / `blocklist` /
//! `aliases` and collecting `.load` directives for the driver to resolve
//! and re-feed (parsing itself never touches the filesystem).

use crate::alloc::Arena;
use crate::error::{ParseError, Result};
use crate::keys::KeycodeMap;
use crate::model::{Action, EventType, Hotkey, KeyEvent, Layer, ModFlags, INVALID_KEY};
use crate::token::{Pos, Token, TokenKind, Tokenizer};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// Accumulates parsed state across one or more source buffers (the primary
/// config file plus every file named by a `.load` directive, transitively).
/// One `Arena` backs every file that contributes to a single load.
pub struct EngineStateBuilder {
    pub layers: HashMap<String, Layer>,
    pub blocklist: HashSet<String>,
    pub aliases: HashMap<String, KeyEvent>,
    pub arena: Arena<Hotkey>,
}

impl Default for EngineStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineStateBuilder {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let mut layers = HashMap::default();
        layers.insert(
            crate::model::DEFAULT_LAYER.to_string(),
            Layer::new(crate::model::DEFAULT_LAYER, &mut arena),
        );
        Self { layers, blocklist: HashSet::default(), aliases: HashMap::default(), arena }
    }

    fn get_or_create_layer(&mut self, name: &str) -> &mut Layer {
        if !self.layers.contains_key(name) {
            let layer = Layer::new(name, &mut self.arena);
            self.layers.insert(name.to_string(), layer);
        }
        self.layers.get_mut(name).expect("just inserted")
    }

    /// Parse one source buffer's statements into `self`. Returns the raw
    /// `.load` path strings seen, in source order, for the driver to resolve
    /// relative to this file's directory and re-feed.
    pub fn load_into(&mut self, source: &str, keycode_map: &dyn KeycodeMap) -> Result<Vec<String>> {
        let tokens = Tokenizer::new(source).tokenize_all();
        let mut parser = Parser { tokens, pos: 0, keycode_map, state: self, loads: Vec::new() };
        parser.parse_statements()?;
        Ok(parser.loads)
    }
}

struct Parser<'a, 'b> {
    tokens: Vec<Token>,
    pos: usize,
    keycode_map: &'b dyn KeycodeMap,
    state: &'a mut EngineStateBuilder,
    loads: Vec<String>,
}

impl<'a, 'b> Parser<'a, 'b> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_pos(&self) -> Pos {
        self.peek().pos
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message.into(), self.peek_pos())
    }

    fn expect_kind(&mut self, want: &TokenKind, what: &str) -> Result<Token> {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(want) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek().kind)))
        }
    }

    fn resolve_alias(&self, name: &str) -> Result<KeyEvent> {
        self.state
            .aliases
            .get(name)
            .copied()
            .ok_or_else(|| self.error(format!("undefined alias ${name}")))
    }

    fn parse_statements(&mut self) -> Result<()> {
        loop {
            if matches!(self.peek().kind, TokenKind::EndOfStream) {
                return Ok(());
            }
            self.parse_statement()?;
        }
    }

    fn parse_statement(&mut self) -> Result<()> {
        match &self.peek().kind {
            TokenKind::LayerRef(_) => self.parse_hotkey(Vec::new()),
            TokenKind::Event(_) => self.parse_hotkey(Vec::new()),
            TokenKind::Modifier(_) | TokenKind::Alias(_) | TokenKind::Key(_)
            | TokenKind::HexKeycode(_) | TokenKind::LiteralKey(_) => self.parse_hotkey(Vec::new()),
            TokenKind::Option(name) if name == "blocklist" => self.parse_blocklist(),
            TokenKind::Option(name) if name == "load" => self.parse_load(),
            TokenKind::Option(name) if name == "alias" => self.parse_alias_def(),
            other => Err(self.error(format!("unexpected token at statement start: {other:?}"))),
        }
    }

    /// A statement whose `layer_list` is already known (possibly empty, in
    /// which case the hotkey attaches to `default`, `spec.md` §4.B "Layer
    /// binding"). Layer refs precede the keyevent; re-entered from
    /// `parse_statement` once the first `LayerRef` has been consumed.
    fn parse_hotkey(&mut self, mut layer_names: Vec<String>) -> Result<()> {
        if let TokenKind::LayerRef(name) = &self.peek().kind {
            let name = name.clone();
            if name.is_empty() {
                return Err(self.error("empty layer name"));
            }
            layer_names.push(name);
            self.advance();
            if matches!(self.peek().kind, TokenKind::Comma) {
                self.advance();
                return self.parse_hotkey(layer_names);
            }
        }

        let event = self.parse_keyevent()?;
        let hotkey = self.parse_action_clause()?;

        let targets = if layer_names.is_empty() {
            vec![crate::model::DEFAULT_LAYER.to_string()]
        } else {
            layer_names
        };
        for name in targets {
            let id = self.state.arena.alloc(hotkey.clone()).map_err(|e| self.error(e.to_string()))?;
            let layer = self.state.get_or_create_layer(&name);
            if let Some(old) = layer.insert_rule(event, id) {
                self.state.arena.free(old);
            }
        }
        Ok(())
    }

    fn parse_keyevent(&mut self) -> Result<KeyEvent> {
        if matches!(self.peek().kind, TokenKind::Event(_)) {
            self.parse_pseudo_event()
        } else {
            self.parse_key_combination()
        }
    }

    fn parse_pseudo_event(&mut self) -> Result<KeyEvent> {
        let name = match &self.peek().kind {
            TokenKind::Event(n) => n.clone(),
            _ => unreachable!(),
        };
        self.advance();
        let kind = match name.as_str() {
            "unmatched" => EventType::Unmatched,
            "enter_layer" => EventType::EnterLayer,
            "exit_layer" => EventType::ExitLayer,
            "keydown" => EventType::KeyDown,
            "keyup" => EventType::KeyUp,
            other => return Err(self.error(format!("unknown pseudo-event @{other}"))),
        };

        let mut flags = ModFlags::empty();
        let mut key = INVALID_KEY;
        if matches!(self.peek().kind, TokenKind::LParen) {
            self.advance();
            if !matches!(self.peek().kind, TokenKind::RParen) {
                let combo = self.parse_key_combination()?;
                flags = combo.flags;
                key = combo.key;
            }
            self.expect_kind(&TokenKind::RParen, "')'")?;
        }
        Ok(KeyEvent::new(kind, flags, key))
    }

    /// `key_combination := modifier_chain? ('-' key)? | key`. `spec.md` §4.B.
    fn parse_key_combination(&mut self) -> Result<KeyEvent> {
        let mut flags = ModFlags::empty();
        let mut key = INVALID_KEY;
        let mut chain_len = 0usize;

        loop {
            match &self.peek().kind {
                TokenKind::Modifier(m) => {
                    flags |= *m;
                    chain_len += 1;
                    self.advance();
                }
                TokenKind::Alias(name) => {
                    let name = name.clone();
                    let aliased = self.resolve_alias(&name)?;
                    if chain_len > 0 && aliased.flags.is_empty() {
                        return Err(self.error(format!(
                            "alias ${name} supplies no modifier bits and cannot follow another chain element"
                        )));
                    }
                    flags |= aliased.flags;
                    if aliased.key != INVALID_KEY {
                        if key != INVALID_KEY {
                            return Err(self.error("two aliases in this rule both supply a concrete key"));
                        }
                        key = aliased.key;
                    }
                    chain_len += 1;
                    self.advance();
                }
                _ => break,
            }
            if matches!(self.peek().kind, TokenKind::Plus) {
                self.advance();
                continue;
            }
            break;
        }

        if matches!(self.peek().kind, TokenKind::Dash) {
            self.advance();
            let (k_flags, k_key) = self.parse_key_value()?;
            flags |= k_flags;
            if k_key != INVALID_KEY {
                if key != INVALID_KEY {
                    return Err(self.error("both sides of this rule supply a concrete key"));
                }
                key = k_key;
            }
        } else if chain_len == 0 {
            let (k_flags, k_key) = self.parse_key_value()?;
            flags |= k_flags;
            key = k_key;
        }

        Ok(KeyEvent::new(EventType::Key, flags, key))
    }

    /// `key := CHAR | HEX | LITERAL | ALIAS`. `spec.md` §4.B.
    fn parse_key_value(&mut self) -> Result<(ModFlags, u32)> {
        match self.peek().kind.clone() {
            TokenKind::Key(c) => {
                self.advance();
                let code = self
                    .keycode_map
                    .keycode_for_char(c)
                    .ok_or_else(|| self.error(format!("no keycode for character '{c}'")))?;
                Ok((ModFlags::empty(), code))
            }
            TokenKind::HexKeycode(v) => {
                self.advance();
                Ok((ModFlags::empty(), v))
            }
            TokenKind::LiteralKey(v) => {
                self.advance();
                Ok((ModFlags::empty(), v))
            }
            TokenKind::Alias(name) => {
                self.advance();
                let aliased = self.resolve_alias(&name)?;
                Ok((aliased.flags, aliased.key))
            }
            other => Err(self.error(format!("expected a key, found {other:?}"))),
        }
    }

    /// `action_clause := action | '[' process_map+ ']'`. `spec.md` §4.B.
    fn parse_action_clause(&mut self) -> Result<Hotkey> {
        if matches!(self.peek().kind, TokenKind::LBracket) {
            self.advance();
            let mut hotkey = Hotkey::default();
            loop {
                self.parse_process_map(&mut hotkey)?;
                if matches!(self.peek().kind, TokenKind::RBracket) {
                    self.advance();
                    break;
                }
            }
            if hotkey.process_names.is_empty() && hotkey.default_action.is_none() {
                return Err(self.error("process-scoped action list requires at least one entry"));
            }
            Ok(hotkey)
        } else {
            let action = self.parse_action()?;
            Ok(Hotkey::with_default(action))
        }
    }

    /// `process_map := ( STRING | '*' ) action`. `spec.md` §4.B.
    fn parse_process_map(&mut self, hotkey: &mut Hotkey) -> Result<()> {
        match self.peek().kind.clone() {
            TokenKind::String(name) => {
                self.advance();
                let action = self.parse_action()?;
                hotkey.process_names.push(name.to_lowercase());
                hotkey.per_process_actions.push(action);
            }
            TokenKind::Star => {
                self.advance();
                let action = self.parse_action()?;
                hotkey.default_action = Some(action);
            }
            other => return Err(self.error(format!("expected a process name or '*', found {other:?}"))),
        }
        Ok(())
    }

    /// `action := COMMAND | '.' action_name ( LAYER_REF )?`. `spec.md` §4.B.
    fn parse_action(&mut self) -> Result<Action> {
        match self.peek().kind.clone() {
            TokenKind::Command(body) => {
                self.advance();
                Ok(Action::Command(body.trim().to_string()))
            }
            TokenKind::Option(name) => {
                self.advance();
                match name.as_str() {
                    "activate" => {
                        let layer = self.expect_layer_ref("activate")?;
                        Ok(Action::PushLayer(layer))
                    }
                    "oneshot" => {
                        let layer = self.expect_layer_ref("oneshot")?;
                        Ok(Action::PushLayerOneshot(layer))
                    }
                    "deactivate" => Ok(Action::PopLayer),
                    "fallthrough" => Ok(Action::Fallthrough),
                    "nop" => Ok(Action::NoOp),
                    "nocapture" => Ok(Action::Nocapture),
                    other => Err(self.error(format!("unknown action name '.{other}'"))),
                }
            }
            other => Err(self.error(format!("expected an action, found {other:?}"))),
        }
    }

    fn expect_layer_ref(&mut self, action_name: &str) -> Result<String> {
        match self.peek().kind.clone() {
            TokenKind::LayerRef(name) => {
                if name.is_empty() {
                    return Err(self.error("empty layer name"));
                }
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected a layer reference after .{action_name}, found {other:?}"))),
        }
    }

    /// `.blocklist '[' STRING+ ']'`. `spec.md` §4.B.
    fn parse_blocklist(&mut self) -> Result<()> {
        self.advance(); // Option("blocklist")
        self.expect_kind(&TokenKind::LBracket, "'['")?;
        let mut count = 0;
        loop {
            match self.peek().kind.clone() {
                TokenKind::String(name) => {
                    self.state.blocklist.insert(name.to_lowercase());
                    count += 1;
                    self.advance();
                }
                TokenKind::RBracket => {
                    self.advance();
                    break;
                }
                other => return Err(self.error(format!("expected a string or ']', found {other:?}"))),
            }
        }
        if count == 0 {
            return Err(self.error("'.blocklist' requires at least one entry"));
        }
        Ok(())
    }

    /// `.load STRING`. `spec.md` §4.B; collected, not executed here.
    fn parse_load(&mut self) -> Result<()> {
        self.advance(); // Option("load")
        match self.peek().kind.clone() {
            TokenKind::String(path) => {
                self.advance();
                self.loads.push(path);
                Ok(())
            }
            other => Err(self.error(format!("expected a string path after '.load', found {other:?}"))),
        }
    }

    /// `.alias ALIAS keyevent`. `spec.md` §4.B.
    fn parse_alias_def(&mut self) -> Result<()> {
        self.advance(); // Option("alias")
        let name = match self.peek().kind.clone() {
            TokenKind::Alias(name) => {
                self.advance();
                name
            }
            other => return Err(self.error(format!("expected an alias name after '.alias', found {other:?}"))),
        };
        let value = self.parse_keyevent()?;
        self.state.aliases.insert(name, value);
        Ok(())
    }
}

/// Parse a single key-combination string in isolation, with no aliases in
/// scope — backs the CLI's `--key STRING` one-shot probe (`spec.md` §6).
pub fn parse_standalone_key_combination(source: &str, keycode_map: &dyn KeycodeMap) -> Result<KeyEvent> {
    let tokens = Tokenizer::new(source).tokenize_all();
    let mut builder = EngineStateBuilder::new();
    let mut parser = Parser { tokens, pos: 0, keycode_map, state: &mut builder, loads: Vec::new() };
    parser.parse_keyevent()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::NullKeycodeMap;

    struct AsciiKeycodeMap;
    impl KeycodeMap for AsciiKeycodeMap {
        fn keycode_for_char(&self, c: char) -> Option<u32> {
            Some(c as u32)
        }
    }

    #[test]
    fn simple_command_hotkey_in_default_layer() {
        let mut builder = EngineStateBuilder::new();
        let loads = builder.load_into("cmd - a : echo hi", &AsciiKeycodeMap).unwrap();
        assert!(loads.is_empty());
        let default = builder.layers.get(crate::model::DEFAULT_LAYER).unwrap();
        let event = KeyEvent::new(EventType::Key, ModFlags::CMD, 'a' as u32);
        let id = default.lookup(&event).unwrap();
        let hk = builder.arena.get(id).unwrap();
        assert_eq!(hk.default_action, Some(Action::Command("echo hi".into())));
    }

    #[test]
    fn layer_push_and_custom_layer_rule() {
        let mut builder = EngineStateBuilder::new();
        builder
            .load_into("|mylayer\ncmd - b : echo b\n\ncmd - m : .activate |mylayer", &AsciiKeycodeMap)
            .unwrap();
        assert!(builder.layers.contains_key("mylayer"));
        let default = builder.layers.get(crate::model::DEFAULT_LAYER).unwrap();
        let push_event = KeyEvent::new(EventType::Key, ModFlags::CMD, 'm' as u32);
        let id = default.lookup(&push_event).unwrap();
        assert_eq!(builder.arena.get(id).unwrap().default_action, Some(Action::PushLayer("mylayer".into())));
    }

    #[test]
    fn blocklist_lowercases_and_requires_entry() {
        let mut builder = EngineStateBuilder::new();
        builder.load_into(".blocklist [\"Terminal\"]", &AsciiKeycodeMap).unwrap();
        assert!(builder.blocklist.contains("terminal"));

        let mut empty = EngineStateBuilder::new();
        assert!(empty.load_into(".blocklist []", &AsciiKeycodeMap).is_err());
    }

    #[test]
    fn process_scoped_actions_with_default() {
        let mut builder = EngineStateBuilder::new();
        builder
            .load_into("cmd - a [ \"app\" : echo 2\n * : echo 3 ]", &AsciiKeycodeMap)
            .unwrap();
        let default = builder.layers.get(crate::model::DEFAULT_LAYER).unwrap();
        let event = KeyEvent::new(EventType::Key, ModFlags::CMD, 'a' as u32);
        let id = default.lookup(&event).unwrap();
        let hk = builder.arena.get(id).unwrap();
        assert_eq!(hk.resolve("other"), Some(&Action::Command("echo 3".into())));
        assert_eq!(hk.resolve("app"), Some(&Action::Command("echo 2".into())));
    }

    #[test]
    fn redefinition_replaces_and_frees_old_slot() {
        let mut builder = EngineStateBuilder::new();
        builder.load_into("cmd - a : echo 1\ncmd - a : echo 2", &AsciiKeycodeMap).unwrap();
        let default = builder.layers.get(crate::model::DEFAULT_LAYER).unwrap();
        let event = KeyEvent::new(EventType::Key, ModFlags::CMD, 'a' as u32);
        let id = default.lookup(&event).unwrap();
        assert_eq!(builder.arena.get(id).unwrap().default_action, Some(Action::Command("echo 2".into())));
    }

    #[test]
    fn distinct_flags_on_the_same_key_do_not_collide() {
        let mut builder = EngineStateBuilder::new();
        builder.load_into("cmd - a : echo cmd\nshift - a : echo shift", &AsciiKeycodeMap).unwrap();
        let default = builder.layers.get(crate::model::DEFAULT_LAYER).unwrap();
        let cmd_event = KeyEvent::new(EventType::Key, ModFlags::CMD, 'a' as u32);
        let shift_event = KeyEvent::new(EventType::Key, ModFlags::SHIFT, 'a' as u32);
        let cmd_id = default.lookup(&cmd_event).unwrap();
        let shift_id = default.lookup(&shift_event).unwrap();
        assert_eq!(
            builder.arena.get(cmd_id).unwrap().default_action,
            Some(Action::Command("echo cmd".into()))
        );
        assert_eq!(
            builder.arena.get(shift_id).unwrap().default_action,
            Some(Action::Command("echo shift".into()))
        );
    }

    #[test]
    fn alias_composes_modifiers_and_key_conflict_is_an_error() {
        let mut builder = EngineStateBuilder::new();
        builder
            .load_into(".alias $hyper cmd+alt+ctrl+shift\n$hyper - x : echo h", &AsciiKeycodeMap)
            .unwrap();
        let default = builder.layers.get(crate::model::DEFAULT_LAYER).unwrap();
        let all_mods = ModFlags::CMD | ModFlags::ALT | ModFlags::CTRL | ModFlags::SHIFT;
        let event = KeyEvent::new(EventType::Key, all_mods, 'x' as u32);
        assert!(default.lookup(&event).is_some());

        let mut conflict = EngineStateBuilder::new();
        let err = conflict.load_into(".alias $a x\n.alias $b y\n$a+$b : echo bad", &AsciiKeycodeMap);
        assert!(err.is_err());
    }

    #[test]
    fn pseudo_event_keydown_vs_keyup() {
        let mut builder = EngineStateBuilder::new();
        builder.load_into("@keydown(cmd-x) : echo down", &AsciiKeycodeMap).unwrap();
        let default = builder.layers.get(crate::model::DEFAULT_LAYER).unwrap();
        let down = KeyEvent::new(EventType::KeyDown, ModFlags::CMD, 'x' as u32);
        let up = KeyEvent::new(EventType::KeyUp, ModFlags::CMD, 'x' as u32);
        assert!(default.lookup(&down).is_some());
        assert!(default.lookup(&up).is_none());
    }

    #[test]
    fn undefined_alias_is_a_parse_error() {
        let mut builder = EngineStateBuilder::new();
        assert!(builder.load_into("$nope - a : echo hi", &NullKeycodeMap).is_err());
    }

    #[test]
    fn standalone_key_combination_has_no_aliases_in_scope() {
        let ev = parse_standalone_key_combination("cmd - a", &AsciiKeycodeMap).unwrap();
        assert_eq!(ev.kind, EventType::Key);
        assert_eq!(ev.key, 'a' as u32);
        assert_eq!(ev.flags, ModFlags::CMD);
        assert!(parse_standalone_key_combination("$hyper - a", &AsciiKeycodeMap).is_err());
    }

    #[test]
    fn load_directive_is_collected_not_executed() {
        let mut builder = EngineStateBuilder::new();
        let loads = builder.load_into(".load \"extra.mkhdrc\"", &AsciiKeycodeMap).unwrap();
        assert_eq!(loads, vec!["extra.mkhdrc".to_string()]);
    }
}
