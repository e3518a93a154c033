//! Tokenizer, recursive-descent parser, data model and layer/hotkey store
//! for mkhd's configuration language (Components A, B, C and F of
//! `spec.md` §2). No filesystem or OS access: callers hand this crate
//! source text and get back an `EngineState` or a diagnostic.

pub mod alloc;
pub mod error;
pub mod keys;
pub mod model;
pub mod parse;
pub mod store;
pub mod token;

pub use error::ParseError;
pub use model::{Action, EventType, Hotkey, KeyEvent, Layer, LayerStackFrame, ModFlags};
pub use store::EngineState;
