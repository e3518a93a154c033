//! Dispatch engine and action interpreter (Components D and E, `spec.md`
//! §4.D/§4.E). Everything here operates on a `mkhd_parser::EngineState`
//! already built by the `parser` crate; no parsing, no I/O.

pub mod dispatch;
pub mod interpreter;

pub use dispatch::dispatch;
