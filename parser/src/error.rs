//! Parse diagnostics: `spec.md` §4.B "Error policy" — single-pass, fail-fast,
//! `line:column` plus a message. Grounded on the teacher's
//! `parser/src/cfg/error.rs` (`CfgError { err_span, help_msg, file_name,
//! file_content }`) but line/column-native rather than byte-span-native,
//! since `spec.md`'s `Token` carries `(line, column)` rather than an offset.

use crate::token::Pos;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic()]
pub struct ParseError {
    pub message: String,
    pub pos: Pos,
    #[label("here")]
    pub err_span: Option<SourceSpan>,
    pub file_name: Option<String>,
    pub file_content: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        Self { message: message.into(), pos, err_span: None, file_name: None, file_content: None }
    }

    /// Attach the source so `miette`'s fancy renderer can show a snippet;
    /// the plain `line:column` in `message`/`Display` is still present
    /// without this.
    pub fn with_source(mut self, file_name: impl Into<String>, content: &str) -> miette::Error {
        let byte_offset = line_col_to_byte_offset(content, self.pos);
        self.err_span = Some(SourceSpan::new(byte_offset.into(), 1.into()));
        let file_name = file_name.into();
        self.file_name = Some(file_name.clone());
        self.file_content = Some(content.to_string());
        let e: miette::Error = self.into();
        e.with_source_code(NamedSource::new(file_name, content.to_string()))
    }
}

fn line_col_to_byte_offset(content: &str, pos: Pos) -> usize {
    let mut line = 1u32;
    let mut col = 1u32;
    for (idx, c) in content.char_indices() {
        if line == pos.line && col == pos.column {
            return idx;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    content.len()
}
