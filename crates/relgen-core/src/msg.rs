//! Parse positions and the diagnostic message queue.

use serde::Serialize;
use std::fmt;
use std::io::{self, Write};

/// A saved parsing position: file name plus 1-based line and column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgKind {
    /// Recoverable warning.
    Warn,
    /// Fatal non-system error.
    Error,
    /// Fatal system error.
    Fatal,
}

impl MsgKind {
    fn label(self) -> &'static str {
        match self {
            MsgKind::Warn => "warning",
            MsgKind::Error => "error",
            MsgKind::Fatal => "fatal",
        }
    }
}

/// A single diagnostic emitted during parsing, linking, or migration
/// checking.
#[derive(Clone, Debug, Serialize)]
pub struct Msg {
    /// Position the diagnostic refers to, if any.
    pub pos: Option<Pos>,
    pub kind: MsgKind,
    pub text: String,
}

impl Msg {
    pub fn new(pos: Option<Pos>, kind: MsgKind, text: impl Into<String>) -> Self {
        Self {
            pos,
            kind,
            text: text.into(),
        }
    }
}

/// Ordered queue of diagnostics.
pub type MsgQueue = Vec<Msg>;

/// Write the queue to a sink, one `file:line:col: kind: text` line per
/// message.
pub fn write_msgs<W: Write>(sink: &mut W, msgs: &[Msg]) -> io::Result<()> {
    for m in msgs {
        match &m.pos {
            Some(pos) => writeln!(sink, "{}: {}: {}", pos, m.kind.label(), m.text)?,
            None => writeln!(sink, "{}: {}", m.kind.label(), m.text)?,
        }
    }
    Ok(())
}
