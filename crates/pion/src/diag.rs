//! Diagnostics shared by the lexer, parser, evaluator, and backend.
//!
//! Every failure surfaces as a [`Diagnostic`] carrying a kind, a message, and
//! (when one exists) a source span. Rendering produces the canonical
//! `file:line:col: error: …` form with the offending source line and a caret
//! under the column. There is no recovery: the first diagnostic aborts the
//! whole run.

use std::{borrow::Cow, fmt, io};

use strum::IntoStaticStr;

/// Broad category of a diagnostic.
///
/// The category never changes the rendering (everything is an `error:`), but
/// tests and callers use it to assert on failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DiagKind {
    /// Unterminated string, unexpected byte.
    Lex,
    /// Unexpected token.
    Parse,
    /// Identifier unbound.
    Name,
    /// Argument or receiver of the wrong kind.
    Type,
    /// Too few, too many, or missing keyword arguments.
    Arity,
    /// Out-of-range integer, malformed version, missing input file, bad
    /// output path.
    Value,
    /// Filesystem or write failure.
    Io,
    /// A violated invariant; a bug.
    Internal,
}

/// A source position recorded on every AST node.
///
/// `file` indexes the workspace's evaluated-source table; `line` and `col`
/// are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub file: u32,
    pub line: u32,
    pub col: u32,
}

impl Span {
    #[must_use]
    pub const fn new(file: u32, line: u32, col: u32) -> Self {
        Self { file, line, col }
    }
}

/// A single error produced anywhere in the pipeline.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub msg: Cow<'static, str>,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn new(kind: DiagKind, msg: impl Into<Cow<'static, str>>, span: Span) -> Self {
        Self {
            kind,
            msg: msg.into(),
            span: Some(span),
        }
    }

    /// A diagnostic with no source position (I/O and setup failures).
    pub fn bare(kind: DiagKind, msg: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            span: None,
        }
    }

    pub fn lex(msg: impl Into<Cow<'static, str>>, span: Span) -> Self {
        Self::new(DiagKind::Lex, msg, span)
    }

    pub fn parse(msg: impl Into<Cow<'static, str>>, span: Span) -> Self {
        Self::new(DiagKind::Parse, msg, span)
    }

    pub fn name(msg: impl Into<Cow<'static, str>>, span: Span) -> Self {
        Self::new(DiagKind::Name, msg, span)
    }

    pub fn type_error(msg: impl Into<Cow<'static, str>>, span: Span) -> Self {
        Self::new(DiagKind::Type, msg, span)
    }

    pub fn arity(msg: impl Into<Cow<'static, str>>, span: Span) -> Self {
        Self::new(DiagKind::Arity, msg, span)
    }

    pub fn value(msg: impl Into<Cow<'static, str>>, span: Span) -> Self {
        Self::new(DiagKind::Value, msg, span)
    }

    pub fn io(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::bare(DiagKind::Io, msg)
    }

    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::bare(DiagKind::Internal, msg)
    }

    /// Renders the full caret diagnostic against the evaluated sources.
    ///
    /// Output shape:
    ///
    /// ```text
    /// meson.build:3:9: error: expected string, got number
    ///   3 | exe = executable(2, 'main.c')
    ///                        ^
    /// ```
    ///
    /// Spans pointing outside the source table degrade to the bare message.
    #[must_use]
    pub fn render(&self, sources: &[SourceFile]) -> String {
        use fmt::Write as _;

        let Some(span) = self.span else {
            return format!("error: {}", self.msg);
        };
        let Some(src) = sources.get(span.file as usize) else {
            return format!("error: {}", self.msg);
        };

        let mut out = String::new();
        let _ = write!(out, "{}:{}:{}: error: {}", src.name, span.line, span.col, self.msg);

        if let Some(line) = src.text.lines().nth(span.line.saturating_sub(1) as usize) {
            let gutter = format!("{:3} | ", span.line);
            let _ = write!(out, "\n{gutter}{line}\n");
            // Tabs keep their width in the caret line so the marker stays
            // aligned with the source line above it.
            let mut caret = " ".repeat(gutter.len());
            for (i, c) in line.chars().enumerate() {
                if i + 1 >= span.col as usize {
                    break;
                }
                caret.push(if c == '\t' { '\t' } else { ' ' });
            }
            caret.push('^');
            out.push_str(&caret);
        }

        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{}:{}: error: {}", span.line, span.col, self.msg),
            None => write!(f, "error: {}", self.msg),
        }
    }
}

impl From<io::Error> for Diagnostic {
    fn from(err: io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// One evaluated source file, kept for the caret renderer and the
/// regenerate edge.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

/// Result alias used across the evaluator.
pub type EvalResult<T> = Result<T, Diagnostic>;
