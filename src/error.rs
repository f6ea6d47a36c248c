//! Error reporting. All errors are fatal; there is no recovery path, so
//! the whole crate funnels diagnostics through a single `Error` type
//! rather than threading distinct error types through every phase, with
//! one kind per phase of a run (lexical, preprocessor, parse, semantic,
//! runtime) rather than parse errors alone.

use std::fmt;

use thiserror::Error;

use crate::common::span::Span;

/// The five fatal error kinds a run can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Lexical,
    Preprocessor,
    Parse,
    Semantic,
    Runtime,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Lexical => "Lexical error",
            Kind::Preprocessor => "Preprocessor error",
            Kind::Parse => "Parse error",
            Kind::Semantic => "Semantic error",
            Kind::Runtime => "Runtime error",
        };
        write!(f, "{}", s)
    }
}

/// A fatal, unrecoverable diagnostic. Printed with file name, line, and
/// position before the interpreter exits with a non-zero status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {reason}\n{span}")]
pub struct Error {
    pub kind: Kind,
    pub reason: String,
    pub span: Span,
}

impl Error {
    pub fn new(kind: Kind, reason: impl Into<String>, span: &Span) -> Error {
        Error { kind, reason: reason.into(), span: span.clone() }
    }

    pub fn lexical(reason: impl Into<String>, span: &Span) -> Error {
        Error::new(Kind::Lexical, reason, span)
    }

    pub fn preprocessor(reason: impl Into<String>, span: &Span) -> Error {
        Error::new(Kind::Preprocessor, reason, span)
    }

    pub fn parse(reason: impl Into<String>, span: &Span) -> Error {
        Error::new(Kind::Parse, reason, span)
    }

    pub fn semantic(reason: impl Into<String>, span: &Span) -> Error {
        Error::new(Kind::Semantic, reason, span)
    }

    pub fn runtime(reason: impl Into<String>, span: &Span) -> Error {
        Error::new(Kind::Runtime, reason, span)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
