use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A handle on a piece of program text: where it came from, and its
/// contents. `Source`s are reference-counted (see [`Span`](super::span::Span))
/// so that spans, tokens, and AST nodes can all point at the same buffer
/// without copying it.
#[derive(Debug, Eq, PartialEq)]
pub struct Source {
    /// Display name — a file path, or `<stdin>` / `<string>` for sourceless input.
    pub path: PathBuf,
    pub contents: String,
}

impl Source {
    /// Wraps a literal string as an anonymous source, useful for tests and
    /// for programs fed in as a single rule body.
    pub fn source(contents: &str) -> Source {
        Source { path: PathBuf::from("./source"), contents: contents.to_string() }
    }

    /// Reads a source from a path on disk.
    pub fn path(path: &Path) -> io::Result<Source> {
        let contents = fs::read_to_string(path)?;
        Ok(Source { path: path.to_path_buf(), contents })
    }

    /// Reads all of standard input as a single source, per the CLI's
    /// "no positional arguments" fallback.
    pub fn stdin() -> io::Result<Source> {
        use io::Read;
        let mut contents = String::new();
        io::stdin().read_to_string(&mut contents)?;
        Ok(Source { path: PathBuf::from("<stdin>"), contents })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolves an `#include path` against the three search locations: literal
/// path, `libraries/path`, then `<libdir>/path`.
pub fn resolve_include(path: &str, library_dir: &Path) -> io::Result<Source> {
    let literal = PathBuf::from(path);
    if literal.is_file() {
        return Source::path(&literal);
    }

    let under_libraries = PathBuf::from("libraries").join(path);
    if under_libraries.is_file() {
        return Source::path(&under_libraries);
    }

    let under_libdir = library_dir.join(path);
    Source::path(&under_libdir)
}
