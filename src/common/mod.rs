//! Datastructures shared across the scanner, parser, rule database, and
//! walker: source file handles, source spans, and the string interner.

pub mod interner;
pub mod source;
pub mod span;
