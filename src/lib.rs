//! # Bertrand
//!
//! A term-rewriting interpreter for an extensible operator language. A
//! program is a sequence of rules `HEAD { BODY } ['TAG]`; the interpreter
//! iteratively rewrites a distinguished subject expression until no rule
//! matches, then prints the normal form.
//!
//! The crate is organized leaf-first, the way the language's components
//! depend on one another:
//!
//! - [`operator`] — the operator table: arity, precedence, supertype and
//!   overload/outfix linkage, eval codes.
//! - [`tree`] — the expression tree: term/name/number/string nodes, copy,
//!   update (substitution), instantiate, and printing.
//! - [`namespace`] — the hierarchical, reference-counted name space and its
//!   merge operation.
//! - [`scanner`] — the lexical scanner (tokens, spans, `#`-directive lines).
//! - [`parser`] — the attributed operator-precedence parser.
//! - [`preprocessor`] — `#op`/`#type`/`#primitive`/`#include`/`#trace`
//!   directive handling.
//! - [`rule`] — the rule database and the specificity comparator.
//! - [`matcher`] — structural pattern matching with parameter binding.
//! - [`primitive`] — the built-in arithmetic/comparison/binding/drawing
//!   dispatcher.
//! - [`walker`] — the rewrite engine's tree walk.
//! - [`interpreter`] — ties every component together into one run.
//! - [`graphics`] — the line-drawing sink abstraction.
//! - [`error`], [`config`] — diagnostics and runtime configuration.
//!
//! Embedding this crate looks like:
//!
//! ```
//! use bertrand::config::Config;
//! use bertrand::interpreter::Interpreter;
//! use bertrand::common::source::Source;
//! use std::rc::Rc;
//!
//! let mut interpreter = Interpreter::new(Config::default());
//! interpreter
//!     .load_source(Rc::new(Source::source(
//!         "#op + binary left 45\nn'constant + m'constant { add }\nmain { 2 + 2 }\n",
//!     )))
//!     .unwrap();
//! let result = interpreter.run().unwrap();
//! assert_eq!(interpreter.print(&result), "4");
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod graphics;
pub mod interpreter;
pub mod matcher;
pub mod namespace;
pub mod operator;
pub mod parser;
pub mod preprocessor;
pub mod primitive;
pub mod rule;
pub mod scanner;
pub mod tree;
pub mod walker;

pub use config::Config;
pub use error::{Error, Result};
pub use interpreter::Interpreter;
