//! The Operator Table (spec.md §4.1): a registry of operators indexed by
//! lexical category, with arity, precedence, supertype, overload/outfix
//! linkage, and eval code. Grounded on the teacher's `compiler::parse::Prec`
//! enum for the precedence idiom, generalized from a fixed enum to a
//! user-extensible table since operators here are declared at runtime by
//! `#op`/`#type` directives rather than fixed by the grammar.

mod table;

pub use table::{
    Arity, Assoc, Category, EvalCode, NameKind, Operator, OperatorId, OperatorTable,
    ReduceAction, UnaryKind,
};
