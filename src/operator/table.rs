use std::collections::HashMap;
use std::rc::Rc;

use crate::common::span::Span;
use crate::error::{Error, Result};

pub type OperatorId = u32;

/// Which of the scanner's lexical categories an operator's print name
/// falls into (spec.md §4.1: "single-char, double-char, alphanumeric, type").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SingleChar,
    DoubleChar,
    Alphanumeric,
    Type,
}

impl Category {
    /// Classifies a print name the way the scanner would classify the
    /// token spelling it produced it from.
    pub fn of(name: &str) -> Category {
        if name.starts_with('\'') {
            return Category::Type;
        }
        let symbolic = name.chars().all(|c| !c.is_alphanumeric() && c != '_');
        if symbolic {
            match name.chars().count() {
                1 => Category::SingleChar,
                _ => Category::DoubleChar,
            }
        } else {
            Category::Alphanumeric
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
    NonAssoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryKind {
    Prefix,
    Postfix,
    Outfix1,
    Outfix2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Identifier,
    Type,
}

/// The arity tag of an operator (spec.md §3 "Operator").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Nullary,
    Unary(UnaryKind),
    Binary(Assoc),
    Name(NameKind),
    Num,
    Str,
}

impl Arity {
    pub fn is_binary(&self) -> bool {
        matches!(self, Arity::Binary(_))
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, Arity::Unary(_))
    }

    pub fn unary_kind(&self) -> Option<UnaryKind> {
        match self {
            Arity::Unary(k) => Some(*k),
            _ => None,
        }
    }
}

/// Parser-time reduce actions, encoded on the teacher's model as negative
/// eval codes; here modeled directly as an enum per spec.md §9's
/// recommendation ("Model as an enumeration ... rather than raw integers").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceAction {
    /// `-1`: discard the wrapping outfix pair, e.g. parenthesization.
    Discard,
    /// `-2`: attach a left-hand name as a label on a right-hand term.
    Label,
    /// `-3`: negate a numeric literal in place.
    Negate,
    /// `-4`: do not walk into this subtree when no rule matches it.
    NoEval,
    /// `-5`: force full simplification of the subtree before continuing.
    FullSimplify,
}

/// The eval code attached to an operator (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalCode {
    /// `0`: ordinary operator, no special behavior.
    Ordinary,
    /// Positive: index of a primitive in the dispatcher (§4.8).
    Primitive(u32),
    /// Negative: a parser reduce action (§4.3).
    Reduce(ReduceAction),
}

/// A registered operator. Operators are immortal for the lifetime of a
/// run (spec.md §5); identity is a stable integer assigned at
/// registration (`id`), per §9's "Operator identity" design note, rather
/// than the C source's raw pointer comparison.
#[derive(Debug, Clone)]
pub struct Operator {
    pub id: OperatorId,
    pub name: Rc<str>,
    pub arity: Arity,
    pub precedence: i32,
    pub supertype: Option<OperatorId>,
    pub other: Option<OperatorId>,
    pub eval: EvalCode,
}

impl Operator {
    pub fn is_outfix1(&self) -> bool {
        self.arity.unary_kind() == Some(UnaryKind::Outfix1)
    }

    pub fn is_outfix2(&self) -> bool {
        self.arity.unary_kind() == Some(UnaryKind::Outfix2)
    }
}

/// The registry of all operators known in a run: an id-indexed arena that
/// owns the actual `Operator` values, plus a lookup keyed by lexical
/// category and print name (spec.md §4.1's four category lists — single-
/// char, double-char, alphanumeric, type — collapsed here into one map
/// since every lookup this crate performs is by `(category, name)`, never
/// "all operators in a category").
#[derive(Debug, Default)]
pub struct OperatorTable {
    operators: Vec<Operator>,
    /// Fast lookup from (category, name) to the one or two operators
    /// sharing that print name.
    by_name: HashMap<(Category, String), Vec<OperatorId>>,
}

impl OperatorTable {
    pub fn new() -> OperatorTable {
        OperatorTable { operators: Vec::new(), by_name: HashMap::new() }
    }

    pub fn get(&self, id: OperatorId) -> &Operator {
        &self.operators[id as usize]
    }

    pub fn get_mut(&mut self, id: OperatorId) -> &mut Operator {
        &mut self.operators[id as usize]
    }

    /// Registers a fresh operator with no name collisions possible
    /// (used for compiler-internal singletons — positive/zero/negative
    /// number, string, undeclared, untyped, true, false, BOE).
    pub fn declare_singleton(&mut self, name: &str, arity: Arity) -> OperatorId {
        let id = self.operators.len() as OperatorId;
        self.operators.push(Operator {
            id,
            name: Rc::from(name),
            arity,
            precedence: 0,
            supertype: None,
            other: None,
            eval: EvalCode::Ordinary,
        });
        id
    }

    /// Declares a user operator per spec.md §4.1's insertion rules.
    /// Returns the new operator's id, or an error on an illegal name
    /// collision.
    pub fn declare(
        &mut self,
        name: &str,
        arity: Arity,
        precedence: i32,
        eval: EvalCode,
        span: &Span,
    ) -> Result<OperatorId> {
        let category = Category::of(name);
        let key = (category, name.to_string());
        let existing = self.by_name.get(&key).cloned().unwrap_or_default();

        if let Some(&other_id) = existing.first() {
            let other = self.get(other_id);
            // spec.md §4.1: identical arity category is always a
            // duplicate; a binary/unary pair overloads; anything else
            // (e.g. a nullary or NAME operator colliding with a binary
            // one) is some other illegal collision.
            let overloadable = (other.arity.is_binary() && arity.is_unary())
                || (other.arity.is_unary() && arity.is_binary());
            if !overloadable {
                return Err(Error::semantic(
                    format!("duplicate operator '{}'", name),
                    span,
                ));
            }
            if existing.len() >= 2 {
                return Err(Error::semantic(
                    format!("operator '{}' already has both a binary and a unary form", name),
                    span,
                ));
            }
        }

        let id = self.operators.len() as OperatorId;
        self.operators.push(Operator {
            id,
            name: Rc::from(name),
            arity,
            precedence,
            supertype: None,
            other: None,
            eval,
        });

        if let Some(&other_id) = existing.first() {
            // link the unary/binary overload pair via `other`
            self.get_mut(id).other = Some(other_id);
            self.get_mut(other_id).other = Some(id);
        }

        self.by_name.entry((category, name.to_string())).or_default().push(id);

        Ok(id)
    }

    /// Links two outfix operators as each other's `other`, e.g. `(` / `)`.
    pub fn pair_outfix(&mut self, first: OperatorId, second: OperatorId) {
        self.get_mut(first).other = Some(second);
        self.get_mut(second).other = Some(first);
    }

    /// Sets `op`'s supertype, resolving `parent` by name in the `Type`
    /// category. Must succeed at declaration time (spec.md §4.1).
    pub fn set_supertype(&mut self, op: OperatorId, parent_name: &str, span: &Span) -> Result<()> {
        let parent_id = self.find(Category::Type, parent_name).ok_or_else(|| {
            Error::preprocessor(format!("unknown supertype '{}'", parent_name), span)
        })?;

        // Acyclicity check (spec.md §3 invariant: "supertype chains are
        // acyclic and finite").
        let mut cursor = Some(parent_id);
        while let Some(c) = cursor {
            if c == op {
                return Err(Error::preprocessor(
                    format!("supertype cycle through '{}'", parent_name),
                    span,
                ));
            }
            cursor = self.get(c).supertype;
        }

        self.get_mut(op).supertype = Some(parent_id);
        Ok(())
    }

    pub fn find(&self, category: Category, name: &str) -> Option<OperatorId> {
        self.by_name
            .get(&(category, name.to_string()))
            .and_then(|ids| ids.first().copied())
    }

    /// Finds the operator that overloads `id` on the other side of the
    /// unary/binary divide, if any.
    pub fn other_of(&self, id: OperatorId) -> Option<OperatorId> {
        self.get(id).other
    }

    /// Whether `sub` is `sup`, or a transitive subtype of it, per the
    /// supertype chain (spec.md §4.6, §4.5).
    pub fn is_subtype_or_eq(&self, sub: OperatorId, sup: OperatorId) -> bool {
        let mut cursor = Some(sub);
        while let Some(c) = cursor {
            if c == sup {
                return true;
            }
            cursor = self.get(c).supertype;
        }
        false
    }

    /// True if `a` is a strict transitive subtype of `b`.
    pub fn is_strict_subtype(&self, a: OperatorId, b: OperatorId) -> bool {
        a != b && self.is_subtype_or_eq(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::empty()
    }

    #[test]
    fn duplicate_binary_is_error() {
        let mut table = OperatorTable::new();
        table.declare("+", Arity::Binary(Assoc::Left), 45, EvalCode::Ordinary, &span()).unwrap();
        let err = table.declare("+", Arity::Binary(Assoc::Left), 50, EvalCode::Ordinary, &span());
        assert!(err.is_err());
    }

    #[test]
    fn binary_unary_overload_links_other() {
        let mut table = OperatorTable::new();
        let minus_bin = table
            .declare("-", Arity::Binary(Assoc::Left), 45, EvalCode::Ordinary, &span())
            .unwrap();
        let minus_un = table
            .declare("-", Arity::Unary(UnaryKind::Prefix), 60, EvalCode::Ordinary, &span())
            .unwrap();

        assert_eq!(table.other_of(minus_bin), Some(minus_un));
        assert_eq!(table.other_of(minus_un), Some(minus_bin));
    }

    #[test]
    fn supertype_chain() {
        let mut table = OperatorTable::new();
        let number = table.declare("'number", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span()).unwrap();
        let positive = table
            .declare("'positive", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span())
            .unwrap();
        table.set_supertype(positive, "'number", &span()).unwrap();

        assert!(table.is_subtype_or_eq(positive, number));
        assert!(!table.is_subtype_or_eq(number, positive));
    }

    #[test]
    fn nullary_binary_collision_is_an_error_not_an_overload() {
        // spec.md §4.1: only a binary/unary pair may overload a print
        // name; a nullary operator colliding with a binary one is "any
        // other collision" and must be rejected, not silently linked as
        // if it were a unary overload partner.
        let mut table = OperatorTable::new();
        table.declare("x", Arity::Nullary, 0, EvalCode::Ordinary, &span()).unwrap();
        let err = table.declare("x", Arity::Binary(Assoc::Left), 10, EvalCode::Ordinary, &span());
        assert!(err.is_err());
    }

    #[test]
    fn supertype_cycle_rejected() {
        let mut table = OperatorTable::new();
        let a = table.declare("'a", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span()).unwrap();
        let b = table.declare("'b", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span()).unwrap();
        table.set_supertype(b, "'a", &span()).unwrap();
        assert!(table.set_supertype(a, "'b", &span()).is_err());
    }
}
