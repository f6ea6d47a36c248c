//! The Expression Tree (spec.md §3 "Expression node", §4.2): a uniform,
//! four-variant node representation for term, name, number, and string
//! nodes, with `copy`, `print`, and `update` (substitution) operations.
//! Grounded on the teacher's `construct::tree` module for the idiom of a
//! small tagged-union AST with `Box` children, generalized from the
//! teacher's fixed `Base`/`Sugar` shape to the four arity-driven variants
//! `spec.md` §3 names.

use std::rc::Rc;

use crate::namespace::NameRef;
use crate::operator::{OperatorId, OperatorTable, UnaryKind};

/// A term node (spec.md §3): holds a TERM-arity operator, an optional
/// label, and the child slots its arity mandates. Nullary terms have no
/// children; prefix has `right` only; postfix has `left` only; binary has
/// both; OUTFIX1 has `right` only (its body is everything between the
/// matching pair); OUTFIX2 never appears as a live node (see §4.3 item 3d
/// — it is always consumed at reduce time).
#[derive(Debug, Clone)]
pub struct Term {
    pub op: OperatorId,
    pub label: Option<NameRef>,
    pub left: Option<Box<Expr>>,
    pub right: Option<Box<Expr>>,
}

/// A uniform expression node (spec.md §3). `Number` and `String` carry
/// their own singleton/interned operator so that the walker and printer
/// never need a special case outside of `Term`.
#[derive(Debug, Clone)]
pub enum Expr {
    Term(Term),
    Name(NameRef),
    Number(f64, OperatorId),
    Str(Rc<str>, OperatorId),
}

impl Term {
    pub fn nullary(op: OperatorId) -> Term {
        Term { op, label: None, left: None, right: None }
    }

    pub fn prefix(op: OperatorId, right: Expr) -> Term {
        Term { op, label: None, left: None, right: Some(Box::new(right)) }
    }

    pub fn postfix(op: OperatorId, left: Expr) -> Term {
        Term { op, label: None, left: Some(Box::new(left)), right: None }
    }

    pub fn binary(op: OperatorId, left: Expr, right: Expr) -> Term {
        Term { op, label: None, left: Some(Box::new(left)), right: Some(Box::new(right)) }
    }

    pub fn outfix1(op: OperatorId, right: Expr) -> Term {
        Term { op, label: None, left: None, right: Some(Box::new(right)) }
    }
}

impl Expr {
    pub fn term(t: Term) -> Expr {
        Expr::Term(t)
    }

    /// The node's root operator, for every variant (spec.md §3's number
    /// and string singletons count as operators too).
    pub fn op(&self) -> OperatorId {
        match self {
            Expr::Term(t) => t.op,
            Expr::Name(n) => n.borrow().ty,
            Expr::Number(_, op) => *op,
            Expr::Str(_, op) => *op,
        }
    }

    pub fn as_term(&self) -> Option<&Term> {
        match self {
            Expr::Term(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_term_mut(&mut self) -> Option<&mut Term> {
        match self {
            Expr::Term(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Number(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&NameRef> {
        match self {
            Expr::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&Rc<str>> {
        match self {
            Expr::Str(s, _) => Some(s),
            _ => None,
        }
    }
}

/// `copy(e)` (spec.md §4.2): deep-copies the term structure. Names are
/// *not* deep-copied — only the `Rc` handle is cloned, matching the
/// spec's ref-counted name nodes. Strings are aliased (an interned
/// `Rc<str>`, so the clone is always sound — spec.md §9 policy (a)).
pub fn copy(e: &Expr) -> Expr {
    match e {
        Expr::Term(t) => Expr::Term(Term {
            op: t.op,
            label: t.label.clone(),
            left: t.left.as_ref().map(|c| Box::new(copy(c))),
            right: t.right.as_ref().map(|c| Box::new(copy(c))),
        }),
        Expr::Name(n) => Expr::Name(Rc::clone(n)),
        Expr::Number(v, op) => Expr::Number(*v, *op),
        Expr::Str(s, op) => Expr::Str(Rc::clone(s), *op),
    }
}

/// `update(e)` (spec.md §4.2): walks the tree and, for every name node
/// whose bound value is non-null, replaces the name in place with a
/// fresh copy of the (recursively updated) value. Run after every
/// successful rewrite to propagate bindings produced by the `bind`
/// primitive (spec.md §4.7 step 2, §4.8 "bind").
pub fn update(e: Expr) -> Expr {
    match e {
        Expr::Term(mut t) => {
            clear_label_binding(&t.label);
            t.left = t.left.map(|c| Box::new(update(*c)));
            t.right = t.right.map(|c| Box::new(update(*c)));
            Expr::Term(t)
        }
        Expr::Name(n) => {
            let bound = n.borrow().value.as_ref().map(copy);
            match bound {
                Some(v) => update(v),
                None => Expr::Name(n),
            }
        }
        other => other,
    }
}

/// Resets a label's own bound value, the same way [`crate::namespace::clear_bindings`]
/// resets a rule's local space — a label is a live name node `bind` can
/// target directly, so it can carry a binding of its own independent of
/// whatever the term's children bind (spec.md §8 "After `update` returns,
/// no name node in the result tree has a non-null bound value"). Unlike an
/// ordinary `Name` occurrence, a label is not a substitution site — there
/// is nowhere in the tree to splice its bound value into — so it is simply
/// cleared rather than expanded.
fn clear_label_binding(label: &Option<NameRef>) {
    if let Some(label) = label {
        label.borrow_mut().value = None;
    }
}

/// `instantiate(body)` (spec.md §4.9): clones a rule body against the
/// bindings a successful match left on its local name space. A term's
/// label is carried forward by value — if the label name was itself bound
/// during match (the common case: the namespace merge step points a
/// local's `value` at its newly-allocated name node, or a parameter's
/// bound value is itself a name), the clone's label follows that
/// reference rather than the original declaration site; an unbound label
/// (a brand new name introduced directly in the body) is kept as-is. A
/// `Name` node is replaced by a copy of its bound value if it names a
/// parameter, or by a direct reference to its (possibly freshly merged-in)
/// name node if it is an unbound local or carried-forward label. Number
/// and string nodes are shallow-cloned, matching `copy`'s aliasing policy.
pub fn instantiate(body: &Expr) -> Expr {
    match body {
        Expr::Term(t) => {
            let label = t.label.as_ref().map(|l| match &l.borrow().value {
                Some(Expr::Name(n)) => Rc::clone(n),
                _ => Rc::clone(l),
            });
            Expr::Term(Term {
                op: t.op,
                label,
                left: t.left.as_deref().map(|c| Box::new(instantiate(c))),
                right: t.right.as_deref().map(|c| Box::new(instantiate(c))),
            })
        }
        Expr::Name(n) => match &n.borrow().value {
            Some(v) => copy(v),
            None => Expr::Name(Rc::clone(n)),
        },
        Expr::Number(v, op) => Expr::Number(*v, *op),
        Expr::Str(s, op) => Expr::Str(Rc::clone(s), *op),
    }
}

/// True if any name reachable from `e` still carries a bound value — an
/// invariant violation per spec.md §4.7 step 1 ("error if a name with a
/// non-null bound value is encountered inside the subject") once `update`
/// should have expanded it.
pub fn has_loose_binding(e: &Expr) -> bool {
    match e {
        Expr::Term(t) => {
            t.label.as_ref().is_some_and(|l| l.borrow().value.is_some())
                || t.left.as_deref().is_some_and(has_loose_binding)
                || t.right.as_deref().is_some_and(has_loose_binding)
        }
        Expr::Name(n) => n.borrow().value.is_some(),
        _ => false,
    }
}

/// Prints `e` in fully-parenthesized infix form (spec.md §6 "Output"):
/// alphabetic operators are padded with spaces, outfix operators print
/// their matching pair, and labels print as `name:`.
pub fn print(e: &Expr, ops: &OperatorTable) -> String {
    let mut out = String::new();
    print_into(e, ops, &mut out);
    out
}

fn print_into(e: &Expr, ops: &OperatorTable, out: &mut String) {
    match e {
        Expr::Number(v, _) => out.push_str(&format_number(*v)),
        Expr::Str(s, _) => {
            out.push('"');
            out.push_str(s);
            out.push('"');
        }
        Expr::Name(n) => out.push_str(&n.borrow().print_value),
        Expr::Term(t) => print_term(t, ops, out),
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn print_term(t: &Term, ops: &OperatorTable, out: &mut String) {
    if let Some(label) = &t.label {
        out.push_str(&label.borrow().print_value);
        out.push(':');
    }

    let op = ops.get(t.op);
    let name: &str = &op.name;
    let spaced = name.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_');

    match op.arity {
        crate::operator::Arity::Nullary => out.push_str(name),
        crate::operator::Arity::Unary(UnaryKind::Prefix) => {
            out.push_str(name);
            if spaced {
                out.push(' ');
            }
            out.push('(');
            print_into(t.right.as_deref().unwrap(), ops, out);
            out.push(')');
        }
        crate::operator::Arity::Unary(UnaryKind::Postfix) => {
            out.push('(');
            print_into(t.left.as_deref().unwrap(), ops, out);
            out.push(')');
            out.push_str(name);
        }
        crate::operator::Arity::Unary(UnaryKind::Outfix1) => {
            out.push_str(name);
            print_into(t.right.as_deref().unwrap(), ops, out);
            if let Some(other) = op.other {
                out.push_str(&ops.get(other).name);
            }
        }
        crate::operator::Arity::Unary(UnaryKind::Outfix2) => out.push_str(name),
        crate::operator::Arity::Binary(_) => {
            out.push('(');
            print_into(t.left.as_deref().unwrap(), ops, out);
            out.push(')');
            if spaced {
                out.push(' ');
                out.push_str(name);
                out.push(' ');
            } else {
                out.push_str(name);
            }
            out.push('(');
            print_into(t.right.as_deref().unwrap(), ops, out);
            out.push(')');
        }
        _ => out.push_str(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NameSpace;
    use crate::operator::{Arity, Assoc, EvalCode};
    use crate::common::span::Span;

    fn table_with_plus() -> (OperatorTable, OperatorId) {
        let mut ops = OperatorTable::new();
        let plus = ops
            .declare("+", Arity::Binary(Assoc::Left), 45, EvalCode::Ordinary, &Span::empty())
            .unwrap();
        (ops, plus)
    }

    #[test]
    fn copy_preserves_structure_and_is_independent() {
        let (_ops, plus) = table_with_plus();
        let e = Expr::Term(Term::binary(plus, Expr::Number(1.0, 0), Expr::Number(2.0, 0)));
        let c = copy(&e);
        match (&e, &c) {
            (Expr::Term(a), Expr::Term(b)) => assert_eq!(a.op, b.op),
            _ => panic!("expected terms"),
        }
    }

    #[test]
    fn update_expands_bound_name_and_clears_binding() {
        let undeclared = 99;
        let local = NameSpace::new_root(undeclared);
        let name = NameSpace::insert_child(&local.root, "x", undeclared);
        name.borrow_mut().value = Some(Expr::Number(42.0, 0));

        let e = Expr::Name(Rc::clone(&name));
        let updated = update(e);
        assert_eq!(updated.as_number(), Some(42.0));
        assert!(!has_loose_binding(&updated));
    }
}
