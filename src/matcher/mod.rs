//! The Matcher (spec.md §4.6): structural match of a rule's head pattern
//! against an expression node, with destructive parameter binding and
//! type-guard checks against the supertype lattice.

use crate::operator::{Arity, OperatorId, OperatorTable, UnaryKind};
use crate::rule::{Rule, RuleDatabase};
use crate::tree::{Expr, Term};

/// `match(e)` (spec.md §4.6): returns the first rule in `e`'s root
/// operator's list whose head structurally matches `e`. `untyped` is the
/// operator used for a parameter with no declared type (spec.md §4.3
/// "Identifier handling (HEAD)").
pub fn find_rule<'a>(
    db: &'a RuleDatabase,
    ops: &OperatorTable,
    untyped: OperatorId,
    e: &Expr,
) -> Option<&'a Rule> {
    db.rules_for(e.op()).iter().find(|rule| match_sub(ops, untyped, &rule.head, e))
}

/// `match_sub(h, e)` (spec.md §4.6): recursively checks `h` against `e`,
/// binding parameters destructively (setting a matched parameter name's
/// `value` field) as a side effect of a successful match.
pub fn match_sub(ops: &OperatorTable, untyped: OperatorId, head: &Expr, e: &Expr) -> bool {
    match head {
        Expr::Str(hs, _) => matches!(e, Expr::Str(es, _) if hs == es),
        Expr::Number(hv, _) => matches!(e, Expr::Number(ev, _) if hv == ev),
        Expr::Name(param) => {
            let param_ty = param.borrow().ty;
            let matches_type = param_ty == untyped || ops.is_subtype_or_eq(e.op(), param_ty);
            if matches_type {
                param.borrow_mut().value = Some(crate::tree::copy(e));
                true
            } else {
                false
            }
        }
        Expr::Term(ht) => match_term(ops, untyped, ht, e),
    }
}

fn match_term(ops: &OperatorTable, untyped: OperatorId, head: &Term, e: &Expr) -> bool {
    let Expr::Term(et) = e else { return false };
    if head.op != et.op {
        return false;
    }
    let arity = ops.get(head.op).arity;
    match arity {
        Arity::Nullary => true,
        Arity::Unary(UnaryKind::Prefix) | Arity::Unary(UnaryKind::Outfix1) => {
            match (&head.right, &et.right) {
                (Some(hr), Some(er)) => match_sub(ops, untyped, hr, er),
                (None, None) => true,
                _ => false,
            }
        }
        Arity::Unary(UnaryKind::Postfix) => match (&head.left, &et.left) {
            (Some(hl), Some(el)) => match_sub(ops, untyped, hl, el),
            (None, None) => true,
            _ => false,
        },
        Arity::Unary(UnaryKind::Outfix2) => true,
        Arity::Binary(_) => {
            let left_ok = match (&head.left, &et.left) {
                (Some(hl), Some(el)) => match_sub(ops, untyped, hl, el),
                (None, None) => true,
                _ => false,
            };
            left_ok
                && match (&head.right, &et.right) {
                    (Some(hr), Some(er)) => match_sub(ops, untyped, hr, er),
                    (None, None) => true,
                    _ => false,
                }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::span::Span;
    use crate::namespace::NameSpace;
    use crate::operator::{Arity as A, Assoc, EvalCode, NameKind};

    #[test]
    fn untyped_parameter_binds_unconditionally() {
        let mut ops = OperatorTable::new();
        let untyped = ops.declare_singleton("untyped", A::Name(NameKind::Identifier));
        let local = NameSpace::new_root(untyped);
        let param = Expr::Name(NameSpace::insert_child(&local.root, "n", untyped));

        assert!(match_sub(&ops, untyped, &param, &Expr::Number(3.0, 0)));
        let bound = NameSpace::find_child(&local.root, "n").unwrap();
        assert_eq!(bound.borrow().value.as_ref().and_then(|v| v.as_number()), Some(3.0));
    }

    #[test]
    fn typed_parameter_requires_subtype() {
        let mut ops = OperatorTable::new();
        let untyped = ops.declare_singleton("untyped", A::Name(NameKind::Identifier));
        let number =
            ops.declare("'number", A::Name(NameKind::Type), 0, EvalCode::Ordinary, &Span::empty()).unwrap();
        let positive =
            ops.declare("'positive", A::Name(NameKind::Type), 0, EvalCode::Ordinary, &Span::empty()).unwrap();
        ops.set_supertype(positive, "'number", &Span::empty()).unwrap();

        let local = NameSpace::new_root(untyped);
        let param = Expr::Name(NameSpace::insert_child(&local.root, "n", positive));

        // subject tagged as 'number (not a subtype of 'positive) should not match
        let subject_name = NameSpace::insert_child(&NameSpace::new_root(untyped).root, "v", number);
        assert!(!match_sub(&ops, untyped, &param, &Expr::Name(subject_name)));

        let subject_positive = NameSpace::insert_child(&NameSpace::new_root(untyped).root, "v", positive);
        assert!(match_sub(&ops, untyped, &param, &Expr::Name(subject_positive)));
    }

    #[test]
    fn binary_term_recurses_on_both_children() {
        let mut ops = OperatorTable::new();
        let untyped = ops.declare_singleton("untyped", A::Name(NameKind::Identifier));
        let plus = ops.declare("+", A::Binary(Assoc::Left), 45, EvalCode::Ordinary, &Span::empty()).unwrap();
        let local = NameSpace::new_root(untyped);
        let n = Expr::Name(NameSpace::insert_child(&local.root, "n", untyped));
        let m = Expr::Name(NameSpace::insert_child(&local.root, "m", untyped));
        let head = Expr::Term(Term::binary(plus, n, m));
        let subject = Expr::Term(Term::binary(plus, Expr::Number(2.0, 0), Expr::Number(3.0, 0)));
        assert!(match_sub(&ops, untyped, &head, &subject));
    }
}
