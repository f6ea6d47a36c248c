//! The Specificity Comparator (spec.md §4.5): a total order over patterns
//! used to insert rules into the database in descending-specificity
//! order. Implemented as a direct transcription of the six-step
//! comparator spec.md lays out, with operator identity (`OperatorId`,
//! spec.md §9 "Operator identity") standing in for the C source's raw
//! pointer-order tie-break.

use std::cmp::Ordering;

use crate::operator::{Arity, OperatorId, OperatorTable};
use crate::tree::Expr;

/// Compares patterns `a` and `b`; `Greater` means `a` is more specific.
/// `untyped` is the operator used for an undeclared (untyped) parameter,
/// needed by rule 2 ("untyped-parameter root is less specific than
/// anything non-untyped").
pub fn compare(ops: &OperatorTable, untyped: OperatorId, a: &Expr, b: &Expr) -> Ordering {
    let op_a = a.op();
    let op_b = b.op();

    // 1. Same root operator: recurse structurally.
    if op_a == op_b {
        if let (Expr::Term(ta), Expr::Term(tb)) = (a, b) {
            if let (Some(la), Some(lb)) = (&ta.left, &tb.left) {
                let c = compare(ops, untyped, la, lb);
                if c != Ordering::Equal {
                    return c;
                }
            }
            if let (Some(ra), Some(rb)) = (&ta.right, &tb.right) {
                let c = compare(ops, untyped, ra, rb);
                if c != Ordering::Equal {
                    return c;
                }
            }
        }
        return Ordering::Equal;
    }

    // 2. Untyped parameter is least specific.
    let a_untyped = op_a == untyped;
    let b_untyped = op_b == untyped;
    if a_untyped != b_untyped {
        return if a_untyped { Ordering::Less } else { Ordering::Greater };
    }

    // 3. Supertype chain: the subtype is more specific.
    if ops.is_strict_subtype(op_a, op_b) {
        return Ordering::Greater;
    }
    if ops.is_strict_subtype(op_b, op_a) {
        return Ordering::Less;
    }

    // 4. A non-NAME operator beats a NAME operator.
    let a_is_name = matches!(ops.get(op_a).arity, Arity::Name(_));
    let b_is_name = matches!(ops.get(op_b).arity, Arity::Name(_));
    if a_is_name != b_is_name {
        return if a_is_name { Ordering::Less } else { Ordering::Greater };
    }

    // 5. Higher precedence is more specific.
    let prec_a = ops.get(op_a).precedence;
    let prec_b = ops.get(op_b).precedence;
    if prec_a != prec_b {
        return prec_a.cmp(&prec_b);
    }

    // 6. Tie-break on stable operator identity for a total order.
    op_a.cmp(&op_b)
}

#[cfg(test)]
mod properties {
    use super::*;
    use crate::common::span::Span;
    use crate::operator::{Assoc, EvalCode};
    use crate::tree::Term;
    use proptest::prelude::*;

    proptest! {
        // A total order is antisymmetric: swapping the arguments must
        // swap Less/Greater and leave Equal fixed, for any pair of
        // same-shape nullary patterns at arbitrary precedences.
        #[test]
        fn comparator_is_antisymmetric(prec_a in 0i32..200, prec_b in 0i32..200) {
            let mut ops = OperatorTable::new();
            let untyped = ops.declare_singleton("'untyped", Arity::Name(crate::operator::NameKind::Type));
            let op_a = ops
                .declare(&format!("lhs{prec_a}"), Arity::Binary(Assoc::Left), prec_a, EvalCode::Ordinary, &Span::empty())
                .unwrap();
            let op_b = ops
                .declare(&format!("rhs{prec_b}"), Arity::Binary(Assoc::Left), prec_b, EvalCode::Ordinary, &Span::empty())
                .unwrap();

            let a = Expr::Term(Term::nullary(op_a));
            let b = Expr::Term(Term::nullary(op_b));

            let forward = compare(&ops, untyped, &a, &b);
            let backward = compare(&ops, untyped, &b, &a);
            prop_assert_eq!(forward, backward.reverse());
        }

        // A strict subtype is always more specific than its supertype,
        // regardless of how the two precedences happen to compare —
        // rule 3 must dominate rule 5.
        #[test]
        fn subtype_beats_precedence(sub_prec in 0i32..200, sup_prec in 0i32..200) {
            let mut ops = OperatorTable::new();
            let untyped = ops.declare_singleton("'untyped", Arity::Name(crate::operator::NameKind::Type));
            let sup = ops
                .declare("'super", Arity::Name(crate::operator::NameKind::Type), sup_prec, EvalCode::Ordinary, &Span::empty())
                .unwrap();
            let sub = ops
                .declare("'sub", Arity::Name(crate::operator::NameKind::Type), sub_prec, EvalCode::Ordinary, &Span::empty())
                .unwrap();
            ops.set_supertype(sub, "'super", &Span::empty()).unwrap();

            let a = Expr::Term(Term::nullary(sub));
            let b = Expr::Term(Term::nullary(sup));
            prop_assert_eq!(compare(&ops, untyped, &a, &b), Ordering::Greater);
            prop_assert_eq!(compare(&ops, untyped, &b, &a), Ordering::Less);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::span::Span;
    use crate::namespace::NameSpace;
    use crate::operator::{Assoc, EvalCode, NameKind};

    #[test]
    fn total_order_is_antisymmetric() {
        let mut ops = OperatorTable::new();
        let untyped = ops.declare_singleton("untyped", Arity::Name(NameKind::Identifier));
        let plus = ops.declare("+", Arity::Binary(Assoc::Left), 45, EvalCode::Ordinary, &Span::empty()).unwrap();
        let local = NameSpace::new_root(untyped);
        let a = Expr::Name(NameSpace::insert_child(&local.root, "x", untyped));
        let b = Expr::Term(crate::tree::Term::nullary(plus));

        assert_eq!(compare(&ops, untyped, &a, &b), Ordering::Less);
        assert_eq!(compare(&ops, untyped, &b, &a), Ordering::Greater);
    }

    #[test]
    fn subtype_more_specific_than_supertype() {
        let mut ops = OperatorTable::new();
        let untyped = ops.declare_singleton("untyped", Arity::Name(NameKind::Identifier));
        let number = ops.declare("'number", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &Span::empty()).unwrap();
        let positive =
            ops.declare("'positive", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &Span::empty()).unwrap();
        ops.set_supertype(positive, "'number", &Span::empty()).unwrap();

        let local = NameSpace::new_root(untyped);
        let a = Expr::Name(NameSpace::insert_child(&local.root, "a", positive));
        let b = Expr::Name(NameSpace::insert_child(&local.root, "b", number));

        assert_eq!(compare(&ops, untyped, &a, &b), Ordering::Greater);
    }
}
