//! The Rule Database (spec.md §3 "Rule", §4.4) and the Specificity
//! Comparator (§4.5): rules are kept per head-operator in strict
//! descending-specificity order, so the matcher (§4.6) can always take
//! the first rule that structurally matches.

pub mod specificity;

use crate::common::span::Span;
use crate::namespace::NameRef;
use crate::operator::{OperatorId, OperatorTable};
use crate::tree::Expr;

pub use specificity::compare;

/// A rule (spec.md §3): head pattern, body template, optional tag type,
/// and the local name space captured while it was parsed. `size` is the
/// count of distinct labels declared in the head (used to size a fresh
/// local-binding environment at match time); `trace` mirrors a per-rule
/// `#trace` annotation.
#[derive(Debug, Clone)]
pub struct Rule {
    pub head: Expr,
    pub body: Expr,
    pub tag: Option<OperatorId>,
    pub space: NameRef,
    pub size: usize,
    pub trace: bool,
    pub span: Span,
}

/// Per-operator lists of rules, each kept in descending specificity
/// order (spec.md §4.4). Rules are keyed by the identity of their head's
/// root operator.
#[derive(Debug)]
pub struct RuleDatabase {
    rules: std::collections::HashMap<OperatorId, Vec<Rule>>,
    untyped: OperatorId,
}

impl RuleDatabase {
    pub fn new(untyped: OperatorId) -> RuleDatabase {
        RuleDatabase { rules: std::collections::HashMap::new(), untyped }
    }

    /// Inserts `rule` into its head operator's list by a linear
    /// scan-and-splice that preserves descending specificity order
    /// (spec.md §4.4).
    pub fn insert(&mut self, ops: &OperatorTable, rule: Rule) {
        let head_op = rule.head.op();
        let untyped = self.untyped;
        let list = self.rules.entry(head_op).or_default();
        let position = list
            .iter()
            .position(|existing| {
                compare(ops, untyped, &rule.head, &existing.head) == std::cmp::Ordering::Greater
            })
            .unwrap_or(list.len());
        list.insert(position, rule);
    }

    pub fn rules_for(&self, op: OperatorId) -> &[Rule] {
        self.rules.get(&op).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NameSpace;
    use crate::operator::{Arity, Assoc, EvalCode, NameKind};
    use crate::tree::Term;

    fn span() -> Span {
        Span::empty()
    }

    #[test]
    fn rules_ordered_by_descending_specificity() {
        let mut ops = OperatorTable::new();
        let plus = ops.declare("+", Arity::Binary(Assoc::Left), 45, EvalCode::Ordinary, &span()).unwrap();
        let number = ops.declare("'number", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span()).unwrap();
        let positive = ops
            .declare("'positive", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span())
            .unwrap();
        ops.set_supertype(positive, "'number", &span()).unwrap();
        let untyped = ops.declare_singleton("untyped", Arity::Name(NameKind::Identifier));

        let mut db = RuleDatabase::new(untyped);
        let local = NameSpace::new_root(untyped);

        let untyped_param = Expr::Name(NameSpace::insert_child(&local.root, "n", untyped));
        let typed_param = Expr::Name(NameSpace::insert_child(&local.root, "m", positive));

        let head_untyped = Expr::Term(Term::binary(plus, untyped_param, Expr::Number(0.0, 0)));
        let head_typed = Expr::Term(Term::binary(plus, typed_param, Expr::Number(0.0, 0)));

        db.insert(
            &ops,
            Rule {
                head: head_untyped,
                body: Expr::Number(0.0, 0),
                tag: None,
                space: NameSpace::new_root(untyped).root,
                size: 1,
                trace: false,
                span: span(),
            },
        );
        db.insert(
            &ops,
            Rule {
                head: head_typed,
                body: Expr::Number(1.0, 0),
                tag: None,
                space: NameSpace::new_root(untyped).root,
                size: 1,
                trace: false,
                span: span(),
            },
        );

        let rules = db.rules_for(plus);
        assert_eq!(rules.len(), 2);
        // the typed ('positive) pattern is more specific, so it comes first.
        assert_eq!(rules[0].body.as_number(), Some(1.0));
        assert_eq!(rules[1].body.as_number(), Some(0.0));
        let _ = number;
    }
}
