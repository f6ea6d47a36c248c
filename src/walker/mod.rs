//! The Rewrite Engine / Walker (spec.md §4.7): an iterative tree walk that
//! finds the leftmost, outermost matching redex, applies its rule, and
//! splices the instantiated result back into the subject. Grounded on the
//! teacher's `vm::exec` module for the idiom of an explicit work stack
//! standing in for call-stack recursion, generalized here into a small
//! tree zipper: since every `Expr` node in this crate uniquely owns its
//! children (spec.md §5 "uniquely owned by whichever structure currently
//! contains them"), the walker's stack frames carry the untouched sibling
//! subtrees alongside the spec's `{node, action}` marker, so the whole
//! subject can be reassembled by move rather than by chasing shared
//! pointers as the original does.

use std::rc::Rc;

use crate::common::span::Span;
use crate::error::{Error, Result};
use crate::graphics::GraphicsSink;
use crate::matcher;
use crate::namespace::{NameRef, NameSpace};
use crate::operator::{Arity, EvalCode, OperatorId, OperatorTable, ReduceAction, UnaryKind};
use crate::primitive::{self, PrimitiveContext};
use crate::rule::RuleDatabase;
use crate::tree::{self, Expr, Term};

/// Everything the walker needs beyond the subject itself: the live
/// operator/rule tables, the primitive dispatcher's singleton operators,
/// and the mutable cells a primitive can observe or change (`trace`'s
/// verbosity level, the graphics sink `draw_line`/`draw_string` forward
/// to).
pub struct WalkCtx<'a> {
    pub ops: &'a OperatorTable,
    pub db: &'a RuleDatabase,
    pub untyped: OperatorId,
    pub prim_ctx: PrimitiveContext,
    pub trace_level: &'a mut i64,
    /// Mirrors `#quiet` (spec.md §6): suppresses the "fired rule" trace
    /// line the walker would otherwise log.
    pub quiet: bool,
    pub sink: &'a mut dyn GraphicsSink,
}

/// The result of visiting one node before its children have been explored
/// (spec.md §4.7 steps 2-3): either a rule fired right here, or the node
/// is a dead end (a leaf, or an operator flagged "do not evaluate"), or it
/// must be explored further, carrying its un-visited child/children.
enum Visit {
    Matched(Expr, bool),
    Leaf(Expr),
    DescendUnary { op: OperatorId, label: Option<NameRef>, side: UnaryKind, child: Expr },
    DescendBinary { op: OperatorId, label: Option<NameRef>, left: Expr, right: Expr },
}

/// A stack frame recording an ancestor the walk has descended through —
/// enough of its untouched structure to reassemble it once its child (or
/// children, left then right) has been explored (spec.md §4.7 step 4).
enum Frame {
    /// A unary node (prefix/outfix1/postfix): once its single child
    /// settles, rebuild and keep bubbling the same status upward.
    Unary { op: OperatorId, label: Option<NameRef>, side: UnaryKind },
    /// A binary node whose left child is still to be explored; `right` is
    /// its untouched original subtree.
    PendingRight { op: OperatorId, label: Option<NameRef>, right: Expr },
    /// A binary node whose left child has already settled (carried here);
    /// its right child is the one now being explored.
    Combine { op: OperatorId, label: Option<NameRef>, left: Expr },
}

/// Runs one full tree walk over `subject` (spec.md §4.7): finds the first
/// node (in pre-order, left-before-right) a rule matches, applies it, and
/// returns the updated subject together with whether anything fired
/// (`learn`). The caller (§4.7 "outer driver") re-invokes this until
/// `learn` is false.
pub fn walk_once(subject: Expr, ctx: &mut WalkCtx<'_>) -> Result<(Expr, bool)> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut current = visit(subject, ctx)?;

    loop {
        match current {
            Visit::Matched(value, bound) => {
                let mut value = value;
                while let Some(frame) = stack.pop() {
                    value = match frame {
                        Frame::Unary { op, label, side } => Expr::Term(rebuild_unary(op, label, side, value)),
                        Frame::PendingRight { op, label, right } => {
                            Expr::Term(Term { op, label, left: Some(Box::new(value)), right: Some(Box::new(right)) })
                        }
                        Frame::Combine { op, label, left } => {
                            Expr::Term(Term { op, label, left: Some(Box::new(left)), right: Some(Box::new(value)) })
                        }
                    };
                }
                if bound {
                    value = tree::update(value);
                }
                return Ok((value, true));
            }
            Visit::Leaf(value) => match stack.pop() {
                None => return Ok((value, false)),
                Some(Frame::Unary { op, label, side }) => {
                    current = Visit::Leaf(Expr::Term(rebuild_unary(op, label, side, value)));
                }
                Some(Frame::PendingRight { op, label, right }) => {
                    stack.push(Frame::Combine { op, label, left: value });
                    current = visit(right, ctx)?;
                }
                Some(Frame::Combine { op, label, left }) => {
                    current = Visit::Leaf(Expr::Term(Term {
                        op,
                        label,
                        left: Some(Box::new(left)),
                        right: Some(Box::new(value)),
                    }));
                }
            },
            Visit::DescendUnary { op, label, side, child } => {
                stack.push(Frame::Unary { op, label, side });
                current = visit(child, ctx)?;
            }
            Visit::DescendBinary { op, label, left, right } => {
                stack.push(Frame::PendingRight { op, label, right });
                current = visit(left, ctx)?;
            }
        }
    }
}

fn rebuild_unary(op: OperatorId, label: Option<NameRef>, side: UnaryKind, child: Expr) -> Term {
    match side {
        UnaryKind::Postfix => Term { op, label, left: Some(Box::new(child)), right: None },
        _ => Term { op, label, left: None, right: Some(Box::new(child)) },
    }
}

/// Visits a single node (spec.md §4.7 steps 1-3): checks the loose-binding
/// invariant, attempts a match, and otherwise decides whether (and how) to
/// descend into its children.
fn visit(node: Expr, ctx: &mut WalkCtx<'_>) -> Result<Visit> {
    if let Expr::Name(n) = &node {
        if n.borrow().value.is_some() {
            return Err(Error::runtime(
                "loose bound variable encountered during walk (update should have expanded it)",
                &Span::empty(),
            ));
        }
    }

    if let Some(rule) = matcher::find_rule(ctx.db, ctx.ops, ctx.untyped, &node) {
        let (value, bound) = fire(&node, rule, ctx)?;
        return Ok(Visit::Matched(value, bound));
    }

    let Expr::Term(t) = node else { return Ok(Visit::Leaf(node)) };

    let op = ctx.ops.get(t.op);
    if matches!(op.eval, EvalCode::Reduce(ReduceAction::NoEval)) {
        return Ok(Visit::Leaf(Expr::Term(t)));
    }

    match op.arity {
        Arity::Binary(_) => match (t.left, t.right) {
            (Some(l), Some(r)) => Ok(Visit::DescendBinary { op: t.op, label: t.label, left: *l, right: *r }),
            (l, r) => Ok(Visit::Leaf(Expr::Term(Term { op: t.op, label: t.label, left: l, right: r }))),
        },
        Arity::Unary(kind @ (UnaryKind::Prefix | UnaryKind::Outfix1)) => match t.right {
            Some(r) => Ok(Visit::DescendUnary { op: t.op, label: t.label, side: kind, child: *r }),
            None => Ok(Visit::Leaf(Expr::Term(Term { op: t.op, label: t.label, left: t.left, right: None }))),
        },
        Arity::Unary(UnaryKind::Postfix) => match t.left {
            Some(l) => Ok(Visit::DescendUnary { op: t.op, label: t.label, side: UnaryKind::Postfix, child: *l }),
            None => Ok(Visit::Leaf(Expr::Term(Term { op: t.op, label: t.label, left: None, right: t.right }))),
        },
        _ => Ok(Visit::Leaf(Expr::Term(Term { op: t.op, label: t.label, left: t.left, right: t.right }))),
    }
}

/// Applies `rule` to the matched `redex` (spec.md §4.7 step 2): attaches
/// the rule's tag to a label (if any), merges the rule's local bindings
/// into the label's (or a fresh anonymous) name space, dispatches to the
/// primitive table or instantiates the body, clears the rule's bindings
/// for its next use, and runs `update` on the result.
fn fire(redex: &Expr, rule: &crate::rule::Rule, ctx: &mut WalkCtx<'_>) -> Result<(Expr, bool)> {
    let Expr::Term(term) = redex else {
        return Err(Error::runtime("matched redex is not a term (spec.md §3 rule invariant)", &rule.span));
    };

    let merge_target: NameRef = match &term.label {
        Some(label) => {
            label.borrow_mut().ty = rule.tag.unwrap_or(ctx.untyped);
            Rc::clone(label)
        }
        None => NameSpace::new_root(ctx.untyped).root,
    };
    NameSpace::merge(&rule.space, &merge_target, ctx.untyped)?;

    let body_op = rule.body.op();
    let eval = ctx.ops.get(body_op).eval;

    let (value, bound) = if let EvalCode::Primitive(code) = eval {
        let outcome =
            primitive::execute(code, term, &ctx.prim_ctx, &mut *ctx.trace_level, &mut *ctx.sink, &rule.span)?;
        (outcome.value, outcome.bound)
    } else {
        (tree::instantiate(&rule.body), false)
    };

    crate::namespace::clear_bindings(&rule.space);
    let updated = tree::update(value);

    if !ctx.quiet {
        if *ctx.trace_level > 0 {
            log::info!("fired rule at {}", rule.span);
        } else {
            log::trace!("fired rule at {}", rule.span);
        }
    }

    Ok((updated, bound))
}

/// Runs [`walk_once`] to fixpoint (spec.md §4.7 "outer driver"): repeats
/// until a full tree walk reports no match.
pub fn walk_to_fixpoint(subject: Expr, ctx: &mut WalkCtx<'_>) -> Result<Expr> {
    let mut subject = subject;
    loop {
        let (next, learn) = walk_once(subject, ctx)?;
        subject = next;
        if !learn {
            return Ok(subject);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::span::Span;
    use crate::graphics::NullSink;
    use crate::namespace::NameSpace;
    use crate::operator::{Assoc, NameKind};
    use crate::rule::{Rule, RuleDatabase};

    struct Fixture {
        ops: OperatorTable,
        untyped: OperatorId,
        db: RuleDatabase,
        prim_ctx: PrimitiveContext,
    }

    fn basic_fixture() -> Fixture {
        let mut ops = OperatorTable::new();
        let untyped = ops.declare_singleton("untyped", Arity::Name(NameKind::Identifier));
        let true_op = ops.declare_singleton("true", Arity::Nullary);
        let false_op = ops.declare_singleton("false", Arity::Nullary);
        let pos = ops.declare_singleton("num+", Arity::Num);
        let zero = ops.declare_singleton("num0", Arity::Num);
        let neg = ops.declare_singleton("num-", Arity::Num);
        let prim_ctx =
            PrimitiveContext { true_op, false_op, positive_num: pos, zero_num: zero, negative_num: neg };
        let db = RuleDatabase::new(untyped);
        Fixture { ops, untyped, db, prim_ctx }
    }

    fn run(fixture: &mut Fixture, subject: Expr) -> Expr {
        let mut trace = 0;
        let mut sink = NullSink;
        let mut ctx = WalkCtx {
            ops: &fixture.ops,
            db: &fixture.db,
            untyped: fixture.untyped,
            prim_ctx: fixture.prim_ctx,
            trace_level: &mut trace,
            quiet: false,
            sink: &mut sink,
        };
        walk_to_fixpoint(subject, &mut ctx).unwrap()
    }

    #[test]
    fn arithmetic_normalization_two_plus_three_times_four() {
        let mut fixture = basic_fixture();
        let plus = fixture.ops.declare("+", Arity::Binary(Assoc::Left), 45, EvalCode::Ordinary, &Span::empty()).unwrap();
        let star = fixture.ops.declare("*", Arity::Binary(Assoc::Left), 50, EvalCode::Ordinary, &Span::empty()).unwrap();
        let mut codes = primitive::install(&mut fixture.ops);
        let add_op = *codes.iter().find(|(_, &c)| c == primitive::ADD).unwrap().0;
        let mul_op = *codes.iter().find(|(_, &c)| c == primitive::MUL).unwrap().0;
        codes.clear();

        let untyped = fixture.untyped;
        let plus_space = NameSpace::new_root(untyped);
        let n = NameSpace::insert_child(&plus_space.root, "n", untyped);
        let m = NameSpace::insert_child(&plus_space.root, "m", untyped);
        fixture.db.insert(
            &fixture.ops,
            Rule {
                head: Expr::Term(Term::binary(plus, Expr::Name(n), Expr::Name(m))),
                body: Expr::Term(Term::nullary(add_op)),
                tag: None,
                space: plus_space.root,
                size: 2,
                trace: false,
                span: Span::empty(),
            },
        );

        let star_space = NameSpace::new_root(untyped);
        let a = NameSpace::insert_child(&star_space.root, "a", untyped);
        let b = NameSpace::insert_child(&star_space.root, "b", untyped);
        fixture.db.insert(
            &fixture.ops,
            Rule {
                head: Expr::Term(Term::binary(star, Expr::Name(a), Expr::Name(b))),
                body: Expr::Term(Term::nullary(mul_op)),
                tag: None,
                space: star_space.root,
                size: 2,
                trace: false,
                span: Span::empty(),
            },
        );

        let subject = Expr::Term(Term::binary(
            plus,
            Expr::Number(2.0, 0),
            Expr::Term(Term::binary(star, Expr::Number(3.0, 0), Expr::Number(4.0, 0))),
        ));

        let result = run(&mut fixture, subject);
        assert_eq!(result.as_number(), Some(14.0));
    }

    #[test]
    fn rule_reapplies_after_bindings_are_cleared() {
        // the same "+" rule must fire on both the outer and (after the
        // first rewrite settles) a later independent redex, proving the
        // rule's local bindings are reset between applications (spec.md
        // §4.6 "cleared ... for the next attempt").
        let mut fixture = basic_fixture();
        let plus = fixture.ops.declare("+", Arity::Binary(Assoc::Left), 45, EvalCode::Ordinary, &Span::empty()).unwrap();
        let mut codes = primitive::install(&mut fixture.ops);
        let add_op = *codes.iter().find(|(_, &c)| c == primitive::ADD).unwrap().0;
        codes.clear();

        let untyped = fixture.untyped;
        let space = NameSpace::new_root(untyped);
        let n = NameSpace::insert_child(&space.root, "n", untyped);
        let m = NameSpace::insert_child(&space.root, "m", untyped);
        fixture.db.insert(
            &fixture.ops,
            Rule {
                head: Expr::Term(Term::binary(plus, Expr::Name(n), Expr::Name(m))),
                body: Expr::Term(Term::nullary(add_op)),
                tag: None,
                space: Rc::clone(&space.root),
                size: 2,
                trace: false,
                span: Span::empty(),
            },
        );

        let subject = Expr::Term(Term::binary(
            plus,
            Expr::Term(Term::binary(plus, Expr::Number(1.0, 0), Expr::Number(2.0, 0))),
            Expr::Term(Term::binary(plus, Expr::Number(3.0, 0), Expr::Number(4.0, 0))),
        ));

        let result = run(&mut fixture, subject);
        assert_eq!(result.as_number(), Some(10.0));
        assert!(space.root.borrow().children.iter().all(|c| c.borrow().value.is_none()));
    }
}
