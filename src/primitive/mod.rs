//! The Primitive Dispatcher (spec.md §4.8): executes built-in operations
//! invoked by a rule whose body's root operator carries a positive eval
//! code. Grounded on `primitive.c`'s `primitive_init`/`primitive_execute`
//! pattern: every primitive is registered as a NULLARY alphanumeric
//! operator (even binary/quaternary ones, like `draw_line`) and a
//! regular rule supplies the real arity by matching around it; the
//! dispatcher is always handed the *redex* (the matched subject node),
//! never the rule body, since that is where the actual operands live
//! (spec.md §4.7 step 2 "dispatch to §4.8 with the redex node").

use crate::common::span::Span;
use crate::error::{Error, Result};
use crate::graphics::GraphicsSink;
use crate::namespace::NameRef;
use crate::operator::{Arity, OperatorId, OperatorTable};
use crate::tree::{Expr, Term};

pub const BIND: u32 = 1;
pub const ADD: u32 = 2;
pub const SUB: u32 = 3;
pub const MUL: u32 = 4;
pub const DIV: u32 = 5;
pub const EQ: u32 = 6;
pub const LT: u32 = 7;
pub const LE: u32 = 8;
pub const POW: u32 = 9;
pub const SIN: u32 = 10;
pub const COS: u32 = 11;
pub const TAN: u32 = 12;
pub const ATAN: u32 = 13;
pub const ROUND: u32 = 14;
pub const FLOOR: u32 = 15;
pub const LEXCOMPARE: u32 = 16;
pub const TRACE: u32 = 17;
pub const DRAW_LINE: u32 = 18;
pub const DRAW_STRING: u32 = 19;

/// The names the core standard library registers for each primitive
/// code, in the order `primitive_init` declares them.
pub const REGISTRY: &[(u32, &str)] = &[
    (BIND, "bind"),
    (ADD, "add"),
    (SUB, "sub"),
    (MUL, "mul"),
    (DIV, "div"),
    (EQ, "eq"),
    (LT, "lt"),
    (LE, "le"),
    (POW, "pow"),
    (SIN, "sin"),
    (COS, "cos"),
    (TAN, "tan"),
    (ATAN, "atan"),
    (ROUND, "round"),
    (FLOOR, "floor"),
    (LEXCOMPARE, "lexcompare"),
    (TRACE, "trace"),
    (DRAW_LINE, "draw_line"),
    (DRAW_STRING, "draw_string"),
];

/// Operators a primitive needs to manufacture its result (booleans, and
/// the positive/zero/negative number singletons used to classify a fresh
/// numeric answer — spec.md §4.8 "After execution...").
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveContext {
    pub true_op: OperatorId,
    pub false_op: OperatorId,
    pub positive_num: OperatorId,
    pub zero_num: OperatorId,
    pub negative_num: OperatorId,
}

/// The outcome of running a primitive: its replacement expression, and
/// whether it bound a variable (spec.md §4.7 "If any parameter was bound
/// via the `bind` primitive, run `update` on the entire subject").
pub struct Outcome {
    pub value: Expr,
    pub bound: bool,
}

/// Registers every primitive as a NULLARY alphanumeric operator with its
/// positive eval code (spec.md §4.8, `primitive.c`'s `primitive_init`).
/// Unlike the parser's compiler-internal singletons (`undeclared`, the
/// number/string classifiers, `BOE`), a primitive's name must be a real
/// entry in the Alphanumeric operator list: rule bodies invoke a
/// primitive by writing its name as an ordinary nullary term (spec.md
/// §4.8 "a rule body's root operator has a positive eval code"), and the
/// parser only ever resolves an identifier to an operator by looking it
/// up in the table (`Parser::handle_identifier`) — so registering these
/// with `declare_singleton` would make every primitive unreachable from
/// source text.
pub fn install(ops: &mut OperatorTable) -> std::collections::HashMap<OperatorId, u32> {
    let mut codes = std::collections::HashMap::new();
    for &(code, name) in REGISTRY {
        let id = ops
            .declare(
                name,
                Arity::Nullary,
                i32::MAX,
                crate::operator::EvalCode::Primitive(code),
                &Span::empty(),
            )
            .expect("primitive registry entries have unique names");
        codes.insert(id, code);
    }
    codes
}

fn number_of(e: &Expr, span: &Span) -> Result<f64> {
    e.as_number().ok_or_else(|| Error::runtime("expected a number", span))
}

fn classify_number(v: f64, ctx: &PrimitiveContext) -> Expr {
    let op = if v > 0.0 {
        ctx.positive_num
    } else if v < 0.0 {
        ctx.negative_num
    } else {
        ctx.zero_num
    };
    Expr::Number(v, op)
}

fn bool_expr(value: bool, ctx: &PrimitiveContext) -> Expr {
    Expr::Term(Term::nullary(if value { ctx.true_op } else { ctx.false_op }))
}

/// Flattens a redex's children into a flat argument list: a number
/// contributes itself; a unary node contributes its single child's
/// flattening; a binary node concatenates its left and right
/// flattenings. This lets arithmetic/comparison primitives read their
/// two NUM operands directly off a binary redex, and lets `draw_line`
/// (four numeric operands) read them off a redex built from nested
/// binary application, without hard-coding one particular grouping.
fn flatten_numbers(e: &Expr, span: &Span) -> Result<Vec<f64>> {
    match e {
        Expr::Number(v, _) => Ok(vec![*v]),
        Expr::Term(t) => {
            let mut out = Vec::new();
            if let Some(l) = &t.left {
                out.extend(flatten_numbers(l, span)?);
            }
            if let Some(r) = &t.right {
                out.extend(flatten_numbers(r, span)?);
            }
            Ok(out)
        }
        _ => Err(Error::runtime("expected a numeric argument", span)),
    }
}

fn occurs(name: &NameRef, e: &Expr) -> bool {
    match e {
        Expr::Name(n) => std::rc::Rc::ptr_eq(n, name),
        Expr::Term(t) => {
            t.left.as_deref().is_some_and(|c| occurs(name, c))
                || t.right.as_deref().is_some_and(|c| occurs(name, c))
        }
        _ => false,
    }
}

/// Runs the primitive identified by `code` against `redex` (spec.md
/// §4.8). `trace_level` backs the `trace` primitive and the `#trace`
/// directive (EXPANSION B); `sink` backs `draw_line`/`draw_string`
/// (EXPANSION D).
pub fn execute(
    code: u32,
    redex: &Term,
    ctx: &PrimitiveContext,
    trace_level: &mut i64,
    sink: &mut dyn GraphicsSink,
    span: &Span,
) -> Result<Outcome> {
    let left = redex.left.as_deref();
    let right = redex.right.as_deref();

    let plain = |value: Expr| Outcome { value, bound: false };

    match code {
        BIND => {
            let name = left
                .and_then(Expr::as_name)
                .ok_or_else(|| Error::runtime("bind requires an unbound name on the left", span))?;
            if name.borrow().value.is_some() {
                return Err(Error::runtime("cannot bind an already-bound name", span));
            }
            let right_expr = right.ok_or_else(|| Error::runtime("bind requires a right operand", span))?;
            if occurs(name, right_expr) {
                return Err(Error::runtime("occurs check failed in bind", span));
            }
            let value = crate::tree::copy(right_expr);
            name.borrow_mut().value = Some(value);
            Ok(Outcome { value: Expr::Term(Term::nullary(ctx.true_op)), bound: true })
        }
        ADD | SUB | MUL | DIV => {
            let a = number_of(left.ok_or_else(|| Error::runtime("missing left operand", span))?, span)?;
            let b = number_of(right.ok_or_else(|| Error::runtime("missing right operand", span))?, span)?;
            let v = match code {
                ADD => a + b,
                SUB => a - b,
                MUL => a * b,
                DIV => a / b,
                _ => unreachable!(),
            };
            Ok(plain(classify_number(v, ctx)))
        }
        EQ | LT | LE => {
            let a = number_of(left.ok_or_else(|| Error::runtime("missing left operand", span))?, span)?;
            let b = number_of(right.ok_or_else(|| Error::runtime("missing right operand", span))?, span)?;
            let v = match code {
                EQ => a == b,
                LT => a < b,
                LE => a <= b,
                _ => unreachable!(),
            };
            Ok(plain(bool_expr(v, ctx)))
        }
        POW => {
            let a = number_of(left.ok_or_else(|| Error::runtime("missing left operand", span))?, span)?;
            let b = number_of(right.ok_or_else(|| Error::runtime("missing right operand", span))?, span)?;
            Ok(plain(classify_number(a.powf(b), ctx)))
        }
        SIN | COS | TAN | ATAN | ROUND | FLOOR => {
            let operand = right.or(left).ok_or_else(|| Error::runtime("missing operand", span))?;
            let a = number_of(operand, span)?;
            let v = match code {
                SIN => a.sin(),
                COS => a.cos(),
                TAN => a.tan(),
                ATAN => a.atan(),
                ROUND => a.round(),
                FLOOR => a.floor(),
                _ => unreachable!(),
            };
            Ok(plain(classify_number(v, ctx)))
        }
        LEXCOMPARE => {
            let a = left.and_then(Expr::as_name).ok_or_else(|| Error::runtime("lexcompare requires names", span))?;
            let b = right.and_then(Expr::as_name).ok_or_else(|| Error::runtime("lexcompare requires names", span))?;
            // spec.md §9 flags the original's pointer-address compare as
            // non-deterministic across runs; this implementation instead
            // orders by print value for a reproducible total order.
            let ordering = a.borrow().print_value.cmp(&b.borrow().print_value);
            let v = match ordering {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            };
            Ok(plain(classify_number(v, ctx)))
        }
        TRACE => {
            let requested = right.or(left).and_then(Expr::as_number).unwrap_or(*trace_level as f64);
            let previous = *trace_level as f64;
            *trace_level = requested as i64;
            Ok(plain(Expr::Number(previous, ctx.zero_num)))
        }
        DRAW_LINE => {
            let args = left.ok_or_else(|| Error::runtime("draw_line requires arguments", span))?;
            let nums = flatten_numbers(args, span)?;
            if nums.len() != 4 {
                return Err(Error::runtime("draw_line requires exactly 4 arguments", span));
            }
            sink.line(nums[0], nums[1], nums[2], nums[3]);
            Ok(plain(Expr::Term(Term::nullary(ctx.true_op))))
        }
        DRAW_STRING => {
            let text_expr = left.ok_or_else(|| Error::runtime("draw_string requires arguments", span))?;
            let Expr::Term(pair) = text_expr else {
                return Err(Error::runtime("draw_string expects (string, x, y)", span));
            };
            let s = pair
                .left
                .as_deref()
                .and_then(Expr::as_str)
                .ok_or_else(|| Error::runtime("draw_string's first argument must be a string", span))?;
            let xy = pair.right.as_deref().ok_or_else(|| Error::runtime("draw_string requires x, y", span))?;
            let nums = flatten_numbers(xy, span)?;
            if nums.len() != 2 {
                return Err(Error::runtime("draw_string requires exactly x, y", span));
            }
            sink.string(s, nums[0], nums[1]);
            Ok(plain(Expr::Term(Term::nullary(ctx.true_op))))
        }
        _ => Err(Error::runtime(format!("unknown primitive code {}", code), span)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::NullSink;

    fn ctx() -> PrimitiveContext {
        PrimitiveContext { true_op: 90, false_op: 91, positive_num: 92, zero_num: 93, negative_num: 94 }
    }

    #[test]
    fn add_sums_two_numbers() {
        let redex = Term::binary(0, Expr::Number(2.0, 0), Expr::Number(3.0, 0));
        let mut trace = 0;
        let mut sink = NullSink;
        let outcome = execute(ADD, &redex, &ctx(), &mut trace, &mut sink, &Span::empty()).unwrap();
        assert_eq!(outcome.value.as_number(), Some(5.0));
        assert!(!outcome.bound);
    }

    #[test]
    fn lt_returns_true_or_false_operator() {
        let redex = Term::binary(0, Expr::Number(2.0, 0), Expr::Number(3.0, 0));
        let mut trace = 0;
        let mut sink = NullSink;
        let outcome = execute(LT, &redex, &ctx(), &mut trace, &mut sink, &Span::empty()).unwrap();
        assert_eq!(outcome.value.op(), ctx().true_op);
    }

    #[test]
    fn bind_sets_value_and_reports_bound() {
        use crate::namespace::NameSpace;
        let local = NameSpace::new_root(0);
        let name = NameSpace::insert_child(&local.root, "x", 0);
        let redex = Term::binary(0, Expr::Name(std::rc::Rc::clone(&name)), Expr::Number(9.0, 0));
        let mut trace = 0;
        let mut sink = NullSink;
        let outcome = execute(BIND, &redex, &ctx(), &mut trace, &mut sink, &Span::empty()).unwrap();
        assert!(outcome.bound);
        assert_eq!(name.borrow().value.as_ref().and_then(|v| v.as_number()), Some(9.0));
    }

    #[test]
    fn bind_occurs_check_fails() {
        use crate::namespace::NameSpace;
        let local = NameSpace::new_root(0);
        let name = NameSpace::insert_child(&local.root, "x", 0);
        let self_ref = Expr::Name(std::rc::Rc::clone(&name));
        let redex = Term::binary(0, Expr::Name(std::rc::Rc::clone(&name)), self_ref);
        let mut trace = 0;
        let mut sink = NullSink;
        assert!(execute(BIND, &redex, &ctx(), &mut trace, &mut sink, &Span::empty()).is_err());
    }
}
