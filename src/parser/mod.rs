//! The attributed operator-precedence Parser (spec.md §4.3): turns a
//! token stream into an expression tree, dynamically adapting to
//! whatever operators have been declared so far. Grounded on the
//! teacher's `compiler::parse` module for the general shift/reduce-over-
//! an-explicit-stack idiom (a `Vec` standing in for the parser's stack,
//! one token of lookahead held in the parser struct), generalized from
//! the teacher's fixed Pratt table to a table built at runtime by `#op`
//! declarations.
//!
//! Two modes (spec.md §4.3): [`Mode::Head`] (parameters may be declared
//! and typed; no global dereference; labels forbidden) and
//! [`Mode::Body`] (types forbidden; labels allowed; `.name` chains
//! resolve against the global space).

use crate::common::span::Span;
use crate::error::{Error, Result};
use crate::namespace::{NameRef, NameSpace};
use crate::operator::{Arity, Assoc, EvalCode, OperatorId, OperatorTable, ReduceAction, UnaryKind};
use crate::scanner::{Lexer, Spanned, Token};
use crate::tree::{Expr, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Head,
    Body,
}

/// An entry on the parser's stack (spec.md §4.3 "Stack"): either a
/// shifted operator awaiting its remaining operand(s), or a fully
/// reduced expression.
#[derive(Debug)]
enum StackItem {
    Oper(OperatorId),
    Expr(Expr),
}

/// Parses one HEAD or BODY (up to, but not including, the terminating
/// `{`/`}`) from `lexer` against the live `ops` table, building names in
/// `local` (spec.md §4.3's per-rule local space) and, in [`Mode::Body`],
/// dereferencing qualified names into `global`.
pub struct Parser<'a> {
    lexer: &'a mut Lexer,
    ops: &'a OperatorTable,
    mode: Mode,
    local: NameRef,
    global: NameRef,
    undeclared: OperatorId,
    num_pos: OperatorId,
    num_zero: OperatorId,
    num_neg: OperatorId,
    str_op: OperatorId,
    boe: OperatorId,
    current: Spanned,
    labeled: Vec<*const std::cell::RefCell<crate::namespace::NameNode>>,
}

/// The singleton operators the parser needs regardless of what the
/// program has declared (spec.md §5 "a small set of singleton operator
/// references").
#[derive(Debug, Clone, Copy)]
pub struct ParserSingletons {
    pub undeclared: OperatorId,
    pub num_pos: OperatorId,
    pub num_zero: OperatorId,
    pub num_neg: OperatorId,
    pub str_op: OperatorId,
    pub boe: OperatorId,
}

impl<'a> Parser<'a> {
    pub fn new(
        lexer: &'a mut Lexer,
        ops: &'a OperatorTable,
        mode: Mode,
        local: NameRef,
        global: NameRef,
        singletons: ParserSingletons,
    ) -> Result<Parser<'a>> {
        let current = lexer.next(ops)?;
        Ok(Parser::resume(lexer, ops, mode, local, global, singletons, current))
    }

    /// Builds a parser that starts from an already-fetched lookahead token
    /// rather than lexing its own first token — used by the top-level rule
    /// loader (spec.md's Loader/Interpreter, `parse.c`'s `parse()`), which
    /// must peek one token past the end of a HEAD or BODY to see whether a
    /// `{`/`}` has arrived before it knows which `Parser` to hand that
    /// token to.
    pub fn resume(
        lexer: &'a mut Lexer,
        ops: &'a OperatorTable,
        mode: Mode,
        local: NameRef,
        global: NameRef,
        singletons: ParserSingletons,
        current: Spanned,
    ) -> Parser<'a> {
        Parser {
            lexer,
            ops,
            mode,
            local,
            global,
            undeclared: singletons.undeclared,
            num_pos: singletons.num_pos,
            num_zero: singletons.num_zero,
            num_neg: singletons.num_neg,
            str_op: singletons.str_op,
            boe: singletons.boe,
            current,
            labeled: Vec::new(),
        }
    }

    /// The parser's current lookahead token, for callers that drive the
    /// parser incrementally (the top-level loader, inspecting what follows
    /// a HEAD's `{` or a BODY's `}`).
    pub fn current_token(&self) -> &Token {
        &self.current.token
    }

    /// A clone of the parser's current lookahead, spanned.
    pub fn current(&self) -> Spanned {
        self.current.clone()
    }

    /// Switches the parser's mode — used by the top-level loader to move
    /// from parsing a rule's HEAD to its BODY without re-lexing the token
    /// that follows the `{` (spec.md §4.3's two modes).
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Advances past the current lookahead token and returns it (spec.md
    /// §4.3's shift/reduce loop leaves `current` sitting on the delimiter
    /// it stopped at; the loader consumes it with this).
    pub fn advance_past(&mut self) -> Result<Spanned> {
        self.advance()
    }

    fn advance(&mut self) -> Result<Spanned> {
        let next = self.lexer.next(self.ops)?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn span(&self) -> Span {
        self.current.span.clone()
    }

    /// Parses one HEAD or BODY, consuming up to (but not past) the
    /// terminating `{`/`}` (spec.md §4.3 "End of expression").
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let mut stack: Vec<StackItem> = vec![StackItem::Oper(self.boe)];

        loop {
            match self.current.token.clone() {
                Token::OpenBrace if self.mode == Mode::Head => break,
                Token::CloseBrace if self.mode == Mode::Body => break,
                Token::Eof => return Err(Error::parse("unexpected end of input", &self.span())),
                Token::Number(v) => {
                    self.advance()?;
                    self.shift_expr(&mut stack, Expr::Number(v, self.classify(v)))?;
                }
                Token::String(s) => {
                    self.advance()?;
                    let interned = crate::common::interner::intern(&s);
                    self.shift_expr(&mut stack, Expr::Str(interned, self.str_op))?;
                }
                Token::Identifier(name) => {
                    self.advance()?;
                    self.handle_identifier(&mut stack, &name)?;
                }
                Token::Dot => {
                    self.advance()?;
                    self.handle_leading_dot(&mut stack)?;
                }
                Token::Operator(sym) => {
                    let span = self.span();
                    self.advance()?;
                    let cn = self.resolve_operator(&sym, &span)?;
                    self.shift_reduce(&mut stack, cn)?;
                }
                Token::Type(_) => {
                    return Err(Error::parse("unexpected type token here", &self.span()))
                }
                other => {
                    return Err(Error::parse(format!("unexpected token {}", other), &self.span()))
                }
            }
        }

        // End of expression: reduce everything down to the sentinel. The
        // nearest operator reaches the BOE sentinel only once a single
        // reduced `Expr` sits directly above it — `stack.last()` itself is
        // that `Expr`, never the sentinel (spec.md §4.3 "End of expression":
        // walk past any pending operand to find the nearest operator, and
        // stop once that operator is BOE).
        while !matches!(Self::nearest_oper(&stack), Some((id, _)) if id == self.boe) {
            self.reduce(&mut stack)?;
        }
        match stack.pop() {
            Some(StackItem::Expr(e)) => match stack.pop() {
                Some(StackItem::Oper(id)) if id == self.boe && stack.is_empty() => Ok(e),
                _ => Err(Error::parse("malformed expression", &self.span())),
            },
            _ => Err(Error::parse("empty expression", &self.span())),
        }
    }

    fn classify(&self, v: f64) -> OperatorId {
        if v > 0.0 {
            self.num_pos
        } else if v < 0.0 {
            self.num_neg
        } else {
            self.num_zero
        }
    }

    fn resolve_operator(&self, sym: &str, span: &Span) -> Result<OperatorId> {
        use crate::operator::Category;
        let category = if sym.chars().count() == 1 { Category::SingleChar } else { Category::DoubleChar };
        self.ops
            .find(category, sym)
            .or_else(|| {
                // a two-character spelling that only exists as two
                // single-character operators never reaches here: the
                // scanner only merges two characters when the pair is
                // itself declared (see scanner::Lexer::lex_operator).
                self.ops.find(Category::SingleChar, sym)
            })
            .ok_or_else(|| Error::parse(format!("undeclared operator '{}'", sym), span))
    }

    /// Identifier handling (spec.md §4.3): first checks whether `name`
    /// names a declared alphanumeric operator (so e.g. `mod` behaves as
    /// an operator token); otherwise handles it per the active mode.
    fn handle_identifier(&mut self, stack: &mut Vec<StackItem>, name: &str) -> Result<()> {
        use crate::operator::Category;
        if let Some(op) = self.ops.find(Category::Alphanumeric, name) {
            return self.shift_reduce(stack, op);
        }

        match self.mode {
            Mode::Head => self.handle_head_identifier(stack, name),
            Mode::Body => self.handle_body_identifier(stack, name),
        }
    }

    fn handle_head_identifier(&mut self, stack: &mut Vec<StackItem>, name: &str) -> Result<()> {
        if NameSpace::find_child(&self.local, name).is_some() {
            return Err(Error::semantic(format!("parameter '{}' declared twice", name), &self.span()));
        }

        let ty = if let Token::Type(ty_name) = &self.current.token {
            let full = format!("'{}", ty_name);
            let id = self
                .ops
                .find(Category::Type, &full)
                .ok_or_else(|| Error::semantic(format!("unknown type {}", full), &self.span()))?;
            self.advance()?;
            id
        } else {
            self.undeclared
        };

        let param = NameSpace::insert_child(&self.local, name, ty);
        // re-type in case the node pre-existed as `undeclared` from an
        // earlier qualified-name reference (not expected in HEAD, but
        // kept defensive: HEAD forbids qualified names per spec.md §4.3).
        param.borrow_mut().ty = ty;
        self.shift_expr(stack, Expr::Name(param))
    }

    fn handle_body_identifier(&mut self, stack: &mut Vec<StackItem>, name: &str) -> Result<()> {
        let mut segments = vec![name.to_string()];
        while matches!(self.current.token, Token::Dot) {
            self.advance()?;
            match self.current.token.clone() {
                Token::Identifier(seg) => {
                    self.advance()?;
                    segments.push(seg);
                }
                _ => return Err(Error::parse("expected a name after '.'", &self.span())),
            }
        }
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let leaf = NameSpace::resolve_chain(&self.local, &refs, self.undeclared);
        self.shift_expr(stack, Expr::Name(leaf))
    }

    /// A leading `.` (spec.md §4.3 "A leading `.` switches the starting
    /// space to the global space"). Illegal in HEAD (§4.3 "no global
    /// dereference allowed").
    fn handle_leading_dot(&mut self, stack: &mut Vec<StackItem>) -> Result<()> {
        if self.mode == Mode::Head {
            return Err(Error::semantic("global dereference not allowed in a rule head", &self.span()));
        }
        let mut segments = Vec::new();
        loop {
            match self.current.token.clone() {
                Token::Identifier(seg) => {
                    self.advance()?;
                    segments.push(seg);
                }
                _ => return Err(Error::parse("expected a name after '.'", &self.span())),
            }
            if matches!(self.current.token, Token::Dot) {
                self.advance()?;
                continue;
            }
            break;
        }
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let leaf = NameSpace::resolve_chain(&self.global, &refs, self.undeclared);
        self.shift_expr(stack, Expr::Name(leaf))
    }

    fn shift_expr(&mut self, stack: &mut Vec<StackItem>, e: Expr) -> Result<()> {
        stack.push(StackItem::Expr(e));
        Ok(())
    }

    /// Finds the operator the shift/reduce loop should next weigh against
    /// the incoming token, and whether it was found as the stack's literal
    /// top. A literal-top hit means the operator has no operand shifted
    /// onto it yet — the only case in which the prefix/outfix1 overload
    /// conversion logic below may fire (spec.md §4.3 step 3's overload
    /// conversions apply only to the nearest operator when it is still
    /// awaiting its first operand). An operator found one slot below a
    /// pending `Expr` is an ordinary operator already in the middle of
    /// being built, ready for a ordinary precedence comparison instead.
    fn nearest_oper(stack: &[StackItem]) -> Option<(OperatorId, bool)> {
        match stack.last()? {
            StackItem::Oper(id) => Some((*id, true)),
            StackItem::Expr(_) => match stack.get(stack.len().wrapping_sub(2))? {
                StackItem::Oper(id) => Some((*id, false)),
                StackItem::Expr(_) => None,
            },
        }
    }

    fn other_as(&self, id: OperatorId, kind: UnaryKind) -> Option<OperatorId> {
        let other = self.ops.other_of(id)?;
        (self.ops.get(other).arity.unary_kind() == Some(kind)).then_some(other)
    }

    /// The shift/reduce control loop for an incoming operator token `cn`
    /// (spec.md §4.3 "Shift/reduce control").
    fn shift_reduce(&mut self, stack: &mut Vec<StackItem>, cn: OperatorId) -> Result<()> {
        let arity = self.ops.get(cn).arity;

        if matches!(arity, Arity::Nullary) {
            return self.shift_expr(stack, Expr::Term(Term::nullary(cn)));
        }
        if matches!(arity, Arity::Unary(UnaryKind::Outfix1) | Arity::Unary(UnaryKind::Prefix)) {
            stack.push(StackItem::Oper(cn));
            return Ok(());
        }

        let mut cn = cn;
        let mut consumed_as_outfix2 = false;

        loop {
            let (lop, lop_is_top) = Self::nearest_oper(stack)
                .ok_or_else(|| Error::parse("missing operand", &self.span()))?;
            let lop_arity = self.ops.get(lop).arity;
            let cn_arity = self.ops.get(cn).arity;

            if lop_is_top && lop_arity.is_binary() && cn_arity.is_binary() {
                let cn_prefix = self.other_as(cn, UnaryKind::Prefix);
                let lop_postfix = self.other_as(lop, UnaryKind::Postfix);
                match (cn_prefix, lop_postfix) {
                    (Some(cn_pre), Some(lop_post)) => {
                        let prec_cn = self.ops.get(cn_pre).precedence;
                        let prec_lop = self.ops.get(lop_post).precedence;
                        if prec_cn > prec_lop {
                            cn = cn_pre;
                        } else if prec_cn < prec_lop {
                            self.convert_top_oper(stack, lop_post)?;
                        } else {
                            cn = cn_pre;
                        }
                    }
                    (Some(cn_pre), None) => cn = cn_pre,
                    (None, Some(lop_post)) => self.convert_top_oper(stack, lop_post)?,
                    (None, None) => return Err(Error::parse("missing operand", &self.span())),
                }
                continue;
            }

            // The BOE sentinel is excluded from the overload/outfix
            // conversion rules (b/c/d): it never holds a real pending
            // operand the way a genuine PREFIX/OUTFIX1 operator does,
            // and only participates in the precedence floor below
            // (spec.md §4.3 "BOE matches nothing via `other`").
            let lop_is_boe = lop == self.boe;

            if lop_is_top
                && !lop_is_boe
                && cn_arity.is_binary()
                && (lop_arity.unary_kind() == Some(UnaryKind::Prefix) || lop_arity.unary_kind() == Some(UnaryKind::Outfix1))
            {
                match self.other_as(cn, UnaryKind::Prefix) {
                    Some(cn_pre) => {
                        cn = cn_pre;
                        stack.push(StackItem::Oper(cn));
                        return Ok(());
                    }
                    None => return Err(Error::parse("missing left operand", &self.span())),
                }
            }

            if cn_arity.unary_kind() == Some(UnaryKind::Outfix2) {
                if lop_is_boe {
                    return Err(Error::parse("unmatched outfix close operator", &self.span()));
                }
                if lop_arity.unary_kind() == Some(UnaryKind::Outfix1) {
                    if self.ops.other_of(lop) == Some(cn) {
                        self.reduce(stack)?;
                        consumed_as_outfix2 = true;
                        break;
                    }
                    return Err(Error::parse("outfix operators do not match", &self.span()));
                }
                self.reduce(stack)?;
                continue;
            }

            let prec_cn = self.ops.get(cn).precedence;
            let prec_lop = self.ops.get(lop).precedence;

            if !lop_is_boe
                && (prec_cn < prec_lop
                    || (prec_cn == prec_lop && matches!(cn_arity, Arity::Binary(Assoc::Left))))
            {
                self.reduce(stack)?;
                continue;
            }
            if !lop_is_boe
                && prec_cn == prec_lop
                && matches!(cn_arity, Arity::Binary(Assoc::NonAssoc))
                && lop_arity.unary_kind() != Some(UnaryKind::Outfix1)
            {
                return Err(Error::parse("nonassociative operators cannot chain", &self.span()));
            }
            break;
        }

        if !consumed_as_outfix2 {
            stack.push(StackItem::Oper(cn));
        }
        Ok(())
    }

    /// Replaces the operator at the top of the stack with `replacement`
    /// (spec.md §4.3 step 3b "convert ... lop"): `lop` must be the
    /// topmost stack entry for this to be meaningful (the sole caller
    /// only ever converts the nearest operator).
    fn convert_top_oper(&self, stack: &mut [StackItem], replacement: OperatorId) -> Result<()> {
        for item in stack.iter_mut().rev() {
            if let StackItem::Oper(id) = item {
                *id = replacement;
                return Ok(());
            }
        }
        Err(Error::parse("missing operand", &self.span()))
    }

    /// Pops an operator and its operand(s) off the stack, reduces them
    /// to a single `EXPR`, and pushes the result — honoring any
    /// parser-time reduce action on the operator (spec.md §4.3 "Reduce").
    ///
    /// The operator being reduced is never the literal stack top except
    /// for a POSTFIX operator, whose one operand was already shifted
    /// *before* it (spec.md §4.3's `lop` layout, mirrored by
    /// [`Self::nearest_oper`]): every other reducible arity has its
    /// trailing operand sitting on top of the operator instead, so that
    /// operand has to be popped and set aside before the operator itself
    /// is reachable.
    fn reduce(&mut self, stack: &mut Vec<StackItem>) -> Result<()> {
        let op = match stack.pop() {
            Some(StackItem::Oper(id)) => id,
            Some(StackItem::Expr(operand)) => match stack.pop() {
                Some(StackItem::Oper(id)) => {
                    stack.push(StackItem::Expr(operand));
                    id
                }
                Some(other) => {
                    stack.push(other);
                    stack.push(StackItem::Expr(operand));
                    return Err(Error::parse("expected an operator to reduce", &self.span()));
                }
                None => {
                    stack.push(StackItem::Expr(operand));
                    return Err(Error::parse("empty stack during reduce", &self.span()));
                }
            },
            None => return Err(Error::parse("empty stack during reduce", &self.span())),
        };
        let arity = self.ops.get(op).arity;
        let eval = self.ops.get(op).eval;

        let term = match arity {
            Arity::Unary(UnaryKind::Prefix) | Arity::Unary(UnaryKind::Outfix1) => {
                let right = self.pop_expr(stack)?;
                if let EvalCode::Reduce(ReduceAction::Negate) = eval {
                    if let Expr::Number(v, _) = right {
                        stack.push(StackItem::Expr(Expr::Number(-v, self.classify(-v))));
                        return Ok(());
                    }
                }
                if let EvalCode::Reduce(ReduceAction::Discard) = eval {
                    stack.push(StackItem::Expr(right));
                    return Ok(());
                }
                Term::prefix(op, right)
            }
            Arity::Unary(UnaryKind::Postfix) => {
                let left = self.pop_expr(stack)?;
                Term::postfix(op, left)
            }
            Arity::Binary(_) => {
                let right = self.pop_expr(stack)?;
                let left = self.pop_expr(stack)?;
                if let EvalCode::Reduce(ReduceAction::Label) = eval {
                    return self.attach_label(stack, left, right);
                }
                Term::binary(op, left, right)
            }
            _ => return Err(Error::parse("cannot reduce this operator kind", &self.span())),
        };
        stack.push(StackItem::Expr(Expr::Term(term)));
        Ok(())
    }

    fn pop_expr(&self, stack: &mut Vec<StackItem>) -> Result<Expr> {
        match stack.pop() {
            Some(StackItem::Expr(e)) => Ok(e),
            _ => Err(Error::parse("missing operand", &self.span())),
        }
    }

    /// `ReduceAction::Label` (spec.md §4.3 "-2 label"): the left operand
    /// must be a fresh, undeclared name and the right a term with no
    /// label yet.
    fn attach_label(&mut self, stack: &mut Vec<StackItem>, left: Expr, right: Expr) -> Result<()> {
        let name = left
            .as_name()
            .ok_or_else(|| Error::semantic("label target must be a name", &self.span()))?
            .clone();
        if name.borrow().ty != self.undeclared || name.borrow().value.is_some() {
            return Err(Error::semantic("label must be a fresh, undeclared name", &self.span()));
        }
        let ptr = std::rc::Rc::as_ptr(&name);
        if self.labeled.contains(&ptr) {
            return Err(Error::semantic("name already used as a label", &self.span()));
        }
        let mut term = right
            .as_term()
            .cloned()
            .ok_or_else(|| Error::semantic("label must apply to a term", &self.span()))?;
        if term.label.is_some() {
            return Err(Error::semantic("target already has a label", &self.span()));
        }
        term.label = Some(name);
        self.labeled.push(ptr);
        stack.push(StackItem::Expr(Expr::Term(term)));
        Ok(())
    }
}

use crate::operator::Category;
