//! The Loader / Interpreter: the piece that owns every other component's
//! shared state for one run and drives the top-level `HEAD { BODY }
//! ['TAG]` parse loop. Grounded on `parse.c`'s `parse()` (the
//! rule-at-a-time loop) and `util.c`'s `init()` (singleton and
//! subject-expression setup), with a single struct owning a pipeline's
//! mutable state end to end.

use std::path::Path;
use std::rc::Rc;

use crate::common::source::{resolve_include, Source};
use crate::common::span::Span;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graphics::{GraphicsSink, NullSink};
use crate::namespace::{NameRef, NameSpace};
use crate::operator::{Arity, Category, EvalCode, NameKind, OperatorId, OperatorTable, UnaryKind};
use crate::parser::{Mode, Parser, ParserSingletons};
use crate::preprocessor::{self, Directive};
use crate::primitive::{self, PrimitiveContext};
use crate::rule::{Rule, RuleDatabase};
use crate::scanner::{Lexer, Spanned, Token};
use crate::tree::{self, Expr, Term};
use crate::walker::{self, WalkCtx};

/// Everything a run needs that is process-wide: the four operator-category
/// lists (inside [`OperatorTable`]), the rule database, the persistent
/// global name space, the parser's singleton operators, and the primitive
/// dispatcher's context. One `Interpreter` is one run; there is no reset
/// operation because nothing outlives it — it is torn down at interpreter
/// exit.
pub struct Interpreter {
    ops: OperatorTable,
    db: RuleDatabase,
    global: NameRef,
    singles: ParserSingletons,
    prim_ctx: PrimitiveContext,
    main_op: OperatorId,
    config: Config,
    trace_level: i64,
    quiet: bool,
    sink: Box<dyn GraphicsSink>,
}

impl Interpreter {
    /// Builds a fresh interpreter with a headless (`NullSink`) graphics
    /// sink, per `init()`'s full singleton/primitive setup.
    pub fn new(config: Config) -> Interpreter {
        Interpreter::with_sink(config, Box::new(NullSink))
    }

    pub fn with_sink(config: Config, sink: Box<dyn GraphicsSink>) -> Interpreter {
        let mut ops = OperatorTable::new();
        let span = Span::empty();

        // Compiler-internal singletons, never resolvable by name
        // (`primitive.c`'s `untyped_prim`/`undeclared_prim`, conflated
        // here into a single `undeclared` id — see DESIGN.md).
        let undeclared = ops.declare_singleton("?", Arity::Name(NameKind::Identifier));
        let num_pos = ops.declare_singleton("positive constants", Arity::Num);
        let num_zero = ops.declare_singleton("zero", Arity::Num);
        let num_neg = ops.declare_singleton("negative constants", Arity::Num);
        let str_op = ops.declare_singleton("string constant", Arity::Str);
        let boe = ops.declare_singleton("<boe>", Arity::Unary(UnaryKind::Outfix1));

        // The primitive type lattice (`primitive.c` lines 102-105):
        // 'constant <- 'nonzero <- 'positive, and the unrelated 'literal.
        // These must be name-lookupable (`#type`/a rule head may refer to
        // them directly), so they go through `declare`, not
        // `declare_singleton`.
        let constant_ty = ops.declare("'constant", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span).expect("builtin type");
        let nonzero_ty = ops.declare("'nonzero", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span).expect("builtin type");
        ops.set_supertype(nonzero_ty, "'constant", &span).expect("builtin supertype");
        let positive_ty = ops.declare("'positive", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span).expect("builtin type");
        ops.set_supertype(positive_ty, "'nonzero", &span).expect("builtin supertype");
        ops.declare("'literal", Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, &span).expect("builtin type");

        // Number literals are classified by sign at lex time into one of
        // three singleton operators (`num_pos`/`num_zero`/`num_neg`); each
        // is wired into the lattice above so a rule head written
        // `n'constant` or `n'positive` can actually match a literal
        // (`primitive.c`'s `classify` feeding `is_kind_of`).
        ops.set_supertype(num_zero, "'constant", &span).expect("builtin supertype");
        ops.set_supertype(num_neg, "'nonzero", &span).expect("builtin supertype");
        ops.set_supertype(num_pos, "'positive", &span).expect("builtin supertype");

        // `true`/`false` are ordinary nullary operators a rule body can
        // name directly (`primitive.c` line 106-107), so they too go
        // through `declare`.
        let true_op = ops.declare("true", Arity::Nullary, i32::MAX, EvalCode::Ordinary, &span).expect("builtin true");
        let false_op = ops.declare("false", Arity::Nullary, i32::MAX, EvalCode::Ordinary, &span).expect("builtin false");

        primitive::install(&mut ops);

        // The initial subject expression's operator (`util.c`'s `init()`:
        // `main_op = primitive("main", NULLARY, NULL, &name_op, 0)`) must
        // also be name-lookupable, since a program's top-level rule is
        // conventionally written `main { ... }`.
        let main_op = ops.declare("main", Arity::Nullary, i32::MAX, EvalCode::Ordinary, &span).expect("builtin main");

        let global = NameSpace::new_root(undeclared).root;
        let db = RuleDatabase::new(undeclared);
        let singles = ParserSingletons { undeclared, num_pos, num_zero, num_neg, str_op, boe };
        let prim_ctx = PrimitiveContext { true_op, false_op, positive_num: num_pos, zero_num: num_zero, negative_num: num_neg };
        let trace_level = if config.trace { 1 } else { 0 };
        let quiet = config.quiet;

        Interpreter { ops, db, global, singles, prim_ctx, main_op, config, trace_level, quiet, sink }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn trace_level(&self) -> i64 {
        self.trace_level
    }

    pub fn global_name_space(&self) -> &NameRef {
        &self.global
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.ops
    }

    /// Reads and loads the program at `path`.
    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        let source = Source::path(path)
            .map_err(|e| Error::preprocessor(format!("can't open program file {}: {}", path.display(), e), &Span::empty()))?;
        self.load_source(Rc::new(source))
    }

    /// Loads every rule and directive in `source` into the live operator
    /// table and rule database, grounded on `parse.c`'s `parse()`: a
    /// `HEAD { BODY }` pair, optionally followed by a `'TAG`, repeated
    /// until end of input. `#`-directives are intercepted between rules
    /// and applied directly against the operator table.
    pub fn load_source(&mut self, source: Rc<Source>) -> Result<()> {
        let mut stack: Vec<Lexer> = vec![Lexer::new(source)];
        let mut current = self.next_token(&mut stack)?;
        while current.token != Token::Eof {
            current = self.load_rule(&mut stack, current)?;
        }
        Ok(())
    }

    /// Parses and inserts one `HEAD { BODY } ['TAG]`, returning the
    /// lookahead that follows it (settled past any directives or
    /// exhausted `#include`d sources).
    fn load_rule(&mut self, stack: &mut Vec<Lexer>, current: Spanned) -> Result<Spanned> {
        let local = NameSpace::new_root(self.singles.undeclared).root;
        let head_start = current.span.clone();

        let lexer = stack.last_mut().expect("lexer stack is never empty while loading");
        let mut parser =
            Parser::resume(lexer, &self.ops, Mode::Head, Rc::clone(&local), Rc::clone(&self.global), self.singles, current);

        let head = parser.parse_expression()?;
        match parser.current_token() {
            Token::OpenBrace => {}
            other => {
                return Err(Error::parse(format!("expected '{{' after rule head, found {}", other), &parser.current().span))
            }
        }
        parser.advance_past()?;
        parser.set_mode(Mode::Body);

        let body = parser.parse_expression()?;
        let close_span = match parser.current_token() {
            Token::CloseBrace => parser.current().span,
            other => {
                return Err(Error::parse(format!("expected '}}' after rule body, found {}", other), &parser.current().span))
            }
        };
        parser.advance_past()?;

        let tag = if let Token::Type(ty_name) = parser.current_token().clone() {
            let full = format!("'{}", ty_name);
            let id = self
                .ops
                .find(Category::Type, &full)
                .ok_or_else(|| Error::semantic(format!("unknown tag type {}", full), &parser.current().span))?;
            parser.advance_past()?;
            Some(id)
        } else {
            None
        };

        let next_lookahead = parser.current();
        drop(parser);

        let size = local.borrow().children.len();
        let span = Span::combine(&head_start, &close_span);
        self.db.insert(
            &self.ops,
            Rule { head, body, tag, space: local, size, trace: self.trace_level > 0, span },
        );

        self.settle(stack, next_lookahead)
    }

    /// Fetches the next raw token and settles it (see [`Interpreter::settle`]).
    fn next_token(&mut self, stack: &mut Vec<Lexer>) -> Result<Spanned> {
        let tok = Self::raw_next(&self.ops, stack)?;
        self.settle(stack, tok)
    }

    /// Drains directive tokens (applying each one) and pops exhausted
    /// `#include`d sources until a real token (or final EOF) is current —
    /// the scanner-level interception `scanner.c` performs inline,
    /// pulled out here since this crate's [`crate::scanner::Lexer`] hands
    /// a `Directive` token back to its caller rather than consuming it
    /// itself.
    fn settle(&mut self, stack: &mut Vec<Lexer>, mut tok: Spanned) -> Result<Spanned> {
        loop {
            match &tok.token {
                Token::Directive(line) => {
                    let line = line.clone();
                    let span = tok.span.clone();
                    self.apply_directive(&line, stack, &span)?;
                    tok = Self::raw_next(&self.ops, stack)?;
                }
                Token::Eof if stack.len() > 1 => {
                    stack.pop();
                    tok = Self::raw_next(&self.ops, stack)?;
                }
                _ => return Ok(tok),
            }
        }
    }

    fn raw_next(ops: &OperatorTable, stack: &mut Vec<Lexer>) -> Result<Spanned> {
        stack.last_mut().expect("lexer stack is never empty while loading").next(ops)
    }

    /// Applies one `#`-directive line. `#line` is accepted but has no
    /// effect: spans compute
    /// line/column by counting newlines from the start of the buffer
    /// (`common::span::Span::line_col`) rather than from a mutable line
    /// counter, so there is nothing for it to adjust.
    fn apply_directive(&mut self, line: &str, stack: &mut Vec<Lexer>, span: &Span) -> Result<()> {
        let (directive, words) = preprocessor::classify(line)?;
        match directive {
            Directive::Op => preprocessor::apply_op(&mut self.ops, &words, span)?,
            Directive::Type => {
                preprocessor::apply_type(&mut self.ops, &words, span)?;
            }
            Directive::Primitive => preprocessor::apply_primitive(&mut self.ops, &words, span)?,
            Directive::Include(path) => {
                let source = resolve_include(&path, &self.config.library_path).map_err(|e| {
                    Error::preprocessor(format!("can't find included file '{}': {}", path, e), span)
                })?;
                stack.push(Lexer::new(Rc::new(source)));
            }
            Directive::Line(_) => {}
            Directive::Trace(n) => {
                self.trace_level = n.unwrap_or_else(|| if self.trace_level > 0 { self.trace_level } else { 1 });
            }
            Directive::Quiet => self.quiet = true,
        }
        Ok(())
    }

    /// Runs the walker to fixpoint starting from a fresh `main` subject
    /// expression (spec.md §4.7 "outer driver"), whose label is the
    /// global name space itself — so a rule matching at the top level
    /// merges its local bindings straight into the global space
    /// (`util.c`'s `init()`: the initial subject's label is
    /// `global_names`).
    pub fn run(&mut self) -> Result<Expr> {
        let subject = Expr::Term(Term { op: self.main_op, label: Some(Rc::clone(&self.global)), left: None, right: None });
        let mut ctx = WalkCtx {
            ops: &self.ops,
            db: &self.db,
            untyped: self.singles.undeclared,
            prim_ctx: self.prim_ctx,
            trace_level: &mut self.trace_level,
            quiet: self.quiet,
            sink: self.sink.as_mut(),
        };
        walker::walk_to_fixpoint(subject, &mut ctx)
    }

    /// Prints `e` in the final-answer form spec.md §6 describes.
    pub fn print(&self, e: &Expr) -> String {
        tree::print(e, &self.ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_leaves_main_unrewritten() {
        let mut interp = Interpreter::new(Config::default());
        interp.load_source(Rc::new(Source::source(""))).unwrap();
        let result = interp.run().unwrap();
        assert_eq!(interp.print(&result), "main");
    }

    #[test]
    fn arithmetic_normalization_end_to_end() {
        let program = r#"
#op + binary left 45
#op * binary left 50
n'constant + m'constant { add }
n'constant * m'constant { mul }
main { 2 + 3 * 4 }
"#;
        let mut interp = Interpreter::new(Config::default());
        interp.load_source(Rc::new(Source::source(program))).unwrap();
        let result = interp.run().unwrap();
        assert_eq!(interp.print(&result), "14");
    }

    #[test]
    fn true_and_false_are_name_lookupable() {
        let mut interp = Interpreter::new(Config::default());
        assert!(interp.ops.find(Category::Alphanumeric, "true").is_some());
        assert!(interp.ops.find(Category::Alphanumeric, "false").is_some());
        assert!(interp.ops.find(Category::Alphanumeric, "main").is_some());
        assert!(interp.ops.find(Category::Alphanumeric, "add").is_some());
    }

    #[test]
    fn builtin_type_lattice_matches_primitive_c() {
        let interp = Interpreter::new(Config::default());
        let constant = interp.ops.find(Category::Type, "'constant").unwrap();
        let nonzero = interp.ops.find(Category::Type, "'nonzero").unwrap();
        let positive = interp.ops.find(Category::Type, "'positive").unwrap();
        assert!(interp.ops.is_subtype_or_eq(positive, nonzero));
        assert!(interp.ops.is_subtype_or_eq(positive, constant));
        assert!(interp.ops.is_subtype_or_eq(nonzero, constant));
        assert!(!interp.ops.is_subtype_or_eq(constant, positive));
    }

    #[test]
    fn quiet_directive_suppresses_fired_rule_logging() {
        let program = "#quiet\n#op + binary left 45\nn + m { add }\nmain { 1 + 1 }\n";
        let mut interp = Interpreter::new(Config::default());
        interp.load_source(Rc::new(Source::source(program))).unwrap();
        assert!(interp.quiet);
        let result = interp.run().unwrap();
        assert_eq!(interp.print(&result), "2");
    }
}
