//! The Preprocessor (spec.md EXPANSION B, §6 "Preprocessor directives").
//! `spec.md` §1 lists the preprocessor among the external collaborators,
//! but EXPANSION B asks for one grounded on `prep.c`'s `op_define` /
//! `type_define` / `primitive_define`: directive words are free-form and
//! order-independent (aside from the leading name(s)), so this module
//! just classifies each whitespace-separated word by shape exactly as
//! `op_define` does — a leading `'` is a type/supertype, a leading `#`
//! digit is a reduce-function tag, a leading digit is a precedence, and
//! everything else is either a recognized keyword or an operator name.

use crate::common::span::Span;
use crate::error::{Error, Result};
use crate::operator::{Arity, Assoc, EvalCode, NameKind, OperatorId, OperatorTable, ReduceAction, UnaryKind};

#[derive(Debug)]
pub enum Directive {
    /// `#op ...` — one operator (any arity), or two (outfix pair).
    Op,
    /// `#type 'name [['super] 'parent]`.
    Type,
    /// `#primitive 'name 'super` / `#primitive name 'super`.
    Primitive,
    /// `#include path`.
    Include(String),
    /// `#line N`.
    Line(usize),
    /// `#trace [N]`.
    Trace(Option<i64>),
    /// `#quiet`.
    Quiet,
}

/// Classifies the directive keyword (the first word after `#`) without
/// consuming the rest of the line; `apply_op`/`apply_type`/
/// `apply_primitive` do the real work against the operator table.
pub fn classify(line: &str) -> Result<(Directive, Vec<&str>)> {
    let mut words = line.split_whitespace();
    let keyword = words.next().ok_or_else(|| {
        Error::preprocessor("empty preprocessor directive", &Span::empty())
    })?;
    let rest: Vec<&str> = words.collect();

    let directive = match keyword {
        "op" | "operator" => Directive::Op,
        "type" => Directive::Type,
        "primitive" => Directive::Primitive,
        "include" => {
            let path = rest.first().ok_or_else(|| {
                Error::preprocessor("#include requires a path", &Span::empty())
            })?;
            Directive::Include(path.to_string())
        }
        "line" => {
            let n = rest
                .first()
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| Error::preprocessor("#line requires a line number", &Span::empty()))?;
            Directive::Line(n)
        }
        "trace" => {
            let n = rest.first().and_then(|s| s.parse::<i64>().ok());
            Directive::Trace(n)
        }
        "quiet" => Directive::Quiet,
        other => {
            return Err(Error::preprocessor(format!("unknown directive '#{}'", other), &Span::empty()))
        }
    };
    Ok((directive, rest))
}

/// Interprets an `#op` directive's words against `ops` (spec.md §6, and
/// `prep.c`'s `op_define`): classifies every word by shape, resolving
/// names (one, or two for an outfix pair), arity words, an optional
/// precedence, an optional `'supertype`, and an optional `#N` reduce tag.
pub fn apply_op(ops: &mut OperatorTable, words: &[&str], span: &Span) -> Result<()> {
    let mut names: Vec<&str> = Vec::new();
    let mut supertype: Option<&str> = None;
    let mut reduce: Option<i64> = None;
    let mut precedence: Option<i32> = None;
    let mut binary_assoc: Option<Assoc> = None;
    let mut unary_kind: Option<UnaryKind> = None;
    let mut saw_binary = false;
    let mut saw_unary = false;
    let mut saw_nullary = false;
    let mut saw_outfix = false;

    for word in words {
        if let Some(stripped) = word.strip_prefix('#') {
            let n: i64 = stripped
                .parse()
                .map_err(|_| Error::preprocessor("invalid parser reduce tag", span))?;
            reduce = Some(n);
            continue;
        }
        if let Some(ty) = word.strip_prefix('\'') {
            supertype = Some(ty);
            continue;
        }
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            precedence = Some(
                word.parse()
                    .map_err(|_| Error::preprocessor("invalid precedence", span))?,
            );
            continue;
        }
        match *word {
            "left" => {
                saw_binary = true;
                binary_assoc = Some(Assoc::Left);
            }
            "right" => {
                saw_binary = true;
                binary_assoc = Some(Assoc::Right);
            }
            "non" | "nonassoc" | "nonassociative" => {
                saw_binary = true;
                binary_assoc = Some(Assoc::NonAssoc);
            }
            "binary" | "infix" => saw_binary = true,
            "prefix" => {
                saw_unary = true;
                unary_kind = Some(UnaryKind::Prefix);
            }
            "postfix" => {
                saw_unary = true;
                unary_kind = Some(UnaryKind::Postfix);
            }
            "unary" => saw_unary = true,
            "outfix" | "matchfix" => {
                saw_unary = true;
                saw_outfix = true;
                unary_kind = Some(UnaryKind::Outfix1);
            }
            "nullary" => saw_nullary = true,
            "associative" | "precedence" | "supertype" => {}
            other => names.push(other),
        }
    }

    if names.is_empty() {
        return Err(Error::preprocessor("no operator name specified", span));
    }
    if names.len() > 2 {
        return Err(Error::preprocessor("too many operator names in #op", span));
    }

    let arity = if saw_outfix || names.len() == 2 {
        if !saw_nullary {
            Arity::Unary(UnaryKind::Outfix1)
        } else {
            return Err(Error::preprocessor("outfix operator cannot be nullary", span));
        }
    } else if saw_binary {
        Arity::Binary(binary_assoc.unwrap_or(Assoc::NonAssoc))
    } else if saw_unary {
        Arity::Unary(unary_kind.unwrap_or(UnaryKind::Prefix))
    } else {
        Arity::Nullary
    };

    if precedence.is_some() && matches!(arity, Arity::Nullary) {
        return Err(Error::preprocessor("a nullary operator may not have a precedence", span));
    }
    if precedence.is_some() && matches!(arity, Arity::Unary(UnaryKind::Outfix1)) {
        return Err(Error::preprocessor("an outfix operator may not have a precedence", span));
    }

    let eval = match reduce {
        None => EvalCode::Ordinary,
        Some(n) => EvalCode::Reduce(reduce_action(n, span)?),
    };

    let resolved_precedence = match arity {
        Arity::Nullary => i32::MAX,
        Arity::Unary(UnaryKind::Outfix1) => 0,
        _ => precedence.unwrap_or(0),
    };

    let first = ops.declare(names[0], arity, resolved_precedence, eval, span)?;

    if matches!(arity, Arity::Unary(UnaryKind::Outfix1)) {
        let second_name = names.get(1).ok_or_else(|| {
            Error::preprocessor("outfix operator requires two operator names", span)
        })?;
        let second = ops.declare(second_name, Arity::Unary(UnaryKind::Outfix2), 0, EvalCode::Ordinary, span)?;
        ops.pair_outfix(first, second);
    } else if names.len() == 2 {
        return Err(Error::preprocessor("multiple operator names defined, or invalid keyword", span));
    }

    if let Some(parent) = supertype {
        ops.set_supertype(first, &format!("'{}", parent), span)?;
    }

    Ok(())
}

fn reduce_action(n: i64, span: &Span) -> Result<ReduceAction> {
    match n {
        1 => Ok(ReduceAction::Discard),
        2 => Ok(ReduceAction::Label),
        3 => Ok(ReduceAction::Negate),
        4 => Ok(ReduceAction::NoEval),
        5 => Ok(ReduceAction::FullSimplify),
        _ => Err(Error::preprocessor(format!("invalid parser reduce function #{}", n), span)),
    }
}

/// `#type 'name [['super] 'parent]` (spec.md §6, `prep.c`'s `type_define`).
pub fn apply_type(ops: &mut OperatorTable, words: &[&str], span: &Span) -> Result<OperatorId> {
    let name = words.first().ok_or_else(|| Error::preprocessor("#type requires a name", span))?;
    let name = name
        .strip_prefix('\'')
        .ok_or_else(|| Error::preprocessor("type must begin with a single quote", span))?;
    if name.is_empty() {
        return Err(Error::preprocessor("cannot define null type", span));
    }

    let full_name = format!("'{}", name);
    let id = ops.declare(&full_name, Arity::Name(NameKind::Type), 0, EvalCode::Ordinary, span)?;

    let rest = &words[1..];
    if let Some(parent_word) = rest.iter().find(|w| w.starts_with('\'')) {
        ops.set_supertype(id, parent_word, span)?;
    } else if !rest.is_empty() && rest != ["supertype"] {
        return Err(Error::preprocessor("invalid type definition", span));
    }

    Ok(id)
}

/// `#primitive 'name 'super` / `#primitive name 'super` (spec.md §6,
/// `prep.c`'s `primitive_define`): attaches a supertype to an
/// already-declared type or operator.
pub fn apply_primitive(ops: &mut OperatorTable, words: &[&str], span: &Span) -> Result<()> {
    let mut iter = words.iter().filter(|w| **w != "supertype");
    let target = iter.next().ok_or_else(|| Error::preprocessor("#primitive requires a name", span))?;
    let parent = iter
        .next()
        .ok_or_else(|| Error::preprocessor("#primitive requires a supertype", span))?;

    let category = crate::operator::Category::of(target);
    let id = ops
        .find(category, target)
        .ok_or_else(|| Error::preprocessor(format!("primitive not found: {}", target), span))?;
    ops.set_supertype(id, parent, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_op_keyword() {
        let (d, rest) = classify("op + binary left 45").unwrap();
        assert!(matches!(d, Directive::Op));
        assert_eq!(rest, vec!["+", "binary", "left", "45"]);
    }

    #[test]
    fn apply_op_binary_left() {
        let mut ops = OperatorTable::new();
        apply_op(&mut ops, &["+", "binary", "left", "45"], &Span::empty()).unwrap();
        let id = ops.find(crate::operator::Category::SingleChar, "+").unwrap();
        assert_eq!(ops.get(id).precedence, 45);
        assert_eq!(ops.get(id).arity, Arity::Binary(Assoc::Left));
    }

    #[test]
    fn apply_op_outfix_pair() {
        let mut ops = OperatorTable::new();
        apply_op(&mut ops, &["(", ")", "#1"], &Span::empty()).unwrap();
        let open = ops.find(crate::operator::Category::SingleChar, "(").unwrap();
        let close = ops.find(crate::operator::Category::SingleChar, ")").unwrap();
        assert_eq!(ops.other_of(open), Some(close));
        assert_eq!(ops.other_of(close), Some(open));
        assert_eq!(ops.get(open).eval, EvalCode::Reduce(ReduceAction::Discard));
    }

    #[test]
    fn apply_type_with_supertype() {
        let mut ops = OperatorTable::new();
        apply_type(&mut ops, &["'number"], &Span::empty()).unwrap();
        apply_type(&mut ops, &["'positive", "'number"], &Span::empty()).unwrap();
        let number = ops.find(crate::operator::Category::Type, "'number").unwrap();
        let positive = ops.find(crate::operator::Category::Type, "'positive").unwrap();
        assert!(ops.is_subtype_or_eq(positive, number));
    }
}
