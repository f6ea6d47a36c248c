//! The Name Space (spec.md §3 "Name node", §4.10): a tree of
//! reference-counted name nodes supporting qualified lookup, insertion,
//! and structural merge. Grounded on the teacher's use of `Rc`/`RefCell`
//! for shared mutable compiler state (e.g. `construct::scope::Scope`),
//! generalized here to a parent/child/sibling tree rather than a flat
//! table, since spec.md §3 calls for qualified (dotted) names and a
//! hierarchical global/local split.
//!
//! A name node's reference count (spec.md §3 "Lifecycle") is simply the
//! strong count of its owning `Rc` — `name_copy`/`name_free` in the
//! original source correspond to `Rc::clone` and dropping a handle, which
//! Rust already does correctly, so this module does not re-implement
//! manual counting.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::operator::OperatorId;
use crate::tree::Expr;

pub type NameRef = Rc<RefCell<NameNode>>;

/// A single node in a name space (spec.md §3 "Name node"). `interest` is
/// carried for fidelity with the original data model but is never read
/// by core semantics (spec.md §9 "reserved").
#[derive(Debug)]
pub struct NameNode {
    pub ty: OperatorId,
    pub print_value: Rc<str>,
    pub value: Option<Expr>,
    pub parent: Option<Weak<RefCell<NameNode>>>,
    pub children: Vec<NameRef>,
    pub interest: u32,
}

impl NameNode {
    fn leaf(print_value: Rc<str>, ty: OperatorId, parent: Option<&NameRef>) -> NameRef {
        Rc::new(RefCell::new(NameNode {
            ty,
            print_value,
            value: None,
            parent: parent.map(Rc::downgrade),
            children: Vec::new(),
            interest: 0,
        }))
    }
}

/// A name space is just a handle on its root node; `spec.md` distinguishes
/// the persistent *global* space from a fresh *local* space allocated per
/// rule (§3 "Name space").
#[derive(Debug, Clone)]
pub struct NameSpace {
    pub root: NameRef,
}

impl NameSpace {
    /// A fresh, anonymous root — used for the global space at startup, for
    /// a rule's local space during parsing, and for the anonymous
    /// namespace a rewrite merges into when its redex carries no label
    /// (spec.md §4.7 "merge the rule's local space with a fresh anonymous
    /// root").
    pub fn new_root(undeclared: OperatorId) -> NameSpace {
        NameSpace { root: NameNode::leaf(crate::common::interner::intern(""), undeclared, None) }
    }

    /// Inserts (or finds) a direct child of `parent` by print value,
    /// keeping children sorted by print value (spec.md §3 "Children of a
    /// name are sorted by print value").
    pub fn insert_child(parent: &NameRef, print_value: &str, undeclared: OperatorId) -> NameRef {
        {
            let node = parent.borrow();
            if let Ok(i) = node.children.binary_search_by(|c| c.borrow().print_value.as_ref().cmp(print_value)) {
                return Rc::clone(&node.children[i]);
            }
        }
        let interned = crate::common::interner::intern(print_value);
        let child = NameNode::leaf(interned, undeclared, Some(parent));
        let mut node = parent.borrow_mut();
        let idx = node
            .children
            .binary_search_by(|c| c.borrow().print_value.as_ref().cmp(print_value))
            .unwrap_err();
        node.children.insert(idx, Rc::clone(&child));
        child
    }

    pub fn find_child(parent: &NameRef, print_value: &str) -> Option<NameRef> {
        let node = parent.borrow();
        node.children
            .binary_search_by(|c| c.borrow().print_value.as_ref().cmp(print_value))
            .ok()
            .map(|i| Rc::clone(&node.children[i]))
    }

    /// Resolves a dotted chain `a.b.c` starting at `start`, inserting
    /// every prefix (as `undeclared`) if absent, per spec.md §4.3 "a
    /// chain `a.b.c` builds nested name-space lookups".
    pub fn resolve_chain(start: &NameRef, segments: &[&str], undeclared: OperatorId) -> NameRef {
        let mut cursor = Rc::clone(start);
        for seg in segments {
            cursor = NameSpace::insert_child(&cursor, seg, undeclared);
        }
        cursor
    }

    /// `insert(ins, into)` (spec.md §4.10): merges a rule-local space
    /// `ins` into an existing space `into` (a label's namespace, or a
    /// fresh anonymous root). For each child of `ins`, in print-value
    /// order (already the storage order):
    /// - absent in `into`: a parameter's bound value is copied in as
    ///   `into`'s new child (so later qualified lookups through the label
    ///   see the same structure the parameter matched); a local with no
    ///   binding gets a fresh node allocated directly under `into`, and
    ///   `ins`'s copy of the local has its `value` pointed at that new
    ///   node so `instantiate` can find it (spec.md §4.9).
    /// - present in `into`: a parameter must not conflict with the
    ///   existing binding; a local merges recursively into the existing
    ///   child.
    pub fn merge(ins: &NameRef, into: &NameRef, undeclared: OperatorId) -> Result<()> {
        let children: Vec<NameRef> = ins.borrow().children.clone();
        for child in children {
            let print_value = child.borrow().print_value.clone();
            let is_parameter = child.borrow().value.is_some();
            let existing = NameSpace::find_child(into, &print_value);

            match existing {
                None => {
                    if is_parameter {
                        let bound = child.borrow().value.as_ref().map(crate::tree::copy).unwrap();
                        let new_child = NameSpace::insert_child(into, &print_value, child.borrow().ty);
                        new_child.borrow_mut().value = Some(bound);
                        NameSpace::merge(&child, &new_child, undeclared)?;
                    } else {
                        let new_child = NameSpace::insert_child(into, &print_value, child.borrow().ty);
                        child.borrow_mut().value = Some(Expr::Name(Rc::clone(&new_child)));
                        NameSpace::merge(&child, &new_child, undeclared)?;
                    }
                }
                Some(existing) => {
                    if is_parameter {
                        let existing_value = existing.borrow().value.clone();
                        if let Some(existing_value) = existing_value {
                            if !structurally_equal(&existing_value, child.borrow().value.as_ref().unwrap()) {
                                return Err(Error::runtime(
                                    format!("binding conflict for '{}' during name-space merge", print_value),
                                    &crate::common::span::Span::empty(),
                                ));
                            }
                        } else {
                            existing.borrow_mut().value =
                                child.borrow().value.as_ref().map(crate::tree::copy);
                        }
                    } else {
                        child.borrow_mut().value = Some(Expr::Name(Rc::clone(&existing)));
                    }
                    NameSpace::merge(&child, &existing, undeclared)?;
                }
            }
        }
        Ok(())
    }
}

/// Recursively resets every bound value under `root` to `None` (spec.md
/// §4.6 "bindings are consumed by instantiation and then cleared when the
/// local name space is re-copied for the next attempt"). A rule keeps one
/// persistent local name space across every match attempt (rather than
/// re-copying it per spec.md §9's suggested cleaner model), so this is run
/// once a rewrite has finished consuming the rule's bindings, to leave the
/// rule ready for its next application.
pub fn clear_bindings(root: &NameRef) {
    let children: Vec<NameRef> = root.borrow().children.clone();
    for child in children {
        child.borrow_mut().value = None;
        clear_bindings(&child);
    }
}

/// A coarse structural-equality check used only to detect binding
/// conflicts during merge (spec.md §4.10 "parameters must not conflict
/// with an existing binding"). Two names are equal iff they are the same
/// node; numbers/strings compare by value; terms compare recursively.
fn structurally_equal(a: &Expr, b: &Expr) -> bool {
    match (a, b) {
        (Expr::Name(x), Expr::Name(y)) => Rc::ptr_eq(x, y),
        (Expr::Number(x, _), Expr::Number(y, _)) => x == y,
        (Expr::Str(x, _), Expr::Str(y, _)) => x == y,
        (Expr::Term(x), Expr::Term(y)) => {
            x.op == y.op
                && match (&x.left, &y.left) {
                    (Some(a), Some(b)) => structurally_equal(a, b),
                    (None, None) => true,
                    _ => false,
                }
                && match (&x.right, &y.right) {
                    (Some(a), Some(b)) => structurally_equal(a, b),
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

    #[test]
    fn insert_child_is_idempotent_and_sorted() {
        let space = NameSpace::new_root(0);
        let b = NameSpace::insert_child(&space.root, "b", 0);
        let a = NameSpace::insert_child(&space.root, "a", 0);
        let b_again = NameSpace::insert_child(&space.root, "b", 0);
        assert!(Rc::ptr_eq(&b, &b_again));
        let names: Vec<String> =
            space.root.borrow().children.iter().map(|c| c.borrow().print_value.to_string()).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        let _ = a;
    }

    #[test]
    fn resolve_chain_builds_nested_path() {
        let space = NameSpace::new_root(0);
        let leaf = NameSpace::resolve_chain(&space.root, &["a", "b", "c"], 0);
        assert_eq!(leaf.borrow().print_value.as_ref(), "c");
        assert_eq!(space.root.borrow().children.len(), 1);
    }

    #[test]
    fn merge_propagates_parameter_binding() {
        let local = NameSpace::new_root(0);
        let param = NameSpace::insert_child(&local.root, "n", 0);
        param.borrow_mut().value = Some(Expr::Number(7.0, 0));

        let into = NameSpace::new_root(0);
        NameSpace::merge(&local.root, &into.root, 0).unwrap();

        let merged = NameSpace::find_child(&into.root, "n").unwrap();
        assert_eq!(merged.borrow().value.as_ref().and_then(|e| e.as_number()), Some(7.0));
    }

    #[test]
    fn clear_bindings_resets_recursively() {
        let local = NameSpace::new_root(0);
        let n = NameSpace::insert_child(&local.root, "n", 0);
        n.borrow_mut().value = Some(Expr::Number(1.0, 0));
        let nested = NameSpace::insert_child(&n, "inner", 0);
        nested.borrow_mut().value = Some(Expr::Number(2.0, 0));

        clear_bindings(&local.root);

        assert!(n.borrow().value.is_none());
        assert!(nested.borrow().value.is_none());
    }
}
