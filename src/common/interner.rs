use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

thread_local! {
    static TABLE: RefCell<HashMap<Rc<str>, ()>> = RefCell::new(HashMap::new());
}

/// Interns a string, returning a cheaply-clonable handle shared by every
/// caller that interns the same text. Spec.md §4.2 notes that `STR` node
/// contents are aliased across `copy`, and §9 requires picking one
/// ownership policy and sticking to it; this crate interns every string
/// once and never frees an individual entry (policy (a)), so aliasing a
/// `Rc<str>` is always sound.
pub fn intern(s: &str) -> Rc<str> {
    TABLE.with(|table| {
        let mut table = table.borrow_mut();
        if let Some((existing, _)) = table.get_key_value(s) {
            return Rc::clone(existing);
        }
        let rc: Rc<str> = Rc::from(s);
        table.insert(Rc::clone(&rc), ());
        rc
    })
}
