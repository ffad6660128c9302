use indexmap::IndexMap;
use log::debug;

use crate::lang::value::Value;

pub type Scope = IndexMap<String, Value>;

/// Stack of lexical scopes, innermost last
///
/// Frames are addressed by their index in the stack, with the global frame at index 0. The global
/// frame lives as long as the stack itself and can never be popped.
pub struct Variables {
    inner: Vec<Scope>,
}

impl Variables {
    pub fn new() -> Self {
        Variables {
            inner: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.inner.push(Scope::default());
        debug!("pushed scope, depth {}", self.inner.len());
    }

    pub fn pop_scope(&mut self) {
        assert!(self.inner.len() > 1, "cannot pop the global scope");
        self.inner.pop();
        debug!("popped scope, depth {}", self.inner.len());
    }

    pub fn depth(&self) -> usize {
        self.inner.len()
    }

    /// Index of the innermost frame that binds `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.inner.iter().rposition(|scope| scope.contains_key(name))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.find(name).and_then(|frame| self.inner[frame].get(name))
    }

    pub fn in_innermost(&self, name: &str) -> bool {
        self.innermost().contains_key(name)
    }

    /// Bind `name` in the innermost frame
    pub fn insert(&mut self, name: String, val: Value) {
        let last = self.inner.len() - 1;
        self.inner[last].insert(name, val);
    }

    /// Rebind `name` in `frame`, which must come from `find()`
    pub fn set(&mut self, frame: usize, name: &str, val: Value) {
        if let Some(slot) = self.inner[frame].get_mut(name) {
            *slot = val;
        }
    }

    fn innermost(&self) -> &Scope {
        &self.inner[self.inner.len() - 1]
    }
}

#[test]
fn test_shadowing() {
    let mut vars = Variables::new();
    vars.insert("x".to_string(), Value::Integer(1));
    vars.push_scope();
    assert!(!vars.in_innermost("x"));

    vars.insert("x".to_string(), Value::Integer(2));
    assert_eq!(vars.get("x"), Some(&Value::Integer(2)));
    assert_eq!(vars.find("x"), Some(1));

    vars.pop_scope();
    assert_eq!(vars.get("x"), Some(&Value::Integer(1)));
    assert_eq!(vars.find("x"), Some(0));
    assert_eq!(vars.depth(), 1);
}

#[test]
fn test_set_defining_frame() {
    let mut vars = Variables::new();
    vars.insert("x".to_string(), Value::Integer(1));
    vars.push_scope();
    vars.push_scope();

    let frame = vars.find("x").unwrap();
    vars.set(frame, "x", Value::Integer(5));
    assert!(!vars.in_innermost("x"));

    vars.pop_scope();
    vars.pop_scope();
    assert_eq!(vars.get("x"), Some(&Value::Integer(5)));
    assert_eq!(vars.find("missing"), None);
}

#[test]
fn test_insertion_order() {
    let mut vars = Variables::new();
    for name in &["c", "a", "b"] {
        vars.insert(name.to_string(), Value::Void);
    }

    let names: Vec<&str> = vars.innermost().keys().map(|k| k.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
}
