use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// One scope frame: a name-to-value map plus an optional pointer to the
/// enclosing frame.  Frames form a singly-linked chain from innermost to
/// global; closures keep their defining frames alive through the `Rc`.
///
/// Lookup failures are reported as `None`/`false`; the interpreter owns the
/// conversion into `UndefinedVariable` diagnostics because only it has the
/// offending token.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Unconditionally writes into the current frame.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Searches the current frame, then the enclosing chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            Some(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            None
        }
    }

    /// Writes into the first frame up the chain that already binds `name`.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            true
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            false
        }
    }

    /// Walks exactly `distance` frames up, then reads that frame only.
    pub fn get_at(&self, name: &str, distance: usize) -> Option<Value> {
        if distance == 0 {
            self.values.get(name).cloned()
        } else {
            self.enclosing
                .as_ref()
                .and_then(|e| e.borrow().get_at(name, distance - 1))
        }
    }

    /// Walks exactly `distance` frames up, then assigns in that frame only.
    pub fn assign_at(&mut self, name: &str, value: Value, distance: usize) -> bool {
        if distance == 0 {
            if self.values.contains_key(name) {
                self.values.insert(name.to_string(), value);
                true
            } else {
                false
            }
        } else {
            match &self.enclosing {
                Some(enclosing) => enclosing.borrow_mut().assign_at(name, value, distance - 1),
                None => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_get() {
        let mut env = Environment::new();
        env.define("x", Value::Number(42.0));

        assert!(matches!(env.get("x"), Some(Value::Number(n)) if n == 42.0));
        assert!(env.get("y").is_none());
    }

    #[test]
    fn get_walks_the_chain() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("x", Value::Number(1.0));

        let inner = Environment::with_enclosing(global);
        assert!(matches!(inner.get("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn assign_targets_the_declaring_frame() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("x", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(global.clone());
        assert!(inner.assign("x", Value::Number(2.0)));
        assert!(!inner.assign("missing", Value::Nil));

        assert!(matches!(global.borrow().get("x"), Some(Value::Number(n)) if n == 2.0));
    }

    #[test]
    fn depth_indexed_access() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("x", Value::Number(1.0));

        let middle = Rc::new(RefCell::new(Environment::with_enclosing(global)));
        let mut inner = Environment::with_enclosing(middle);

        assert!(matches!(inner.get_at("x", 2), Some(Value::Number(n)) if n == 1.0));
        // get_at reads only the frame at the given depth.
        assert!(inner.get_at("x", 0).is_none());
        assert!(inner.get_at("x", 1).is_none());

        assert!(inner.assign_at("x", Value::Number(3.0), 2));
        assert!(matches!(inner.get_at("x", 2), Some(Value::Number(n)) if n == 3.0));
        assert!(!inner.assign_at("x", Value::Number(4.0), 1));
    }
}
