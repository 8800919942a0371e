use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::error::{ErrorCode, LoxError, Result};
use crate::stmt::FunctionDecl;
use crate::value::Value;

/// A user-defined function: its declaration plus the environment captured
/// at the definition site.
#[derive(Debug)]
pub struct LoxFunction {
    pub decl: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        decl: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            decl,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.decl.name.as_ref().map(|t| t.lexeme.as_str())
    }

    pub fn arity(&self) -> usize {
        self.decl.params.len()
    }

    /// A bound method: same declaration, closure extended with a one-slot
    /// frame holding `this`.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this", Value::Instance(instance));

        LoxFunction::new(
            self.decl.clone(),
            Rc::new(RefCell::new(environment)),
            self.is_initializer,
        )
    }
}

/// A host-provided builtin exposed in the global scope.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// `clock()`: microseconds since the Unix epoch.
pub fn clock_native(_args: &[Value]) -> Result<Value> {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|e| {
        LoxError::runtime(
            ErrorCode::InvalidOperation,
            0,
            0,
            format!("Clock error: {}", e),
        )
    })?;

    Ok(Value::Number(elapsed.as_micros() as f64))
}
