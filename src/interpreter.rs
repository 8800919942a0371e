//! The tree-walking evaluator.
//!
//! Statements return a [`FlowSignal`]; `return`, `break`, and `continue`
//! travel as typed signals through the recursion instead of mutating the
//! AST or unwinding through panics.  The AST is immutable once parsed.
//!
//! Output goes through a caller-supplied `Write` sink so end-to-end tests
//! can capture stdout byte-for-byte.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::debug;

use crate::callable::{clock_native, LoxFunction, NativeFunction};
use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{ErrorCode, LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Statement-level result used to thread `return`/`break`/`continue`
/// through recursive evaluation.
#[derive(Debug)]
pub enum FlowSignal {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct Interpreter<W: Write> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: W,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(output: W) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Native(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            })),
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Execute a resolved program.  The resolution map is merged rather
    /// than replaced so REPL sessions accumulate entries while closures
    /// from earlier lines stay callable.
    pub fn interpret(&mut self, program: &[Stmt], locals: HashMap<ExprId, usize>) -> Result<()> {
        self.locals.extend(locals);

        for stmt in program {
            match self.execute(stmt)? {
                FlowSignal::Normal => {}

                // The parser and resolver reject orphaned control flow;
                // reaching this is a resolver bug, not a user fault.
                signal => {
                    return Err(LoxError::runtime(
                        ErrorCode::InvalidOperation,
                        0,
                        0,
                        format!("Control-flow signal {:?} escaped the top level", signal),
                    ));
                }
            }
        }

        Ok(())
    }

    // ─── Statements ──────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<FlowSignal> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(FlowSignal::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)?;
                Ok(FlowSignal::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(FlowSignal::Normal)
            }

            Stmt::Block(statements) => {
                let enclosing = self.environment.clone();
                let scope = Rc::new(RefCell::new(Environment::with_enclosing(enclosing)));
                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_in_child_scope(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_in_child_scope(else_branch)
                } else {
                    Ok(FlowSignal::Normal)
                }
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // Header scope for the loop variable; the body opens a
                // fresh child scope every iteration.
                let previous = self.environment.clone();
                self.environment = Rc::new(RefCell::new(Environment::with_enclosing(
                    previous.clone(),
                )));

                let result = self.run_for(
                    initializer.as_deref(),
                    condition.as_ref(),
                    increment.as_ref(),
                    body,
                );

                self.environment = previous;
                result
            }

            Stmt::Function(decl) => {
                let function = Value::Function(Rc::new(LoxFunction::new(
                    decl.clone(),
                    self.environment.clone(),
                    false,
                )));

                // An anonymous function statement binds nothing.
                if let Some(name) = &decl.name {
                    self.environment.borrow_mut().define(&name.lexeme, function);
                }

                Ok(FlowSignal::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(FlowSignal::Return(value))
            }

            Stmt::Break { .. } => Ok(FlowSignal::Break),

            Stmt::Continue { .. } => Ok(FlowSignal::Continue),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    fn run_for(
        &mut self,
        initializer: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &[Stmt],
    ) -> Result<FlowSignal> {
        if let Some(init) = initializer {
            self.execute(init)?;
        }

        loop {
            let keep_going = match condition {
                Some(cond) => self.evaluate(cond)?.is_truthy(),
                None => true,
            };

            if !keep_going {
                break;
            }

            match self.execute_in_child_scope(body)? {
                FlowSignal::Normal | FlowSignal::Continue => {}
                FlowSignal::Break => break,
                signal @ FlowSignal::Return(_) => return Ok(signal),
            }

            if let Some(incr) = increment {
                self.evaluate(incr)?;
            }
        }

        Ok(FlowSignal::Normal)
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<FlowSignal> {
        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                other => {
                    let at = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };

                    return Err(LoxError::runtime(
                        ErrorCode::NotAClass,
                        at.line,
                        at.column,
                        format!("Superclass must be a class, got {}", other.type_name()),
                    ));
                }
            },

            None => None,
        };

        // Two-stage definition lets methods close over the scope that
        // binds the class name.
        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        let mut method_table: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for decl in methods {
            let is_initializer = decl.is_named("init");
            let method = LoxFunction::new(decl.clone(), self.environment.clone(), is_initializer);

            if let Some(method_name) = &decl.name {
                method_table.insert(method_name.lexeme.clone(), Rc::new(method));
            }
        }

        let class = Value::Class(Rc::new(LoxClass::new(
            name.lexeme.clone(),
            superclass,
            method_table,
        )));

        self.environment.borrow_mut().assign(&name.lexeme, class);

        Ok(FlowSignal::Normal)
    }

    /// Run statements in `scope`, restoring the previous frame on every
    /// exit path.  A non-`Normal` signal stops execution and propagates.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        scope: Rc<RefCell<Environment>>,
    ) -> Result<FlowSignal> {
        let previous = std::mem::replace(&mut self.environment, scope);

        let mut result = Ok(FlowSignal::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(FlowSignal::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn execute_in_child_scope(&mut self, statements: &[Stmt]) -> Result<FlowSignal> {
        let scope = Rc::new(RefCell::new(Environment::with_enclosing(
            self.environment.clone(),
        )));
        self.execute_block(statements, scope)
    }

    // ─── Expressions ─────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(token) => self.evaluate_literal(token),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { op, right } => self.evaluate_unary(op, right),

            Expr::Binary { left, op, right } => self.evaluate_binary(left, op, right),

            Expr::Logical { left, op, right } => self.evaluate_logical(left, op, right),

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                self.assign_variable(*id, name, value.clone())?;
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.call_value(callee, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),

                other => Err(LoxError::runtime(
                    ErrorCode::NotAnObject,
                    name.line,
                    name.column,
                    format!("Only instances have properties, got {}", other.type_name()),
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.borrow_mut().set(name, value.clone());
                    Ok(value)
                }

                other => Err(LoxError::runtime(
                    ErrorCode::NotAnObject,
                    name.line,
                    name.column,
                    format!("Only instances have fields, got {}", other.type_name()),
                )),
            },

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),
        }
    }

    fn evaluate_literal(&self, token: &Token) -> Result<Value> {
        match &token.token_type {
            TokenType::NUMBER(n) => Ok(Value::Number(*n)),
            TokenType::STRING(s) => Ok(Value::String(s.clone())),
            TokenType::TRUE => Ok(Value::Bool(true)),
            TokenType::FALSE => Ok(Value::Bool(false)),
            TokenType::NIL => Ok(Value::Nil),

            other => Err(LoxError::runtime(
                ErrorCode::InvalidOperation,
                token.line,
                token.column,
                format!("Invalid literal {:?}", other),
            )),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, right: &Expr) -> Result<Value> {
        let value = self.evaluate(right)?;

        match op.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                other => Err(LoxError::runtime(
                    ErrorCode::InvalidDataType,
                    op.line,
                    op.column,
                    format!("Operand must be a number, got {}", other.type_name()),
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            _ => Err(LoxError::runtime(
                ErrorCode::InvalidOperation,
                op.line,
                op.column,
                format!("Invalid unary operator '{}'", op.lexeme),
            )),
        }
    }

    fn evaluate_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;

        // Short-circuit yields the deciding operand itself, not a boolean.
        match op.token_type {
            TokenType::OR if left.is_truthy() => Ok(left),
            TokenType::AND if !left.is_truthy() => Ok(left),
            _ => self.evaluate(right),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match op.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                (left, right) => Err(self.operands_error(
                    op,
                    ErrorCode::InvalidOperation,
                    "Operands must be two numbers or two strings",
                    &left,
                    &right,
                )),
            },

            TokenType::MINUS => self.arithmetic(op, left, right, |a, b| a - b),
            TokenType::STAR => self.arithmetic(op, left, right, |a, b| a * b),

            TokenType::SLASH => match (left, right) {
                (Value::Number(_), Value::Number(b)) if b == 0.0 => Err(LoxError::runtime(
                    ErrorCode::DivisionByZero,
                    op.line,
                    op.column,
                    "Division by zero",
                )),

                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),

                (left, right) => Err(self.operands_error(
                    op,
                    ErrorCode::InvalidDataType,
                    "Operands must be numbers",
                    &left,
                    &right,
                )),
            },

            TokenType::GREATER => self.comparison(op, left, right, |o| o.is_gt()),
            TokenType::GREATER_EQUAL => self.comparison(op, left, right, |o| o.is_ge()),
            TokenType::LESS => self.comparison(op, left, right, |o| o.is_lt()),
            TokenType::LESS_EQUAL => self.comparison(op, left, right, |o| o.is_le()),

            TokenType::EQUAL_EQUAL => self.equality(op, left, right, false),
            TokenType::BANG_EQUAL => self.equality(op, left, right, true),

            _ => Err(LoxError::runtime(
                ErrorCode::InvalidOperation,
                op.line,
                op.column,
                format!("Invalid binary operator '{}'", op.lexeme),
            )),
        }
    }

    fn arithmetic(
        &self,
        op: &Token,
        left: Value,
        right: Value,
        apply: fn(f64, f64) -> f64,
    ) -> Result<Value> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(apply(a, b))),

            (left, right) => Err(self.operands_error(
                op,
                ErrorCode::InvalidDataType,
                "Operands must be numbers",
                &left,
                &right,
            )),
        }
    }

    // Ordering works on two numbers or two strings (lexicographic).
    fn comparison(
        &self,
        op: &Token,
        left: Value,
        right: Value,
        accept: fn(std::cmp::Ordering) -> bool,
    ) -> Result<Value> {
        match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => {
                Ok(Value::Bool(a.partial_cmp(b).is_some_and(accept)))
            }

            (Value::String(a), Value::String(b)) => Ok(Value::Bool(accept(a.cmp(b)))),

            _ => Err(self.operands_error(
                op,
                ErrorCode::InvalidOperation,
                "Operands must be two numbers or two strings",
                &left,
                &right,
            )),
        }
    }

    fn equality(&self, op: &Token, left: Value, right: Value, negate: bool) -> Result<Value> {
        match left.strict_eq(&right) {
            Some(eq) => Ok(Value::Bool(eq != negate)),

            None => Err(self.operands_error(
                op,
                ErrorCode::InvalidOperation,
                "Cannot compare values of different types",
                &left,
                &right,
            )),
        }
    }

    fn operands_error(
        &self,
        op: &Token,
        code: ErrorCode,
        message: &str,
        left: &Value,
        right: &Value,
    ) -> LoxError {
        LoxError::runtime(
            code,
            op.line,
            op.column,
            format!(
                "{} ({} {} {})",
                message,
                left.type_name(),
                op.lexeme,
                right.type_name()
            ),
        )
    }

    // ─── Variables ───────────────────────────────────────────────────────

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        let value = match self.locals.get(&id) {
            Some(&distance) => self.environment.borrow().get_at(&name.lexeme, distance),

            // No resolution entry means the resolver pinned this name to the
            // global scope; reading through the current chain instead would
            // let later local declarations shadow it dynamically.
            None => self.globals.borrow().get(&name.lexeme),
        };

        value.ok_or_else(|| self.undefined_variable(name))
    }

    fn assign_variable(&mut self, id: ExprId, name: &Token, value: Value) -> Result<()> {
        let assigned = match self.locals.get(&id) {
            Some(&distance) => self
                .environment
                .borrow_mut()
                .assign_at(&name.lexeme, value, distance),

            None => self.globals.borrow_mut().assign(&name.lexeme, value),
        };

        if assigned {
            Ok(())
        } else {
            Err(self.undefined_variable(name))
        }
    }

    fn undefined_variable(&self, name: &Token) -> LoxError {
        LoxError::runtime(
            ErrorCode::UndefinedVariable,
            name.line,
            name.column,
            format!("Undefined variable '{}'", name.lexeme),
        )
    }

    // ─── Calls ───────────────────────────────────────────────────────────

    fn call_value(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Function(function) => self.call_function(&function, paren, args),

            Value::Native(native) => {
                self.check_arity(native.arity, args.len(), paren)?;
                (native.func)(&args)
            }

            Value::Class(class) => self.instantiate(class, paren, args),

            other => Err(LoxError::runtime(
                ErrorCode::ExpressionIsNotCallable,
                paren.line,
                paren.column,
                format!("Can only call functions and classes, got {}", other.type_name()),
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &LoxFunction,
        paren: &Token,
        args: Vec<Value>,
    ) -> Result<Value> {
        self.check_arity(function.arity(), args.len(), paren)?;

        debug!(
            "Calling {} with {} argument(s)",
            function.name().unwrap_or("<anonymous>"),
            args.len()
        );

        // Parameters bind in a fresh frame chained to the captured closure,
        // not to the caller's current frame.
        let mut frame = Environment::with_enclosing(function.closure.clone());

        for (param, arg) in function.decl.params.iter().zip(args) {
            frame.define(&param.lexeme, arg);
        }

        let signal = self.execute_block(&function.decl.body, Rc::new(RefCell::new(frame)))?;

        if function.is_initializer {
            // `init` always yields the receiver; an explicit return value is
            // discarded.
            return self
                .environment_this(function)
                .ok_or_else(|| self.undefined_variable(paren));
        }

        match signal {
            FlowSignal::Return(value) => Ok(value),
            FlowSignal::Normal => Ok(Value::Nil),

            FlowSignal::Break | FlowSignal::Continue => Err(LoxError::runtime(
                ErrorCode::InvalidOperation,
                paren.line,
                paren.column,
                "Loop control escaped the function body",
            )),
        }
    }

    fn environment_this(&self, function: &LoxFunction) -> Option<Value> {
        function.closure.borrow().get_at("this", 0)
    }

    fn instantiate(
        &mut self,
        class: Rc<LoxClass>,
        paren: &Token,
        args: Vec<Value>,
    ) -> Result<Value> {
        self.check_arity(class.arity(), args.len(), paren)?;

        let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));

        if let Some(init) = class.find_method("init") {
            let bound = init.bind(instance.clone());
            self.call_function(&bound, paren, args)?;
        }

        Ok(Value::Instance(instance))
    }

    fn check_arity(&self, expected: usize, got: usize, paren: &Token) -> Result<()> {
        if expected != got {
            return Err(LoxError::runtime(
                ErrorCode::WrongNumberOfArguments,
                paren.line,
                paren.column,
                format!("Expected {} arguments but got {}", expected, got),
            ));
        }

        Ok(())
    }
}
