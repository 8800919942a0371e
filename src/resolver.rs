//! Static resolution pass.
//!
//! A single AST walk that:
//! 1. builds lexical scopes: a stack of maps tracking declared, defined, and
//!    used names per block, function body, class body, and `for` header;
//! 2. enforces static rules: duplicate declarations in one scope, reading a
//!    variable in its own initializer, unused locals on scope exit, `this`
//!    outside a class, self-inheritance, and orphaned
//!    `break`/`continue`/`return` (a backstop behind the parser's checks);
//! 3. records binding distances: for every variable occurrence the number of
//!    scopes between the use and the declaration, keyed by the expression's
//!    id.  Names absent from every scope resolve through the global chain at
//!    runtime and get no entry.
//!
//! Resolution halts at the first static error.  On success the distance map
//! is handed to the interpreter, which never consults the scope stack again.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{ErrorCode, LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;

/// Resolve a program, producing the expression-id → lexical-distance map.
pub fn resolve(program: &[Stmt]) -> Result<HashMap<ExprId, usize>> {
    let mut resolver = Resolver::new();
    resolver.resolve_all(program)?;
    Ok(resolver.locals)
}

#[derive(Debug)]
struct ScopeEntry {
    defined: bool,
    used: bool,
    line: usize,
    column: usize,
}

struct Resolver {
    scopes: Vec<HashMap<String, ScopeEntry>>,

    // Shadow map of the implicit global scope, tracked only far enough to
    // catch `var x = x;` at the top level.  Globals may be redeclared and
    // are exempt from the unused sweep.
    globals: HashMap<String, bool>,

    locals: HashMap<ExprId, usize>,
    function_depth: usize,
    loop_depth: usize,
    in_class: bool,
}

impl Resolver {
    fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            globals: HashMap::new(),
            locals: HashMap::new(),
            function_depth: 0,
            loop_depth: 0,
            in_class: false,
        }
    }

    fn resolve_all(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Resolving {} statement(s)", statements.len());

        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    // ─── Statements ──────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

            Stmt::Var { name, initializer } => {
                self.declare(name)?;

                if let Some(init) = initializer {
                    self.resolve_expr(init)?;
                }

                self.define(name);
                Ok(())
            }

            Stmt::Block(statements) => self.resolve_block(statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_block(then_branch)?;

                if let Some(else_branch) = else_branch {
                    self.resolve_block(else_branch)?;
                }

                Ok(())
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // The header gets its own scope so a loop variable does not
                // leak into the enclosing block.
                self.begin_scope();

                let result = (|| {
                    if let Some(init) = initializer {
                        self.resolve_stmt(init)?;
                    }

                    if let Some(cond) = condition {
                        self.resolve_expr(cond)?;
                    }

                    if let Some(incr) = increment {
                        self.resolve_expr(incr)?;
                    }

                    self.loop_depth += 1;
                    let body_result = self.resolve_block(body);
                    self.loop_depth -= 1;

                    body_result
                })();

                match result {
                    Ok(()) => self.end_scope(),
                    Err(e) => {
                        self.scopes.pop();
                        Err(e)
                    }
                }
            }

            Stmt::Function(decl) => {
                if let Some(name) = &decl.name {
                    self.declare(name)?;
                    self.define(name);
                }

                self.resolve_function(decl)
            }

            Stmt::Return { keyword, value } => {
                if self.function_depth == 0 {
                    return Err(self.context_error(
                        ErrorCode::ReturnStatementOutsideFunction,
                        keyword,
                        "'return' used outside of a function",
                    ));
                }

                if let Some(expr) = value {
                    self.resolve_expr(expr)?;
                }

                Ok(())
            }

            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    return Err(self.context_error(
                        ErrorCode::BreakStatementOutsideLoop,
                        keyword,
                        "'break' used outside of a loop",
                    ));
                }

                Ok(())
            }

            Stmt::Continue { keyword } => {
                if self.loop_depth == 0 {
                    return Err(self.context_error(
                        ErrorCode::ContinueStatementOutsideLoop,
                        keyword,
                        "'continue' used outside of a loop",
                    ));
                }

                Ok(())
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        if let Some(Expr::Variable { name: sup_name, .. }) = superclass {
            if sup_name.lexeme == name.lexeme {
                return Err(self.context_error(
                    ErrorCode::NoSelfInheritance,
                    sup_name,
                    "A class cannot inherit from itself",
                ));
            }
        }

        self.declare(name)?;
        self.define(name);

        if let Some(sup) = superclass {
            self.resolve_expr(sup)?;
        }

        let enclosing_class = self.in_class;
        self.in_class = true;

        // Implicit `this` scope for the methods.  The binding is synthetic,
        // so it is exempt from the unused sweep.
        self.begin_scope();
        self.scopes.last_mut().unwrap().insert(
            "this".to_string(),
            ScopeEntry {
                defined: true,
                used: true,
                line: name.line,
                column: name.column,
            },
        );

        let result = (|| {
            for method in methods {
                // Method names are instance properties, not lexical
                // bindings; only their bodies are resolved.
                self.resolve_function(method)?;
            }
            Ok(())
        })();

        let result = match result {
            Ok(()) => self.end_scope(),
            Err(e) => {
                self.scopes.pop();
                Err(e)
            }
        };

        self.in_class = enclosing_class;
        result
    }

    /// Fresh scope for a function's parameters and body.  Loop context does
    /// not cross the function boundary.
    fn resolve_function(&mut self, decl: &FunctionDecl) -> Result<()> {
        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;

        self.begin_scope();

        let result = (|| {
            for param in &decl.params {
                self.declare(param)?;
                self.define(param);
            }

            for stmt in &decl.body {
                self.resolve_stmt(stmt)?;
            }

            Ok(())
        })();

        let result = match result {
            Ok(()) => self.end_scope(),
            Err(e) => {
                self.scopes.pop();
                Err(e)
            }
        };

        self.function_depth -= 1;
        self.loop_depth = enclosing_loops;

        result
    }

    fn resolve_block(&mut self, statements: &[Stmt]) -> Result<()> {
        self.begin_scope();

        for (index, stmt) in statements.iter().enumerate() {
            if let Err(e) = self.resolve_stmt(stmt) {
                debug!("Resolution failed at block statement {}", index);
                self.scopes.pop();
                return Err(e);
            }
        }

        self.end_scope()
    }

    // ─── Expressions ─────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => Ok(()),

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if let Some(entry) = scope.get(&name.lexeme) {
                        if !entry.defined {
                            return Err(self.context_error(
                                ErrorCode::InvalidSelfReference,
                                name,
                                "Cannot read a variable in its own initializer",
                            ));
                        }
                    }
                } else if self.globals.get(&name.lexeme) == Some(&false) {
                    return Err(self.context_error(
                        ErrorCode::InvalidSelfReference,
                        name,
                        "Cannot read a variable in its own initializer",
                    ));
                }

                self.resolve_local(*id, name);
                Ok(())
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
                Ok(())
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;

                for argument in arguments {
                    self.resolve_expr(argument)?;
                }

                Ok(())
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)
            }

            Expr::This { id, keyword } => {
                if !self.in_class {
                    return Err(self.context_error(
                        ErrorCode::ThisOutsideClass,
                        keyword,
                        "Cannot use 'this' outside of a class",
                    ));
                }

                self.resolve_local(*id, keyword);
                Ok(())
            }
        }
    }

    // ─── Scope management ────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope, sweeping for unused names.  When several
    /// names went unused the earliest declaration is reported, keeping the
    /// diagnostic deterministic.
    fn end_scope(&mut self) -> Result<()> {
        let scope = self.scopes.pop().expect("scope stack underflow");

        let mut offender: Option<(&String, &ScopeEntry)> = None;

        for (name, entry) in &scope {
            if entry.used {
                continue;
            }

            let earlier = match offender {
                Some((_, best)) => (entry.line, entry.column) < (best.line, best.column),
                None => true,
            };

            if earlier {
                offender = Some((name, entry));
            }
        }

        if let Some((name, entry)) = offender {
            return Err(LoxError::syntax(
                ErrorCode::UnusedVariable,
                entry.line,
                entry.column,
                format!("Variable '{}' is declared but never used", name),
            ));
        }

        Ok(())
    }

    fn declare(&mut self, name: &Token) -> Result<()> {
        match self.scopes.last_mut() {
            Some(scope) => {
                if scope.contains_key(&name.lexeme) {
                    return Err(LoxError::syntax(
                        ErrorCode::VariableAlreadyDeclared,
                        name.line,
                        name.column,
                        format!("Variable '{}' is already declared in this scope", name.lexeme),
                    ));
                }

                scope.insert(
                    name.lexeme.clone(),
                    ScopeEntry {
                        defined: false,
                        used: false,
                        line: name.line,
                        column: name.column,
                    },
                );
            }

            None => {
                self.globals.insert(name.lexeme.clone(), false);
            }
        }

        Ok(())
    }

    fn define(&mut self, name: &Token) {
        match self.scopes.last_mut() {
            Some(scope) => {
                if let Some(entry) = scope.get_mut(&name.lexeme) {
                    entry.defined = true;
                }
            }

            None => {
                self.globals.insert(name.lexeme.clone(), true);
            }
        }
    }

    /// Record this occurrence as a local at its lexical depth, or leave it
    /// for the global chain when no scope binds the name.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(entry) = scope.get_mut(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                entry.used = true;
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }

    fn context_error<S: Into<String>>(&self, code: ErrorCode, at: &Token, msg: S) -> LoxError {
        LoxError::syntax(code, at.line, at.column, msg)
    }
}
