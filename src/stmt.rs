use std::rc::Rc;

use crate::expr::Expr;
use crate::token::Token;

/// A function or method declaration.  Shared via `Rc` so function values
/// reference their declaration instead of cloning parameter lists and
/// bodies at definition time.
#[derive(Debug)]
pub struct FunctionDecl {
    /// `None` for an anonymous function.
    pub name: Option<Token>,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

impl FunctionDecl {
    pub fn is_named(&self, expected: &str) -> bool {
        self.name
            .as_ref()
            .map(|t| t.lexeme == expected)
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    Block(Vec<Stmt>),

    // Branches are braced blocks in this dialect.
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },

    For {
        initializer: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Vec<Stmt>,
    },

    Function(Rc<FunctionDecl>),

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Break {
        keyword: Token,
    },

    Continue {
        keyword: Token,
    },

    Class {
        name: Token,
        /// Always an `Expr::Variable` when present.
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}
