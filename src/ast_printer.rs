//! Canonical unparse of the AST back to Lox surface syntax.
//!
//! The printed text re-parses to an equivalent tree: groupings keep their
//! parentheses, blocks keep their braces, and number literals render through
//! the same formatter the runtime uses.  Printing then parsing then printing
//! again is a fixpoint, which the parser tests rely on.

use crate::expr::Expr;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

pub struct AstPrinter;

impl AstPrinter {
    pub fn print_program(&self, statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(|s| self.print_stmt(s))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn print_stmt(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("{};", self.print_expr(expr)),

            Stmt::Print(expr) => format!("print {};", self.print_expr(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("var {} = {};", name.lexeme, self.print_expr(init)),
                None => format!("var {};", name.lexeme),
            },

            Stmt::Block(statements) => self.print_block(statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut out = format!(
                    "if ({}) {}",
                    self.print_expr(condition),
                    self.print_block(then_branch)
                );

                if let Some(else_branch) = else_branch {
                    out.push_str(&format!(" else {}", self.print_block(else_branch)));
                }

                out
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                let init = match initializer {
                    Some(stmt) => self.print_stmt(stmt),
                    None => ";".to_string(),
                };

                let cond = condition
                    .as_ref()
                    .map(|c| format!(" {}", self.print_expr(c)))
                    .unwrap_or_default();

                let incr = increment
                    .as_ref()
                    .map(|i| format!(" {}", self.print_expr(i)))
                    .unwrap_or_default();

                format!("for ({}{};{}) {}", init, cond, incr, self.print_block(body))
            }

            Stmt::Function(decl) => format!("fun {}", self.print_function(decl)),

            Stmt::Return { value, .. } => match value {
                Some(expr) => format!("return {};", self.print_expr(expr)),
                None => "return;".to_string(),
            },

            Stmt::Break { .. } => "break;".to_string(),

            Stmt::Continue { .. } => "continue;".to_string(),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let heritage = match superclass {
                    Some(Expr::Variable { name: sup, .. }) => format!(" < {}", sup.lexeme),
                    _ => String::new(),
                };

                let body = methods
                    .iter()
                    .map(|m| self.print_function(m))
                    .collect::<Vec<_>>()
                    .join(" ");

                if body.is_empty() {
                    format!("class {}{} {{}}", name.lexeme, heritage)
                } else {
                    format!("class {}{} {{ {} }}", name.lexeme, heritage, body)
                }
            }
        }
    }

    pub fn print_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(token) => self.print_literal(token),

            Expr::Grouping(inner) => format!("({})", self.print_expr(inner)),

            Expr::Unary { op, right } => format!("{}{}", op.lexeme, self.print_expr(right)),

            Expr::Binary { left, op, right } | Expr::Logical { left, op, right } => format!(
                "{} {} {}",
                self.print_expr(left),
                op.lexeme,
                self.print_expr(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("{} = {}", name.lexeme, self.print_expr(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let args = arguments
                    .iter()
                    .map(|a| self.print_expr(a))
                    .collect::<Vec<_>>()
                    .join(", ");

                format!("{}({})", self.print_expr(callee), args)
            }

            Expr::Get { object, name } => {
                format!("{}.{}", self.print_expr(object), name.lexeme)
            }

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "{}.{} = {}",
                self.print_expr(object),
                name.lexeme,
                self.print_expr(value)
            ),

            Expr::This { .. } => "this".to_string(),
        }
    }

    fn print_block(&self, statements: &[Stmt]) -> String {
        if statements.is_empty() {
            return "{}".to_string();
        }

        let body = statements
            .iter()
            .map(|s| self.print_stmt(s))
            .collect::<Vec<_>>()
            .join(" ");

        format!("{{ {} }}", body)
    }

    fn print_function(&self, decl: &FunctionDecl) -> String {
        let params = decl
            .params
            .iter()
            .map(|p| p.lexeme.clone())
            .collect::<Vec<_>>()
            .join(", ");

        let body = self.print_block(&decl.body);

        match &decl.name {
            Some(name) => format!("{}({}) {}", name.lexeme, params, body),
            None => format!("({}) {}", params, body),
        }
    }

    fn print_literal(&self, token: &Token) -> String {
        match &token.token_type {
            TokenType::NUMBER(n) => {
                if n.fract() == 0.0 {
                    format!("{:.0}", n)
                } else {
                    n.to_string()
                }
            }

            TokenType::STRING(s) => format!("\"{}\"", s),

            TokenType::TRUE => "true".to_string(),

            TokenType::FALSE => "false".to_string(),

            TokenType::NIL => "nil".to_string(),

            other => unreachable!("invalid literal token: {:?}", other),
        }
    }
}
