//! Recursive-descent parser.
//!
//! `parse` walks the token stream one declaration at a time, recording every
//! recoverable syntax error and resynchronizing at the next declaration
//! keyword.  If any error was recorded the statement list is discarded and
//! the full error list is returned instead.
//!
//! `break`, `continue`, and `return` are context-checked here: the parser
//! threads loop and function depths down the recursion and rejects the
//! keywords when the matching target is absent.  The resolver re-verifies
//! the same invariant as a backstop.

use std::mem;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{ErrorCode, LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

const MAX_ARGUMENTS: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<LoxError>,
    loop_depth: usize,
    function_depth: usize,
    next_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::starting_at(tokens, 0)
    }

    /// Like `new`, but expression ids start at `first_id`.  The REPL threads
    /// the next unissued id from line to line so resolution-map keys never
    /// collide while closures from earlier lines remain callable.
    pub fn starting_at(tokens: Vec<Token>, first_id: u32) -> Self {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
            loop_depth: 0,
            function_depth: 0,
            next_id: first_id,
        }
    }

    /// The first id this parser has not handed out.
    pub fn next_expr_id(&self) -> u32 {
        self.next_id
    }

    pub fn parse(&mut self) -> std::result::Result<Vec<Stmt>, Vec<LoxError>> {
        info!("Parsing {} token(s)", self.tokens.len());

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            info!("Parsed {} statement(s)", statements.len());
            Ok(statements)
        } else {
            Err(mem::take(&mut self.errors))
        }
    }

    // ─── Declarations ────────────────────────────────────────────────────

    fn declaration(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::CLASS]) {
            return self.class_declaration();
        }

        if self.match_tokens(&[TokenType::FUN]) {
            return Ok(Stmt::Function(Rc::new(self.function_decl()?)));
        }

        if self.match_tokens(&[TokenType::VAR]) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume_identifier("Expected class name")?;

        let superclass = if self.match_tokens(&[TokenType::LESS]) {
            let super_name = self.consume_identifier("Expected superclass name")?;
            Some(Expr::Variable {
                id: self.fresh_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(
            TokenType::LEFT_BRACE,
            ErrorCode::UnexpectedToken,
            "Expected '{' before class body",
        )?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            let method = self.function_decl()?;

            if method.name.is_none() {
                let at = self.previous().clone();
                return Err(LoxError::syntax(
                    ErrorCode::ExpectedIdentifier,
                    at.line,
                    at.column,
                    "Expected method name",
                ));
            }

            methods.push(Rc::new(method));
        }

        self.consume(
            TokenType::RIGHT_BRACE,
            ErrorCode::UnexpectedToken,
            "Expected '}' after class body",
        )?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
        })
    }

    // Parses `IDENT? "(" parameters? ")" block`.  The leading `fun` (for
    // function declarations) is consumed by the caller; methods have none.
    fn function_decl(&mut self) -> Result<FunctionDecl> {
        let name = if self.check(&TokenType::IDENTIFIER) {
            Some(self.advance().clone())
        } else {
            None
        };

        self.consume(
            TokenType::LEFT_PAREN,
            ErrorCode::UnexpectedToken,
            "Expected '(' before parameters",
        )?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    // Recorded but not fatal; parsing continues.
                    let at = self.peek().clone();
                    self.errors.push(LoxError::syntax(
                        ErrorCode::ArgumentSizeExceeded,
                        at.line,
                        at.column,
                        format!("Cannot have more than {} parameters", MAX_ARGUMENTS),
                    ));
                }

                params.push(self.consume_identifier("Expected parameter name")?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(
            TokenType::RIGHT_PAREN,
            ErrorCode::UnclosedParenthesis,
            "Expected ')' after parameters",
        )?;

        self.consume(
            TokenType::LEFT_BRACE,
            ErrorCode::UnexpectedToken,
            "Expected '{' before function body",
        )?;

        // A function body resets loop context: `break` may not cross a
        // function boundary even when the declaration sits inside a loop.
        let enclosing_loops = mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;

        let body = self.block_items();

        self.function_depth -= 1;
        self.loop_depth = enclosing_loops;

        Ok(FunctionDecl {
            name,
            params,
            body: body?,
        })
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume_identifier("Expected variable name")?;

        let initializer = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            ErrorCode::UnexpectedToken,
            "Expected ';' after variable declaration",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ─── Statements ──────────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block_items()?));
        }

        if self.match_tokens(&[TokenType::BREAK]) {
            let keyword = self.previous().clone();

            if self.loop_depth == 0 {
                return Err(LoxError::syntax(
                    ErrorCode::BreakStatementOutsideLoop,
                    keyword.line,
                    keyword.column,
                    "'break' used outside of a loop",
                ));
            }

            self.consume(
                TokenType::SEMICOLON,
                ErrorCode::UnexpectedToken,
                "Expected ';' after 'break'",
            )?;

            return Ok(Stmt::Break { keyword });
        }

        if self.match_tokens(&[TokenType::CONTINUE]) {
            let keyword = self.previous().clone();

            if self.loop_depth == 0 {
                return Err(LoxError::syntax(
                    ErrorCode::ContinueStatementOutsideLoop,
                    keyword.line,
                    keyword.column,
                    "'continue' used outside of a loop",
                ));
            }

            self.consume(
                TokenType::SEMICOLON,
                ErrorCode::UnexpectedToken,
                "Expected ';' after 'continue'",
            )?;

            return Ok(Stmt::Continue { keyword });
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        self.expression_statement()
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous().clone();

        if self.function_depth == 0 {
            return Err(LoxError::syntax(
                ErrorCode::ReturnStatementOutsideFunction,
                keyword.line,
                keyword.column,
                "'return' used outside of a function",
            ));
        }

        let value = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(
            TokenType::SEMICOLON,
            ErrorCode::UnexpectedToken,
            "Expected ';' after return value",
        )?;

        Ok(Stmt::Return { keyword, value })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(
            TokenType::LEFT_PAREN,
            ErrorCode::UnexpectedToken,
            "Expected '(' after 'for'",
        )?;

        let initializer = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(Box::new(self.var_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        let condition = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(
            TokenType::SEMICOLON,
            ErrorCode::UnexpectedToken,
            "Expected ';' after loop condition",
        )?;

        let increment = if self.check(&TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(
            TokenType::RIGHT_PAREN,
            ErrorCode::UnclosedParenthesis,
            "Expected ')' after for clauses",
        )?;

        self.consume(
            TokenType::LEFT_BRACE,
            ErrorCode::UnexpectedToken,
            "Expected '{' before loop body",
        )?;

        self.loop_depth += 1;
        let body = self.block_items();
        self.loop_depth -= 1;

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body: body?,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(
            TokenType::LEFT_PAREN,
            ErrorCode::UnexpectedToken,
            "Expected '(' after 'if'",
        )?;

        let condition = self.expression()?;

        self.consume(
            TokenType::RIGHT_PAREN,
            ErrorCode::UnclosedParenthesis,
            "Expected ')' after condition",
        )?;

        self.consume(
            TokenType::LEFT_BRACE,
            ErrorCode::UnexpectedToken,
            "Expected '{' before if body",
        )?;

        let then_branch = self.block_items()?;

        let else_branch = if self.match_tokens(&[TokenType::ELSE]) {
            self.consume(
                TokenType::LEFT_BRACE,
                ErrorCode::UnexpectedToken,
                "Expected '{' before else body",
            )?;

            Some(self.block_items()?)
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;

        self.consume(
            TokenType::SEMICOLON,
            ErrorCode::UnexpectedToken,
            "Expected ';' after value",
        )?;

        Ok(Stmt::Print(expr))
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;

        self.consume(
            TokenType::SEMICOLON,
            ErrorCode::UnexpectedToken,
            "Expected ';' after expression",
        )?;

        Ok(Stmt::Expression(expr))
    }

    // The opening '{' is already consumed.
    fn block_items(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(
            TokenType::RIGHT_BRACE,
            ErrorCode::UnexpectedToken,
            "Expected '}' after block",
        )?;

        Ok(statements)
    }

    // ─── Expressions ─────────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.logic_or()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: self.fresh_id(),
                    name,
                    value: Box::new(value),
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),

                _ => Err(LoxError::syntax(
                    ErrorCode::InvalidTarget,
                    equals.line,
                    equals.column,
                    "Invalid assignment target",
                )),
            };
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<Expr> {
        let mut expr = self.logic_and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let op = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let op = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let op = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let op = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name = self.consume_identifier("Expected property name after '.'")?;
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    let at = self.peek().clone();
                    self.errors.push(LoxError::syntax(
                        ErrorCode::ArgumentSizeExceeded,
                        at.line,
                        at.column,
                        format!("Cannot have more than {} arguments", MAX_ARGUMENTS),
                    ));
                }

                arguments.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren = self.consume(
            TokenType::RIGHT_PAREN,
            ErrorCode::UnclosedParenthesis,
            "Expected ')' after arguments",
        )?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[
            TokenType::NUMBER(0.0),
            TokenType::STRING(String::new()),
            TokenType::TRUE,
            TokenType::FALSE,
            TokenType::NIL,
        ]) {
            return Ok(Expr::Literal(self.previous().clone()));
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This {
                id: self.fresh_id(),
                keyword: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                id: self.fresh_id(),
                name: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr = self.expression()?;

            self.consume(
                TokenType::RIGHT_PAREN,
                ErrorCode::UnclosedParenthesis,
                "Expected ')' after expression",
            )?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        let at = self.peek().clone();
        Err(LoxError::syntax(
            ErrorCode::UnexpectedToken,
            at.line,
            at.column,
            format!("Expected expression, found '{}'", at.lexeme),
        ))
    }

    // ─── Token-stream helpers ────────────────────────────────────────────

    fn fresh_id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn consume(&mut self, token_type: TokenType, code: ErrorCode, msg: &str) -> Result<Token> {
        if self.check(&token_type) {
            return Ok(self.advance().clone());
        }

        let at = self.peek().clone();
        Err(LoxError::syntax(code, at.line, at.column, msg))
    }

    fn consume_identifier(&mut self, msg: &str) -> Result<Token> {
        self.consume(TokenType::IDENTIFIER, ErrorCode::ExpectedIdentifier, msg)
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    // Discard the offending token, then everything up to the next
    // statement boundary or declaration keyword (or EOF).
    fn synchronize(&mut self) {
        debug!("Synchronizing at token {}", self.current);

        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {
                    self.advance();
                }
            }
        }
    }
}
