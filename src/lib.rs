pub mod ast_printer;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod stmt;
pub mod token;
pub mod value;

use std::io::Write;

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::scanner::Scanner;

/// Run a complete source text through the pipeline (scan, parse, resolve,
/// interpret) on the given interpreter.
///
/// `expr_id_seed` feeds the parser's expression-id counter and is advanced
/// past every id the parser handed out, even on failure.  The REPL passes
/// the same seed for every line so resolution-map keys stay unique while
/// closures from earlier lines remain callable; one-shot callers pass a
/// fresh `&mut 0`.
pub fn run<W: Write>(
    source: &str,
    interpreter: &mut Interpreter<W>,
    expr_id_seed: &mut u32,
) -> Result<(), Vec<LoxError>> {
    let tokens = Scanner::new(source)
        .scan_tokens()
        .map_err(|e| vec![e])?;

    let mut parser = Parser::starting_at(tokens, *expr_id_seed);
    let parsed = parser.parse();
    *expr_id_seed = parser.next_expr_id();
    let program = parsed?;

    let locals = resolver::resolve(&program).map_err(|e| vec![e])?;

    interpreter
        .interpret(&program, locals)
        .map_err(|e| vec![e])?;

    Ok(())
}
