use lox::ast_printer::AstPrinter;
use lox::error::{ErrorCode, LoxError};
use lox::parser::Parser;
use lox::scanner::Scanner;
use lox::stmt::Stmt;

fn parse(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
    let tokens = Scanner::new(source).scan_tokens().expect("scan failed");
    Parser::new(tokens).parse()
}

fn unparse(source: &str) -> String {
    let program = parse(source).expect("parse failed");
    AstPrinter.print_program(&program)
}

fn first_error_code(source: &str) -> ErrorCode {
    let errors = parse(source).expect_err("expected parse failure");
    errors[0].code().expect("error without code")
}

// The canonical unparse re-parses to an equivalent tree, so printing is a
// fixpoint after one round.
fn assert_round_trip(source: &str) {
    let printed = unparse(source);
    assert_eq!(unparse(&printed), printed, "round-trip for {:?}", source);
}

#[test]
fn round_trip_expressions() {
    assert_round_trip("print -2 * (3 + 4);");
    assert_round_trip("print 1 + 2 + 3 - 4 / 5;");
    assert_round_trip("print !(1 == 2) && (3 >= 4 || 5 < 6);");
    assert_round_trip("print \"a\" + \"b\";");
    assert_round_trip("x = y = 2.5;");
    assert_round_trip("print nil;");
}

#[test]
fn round_trip_statements() {
    assert_round_trip("var x = 1; { var y = x; print y; }");
    assert_round_trip("if (a > b) { print a; } else { print b; }");
    assert_round_trip("for (var i = 0; i < 5; i = i + 1) { print i; }");
    assert_round_trip("for (;;) { break; }");
    assert_round_trip("fun add(a, b) { return a + b; } print add(1, 2);");
    assert_round_trip("fun (x) { print x; }");
    assert_round_trip("fun outer() { for (var i = 0; i < 2; i = i + 1) { continue; } return; }");
}

#[test]
fn round_trip_classes() {
    assert_round_trip(
        "class Point { init(x, y) { this.x = x; this.y = y; } sum() { return this.x + this.y; } } \
         var p = Point(1, 2); print p.sum(); p.x = 3;",
    );
    assert_round_trip("class A {} class B < A {}");
}

#[test]
fn grouping_survives_printing() {
    // Without the parentheses the tree would re-associate.
    assert_eq!(unparse("print (1 + 2) * 3;"), "print (1 + 2) * 3;");
}

#[test]
fn invalid_assignment_target() {
    assert_eq!(first_error_code("1 = 2;"), ErrorCode::InvalidTarget);
    assert_eq!(first_error_code("a + b = c;"), ErrorCode::InvalidTarget);
}

#[test]
fn break_and_continue_require_a_loop() {
    assert_eq!(
        first_error_code("break;"),
        ErrorCode::BreakStatementOutsideLoop
    );
    assert_eq!(
        first_error_code("continue;"),
        ErrorCode::ContinueStatementOutsideLoop
    );
    assert_eq!(
        first_error_code("{ break; }"),
        ErrorCode::BreakStatementOutsideLoop
    );

    // A function body severs the loop context.
    assert_eq!(
        first_error_code("for (;;) { fun f() { break; } }"),
        ErrorCode::BreakStatementOutsideLoop
    );
}

#[test]
fn return_requires_a_function() {
    assert_eq!(
        first_error_code("return 1;"),
        ErrorCode::ReturnStatementOutsideFunction
    );
    assert_eq!(
        first_error_code("for (;;) { return; }"),
        ErrorCode::ReturnStatementOutsideFunction
    );
}

#[test]
fn branches_must_be_blocks() {
    assert_eq!(first_error_code("if (true) print 1;"), ErrorCode::UnexpectedToken);
    assert_eq!(first_error_code("for (;;) print 1;"), ErrorCode::UnexpectedToken);
}

#[test]
fn while_is_reserved_but_unsupported() {
    assert_eq!(
        first_error_code("while (true) { print 1; }"),
        ErrorCode::UnexpectedToken
    );
}

#[test]
fn unclosed_parenthesis() {
    assert_eq!(first_error_code("print (1 + 2;"), ErrorCode::UnclosedParenthesis);
}

#[test]
fn missing_identifiers() {
    assert_eq!(first_error_code("var 1 = 2;"), ErrorCode::ExpectedIdentifier);
    assert_eq!(first_error_code("class {}"), ErrorCode::ExpectedIdentifier);
    assert_eq!(first_error_code("a.;"), ErrorCode::ExpectedIdentifier);
}

#[test]
fn argument_and_parameter_limits() {
    let args = (0..256).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let call = format!("f({});", args);
    let errors = parse(&call).expect_err("expected failure");
    assert!(errors
        .iter()
        .any(|e| e.code() == Some(ErrorCode::ArgumentSizeExceeded)));

    let params = (0..256).map(|i| format!("p{}", i)).collect::<Vec<_>>().join(", ");
    let decl = format!("fun f({}) {{ print p0; }}", params);
    let errors = parse(&decl).expect_err("expected failure");
    assert!(errors
        .iter()
        .any(|e| e.code() == Some(ErrorCode::ArgumentSizeExceeded)));
}

#[test]
fn synchronize_collects_multiple_errors() {
    let errors = parse("var 1; print +; var ok = 3;").expect_err("expected failure");
    assert!(errors.len() >= 2, "got {} error(s)", errors.len());
}
