use lox::error::{ErrorCode, LoxError};
use lox::interpreter::Interpreter;

fn run_program(source: &str) -> Result<String, Vec<LoxError>> {
    let mut sink: Vec<u8> = Vec::new();

    {
        let mut interpreter = Interpreter::with_output(&mut sink);
        lox::run(source, &mut interpreter, &mut 0)?;
    }

    Ok(String::from_utf8(sink).expect("output is not UTF-8"))
}

fn run_ok(source: &str) -> String {
    run_program(source).expect("program failed")
}

fn first_error(source: &str) -> LoxError {
    run_program(source)
        .expect_err("expected failure")
        .into_iter()
        .next()
        .expect("empty error list")
}

fn first_code(source: &str) -> ErrorCode {
    first_error(source).code().expect("error without code")
}

// ─── End-to-end scenarios ────────────────────────────────────────────────

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_ok("print -2 * (3 + 4);"), "-14\n");
}

#[test]
fn closures_capture_by_reference() {
    let source = r#"
        fun makeCounter() {
          var i = 0;
          fun tick() { i = i + 1; return i; }
          return tick;
        }
        var c = makeCounter();
        print c(); print c(); print c();
    "#;

    assert_eq!(run_ok(source), "1\n2\n3\n");
}

#[test]
fn lexical_scoping_beats_dynamic() {
    // The local `a` is read at the end: declaring it and never touching it
    // would be rejected by the unused-variable sweep.
    let source = r#"
        var a = "global";
        {
          fun show() { print a; }
          show();
          var a = "local";
          show();
          print a;
        }
    "#;

    assert_eq!(run_ok(source), "global\nglobal\nlocal\n");
}

#[test]
fn for_loop_with_break_and_continue() {
    let source = "for (var i = 0; i < 5; i = i + 1) { \
                    if (i == 2) { continue; } \
                    if (i == 4) { break; } \
                    print i; \
                  }";

    assert_eq!(run_ok(source), "0\n1\n3\n");
}

#[test]
fn division_by_zero() {
    let err = first_error("print 1 / 0;");
    assert_eq!(err.code(), Some(ErrorCode::DivisionByZero));
    assert_eq!(err.exit_code(), 70);

    // No output reaches the sink before the fault.
    assert!(run_program("print 1 / 0;").is_err());
}

#[test]
fn clock_is_monotonic_enough() {
    assert_eq!(run_ok("var a = clock(); var b = clock(); print b >= a;"), "true\n");
}

// ─── Determinism and flow containment ────────────────────────────────────

#[test]
fn independent_runs_are_identical() {
    let source = r#"
        fun fib(n) {
          if (n < 2) { return n; }
          return fib(n - 1) + fib(n - 2);
        }
        for (var i = 0; i < 10; i = i + 1) { print fib(i); }
    "#;

    assert_eq!(run_ok(source), run_ok(source));
    assert_eq!(run_ok(source), "0\n1\n1\n2\n3\n5\n8\n13\n21\n34\n");
}

#[test]
fn break_only_exits_the_inner_loop() {
    let source = "for (var i = 0; i < 2; i = i + 1) { \
                    for (var j = 0; j < 5; j = j + 1) { \
                      if (j == 1) { break; } \
                      print i + j; \
                    } \
                  }";

    assert_eq!(run_ok(source), "0\n1\n");
}

#[test]
fn return_unwinds_out_of_a_loop() {
    let source = r#"
        fun firstOver(limit) {
          for (var i = 0;; i = i + 1) {
            if (i > limit) { return i; }
          }
        }
        print firstOver(3);
    "#;

    assert_eq!(run_ok(source), "4\n");
}

// ─── Operator semantics ──────────────────────────────────────────────────

#[test]
fn plus_is_overloaded() {
    assert_eq!(run_ok("print 1 + 2;"), "3\n");
    assert_eq!(run_ok("print \"foo\" + \"bar\";"), "foobar\n");
    assert_eq!(first_code("print \"a\" + 1;"), ErrorCode::InvalidOperation);
}

#[test]
fn unary_minus_requires_a_number() {
    assert_eq!(first_code("print -\"abc\";"), ErrorCode::InvalidDataType);
}

#[test]
fn string_ordering_is_lexicographic() {
    assert_eq!(run_ok("print \"abc\" < \"abd\";"), "true\n");
    assert_eq!(run_ok("print \"b\" >= \"a\";"), "true\n");
    assert_eq!(first_code("print \"a\" < 1;"), ErrorCode::InvalidOperation);
}

#[test]
fn equality_is_strictly_typed() {
    assert_eq!(run_ok("print 1 == 2;"), "false\n");
    assert_eq!(run_ok("print \"a\" != \"b\";"), "true\n");
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(first_code("print 1 == \"1\";"), ErrorCode::InvalidOperation);
    assert_eq!(first_code("print nil == false;"), ErrorCode::InvalidOperation);
}

#[test]
fn logical_operators_yield_the_deciding_operand() {
    assert_eq!(run_ok("print nil || \"fallback\";"), "fallback\n");
    assert_eq!(run_ok("print 1 && 2;"), "2\n");
    assert_eq!(run_ok("print false && 1;"), "false\n");

    // The right side never evaluates when the left decides.
    assert_eq!(run_ok("print false && missing;"), "false\n");
}

#[test]
fn canonical_stringification() {
    assert_eq!(run_ok("print 14;"), "14\n");
    assert_eq!(run_ok("print 2.5;"), "2.5\n");
    assert_eq!(run_ok("print true;"), "true\n");
    assert_eq!(run_ok("print nil;"), "nil\n");
    assert_eq!(run_ok("fun f() {} print f;"), "<fn f>\n");
    assert_eq!(run_ok("print clock;"), "<native fn>\n");
}

// ─── Functions and calls ─────────────────────────────────────────────────

#[test]
fn implicit_return_is_nil() {
    assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
}

#[test]
fn arguments_evaluate_in_source_order() {
    let source = r#"
        var trace = "";
        fun log(tag) { trace = trace + tag; return tag; }
        fun pair(a, b) { return a + b; }
        pair(log("x"), log("y"));
        print trace;
    "#;

    assert_eq!(run_ok(source), "xy\n");
}

#[test]
fn arity_is_checked() {
    assert_eq!(
        first_code("fun f(a) { return a; } f();"),
        ErrorCode::WrongNumberOfArguments
    );
    assert_eq!(
        first_code("fun f(a) { return a; } f(1, 2);"),
        ErrorCode::WrongNumberOfArguments
    );
    assert_eq!(first_code("clock(1);"), ErrorCode::WrongNumberOfArguments);
}

#[test]
fn only_callables_can_be_called() {
    assert_eq!(first_code("\"abc\"();"), ErrorCode::ExpressionIsNotCallable);
    assert_eq!(first_code("var x = 1; x();"), ErrorCode::ExpressionIsNotCallable);
}

#[test]
fn undefined_variable_is_a_runtime_fault() {
    assert_eq!(first_code("print missing;"), ErrorCode::UndefinedVariable);
    assert_eq!(first_code("missing = 1;"), ErrorCode::UndefinedVariable);
}

#[test]
fn interpreter_state_persists_across_runs() {
    let mut sink: Vec<u8> = Vec::new();

    {
        let mut interpreter = Interpreter::with_output(&mut sink);
        let mut seed = 0;

        lox::run("fun inc(x) { return x + 1; }", &mut interpreter, &mut seed)
            .expect("definition failed");
        lox::run("print inc(41);", &mut interpreter, &mut seed).expect("call failed");
    }

    assert_eq!(String::from_utf8(sink).unwrap(), "42\n");
}

// ─── Classes ─────────────────────────────────────────────────────────────

#[test]
fn classes_instantiate_through_init() {
    let source = r#"
        class Point {
          init(x, y) { this.x = x; this.y = y; }
          sum() { return this.x + this.y; }
        }
        var p = Point(3, 4);
        print p.sum();
        print p;
        print Point;
    "#;

    assert_eq!(run_ok(source), "7\n<Point instance>\nPoint\n");
}

#[test]
fn constructor_arity_comes_from_init() {
    assert_eq!(
        first_code("class C { init(x) { this.x = x; } } C();"),
        ErrorCode::WrongNumberOfArguments
    );
    assert_eq!(
        first_code("class C {} C(1);"),
        ErrorCode::WrongNumberOfArguments
    );
}

#[test]
fn fields_shadow_methods() {
    let source = r#"
        class C { tag() { return "method"; } }
        var c = C();
        print c.tag();
        c.tag = "field";
        print c.tag;
    "#;

    assert_eq!(run_ok(source), "method\nfield\n");
}

#[test]
fn methods_bind_their_receiver() {
    let source = r#"
        class Counter {
          init() { this.count = 0; }
          bump() { this.count = this.count + 1; return this.count; }
        }
        var c = Counter();
        var bump = c.bump;
        print bump();
        print c.bump();
    "#;

    assert_eq!(run_ok(source), "1\n2\n");
}

#[test]
fn methods_resolve_through_the_superclass() {
    let source = r#"
        class Animal { speak() { return "..."; } }
        class Dog < Animal {}
        var d = Dog();
        print d.speak();
    "#;

    assert_eq!(run_ok(source), "...\n");
}

#[test]
fn superclass_must_be_a_class() {
    assert_eq!(
        first_code("var notAClass = 1; class B < notAClass {} B();"),
        ErrorCode::NotAClass
    );
}

#[test]
fn property_faults() {
    assert_eq!(
        first_code("class A {} var a = A(); print a.missing;"),
        ErrorCode::InvalidProperty
    );
    assert_eq!(first_code("print \"str\".length;"), ErrorCode::NotAnObject);
    assert_eq!(first_code("var x = 1; x.field = 2;"), ErrorCode::NotAnObject);
}

#[test]
fn init_always_yields_the_instance() {
    let source = r#"
        class C {
          init() { this.ready = true; return; }
        }
        print C().ready;
    "#;

    assert_eq!(run_ok(source), "true\n");
}

#[test]
fn instance_fields_mutate_in_place() {
    let source = r#"
        class Box {}
        var a = Box();
        var b = a;
        a.value = 1;
        b.value = b.value + 1;
        print a.value;
    "#;

    assert_eq!(run_ok(source), "2\n");
}
