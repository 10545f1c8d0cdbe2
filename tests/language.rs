use pretty_assertions::assert_eq;
use treelox::{error::Error, run, Session};

fn output(source: &str) -> String {
    let (diagnostics, output) = run(source);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
    output
}

fn failure(source: &str) -> (Vec<String>, String) {
    let (diagnostics, output) = run(source);
    assert!(!diagnostics.is_empty(), "expected a diagnostic");
    (diagnostics.iter().map(ToString::to_string).collect(), output)
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(output("print 1 + 2 * 3;"), "7\n");
    assert_eq!(output("print (1 + 2) * 3;"), "9\n");
    assert_eq!(output("print 10 - 4 - 3;"), "3\n");
}

#[test]
fn equality_does_not_coerce() {
    assert_eq!(
        output("print \"a\" == \"a\"; print \"a\" == 1; print nil == nil; print 1 != 2;"),
        "true\nfalse\ntrue\ntrue\n"
    );
    assert_eq!(output("print 0 == false; print \"\" == nil;"), "false\nfalse\n");
}

#[test]
fn block_shadowing_stays_inside_the_block() {
    assert_eq!(output("var x = 1; { var x = 2; print x; } print x;"), "2\n1\n");
}

#[test]
fn closures_share_their_defining_scope() {
    let source = "
        var counter;
        {
            var n = 0;
            fun inc() { n = n + 1; return n; }
            counter = inc;
        }
        print counter();
        print counter();
    ";
    assert_eq!(output(source), "1\n2\n");
}

#[test]
fn closures_capture_independent_scopes() {
    let source = "
        fun make() {
            var count = 0;
            fun next() { count = count + 1; return count; }
            return next;
        }
        var a = make();
        var b = make();
        print a();
        print a();
        print b();
    ";
    assert_eq!(output(source), "1\n2\n1\n");
}

#[test]
fn wrong_arity_stops_execution() {
    let source = "fun f(a, b) { print \"in\"; }\nprint \"before\";\nf(1);\nprint \"after\";";
    let (diagnostics, output) = failure(source);
    assert_eq!(
        diagnostics,
        vec!["[line 3] runtime error: Expected 2 arguments but got 1.".to_string()]
    );
    assert_eq!(output, "before\n");
}

#[test]
fn for_loop_variable_is_block_scoped() {
    assert_eq!(
        output("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );

    let (diagnostics, output) = failure("for (var i = 0; i < 3; i = i + 1) print i;\nprint i;");
    assert_eq!(
        diagnostics,
        vec!["[line 2] runtime error: Undefined variable 'i'.".to_string()]
    );
    assert_eq!(output, "0\n1\n2\n");
}

#[test]
fn division_by_zero_is_infinite_but_string_minus_is_an_error() {
    assert_eq!(output("print 1 / 0; print -1 / 0;"), "inf\n-inf\n");

    let (diagnostics, output) = failure("print \"a\" - 1;");
    assert_eq!(
        diagnostics,
        vec!["[line 1] runtime error: Operands of '-' must be numbers, got string and number."
            .to_string()]
    );
    assert_eq!(output, "");
}

#[test]
fn recursion_and_returns() {
    let source = "
        fun fib(n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        print fib(15);

        fun early() {
            while (true) { return \"done\"; }
        }
        print early();

        fun nothing() {}
        print nothing();
    ";
    assert_eq!(output(source), "610\ndone\nnil\n");
}

#[test]
fn strings_concatenate_and_print_raw() {
    assert_eq!(
        output("var greeting = \"hello\"; print greeting + \", \" + \"world\";"),
        "hello, world\n"
    );
}

#[test]
fn truthiness_and_short_circuit() {
    let source = "
        if (0) print \"zero is truthy\";
        if (\"\") print \"empty is truthy\";
        if (nil) print \"unreachable\"; else print \"nil is falsy\";
        var calls = 0;
        fun touch() { calls = calls + 1; return true; }
        false and touch();
        true or touch();
        print calls;
    ";
    assert_eq!(
        output(source),
        "zero is truthy\nempty is truthy\nnil is falsy\n0\n"
    );
}

#[test]
fn functions_print_by_name() {
    assert_eq!(
        output("fun greet() {} print greet; print clock;"),
        "<fn greet>\n<native fn clock>\n"
    );
}

#[test]
fn lexical_and_syntax_errors_are_all_reported_and_nothing_runs() {
    let (diagnostics, output) = failure("print 1;\nvar a = @;\nprint \"open;");
    assert_eq!(
        diagnostics,
        vec![
            "[line 2] lexical error: Unexpected character '@'.".to_string(),
            "[line 3] lexical error: Unterminated string.".to_string(),
            "[line 2] parse error at ';': Expect expression.".to_string(),
        ]
    );
    assert_eq!(output, "");
}

#[test]
fn parse_errors_name_the_offending_token() {
    let (diagnostics, _) = failure("print 1");
    assert_eq!(
        diagnostics,
        vec!["[line 1] parse error at end: Expect ';' after value.".to_string()]
    );

    let (diagnostics, _) = failure("var 1 = 2;");
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].starts_with("[line 1] parse error at '1':"));

    let (diagnostics, _) = failure("1 + 2 = 3;");
    assert!(diagnostics[0].ends_with("Invalid assignment target."));
}

#[test]
fn undefined_assignment_is_an_error() {
    let (diagnostics, output) = failure("print 1;\nmissing = 2;");
    assert_eq!(
        diagnostics,
        vec!["[line 2] runtime error: Undefined variable 'missing'.".to_string()]
    );
    assert_eq!(output, "1\n");
}

#[test]
fn session_recovers_after_a_runtime_error() {
    let mut session = Session::new(Vec::new());
    assert!(session.run("var total = 1;").is_empty());

    let diagnostics = session.run("total = total + nil;");
    assert!(matches!(diagnostics.as_slice(), [Error::Runtime { line: 1, .. }]));

    assert!(session.run("print total;").is_empty());
    assert_eq!(session.into_output(), b"1\n");
}
