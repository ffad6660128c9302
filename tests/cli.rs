use std::process::{Command, Output};

fn get_quill_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_quill"))
}

fn demo(name: &str) -> String {
    format!("{}/demos/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn run(args: &[&str]) -> (Output, String) {
    let output = get_quill_binary()
        .args(args)
        .output()
        .expect("Failed to execute quill");
    let stdout = String::from_utf8(output.stdout.clone()).expect("Output not utf-8");

    (output, stdout)
}

#[test]
fn test_run_program() {
    let (output, stdout) = run(&[&demo("countdown.ql")]);

    assert!(output.status.success());
    assert_eq!(stdout, "0\n0\nvoid\n18\n\"small\"\nfinished\n");
}

#[test]
fn test_errors_do_not_stop_evaluation() {
    let (output, stdout) = run(&[&demo("mistakes.ql")]);

    assert!(output.status.success());
    assert_eq!(
        stdout,
        "\"quill\"\n\
         error: type mismatch: cannot apply operator '+' to string and integer\n\
         false\n\
         error: undefined variable 'missing'\n\
         error: 'name' is already declared in this scope\n\
         \"quill\"\n\
         finished\n"
    );
}

#[test]
fn test_parse_error_exits() {
    let (output, stdout) = run(&[&demo("parse_error.ql")]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout,
        "parsing error: expected identifier after 'let' on line 2\n"
    );
}

#[test]
fn test_lex_error_exits() {
    let (output, stdout) = run(&[&demo("lex_error.ql")]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout, "unterminated string literal on line 1\n");
}

#[test]
fn test_missing_file() {
    let (output, stdout) = run(&[&demo("does_not_exist.ql")]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).expect("Output not utf-8");
    assert!(stderr.starts_with("error: cannot read '"), "stderr: {}", stderr);
    assert!(stderr.contains("does_not_exist.ql"));
}

#[test]
fn test_missing_argument() {
    let (output, _) = run(&[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_debug_dump() {
    let (output, stdout) = run(&["--debug", &demo("parse_error.ql")]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout,
        "Let: let\nIdentifier: ok\nAssign: =\nInteger: 1\nSemicolon: ;\n\
         Let: let\nAssign: =\nInteger: 2\nSemicolon: ;\nEof: \n\
         ast: ok = 1\n\
         parsing error: expected identifier after 'let' on line 2\n"
    );

    // Log records go to stderr, never between the dump lines
    let stderr = String::from_utf8(output.stderr).expect("Output not utf-8");
    assert!(stderr.contains("parsing failed"), "stderr: {}", stderr);
}

#[test]
fn test_string_results_are_escaped() {
    let (output, stdout) = run(&[&demo("strings.ql")]);

    assert!(output.status.success());
    assert_eq!(
        stdout,
        "\"line one\\nline \\\"two\\\"\"\n'\\t'\nfinished\n"
    );
}

#[test]
fn test_version_flag() {
    let (output, stdout) = run(&["--version"]);

    assert!(output.status.success());
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
