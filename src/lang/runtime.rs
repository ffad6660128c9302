use std::io::Write;

use anyhow::{bail, Result};
use log::info;

use crate::lang::eval::Eval;
use crate::lang::lexer::tokenize;
use crate::lang::parse::parse_ast;
use crate::lang::token::Token;

pub struct Runtime<'a> {
    sink: &'a mut dyn Write,
    debug: bool,
}

impl<'a> Runtime<'a> {
    /// Create a new `Runtime` instance
    ///
    /// `sink` is where output should be written. eg. per-statement results and diagnostics
    ///
    /// `debug` sets whether the token stream and the AST are dumped before evaluation
    pub fn new(sink: &'a mut dyn Write, debug: bool) -> Self {
        Self { sink, debug }
    }

    fn dump_tokens(&mut self, tokens: &[Token]) -> Result<()> {
        if self.debug {
            for token in tokens {
                writeln!(self.sink, "{}", token)?;
            }
        }

        Ok(())
    }

    /// Lex, parse and evaluate `source`
    ///
    /// Lex and parse failures are written to the sink and returned as an error; nothing is
    /// evaluated in that case. Evaluation errors are per statement and never fail the run.
    pub fn run(&mut self, source: &str) -> Result<()> {
        info!("lexing {} bytes", source.len());
        let tokens = match tokenize(source) {
            Ok(t) => t,
            Err(e) => {
                self.dump_tokens(&e.partial)?;
                writeln!(self.sink, "{}", e)?;
                bail!("lexing failed: {}", e);
            }
        };
        self.dump_tokens(&tokens)?;

        info!("parsing {} tokens", tokens.len());
        let ast = parse_ast(tokens);
        info!(
            "parsed {} statements (failed: {})",
            ast.body.len(),
            ast.has_error()
        );
        if self.debug {
            for stmt in &ast.body {
                writeln!(self.sink, "ast: {}", stmt)?;
            }
        }

        if let Some(e) = &ast.error {
            writeln!(self.sink, "parsing error: {}", e)?;
            bail!("parsing failed: {}", e);
        }

        Eval::new(self.sink).analyze(&ast.body)
    }
}

#[cfg(test)]
fn run(source: &str, debug: bool) -> (bool, String) {
    let mut output = Vec::new();
    let ok = Runtime::new(&mut output, debug).run(source).is_ok();

    (ok, String::from_utf8(output).expect("Output not utf-8"))
}

#[test]
fn test_run() {
    let data = vec![
        ("let x = 3; x * 2;", true, "3\n6\n"),
        ("", true, ""),
        (
            "let a = 1;\nlet = 2;",
            false,
            "parsing error: expected identifier after 'let' on line 2\n",
        ),
        (
            "let s = \"abc",
            false,
            "unterminated string literal on line 1\n",
        ),
        (
            "x; let y = 2; y;",
            true,
            "error: undefined variable 'x'\n2\n2\n",
        ),
    ];

    for (input, ok, expected) in data {
        assert_eq!(run(input, false), (ok, expected.to_string()), "input: {}", input);
    }
}

#[test]
fn test_debug_dump() {
    let (ok, output) = run("let x = 1 + 2;", true);
    assert!(ok);
    assert_eq!(
        output,
        "Let: let\nIdentifier: x\nAssign: =\nInteger: 1\nPlus: +\nInteger: 2\nSemicolon: ;\nEof: \n\
         ast: x = (1 + 2)\n3\n"
    );

    let (ok, output) = run("let s = \"abc", true);
    assert!(!ok);
    assert_eq!(
        output,
        "Let: let\nIdentifier: s\nAssign: =\nBad: \"abc\nunterminated string literal on line 1\n"
    );
}
