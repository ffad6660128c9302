//! Hand written scanner turning source text into a flat token stream.
//!
//! The scanner is fail-fast: the first malformed lexeme ends the scan. Everything produced up to
//! that point is handed back inside the `LexError`, terminated by a `Bad` token, so callers can
//! still dump what was recognized.
//!
//! NB: two character operators must be tried before their one character prefixes, ie. `>=` is
//! matched before `>`, otherwise `>=` would lex as `>` followed by `=`.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::debug;

use crate::lang::error::LexError;
use crate::lang::token::{Token, TokenKind};

lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, TokenKind> = [
        ("let", TokenKind::Let),
        ("if", TokenKind::If),
        ("elseif", TokenKind::ElseIf),
        ("else", TokenKind::Else),
        ("endif", TokenKind::EndIf),
        ("while", TokenKind::While),
        ("end", TokenKind::End),
        ("break", TokenKind::Break),
        ("next", TokenKind::Next),
        ("def", TokenKind::Def),
        ("return", TokenKind::Return),
        ("then", TokenKind::Then),
        ("and", TokenKind::And),
        ("or", TokenKind::Or),
        ("not", TokenKind::Not),
        ("true", TokenKind::Boolean),
        ("false", TokenKind::Boolean),
    ]
    .iter()
    .cloned()
    .collect();
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Consume the next char only if it is `expected`
    fn advance_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn text_from(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>) {
        let line = self.line;
        self.tokens.push(Token::new(kind, lexeme, line));
    }

    /// Build the error for a malformed lexeme starting at char offset `start`
    fn fail(&mut self, start: usize, line: usize, message: impl Into<String>) -> LexError {
        let lexeme = self.text_from(start);
        self.tokens.push(Token::new(TokenKind::Bad, lexeme, line));

        LexError {
            message: message.into(),
            line,
            partial: std::mem::take(&mut self.tokens),
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn escape(&mut self, start: usize, line: usize, unterminated: &str) -> Result<char, LexError> {
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some(c) => Err(self.fail(start, line, format!("unknown escape sequence '\\{}'", c))),
            None => Err(self.fail(start, line, unterminated)),
        }
    }

    fn string(&mut self) -> Result<(), LexError> {
        let start = self.pos - 1;
        let line = self.line;
        let mut contents = String::new();

        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => {
                    let c = self.escape(start, line, "unterminated string literal")?;
                    contents.push(c);
                }
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    contents.push(c);
                }
                None => return Err(self.fail(start, line, "unterminated string literal")),
            }
        }

        // Report the line the literal started on
        self.tokens.push(Token::new(TokenKind::Str, contents, line));
        Ok(())
    }

    fn character(&mut self) -> Result<(), LexError> {
        let start = self.pos - 1;
        let line = self.line;

        let c = match self.advance() {
            Some('\'') => return Err(self.fail(start, line, "empty character literal")),
            Some('\\') => self.escape(start, line, "unterminated character literal")?,
            Some('\n') | None => {
                return Err(self.fail(start, line, "unterminated character literal"))
            }
            Some(c) => c,
        };

        if !self.advance_if('\'') {
            return Err(self.fail(start, line, "unterminated character literal"));
        }

        self.push(TokenKind::Char, c.to_string());
        Ok(())
    }

    fn integer(&mut self) -> Result<(), LexError> {
        let start = self.pos - 1;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }

        let digits = self.text_from(start);
        if digits.parse::<i64>().is_err() {
            let line = self.line;
            return Err(self.fail(start, line, "integer literal too large"));
        }

        self.push(TokenKind::Integer, digits);
        Ok(())
    }

    fn word(&mut self) {
        let start = self.pos - 1;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }

        let word = self.text_from(start);
        let kind = KEYWORDS
            .get(word.as_str())
            .copied()
            .unwrap_or(TokenKind::Identifier);

        self.push(kind, word);
    }

    /// Push `long` if the next char is `second`, `short` otherwise
    fn one_or_two(&mut self, first: char, second: char, long: TokenKind, short: TokenKind) {
        if self.advance_if(second) {
            self.push(long, format!("{}{}", first, second));
        } else {
            self.push(short, first.to_string());
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.advance() {
            match c {
                '\n' => self.line += 1,
                c if c.is_whitespace() => (),
                '#' => self.skip_comment(),
                '"' => self.string()?,
                '\'' => self.character()?,
                c if c.is_ascii_digit() => self.integer()?,
                c if c.is_alphabetic() || c == '_' => self.word(),
                '+' => self.push(TokenKind::Plus, "+"),
                '-' => self.push(TokenKind::Minus, "-"),
                '*' => self.push(TokenKind::Star, "*"),
                '/' => self.push(TokenKind::Slash, "/"),
                '%' => self.push(TokenKind::Percent, "%"),
                '(' => self.push(TokenKind::LeftParen, "("),
                ')' => self.push(TokenKind::RightParen, ")"),
                ':' => self.push(TokenKind::Colon, ":"),
                ',' => self.push(TokenKind::Comma, ","),
                ';' => self.push(TokenKind::Semicolon, ";"),
                '=' => self.one_or_two('=', '=', TokenKind::Equals, TokenKind::Assign),
                '>' => self.one_or_two('>', '=', TokenKind::GreaterEquals, TokenKind::Greater),
                '<' => self.one_or_two('<', '=', TokenKind::LessEquals, TokenKind::Less),
                '!' if self.advance_if('=') => self.push(TokenKind::NotEquals, "!="),
                c => {
                    let start = self.pos - 1;
                    let line = self.line;
                    return Err(self.fail(start, line, format!("unrecognized character '{}'", c)));
                }
            }
        }

        self.push(TokenKind::Eof, "");
        debug!("lexed {} tokens", self.tokens.len());

        Ok(self.tokens)
    }
}

/// Convert source text into an ordered token stream terminated by `Eof`
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_keywords_and_identifiers() {
    use TokenKind::*;

    let data = vec![
        ("let", vec![Let, Eof]),
        ("letter", vec![Identifier, Eof]),
        ("if elseif else endif", vec![If, ElseIf, Else, EndIf, Eof]),
        ("while end break next", vec![While, End, Break, Next, Eof]),
        ("def return then", vec![Def, Return, Then, Eof]),
        ("true false", vec![Boolean, Boolean, Eof]),
        ("a and b or not c", vec![Identifier, And, Identifier, Or, Not, Identifier, Eof]),
        ("_tmp x1 end_", vec![Identifier, Identifier, Identifier, Eof]),
    ];

    for (input, expected) in data {
        assert_eq!(kinds(input), expected, "input: {}", input);
    }
}

#[test]
fn test_operators_longest_match() {
    use TokenKind::*;

    let data = vec![
        (">=", vec![GreaterEquals, Eof]),
        ("> =", vec![Greater, Assign, Eof]),
        ("<=<", vec![LessEquals, Less, Eof]),
        ("===", vec![Equals, Assign, Eof]),
        ("!=", vec![NotEquals, Eof]),
        ("+-*/%", vec![Plus, Minus, Star, Slash, Percent, Eof]),
        (
            "(a: b, c);",
            vec![
                LeftParen, Identifier, Colon, Identifier, Comma, Identifier, RightParen, Semicolon,
                Eof,
            ],
        ),
    ];

    for (input, expected) in data {
        assert_eq!(kinds(input), expected, "input: {}", input);
    }
}

#[test]
fn test_literals() {
    let tokens = tokenize(r#"let s = "a\tb"; let c = 'x'; let n = 1234;"#).unwrap();

    let literals: Vec<(TokenKind, &str)> = tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Str | TokenKind::Char | TokenKind::Integer))
        .map(|t| (t.kind, t.lexeme.as_str()))
        .collect();

    assert_eq!(
        literals,
        vec![
            (TokenKind::Str, "a\tb"),
            (TokenKind::Char, "x"),
            (TokenKind::Integer, "1234"),
        ]
    );
}

#[test]
fn test_line_tracking() {
    let tokens =
        tokenize("let x = 1;\n\n# a comment with \"quotes\"\nx = \"two\nlines\";\ny").unwrap();
    let lines: Vec<(TokenKind, usize)> = tokens.iter().map(|t| (t.kind, t.line)).collect();

    assert_eq!(lines[0], (TokenKind::Let, 1));
    assert_eq!(lines[5], (TokenKind::Identifier, 4));
    // String literals report the line they start on
    assert_eq!(lines[7], (TokenKind::Str, 4));
    assert_eq!(lines[9], (TokenKind::Identifier, 6));
    assert_eq!(lines[10], (TokenKind::Eof, 6));
}

#[test]
fn test_unterminated_string() {
    let err = tokenize("\"abc").unwrap_err();

    assert_eq!(err.to_string(), "unterminated string literal on line 1");
    assert_eq!(err.partial, vec![Token::new(TokenKind::Bad, "\"abc", 1)]);
}

#[test]
fn test_lex_errors() {
    let data = vec![
        ("let c = '';", "empty character literal on line 1"),
        ("let c = 'ab';", "unterminated character literal on line 1"),
        ("let c = 'a", "unterminated character literal on line 1"),
        ("\n\nlet s = \"\\q\";", "unknown escape sequence '\\q' on line 3"),
        ("let x = 1;\nx = x $ 2;", "unrecognized character '$' on line 2"),
        ("!x", "unrecognized character '!' on line 1"),
        ("99999999999999999999", "integer literal too large on line 1"),
    ];

    for (input, expected) in data {
        let err = tokenize(input).unwrap_err();
        assert_eq!(err.to_string(), expected, "input: {}", input);
        assert_eq!(err.partial.last().map(|t| t.kind), Some(TokenKind::Bad));
    }
}

#[test]
fn test_partial_tokens_stop_at_error() {
    let err = tokenize("let x = 1; let y = @; let z = 3;").unwrap_err();
    let kinds: Vec<TokenKind> = err.partial.iter().map(|t| t.kind).collect();

    assert_eq!(
        kinds,
        vec![
            TokenKind::Let,
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::Integer,
            TokenKind::Semicolon,
            TokenKind::Let,
            TokenKind::Identifier,
            TokenKind::Assign,
            TokenKind::Bad,
        ]
    );
}
