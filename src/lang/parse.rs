//! This module implements the parser for quill's statement language.
//!
//! The parser is a hand written recursive descent parser over the token stream produced by the
//! lexer. Each statement form is dispatched on its leading token, and expressions are parsed with
//! a precedence ladder: every precedence level is its own function that parses its operands with
//! the next tighter level and then left folds, ie:
//!
//!     1 - 2 - 3 => ((1 - 2) - 3)
//!
//! Developer notes:
//!
//! * The parser stops at the first statement that does not match a production. Statements parsed
//!   before it are kept, and the error is recorded exactly once: every production propagates the
//!   first `ParseError` upwards with `?` instead of trying to resynchronize.
//!
//! * `if` and `elseif` conditions are parsed one level below the ternary so that the `then`
//!   closing the condition is not mistaken for a conditional expression.
//!
//! * Every recursive production goes through `nested()`, which bounds the recursion depth. Input
//!   nested past `MAX_DEPTH` is a parse error instead of a stack overflow, and the evaluator and
//!   `Display` impls can recurse over any AST the parser hands out.
//!
//! * There is no grouping with parentheses and there are no call expressions. Primary
//!   expressions are literals and identifiers only.

use log::debug;

use crate::lang::ast::*;
use crate::lang::error::ParseError;
use crate::lang::token::{Token, TokenKind};
use crate::lang::value::{Type, Value};

type ParseResult<T> = Result<T, ParseError>;
type Level = fn(&mut Parser) -> ParseResult<Expression>;

/// Deepest nesting of statements, expressions and unary operators the parser accepts
const MAX_DEPTH: usize = 256;

const EQUALITY_OPS: &[(TokenKind, BinaryOperator)] = &[
    (TokenKind::Equals, BinaryOperator::Equals),
    (TokenKind::NotEquals, BinaryOperator::NotEquals),
];

const COMPARISON_OPS: &[(TokenKind, BinaryOperator)] = &[
    (TokenKind::Greater, BinaryOperator::GreaterThan),
    (TokenKind::Less, BinaryOperator::LessThan),
    (TokenKind::GreaterEquals, BinaryOperator::GreaterThanEquals),
    (TokenKind::LessEquals, BinaryOperator::LessThanEquals),
];

const TERM_OPS: &[(TokenKind, BinaryOperator)] = &[
    (TokenKind::Plus, BinaryOperator::Plus),
    (TokenKind::Minus, BinaryOperator::Minus),
];

const FACTOR_OPS: &[(TokenKind, BinaryOperator)] = &[
    (TokenKind::Star, BinaryOperator::Multiply),
    (TokenKind::Slash, BinaryOperator::Divide),
    (TokenKind::Percent, BinaryOperator::Modulo),
];

/// Result of parsing a whole token stream
#[derive(Debug, PartialEq)]
pub struct Ast {
    /// Every statement that parsed successfully, in source order
    pub body: Program,
    /// The first (and only) parse error, if any
    pub error: Option<ParseError>,
}

impl Ast {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    error: Option<ParseError>,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        // Guarantee the stream ends in `Eof` so `current()` always has something to return
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let line = tokens.last().map(|t| t.line).unwrap_or(1);
            tokens.push(Token::new(TokenKind::Eof, "", line));
        }

        Self {
            tokens,
            pos: 0,
            depth: 0,
            error: None,
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }

        token
    }

    fn advance_if(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: String) -> ParseError {
        ParseError {
            message,
            line: self.current().line,
        }
    }

    /// Consume a token of `kind` or fail with "expected `what`"
    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected {}", what)))
        }
    }

    /// Run `production` one nesting level deeper
    fn nested<T>(
        &mut self,
        production: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error_here("expression nested too deeply".to_string()));
        }

        self.depth += 1;
        let ret = production(self);
        self.depth -= 1;

        ret
    }

    fn type_name(&mut self, what: &str) -> ParseResult<Type> {
        let token = self.expect(TokenKind::Identifier, what)?;
        token.lexeme.parse::<Type>().map_err(|_| ParseError {
            message: format!("expected type name, found '{}'", token.lexeme),
            line: token.line,
        })
    }

    fn primary(&mut self) -> ParseResult<Expression> {
        let token = self.current().clone();
        let expr = match token.kind {
            TokenKind::Integer => {
                let i = token.lexeme.parse::<i64>().map_err(|_| ParseError {
                    message: format!("expected integer, found '{}'", token.lexeme),
                    line: token.line,
                })?;
                Expression::Literal(Value::Integer(i))
            }
            TokenKind::Str => Expression::Literal(Value::Text(token.lexeme)),
            TokenKind::Char => match token.lexeme.chars().next() {
                Some(c) => Expression::Literal(Value::Character(c)),
                None => return Err(self.error_here("expected character".to_string())),
            },
            TokenKind::Boolean => Expression::Literal(Value::Boolean(token.lexeme == "true")),
            TokenKind::Identifier => Expression::Identifier(token.lexeme),
            _ => return Err(self.error_here("expected expression".to_string())),
        };

        self.advance();
        Ok(expr)
    }

    /// NB: unary operators are right-to-left associative, so recurse instead of looping
    fn unary(&mut self) -> ParseResult<Expression> {
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Not => UnaryOperator::Not,
            _ => return self.primary(),
        };
        self.advance();

        let operand = self.nested(Parser::unary)?;
        Ok(Expression::Unary(op, Box::new(operand)))
    }

    /// Parse `next (op next)*` for any `op` in `ops`, folding left
    fn left_fold(
        &mut self,
        ops: &[(TokenKind, BinaryOperator)],
        next: Level,
    ) -> ParseResult<Expression> {
        let mut expr = next(self)?;

        loop {
            let kind = self.current().kind;
            let op = match ops.iter().find(|(k, _)| *k == kind) {
                Some((_, op)) => *op,
                None => break,
            };
            self.advance();

            let rhs = next(self)?;
            expr = Expression::Binary(Box::new(expr), op, Box::new(rhs));
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expression> {
        self.left_fold(FACTOR_OPS, Parser::unary)
    }

    fn term(&mut self) -> ParseResult<Expression> {
        self.left_fold(TERM_OPS, Parser::factor)
    }

    fn comparison(&mut self) -> ParseResult<Expression> {
        self.left_fold(COMPARISON_OPS, Parser::term)
    }

    fn equality(&mut self) -> ParseResult<Expression> {
        self.left_fold(EQUALITY_OPS, Parser::comparison)
    }

    fn logical_and(&mut self) -> ParseResult<Expression> {
        self.left_fold(
            &[(TokenKind::And, BinaryOperator::LogicalAnd)],
            Parser::equality,
        )
    }

    fn logical_or(&mut self) -> ParseResult<Expression> {
        self.left_fold(
            &[(TokenKind::Or, BinaryOperator::LogicalOr)],
            Parser::logical_and,
        )
    }

    /// `cond then expr else expr`, or just `cond`
    fn ternary(&mut self) -> ParseResult<Expression> {
        let cond = self.logical_or()?;
        if !self.advance_if(TokenKind::Then) {
            return Ok(cond);
        }

        let true_branch = self.expression()?;
        self.expect(TokenKind::Else, "'else' in conditional expression")?;
        let false_branch = self.expression()?;

        Ok(Expression::Ternary(
            Box::new(cond),
            Box::new(true_branch),
            Box::new(false_branch),
        ))
    }

    fn expression(&mut self) -> ParseResult<Expression> {
        self.nested(Parser::ternary)
    }

    /// Parse statements until one of `terminators` (or end of input) is the current token
    ///
    /// The terminator itself is left for the caller to consume.
    fn block(&mut self, terminators: &[TokenKind]) -> ParseResult<Vec<Expression>> {
        let mut body = Vec::new();
        while !terminators.contains(&self.current().kind) && !self.check(TokenKind::Eof) {
            body.push(self.nested(Parser::statement)?);
        }

        Ok(body)
    }

    fn variable_declaration(&mut self) -> ParseResult<Expression> {
        self.advance();
        let name = self
            .expect(TokenKind::Identifier, "identifier after 'let'")?
            .lexeme;

        let ty = if self.advance_if(TokenKind::Colon) {
            Some(self.type_name("type name after ':'")?)
        } else {
            None
        };

        self.expect(TokenKind::Assign, "'=' after variable name")?;
        let init = self.expression()?;
        self.expect(TokenKind::Semicolon, "';' after variable declaration")?;

        Ok(Expression::VariableDeclaration(name, Box::new(init), ty))
    }

    fn assignment(&mut self) -> ParseResult<Expression> {
        let name = self.advance().lexeme;
        self.expect(TokenKind::Assign, "'=' after variable name")?;
        let value = self.expression()?;
        self.expect(TokenKind::Semicolon, "';' after assignment")?;

        Ok(Expression::Assignment(name, Box::new(value)))
    }

    /// Everything after an `if` or `elseif` keyword, including the closing `endif`
    fn if_rest(&mut self) -> ParseResult<If> {
        let condition = self.logical_or()?;
        self.expect(TokenKind::Then, "'then' after if condition")?;
        let body = self.block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf])?;

        let alternate = match self.current().kind {
            TokenKind::ElseIf => {
                self.advance();
                Some(Box::new(self.nested(Parser::if_rest)?))
            }
            TokenKind::Else => {
                self.advance();
                self.expect(TokenKind::Then, "'then' after 'else'")?;
                let body = self.block(&[TokenKind::EndIf])?;
                self.expect(TokenKind::EndIf, "'endif'")?;

                Some(Box::new(If {
                    condition: None,
                    body,
                    alternate: None,
                }))
            }
            _ => {
                self.expect(TokenKind::EndIf, "'endif'")?;
                None
            }
        };

        Ok(If {
            condition: Some(Box::new(condition)),
            body,
            alternate,
        })
    }

    fn while_stmt(&mut self) -> ParseResult<Expression> {
        self.advance();
        let cond = self.expression()?;
        let body = self.block(&[TokenKind::End])?;
        self.expect(TokenKind::End, "'end' to close 'while'")?;

        Ok(Expression::While(Box::new(cond), body))
    }

    fn function_declaration(&mut self) -> ParseResult<Expression> {
        self.advance();
        let name = self
            .expect(TokenKind::Identifier, "function name after 'def'")?
            .lexeme;
        self.expect(TokenKind::LeftParen, "'(' after function name")?;

        let mut parameters = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let name = self.expect(TokenKind::Identifier, "parameter name")?.lexeme;
                self.expect(TokenKind::Colon, "':' after parameter name")?;
                let ty = self.type_name("parameter type")?;
                parameters.push(Parameter { name, ty });

                if !self.advance_if(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RightParen, "')' after parameters")?;
        self.expect(TokenKind::Colon, "':' before return type")?;
        let return_type = self.type_name("return type")?;
        let body = self.block(&[TokenKind::End])?;
        self.expect(TokenKind::End, "'end' to close function")?;

        Ok(Expression::FunctionDeclaration(FunctionDeclaration {
            name,
            parameters,
            return_type,
            body,
        }))
    }

    fn jump(&mut self, node: Expression) -> ParseResult<Expression> {
        let keyword = self.advance();
        self.expect(
            TokenKind::Semicolon,
            &format!("';' after '{}'", keyword.lexeme),
        )?;

        Ok(node)
    }

    fn return_stmt(&mut self) -> ParseResult<Expression> {
        self.advance();
        let value = self.expression()?;
        self.expect(TokenKind::Semicolon, "';' after return value")?;

        Ok(Expression::Return(Box::new(value)))
    }

    fn statement(&mut self) -> ParseResult<Expression> {
        match self.current().kind {
            TokenKind::Let => self.variable_declaration(),
            TokenKind::If => {
                self.advance();
                Ok(Expression::If(self.if_rest()?))
            }
            TokenKind::While => self.while_stmt(),
            TokenKind::Break => self.jump(Expression::Break),
            TokenKind::Next => self.jump(Expression::Next),
            TokenKind::Def => self.function_declaration(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Identifier if self.peek_kind(1) == TokenKind::Assign => self.assignment(),
            TokenKind::Eof => Ok(Expression::Eof),
            _ => {
                let expr = self.expression()?;
                self.expect(TokenKind::Semicolon, "';' after expression")?;
                Ok(expr)
            }
        }
    }

    /// Parse one top-level statement, turning a failure into a `Bad` node
    fn next_statement(&mut self) -> Expression {
        match self.statement() {
            Ok(stmt) => stmt,
            Err(e) => {
                debug!("parse failed at token {}: {}", self.pos, e);
                self.error = Some(e);
                Expression::Bad
            }
        }
    }
}

/// Parse a token stream into an AST
///
/// Parsing stops at the first malformed statement. Everything before it is kept in `Ast::body`.
pub fn parse_ast(tokens: Vec<Token>) -> Ast {
    let mut parser = Parser::new(tokens);
    let mut body = Vec::new();

    loop {
        match parser.next_statement() {
            Expression::Eof | Expression::Bad => break,
            stmt => body.push(stmt),
        }
    }

    debug!("parsed {} top-level statements", body.len());

    Ast {
        body,
        error: parser.error,
    }
}

#[cfg(test)]
fn parse(source: &str) -> Ast {
    use crate::lang::lexer::tokenize;
    parse_ast(tokenize(source).unwrap())
}

#[cfg(test)]
fn parse_one(source: &str) -> String {
    let ast = parse(source);
    assert!(!ast.has_error(), "{:?}", ast.error);
    assert_eq!(ast.body.len(), 1);
    ast.body[0].to_string()
}

#[test]
fn test_arith_expr() {
    let data = vec![
        ("1 + 2;", "(1 + 2)"),
        ("2 - 3 - 4;", "((2 - 3) - 4)"),
        ("2 + 4 - 4 * 32 + 1 * 2;", "(((2 + 4) - (4 * 32)) + (1 * 2))"),
        ("8 / 2 % 3 * x;", "(((8 / 2) % 3) * x)"),
        ("-a * - - 3;", "((-a) * (-(-3)))"),
    ];

    for (input, expected) in data {
        assert_eq!(parse_one(input), expected, "input: {}", input);
    }
}

#[test]
fn test_logic_expr() {
    let data = vec![
        (
            "let x = 2 > 4 + 1 or 2 == 4 and 2 != 2;",
            "x = ((2 > (4 + 1)) or ((2 == 4) and (2 != 2)))",
        ),
        ("a < b == c >= d;", "((a < b) == (c >= d))"),
        ("not a and not b or c;", "(((not a) and (not b)) or c)"),
        ("1 <= 2 <= 3;", "((1 <= 2) <= 3)"),
    ];

    for (input, expected) in data {
        assert_eq!(parse_one(input), expected, "input: {}", input);
    }
}

#[test]
fn test_ternary_expr() {
    let data = vec![
        ("let y = a > 1 then 2 else 3;", "y = ((a > 1) then 2 else 3)"),
        (
            "let y = a then b else c then d else e;",
            "y = (a then b else (c then d else e))",
        ),
        ("x = a or b then \"s\" else 'c';", "x = ((a or b) then \"s\" else 'c')"),
    ];

    for (input, expected) in data {
        assert_eq!(parse_one(input), expected, "input: {}", input);
    }
}

#[test]
fn test_block_stmt() {
    let data = vec![
        (
            "if x > 1 then let y = 1; endif",
            "if (x > 1) then y = 1 endif",
        ),
        (
            "if a then x = 1; elseif b then x = 2; elseif c then else then x = 3; x = 4; endif",
            "if a then x = 1 elseif b then x = 2 elseif c then else then x = 3; x = 4 endif",
        ),
        (
            "while i < 3 i = i + 1; next; break; end",
            "while (i < 3) i = (i + 1); next; break end",
        ),
        (
            "def add(a: int, b: integer): int return a + b; end",
            "def add(a: integer, b: integer): integer return (a + b) end",
        ),
        ("def nothing(): void end", "def nothing(): void end"),
        (
            "while true if x then break; endif end",
            "while true if x then break endif end",
        ),
    ];

    for (input, expected) in data {
        assert_eq!(parse_one(input), expected, "input: {}", input);
    }
}

#[test]
fn test_if_chain_shape() {
    let ast = parse("if a then elseif b then else then x = 1; endif");
    assert!(!ast.has_error());

    let first = match &ast.body[0] {
        Expression::If(i) => i,
        e => panic!("expected if, got {}", e),
    };
    let second = first.alternate.as_ref().unwrap();
    let last = second.alternate.as_ref().unwrap();

    assert_eq!(
        second.condition,
        Some(Box::new(Expression::Identifier("b".to_string())))
    );
    assert_eq!(last.condition, None);
    assert_eq!(last.alternate, None);
    assert_eq!(
        last.body,
        vec![Expression::Assignment(
            "x".to_string(),
            Box::new(Expression::Literal(Value::Integer(1)))
        )]
    );
}

#[test]
fn test_declaration_annotation() {
    let ast = parse("let s: string = \"hi\";");
    assert_eq!(
        ast.body,
        vec![Expression::VariableDeclaration(
            "s".to_string(),
            Box::new(Expression::Literal(Value::Text("hi".to_string()))),
            Some(Type::String),
        )]
    );
}

#[test]
fn test_parse_errors() {
    let data = vec![
        ("let", "expected identifier after 'let' on line 1"),
        ("let x 5;", "expected '=' after variable name on line 1"),
        ("let x = 5", "expected ';' after variable declaration on line 1"),
        ("let x: float = 1;", "expected type name, found 'float' on line 1"),
        ("let x: = 1;", "expected type name after ':' on line 1"),
        ("x = ;", "expected expression on line 1"),
        ("1 + 2 3;", "expected ';' after expression on line 1"),
        ("break", "expected ';' after 'break' on line 1"),
        ("if x then\n let y = 1;\n", "expected 'endif' on line 3"),
        ("if x y = 1; endif", "expected 'then' after if condition on line 1"),
        ("if x then y = 1; else y = 2; endif", "expected 'then' after 'else' on line 1"),
        ("while true\n x = 1;", "expected 'end' to close 'while' on line 2"),
        ("def f(a int): int end", "expected ':' after parameter name on line 1"),
        ("def f(a: int) end", "expected ':' before return type on line 1"),
        ("def (a: int): int end", "expected function name after 'def' on line 1"),
        ("let x = a then 1;", "expected 'else' in conditional expression on line 1"),
        ("return;", "expected expression on line 1"),
    ];

    for (input, expected) in data {
        let ast = parse(input);
        assert!(ast.has_error(), "input: {}", input);
        assert_eq!(ast.error.unwrap().to_string(), expected, "input: {}", input);
    }
}

#[test]
fn test_statements_before_error_are_kept() {
    let ast = parse("let a = 1;\nlet b = 2;\nlet c 3;\nlet d = 4;");

    assert_eq!(ast.body.len(), 2);
    assert_eq!(ast.body[1].to_string(), "b = 2");
    assert_eq!(ast.error.unwrap().line, 3);
}

#[test]
fn test_program() {
    let ast = parse(
        r#"
        # comments are ignored
        let x = 1;
        x = x + 1;
        if x == 2 then
            let y: char = 'y';
        endif
        x;
        "#,
    );

    assert!(!ast.has_error());
    assert_eq!(ast.body.len(), 4);

    let empty = parse("   \n  # nothing here\n");
    assert!(!empty.has_error());
    assert!(empty.body.is_empty());
}

#[test]
fn test_nesting_limit() {
    let ast = parse(&format!("{}1;", "- ".repeat(3000)));
    assert_eq!(
        ast.error.unwrap().to_string(),
        "expression nested too deeply on line 1"
    );

    let ast = parse(&format!("{}true;", "not ".repeat(200)));
    assert!(!ast.has_error(), "{:?}", ast.error);

    let ast = parse(&format!("{}{}", "if a then ".repeat(300), "endif ".repeat(300)));
    assert_eq!(
        ast.error.unwrap().to_string(),
        "expression nested too deeply on line 1"
    );

    let ast = parse(&format!("let x = {}0;", "a then 1 else ".repeat(300)));
    assert!(ast.has_error());
    assert!(ast.body.is_empty());

    let chain: String = (0..300).map(|i| format!("elseif c{} then ", i)).collect();
    let ast = parse(&format!("if a then {}endif", chain));
    assert!(ast.has_error());
}

#[test]
fn test_missing_eof_is_tolerated() {
    let tokens = vec![
        Token::new(TokenKind::Identifier, "x", 1),
        Token::new(TokenKind::Semicolon, ";", 1),
    ];
    let ast = parse_ast(tokens);

    assert!(!ast.has_error());
    assert_eq!(ast.body, vec![Expression::Identifier("x".to_string())]);

    let ast = parse_ast(Vec::new());
    assert!(!ast.has_error());
    assert!(ast.body.is_empty());
}
