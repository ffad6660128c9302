use std::fmt;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum TokenKind {
    // Keywords
    Let,
    If,
    ElseIf,
    Else,
    EndIf,
    While,
    End,
    Break,
    Next,
    Def,
    Return,
    Then,

    // Literals
    Integer,
    Str,
    Char,
    Boolean,

    Identifier,

    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=`
    Assign,
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
    /// `>`
    Greater,
    /// `>=`
    GreaterEquals,
    /// `<`
    Less,
    /// `<=`
    LessEquals,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,

    LeftParen,
    RightParen,
    Colon,
    Comma,
    Semicolon,

    Eof,
    /// Emitted as the last token when lexing fails
    Bad,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Let => "Let",
            TokenKind::If => "If",
            TokenKind::ElseIf => "ElseIf",
            TokenKind::Else => "Else",
            TokenKind::EndIf => "EndIf",
            TokenKind::While => "While",
            TokenKind::End => "End",
            TokenKind::Break => "Break",
            TokenKind::Next => "Next",
            TokenKind::Def => "Def",
            TokenKind::Return => "Return",
            TokenKind::Then => "Then",
            TokenKind::Integer => "Integer",
            TokenKind::Str => "String",
            TokenKind::Char => "Char",
            TokenKind::Boolean => "Boolean",
            TokenKind::Identifier => "Identifier",
            TokenKind::Plus => "Plus",
            TokenKind::Minus => "Minus",
            TokenKind::Star => "Star",
            TokenKind::Slash => "Slash",
            TokenKind::Percent => "Percent",
            TokenKind::Assign => "Assign",
            TokenKind::Equals => "Equals",
            TokenKind::NotEquals => "NotEquals",
            TokenKind::Greater => "Greater",
            TokenKind::GreaterEquals => "GreaterEquals",
            TokenKind::Less => "Less",
            TokenKind::LessEquals => "LessEquals",
            TokenKind::And => "And",
            TokenKind::Or => "Or",
            TokenKind::Not => "Not",
            TokenKind::LeftParen => "LeftParen",
            TokenKind::RightParen => "RightParen",
            TokenKind::Colon => "Colon",
            TokenKind::Comma => "Comma",
            TokenKind::Semicolon => "Semicolon",
            TokenKind::Eof => "Eof",
            TokenKind::Bad => "Bad",
        };

        write!(f, "{}", name)
    }
}

/// A classified lexeme
///
/// For string and char literals, `lexeme` holds the decoded contents without the surrounding
/// quotes.
#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.lexeme)
    }
}

#[test]
fn test_token_dump_format() {
    let data = vec![
        (Token::new(TokenKind::Let, "let", 1), "Let: let"),
        (Token::new(TokenKind::Integer, "42", 3), "Integer: 42"),
        (Token::new(TokenKind::GreaterEquals, ">=", 1), "GreaterEquals: >="),
        (Token::new(TokenKind::Eof, "", 9), "Eof: "),
    ];

    for (token, expected) in data {
        assert_eq!(token.to_string(), expected);
    }
}
