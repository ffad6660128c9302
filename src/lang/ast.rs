use std::fmt;

use crate::lang::value::{Type, Value};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEquals,
    /// `and`
    LogicalAnd,
    /// `or`
    LogicalOr,
}

impl BinaryOperator {
    pub fn op_str(&self) -> &'static str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equals => "==",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEquals => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEquals => "<=",
            BinaryOperator::LogicalAnd => "and",
            BinaryOperator::LogicalOr => "or",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op_str())
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    /// `-`
    Minus,
    /// `not`
    Not,
}

impl UnaryOperator {
    pub fn op_str(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "not",
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op_str())
    }
}

/// One link of an `if`/`elseif`/`else` chain
///
/// A missing `condition` marks the terminal `else` link, which never has an `alternate`.
#[derive(Debug, PartialEq, Clone)]
pub struct If {
    pub condition: Option<Box<Expression>>,
    pub body: Vec<Expression>,
    pub alternate: Option<Box<If>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDeclaration {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    pub body: Vec<Expression>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(Value),
    Identifier(String),
    /// (name, initializer, annotation)
    VariableDeclaration(String, Box<Expression>, Option<Type>),
    /// (name, value)
    Assignment(String, Box<Expression>),
    Binary(Box<Expression>, BinaryOperator, Box<Expression>),
    Unary(UnaryOperator, Box<Expression>),
    /// (condition, true_branch, false_branch)
    Ternary(Box<Expression>, Box<Expression>, Box<Expression>),
    If(If),
    /// (condition, body)
    While(Box<Expression>, Vec<Expression>),
    Break,
    Next,
    FunctionDeclaration(FunctionDeclaration),
    Return(Box<Expression>),
    /// Produced in place of a statement that failed to parse
    Bad,
    /// Produced when the parser runs out of input
    Eof,
}

fn write_body(f: &mut fmt::Formatter<'_>, body: &[Expression]) -> fmt::Result {
    for (i, stmt) in body.iter().enumerate() {
        if i > 0 {
            write!(f, ";")?;
        }
        write!(f, " {}", stmt)?;
    }

    Ok(())
}

impl fmt::Display for If {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cond) = &self.condition {
            write!(f, "{} then", cond)?;
        } else {
            write!(f, "then")?;
        }
        write_body(f, &self.body)?;

        match &self.alternate {
            Some(alt) if alt.condition.is_some() => write!(f, " elseif {}", alt),
            Some(alt) => write!(f, " else {}", alt),
            None => write!(f, " endif"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write!(f, "{}", v),
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::VariableDeclaration(name, init, ty) => match ty {
                Some(ty) => write!(f, "{}: {} = {}", name, ty, init),
                None => write!(f, "{} = {}", name, init),
            },
            Expression::Assignment(name, value) => write!(f, "{} = {}", name, value),
            Expression::Binary(lhs, op, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
            Expression::Unary(UnaryOperator::Not, operand) => write!(f, "(not {})", operand),
            Expression::Unary(op, operand) => write!(f, "({}{})", op, operand),
            Expression::Ternary(cond, t, e) => write!(f, "({} then {} else {})", cond, t, e),
            Expression::If(i) => write!(f, "if {}", i),
            Expression::While(cond, body) => {
                write!(f, "while {}", cond)?;
                write_body(f, body)?;
                write!(f, " end")
            }
            Expression::Break => write!(f, "break"),
            Expression::Next => write!(f, "next"),
            Expression::FunctionDeclaration(func) => {
                let params: Vec<String> = func.parameters.iter().map(|p| p.to_string()).collect();
                write!(
                    f,
                    "def {}({}): {}",
                    func.name,
                    params.join(", "),
                    func.return_type
                )?;
                write_body(f, &func.body)?;
                write!(f, " end")
            }
            Expression::Return(value) => write!(f, "return {}", value),
            Expression::Bad => write!(f, "<bad>"),
            Expression::Eof => write!(f, "<eof>"),
        }
    }
}

/// Top-level statements in execution order
pub type Program = Vec<Expression>;

#[test]
fn test_display() {
    let int = |i| Box::new(Expression::Literal(Value::Integer(i)));
    let ident = |s: &str| Box::new(Expression::Identifier(s.to_string()));

    let data = vec![
        (
            Expression::VariableDeclaration(
                "x".to_string(),
                Box::new(Expression::Binary(int(1), BinaryOperator::Plus, int(2))),
                Some(Type::Integer),
            ),
            "x: integer = (1 + 2)",
        ),
        (
            Expression::Unary(
                UnaryOperator::Not,
                Box::new(Expression::Unary(UnaryOperator::Minus, ident("y"))),
            ),
            "(not (-y))",
        ),
        (
            Expression::Ternary(ident("c"), int(1), int(2)),
            "(c then 1 else 2)",
        ),
        (
            Expression::If(If {
                condition: Some(ident("a")),
                body: vec![Expression::Assignment("x".to_string(), int(1)), Expression::Break],
                alternate: Some(Box::new(If {
                    condition: Some(ident("b")),
                    body: vec![],
                    alternate: Some(Box::new(If {
                        condition: None,
                        body: vec![Expression::Next],
                        alternate: None,
                    })),
                })),
            }),
            "if a then x = 1; break elseif b then else then next endif",
        ),
        (
            Expression::FunctionDeclaration(FunctionDeclaration {
                name: "f".to_string(),
                parameters: vec![
                    Parameter {
                        name: "a".to_string(),
                        ty: Type::Integer,
                    },
                    Parameter {
                        name: "s".to_string(),
                        ty: Type::String,
                    },
                ],
                return_type: Type::Void,
                body: vec![Expression::Return(ident("a"))],
            }),
            "def f(a: integer, s: string): void return a end",
        ),
    ];

    for (expr, expected) in data {
        assert_eq!(expr.to_string(), expected);
    }
}
