use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error, Result};

/// Runtime type of a `Value`, also the vocabulary of type annotations
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Type {
    Integer,
    String,
    Char,
    Boolean,
    Void,
}

impl FromStr for Type {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "int" | "integer" => Type::Integer,
            "string" => Type::String,
            "char" => Type::Char,
            "bool" | "boolean" => Type::Boolean,
            "void" => Type::Void,
            _ => bail!("Unknown type: {}", s),
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => write!(f, "integer"),
            Type::String => write!(f, "string"),
            Type::Char => write!(f, "char"),
            Type::Boolean => write!(f, "boolean"),
            Type::Void => write!(f, "void"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Text(String),
    Character(char),
    Boolean(bool),
    Void,
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Integer(_) => Type::Integer,
            Value::Text(_) => Type::String,
            Value::Character(_) => Type::Char,
            Value::Boolean(_) => Type::Boolean,
            Value::Void => Type::Void,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Write `c` the way it would be spelled inside a literal delimited by `quote`
fn write_escaped(f: &mut fmt::Formatter<'_>, c: char, quote: char) -> fmt::Result {
    match c {
        '\n' => write!(f, "\\n"),
        '\t' => write!(f, "\\t"),
        '\r' => write!(f, "\\r"),
        '\0' => write!(f, "\\0"),
        '\\' => write!(f, "\\\\"),
        c if c == quote => write!(f, "\\{}", c),
        c => write!(f, "{}", c),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Text(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    write_escaped(f, c, '"')?;
                }
                write!(f, "\"")
            }
            Value::Character(c) => {
                write!(f, "'")?;
                write_escaped(f, *c, '\'')?;
                write!(f, "'")
            }
            Value::Boolean(b) => {
                write!(f, "{}", if *b { "true" } else { "false" })
            }
            Value::Void => write!(f, "void"),
        }
    }
}

#[test]
fn test_type_names() {
    let data = vec![
        ("int", Type::Integer),
        ("integer", Type::Integer),
        ("string", Type::String),
        ("char", Type::Char),
        ("bool", Type::Boolean),
        ("boolean", Type::Boolean),
        ("void", Type::Void),
    ];

    for (input, expected) in data {
        assert_eq!(input.parse::<Type>().unwrap(), expected);
    }

    assert!("float".parse::<Type>().is_err());
    assert!("Integer".parse::<Type>().is_err());
}

#[test]
fn test_value_display() {
    let data = vec![
        (Value::Integer(-5), "-5"),
        (Value::Text("hi".to_string()), "\"hi\""),
        (Value::Character('c'), "'c'"),
        (Value::Text("a\"b\nc\\".to_string()), r#""a\"b\nc\\""#),
        (Value::Text("it's\t".to_string()), r#""it's\t""#),
        (Value::Character('\''), r"'\''"),
        (Value::Character('"'), r#"'"'"#),
        (Value::Character('\0'), r"'\0'"),
        (Value::Boolean(false), "false"),
        (Value::Void, "void"),
    ];

    for (value, expected) in data {
        assert_eq!(value.to_string(), expected);
    }
}
