use std::io::Write;

use anyhow::Result;
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::lang::ast::*;
use crate::lang::error::EvalError;
use crate::lang::value::{Type, Value};
use crate::lang::variables::Variables;

type EvalResult<T> = std::result::Result<T, EvalError>;

/// Outcome of evaluating one node
///
/// Everything but `Value` is control flow that has to unwind to an enclosing construct.
enum Signal {
    Value(Value),
    Break,
    Next,
    Return,
}

impl Signal {
    /// Collapse a signal that escaped every construct able to handle it
    fn into_value(self) -> EvalResult<Value> {
        match self {
            Signal::Value(v) => Ok(v),
            Signal::Break => Err(EvalError::JumpOutsideLoop("break")),
            Signal::Next => Err(EvalError::JumpOutsideLoop("next")),
            Signal::Return => Err(EvalError::ReturnOutsideFunction),
        }
    }
}

fn integer_binop(op: BinaryOperator, lhs: i64, rhs: i64) -> EvalResult<Value> {
    let overflow = || EvalError::Overflow(format!("{} {} {}", lhs, op, rhs));

    let val = match op {
        BinaryOperator::Plus => Value::Integer(lhs.checked_add(rhs).ok_or_else(overflow)?),
        BinaryOperator::Minus => Value::Integer(lhs.checked_sub(rhs).ok_or_else(overflow)?),
        BinaryOperator::Multiply => Value::Integer(lhs.checked_mul(rhs).ok_or_else(overflow)?),
        BinaryOperator::Divide => {
            if rhs == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Value::Integer(lhs.checked_div(rhs).ok_or_else(overflow)?)
        }
        BinaryOperator::Modulo => {
            if rhs == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Value::Integer(lhs.checked_rem(rhs).ok_or_else(overflow)?)
        }
        BinaryOperator::Equals => Value::Boolean(lhs == rhs),
        BinaryOperator::NotEquals => Value::Boolean(lhs != rhs),
        BinaryOperator::GreaterThan => Value::Boolean(lhs > rhs),
        BinaryOperator::GreaterThanEquals => Value::Boolean(lhs >= rhs),
        BinaryOperator::LessThan => Value::Boolean(lhs < rhs),
        BinaryOperator::LessThanEquals => Value::Boolean(lhs <= rhs),
        BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => {
            return Err(EvalError::TypeMismatch(format!(
                "cannot apply operator '{}' to integer and integer",
                op
            )))
        }
    };

    Ok(val)
}

pub struct Eval<'a> {
    sink: &'a mut dyn Write,
    variables: Variables,
    functions: IndexMap<String, FunctionDeclaration>,
    /// Type mismatches reported while evaluating the current statement
    reported: Vec<EvalError>,
}

impl<'a> Eval<'a> {
    /// Create a new `Eval` instance
    ///
    /// `sink` is where per-statement results and diagnostics are written
    pub fn new(sink: &'a mut dyn Write) -> Self {
        Self {
            sink,
            variables: Variables::new(),
            functions: IndexMap::new(),
            reported: Vec::new(),
        }
    }

    /// Record a non-fatal type error and produce the `false` sentinel in place of a result
    fn report(&mut self, err: EvalError) -> Value {
        warn!("{}", err);
        self.reported.push(err);
        Value::Boolean(false)
    }

    fn mismatch(&mut self, op: &str, lhs: &Value, rhs: &Value) -> Value {
        self.report(EvalError::TypeMismatch(format!(
            "cannot apply operator '{}' to {} and {}",
            op,
            lhs.ty(),
            rhs.ty()
        )))
    }

    fn eval_binop_expr(
        &mut self,
        lhs: &Expression,
        op: BinaryOperator,
        rhs: &Expression,
    ) -> EvalResult<Value> {
        let lhs_val = self.eval_expr(lhs)?;
        let rhs_val = self.eval_expr(rhs)?;

        match op {
            BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => match (&lhs_val, &rhs_val) {
                (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(
                    if op == BinaryOperator::LogicalAnd {
                        *l && *r
                    } else {
                        *l || *r
                    },
                )),
                (l, r) => Ok(self.mismatch(op.op_str(), l, r)),
            },
            BinaryOperator::Equals | BinaryOperator::NotEquals => {
                if lhs_val.ty() != rhs_val.ty() {
                    return Ok(self.mismatch(op.op_str(), &lhs_val, &rhs_val));
                }

                let equal = lhs_val == rhs_val;
                Ok(Value::Boolean(if op == BinaryOperator::Equals {
                    equal
                } else {
                    !equal
                }))
            }
            _ => match (lhs_val, rhs_val) {
                (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
                    Ok(self.report(EvalError::TypeMismatch(format!(
                        "cannot apply operator '{}' to boolean values",
                        op
                    ))))
                }
                (Value::Integer(l), Value::Integer(r)) => integer_binop(op, l, r),
                (Value::Text(l), Value::Text(r)) if op == BinaryOperator::Plus => {
                    Ok(Value::Text(l + &r))
                }
                (l, r) => Ok(self.mismatch(op.op_str(), &l, &r)),
            },
        }
    }

    fn eval_unary_expr(&mut self, op: UnaryOperator, operand: &Expression) -> EvalResult<Value> {
        match (op, self.eval_expr(operand)?) {
            (UnaryOperator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
            (UnaryOperator::Minus, Value::Integer(i)) => i
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| EvalError::Overflow(format!("-{}", i))),
            (op, v) => Ok(self.report(EvalError::TypeMismatch(format!(
                "cannot apply operator '{}' to {}",
                op,
                v.ty()
            )))),
        }
    }

    fn eval_ternary_expr(
        &mut self,
        cond: &Expression,
        true_branch: &Expression,
        false_branch: &Expression,
    ) -> EvalResult<Value> {
        match self.eval_expr(cond)? {
            Value::Boolean(true) => self.eval_expr(true_branch),
            Value::Boolean(false) => self.eval_expr(false_branch),
            v => Ok(self.report(EvalError::TypeMismatch(format!(
                "conditional expression requires a boolean condition, found {}",
                v.ty()
            )))),
        }
    }

    /// Evaluate a loop or branch condition, treating anything but a boolean as `false`
    fn eval_condition(&mut self, construct: &str, cond: &Expression) -> EvalResult<bool> {
        let val = self.eval_expr(cond)?;
        if let Some(b) = val.as_boolean() {
            return Ok(b);
        }

        self.report(EvalError::TypeMismatch(format!(
            "'{}' condition must be boolean, found {}",
            construct,
            val.ty()
        )));
        Ok(false)
    }

    fn eval_expr(&mut self, expr: &Expression) -> EvalResult<Value> {
        self.eval(expr)?.into_value()
    }

    /// Run `body` in its own scope
    ///
    /// The scope is popped on every path out, including errors and control flow signals.
    fn eval_block(&mut self, body: &[Expression]) -> EvalResult<Signal> {
        self.variables.push_scope();
        let ret = self.eval_stmts(body);
        self.variables.pop_scope();

        ret
    }

    fn eval_stmts(&mut self, body: &[Expression]) -> EvalResult<Signal> {
        let mut last = Value::Void;
        for stmt in body {
            match self.eval(stmt)? {
                Signal::Value(v) => last = v,
                signal => return Ok(signal),
            }
        }

        Ok(Signal::Value(last))
    }

    fn eval_if(&mut self, node: &If) -> EvalResult<Signal> {
        let taken = match &node.condition {
            Some(cond) => self.eval_condition("if", cond)?,
            None => true,
        };

        if taken {
            self.eval_block(&node.body)
        } else if let Some(alt) = &node.alternate {
            self.eval_if(alt)
        } else {
            Ok(Signal::Value(Value::Void))
        }
    }

    fn eval_while(&mut self, cond: &Expression, body: &[Expression]) -> EvalResult<Signal> {
        while self.eval_condition("while", cond)? {
            match self.eval_block(body)? {
                Signal::Value(_) | Signal::Next => (),
                Signal::Break => break,
                Signal::Return => return Ok(Signal::Return),
            }
        }

        Ok(Signal::Value(Value::Void))
    }

    fn declare_variable(
        &mut self,
        name: &str,
        init: &Expression,
        annotation: Option<Type>,
    ) -> EvalResult<Value> {
        if self.variables.in_innermost(name) {
            return Err(EvalError::Redeclaration(name.to_string()));
        }

        let val = self.eval_expr(init)?;
        if let Some(ty) = annotation {
            if val.ty() != ty {
                return Err(EvalError::TypeMismatch(format!(
                    "cannot initialize '{}' of type {} with {}",
                    name,
                    ty,
                    val.ty()
                )));
            }
        }

        self.variables.insert(name.to_string(), val.clone());
        Ok(val)
    }

    fn assign_variable(&mut self, name: &str, value: &Expression) -> EvalResult<Value> {
        let frame = self
            .variables
            .find(name)
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))?;

        let val = self.eval_expr(value)?;
        self.variables.set(frame, name, val.clone());

        Ok(val)
    }

    fn declare_function(&mut self, func: &FunctionDeclaration) -> EvalResult<()> {
        if self.functions.contains_key(&func.name) {
            return Err(EvalError::Redeclaration(func.name.clone()));
        }

        for (i, param) in func.parameters.iter().enumerate() {
            if func.parameters[..i].iter().any(|p| p.name == param.name) {
                return Err(EvalError::Redeclaration(param.name.clone()));
            }
        }

        info!("declared function {}", func.name);
        self.functions.insert(func.name.clone(), func.clone());

        Ok(())
    }

    fn eval(&mut self, expr: &Expression) -> EvalResult<Signal> {
        let val = match expr {
            Expression::Literal(v) => v.clone(),
            Expression::Identifier(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone()))?,
            Expression::VariableDeclaration(name, init, ty) => {
                self.declare_variable(name, init, *ty)?
            }
            Expression::Assignment(name, value) => self.assign_variable(name, value)?,
            Expression::Binary(lhs, op, rhs) => self.eval_binop_expr(lhs, *op, rhs)?,
            Expression::Unary(op, operand) => self.eval_unary_expr(*op, operand)?,
            Expression::Ternary(cond, t, f) => self.eval_ternary_expr(cond, t, f)?,
            Expression::If(node) => return self.eval_if(node),
            Expression::While(cond, body) => return self.eval_while(cond, body),
            Expression::Break => return Ok(Signal::Break),
            Expression::Next => return Ok(Signal::Next),
            Expression::Return(value) => {
                // Function bodies never run, so the value itself has nowhere to go
                self.eval_expr(value)?;
                return Ok(Signal::Return);
            }
            Expression::FunctionDeclaration(func) => {
                self.declare_function(func)?;
                Value::Void
            }
            Expression::Bad | Expression::Eof => Value::Void,
        };

        Ok(Signal::Value(val))
    }

    /// Evaluate every top-level statement in order
    ///
    /// A failing statement is reported to the sink and evaluation carries on with the next one.
    /// Only I/O errors on the sink are returned.
    pub fn analyze(&mut self, program: &[Expression]) -> Result<()> {
        info!("evaluating {} statements", program.len());

        for stmt in program {
            debug!("eval: {}", stmt);
            let res = self.eval(stmt).and_then(Signal::into_value);
            debug!("scope depth after statement: {}", self.variables.depth());

            for err in self.reported.drain(..) {
                writeln!(self.sink, "error: {}", err)?;
            }

            match res {
                Ok(v) => writeln!(self.sink, "{}", v)?,
                Err(e) => writeln!(self.sink, "error: {}", e)?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
fn run(prog: &str) -> String {
    use crate::lang::lexer::tokenize;
    use crate::lang::parse::parse_ast;

    let ast = parse_ast(tokenize(prog).unwrap());
    assert!(!ast.has_error(), "{:?}", ast.error);

    let mut output = Vec::new();
    Eval::new(&mut output).analyze(&ast.body).unwrap();
    String::from_utf8(output).expect("Output not utf-8")
}

#[test]
fn test_expression() {
    let tests = vec![
        ("2 - 3 - 4;", "-5\n"),
        ("2 + 4 - 4 * 32 + 1 * 2;", "-120\n"),
        ("7 / 2;", "3\n"),
        ("-7 / 2;", "-3\n"),
        ("-7 % 3;", "-1\n"),
        ("- -5;", "5\n"),
        ("\"ab\" + \"cd\";", "\"abcd\"\n"),
        (
            r#"let s = "a\"b\nc"; s;"#,
            concat!(r#""a\"b\nc""#, "\n", r#""a\"b\nc""#, "\n"),
        ),
        (r"'\'';", "'\\''\n"),
        ("1 < 2;", "true\n"),
        ("3 >= 3;", "true\n"),
        ("3 > 3;", "false\n"),
        ("2 <= 1;", "false\n"),
        ("'a' == 'a';", "true\n"),
        ("\"a\" != \"b\";", "true\n"),
        ("true == false;", "false\n"),
        ("not true;", "false\n"),
        ("true and false;", "false\n"),
        ("false or true;", "true\n"),
        ("2 > 4 + 1 or 2 == 4 and 2 != 2;", "false\n"),
    ];

    for (input, expected) in tests {
        assert_eq!(run(input), expected, "input: {}", input);
    }
}

#[test]
fn test_type_mismatch() {
    let tests = vec![
        (
            "true + 1;",
            "error: type mismatch: cannot apply operator '+' to boolean values\nfalse\n",
        ),
        (
            "1 < false;",
            "error: type mismatch: cannot apply operator '<' to boolean values\nfalse\n",
        ),
        (
            "\"a\" - \"b\";",
            "error: type mismatch: cannot apply operator '-' to string and string\nfalse\n",
        ),
        (
            "1 + 'c';",
            "error: type mismatch: cannot apply operator '+' to integer and char\nfalse\n",
        ),
        (
            "1 == \"1\";",
            "error: type mismatch: cannot apply operator '==' to integer and string\nfalse\n",
        ),
        (
            "true or 1;",
            "error: type mismatch: cannot apply operator 'or' to boolean and integer\nfalse\n",
        ),
        (
            "not 1;",
            "error: type mismatch: cannot apply operator 'not' to integer\nfalse\n",
        ),
        (
            "-\"s\";",
            "error: type mismatch: cannot apply operator '-' to string\nfalse\n",
        ),
        (
            "let y = true + 1; y;",
            "error: type mismatch: cannot apply operator '+' to boolean values\nfalse\nfalse\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run(input), expected, "input: {}", input);
    }
}

#[test]
fn test_variables() {
    let tests = vec![
        ("let x = 1; x;", "1\n1\n"),
        ("let x = 1; x = x + 1; x;", "1\n2\n2\n"),
        ("y;", "error: undefined variable 'y'\n"),
        ("y = 3;", "error: undefined variable 'y'\n"),
        (
            "let x = 1; let x = 2;",
            "1\nerror: 'x' is already declared in this scope\n",
        ),
        (
            "let a = 1; b; a + 1;",
            "1\nerror: undefined variable 'b'\n2\n",
        ),
        ("let x: int = 1;", "1\n"),
        (
            "let s: string = 2;",
            "error: type mismatch: cannot initialize 's' of type string with integer\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run(input), expected, "input: {}", input);
    }
}

#[test]
fn test_variable_scope() {
    let tests = vec![
        // Shadowing an outer binding is legal and disappears with the block
        (
            "let x = 1; if true then let x = 2; x; endif x;",
            "1\n2\n1\n",
        ),
        // Assignment rebinds in the frame that defines the name
        ("let x = 1; if true then x = 5; endif x;", "1\n5\n5\n"),
        (
            "if true then let inner = 3; endif inner;",
            "3\nerror: undefined variable 'inner'\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run(input), expected, "input: {}", input);
    }
}

#[test]
fn test_scope_popped_after_error() {
    use crate::lang::lexer::tokenize;
    use crate::lang::parse::parse_ast;

    let ast = parse_ast(
        tokenize("let x = 1; if true then let y = 2; while true z; end endif y;").unwrap(),
    );

    let mut output = Vec::new();
    let mut eval = Eval::new(&mut output);
    eval.analyze(&ast.body).unwrap();
    assert_eq!(eval.variables.depth(), 1);
    drop(eval);

    assert_eq!(
        String::from_utf8(output).expect("Output not utf-8"),
        "1\nerror: undefined variable 'z'\nerror: undefined variable 'y'\n"
    );
}

#[test]
fn test_scope_popped_after_jump() {
    use crate::lang::lexer::tokenize;
    use crate::lang::parse::parse_ast;

    let ast = parse_ast(
        tokenize(
            r#"
            let i = 0;
            while true
                let a = i;
                i = i + 1;
                if i < 3 then
                    let b = a;
                    if true then let c = b; next; endif
                endif
                if true then if true then break; endif endif
            end
            i;
            "#,
        )
        .unwrap(),
    );
    assert!(!ast.has_error(), "{:?}", ast.error);

    let mut output = Vec::new();
    let mut eval = Eval::new(&mut output);
    eval.analyze(&ast.body).unwrap();
    assert_eq!(eval.variables.depth(), 1);
    assert!(eval.variables.get("a").is_none());
    drop(eval);

    assert_eq!(
        String::from_utf8(output).expect("Output not utf-8"),
        "0\nvoid\n3\n"
    );
}

#[test]
fn test_if() {
    let chain = r#"
        if x == 1 then "one";
        elseif x == 2 then "two";
        else then "many";
        endif
    "#;

    let tests = vec![
        (format!("let x = 1; {}", chain), "1\n\"one\"\n"),
        (format!("let x = 2; {}", chain), "2\n\"two\"\n"),
        (format!("let x = 9; {}", chain), "9\n\"many\"\n"),
        ("if false then 1; endif".to_string(), "void\n"),
        (
            "if 1 then 2; else then 3; endif".to_string(),
            "error: type mismatch: 'if' condition must be boolean, found integer\n3\n",
        ),
        (
            "let a = 3; a > 2 then \"big\" else \"small\";".to_string(),
            "3\n\"big\"\n",
        ),
        // Only the selected branch is evaluated
        ("true then 1 else nope;".to_string(), "1\n"),
        ("false then nope else 2;".to_string(), "2\n"),
        ("if true then 1; else then nope; endif".to_string(), "1\n"),
        (
            "if false then nope; elseif true then 2; else then nope; endif".to_string(),
            "2\n",
        ),
        (
            "1 then 2 else 3;".to_string(),
            "error: type mismatch: conditional expression requires a boolean \
             condition, found integer\nfalse\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run(&input), expected, "input: {}", input);
    }
}

#[test]
fn test_loop() {
    let tests = vec![
        (
            r#"
            let i = 0;
            let sum = 0;
            while i < 5
                i = i + 1;
                if i == 2 then next; endif
                if i == 4 then break; endif
                sum = sum + i;
            end
            sum;
            i;
            "#,
            "0\n0\nvoid\n4\n4\n",
        ),
        ("while false end", "void\n"),
        (
            "while 1 end",
            "error: type mismatch: 'while' condition must be boolean, found integer\nvoid\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run(input), expected, "input: {}", input);
    }
}

#[test]
fn test_control_flow_outside_construct() {
    let tests = vec![
        ("break;", "error: cannot 'break' outside of a loop\n"),
        (
            "if true then next; endif",
            "error: cannot 'next' outside of a loop\n",
        ),
        ("return 1;", "error: cannot 'return' outside of a function\n"),
        ("return nope;", "error: undefined variable 'nope'\n"),
        (
            "while true return 2; end",
            "error: cannot 'return' outside of a function\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run(input), expected, "input: {}", input);
    }
}

#[test]
fn test_arithmetic_faults() {
    let tests = vec![
        ("1 / 0;", "error: division by zero\n"),
        ("5 % 0;", "error: division by zero\n"),
        (
            "9223372036854775807 + 1;",
            "error: 9223372036854775807 + 1 overflows\n",
        ),
        (
            "let m = -9223372036854775807 - 1; m / -1;",
            "-9223372036854775808\nerror: -9223372036854775808 / -1 overflows\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run(input), expected, "input: {}", input);
    }
}

#[test]
fn test_functions() {
    let tests = vec![
        ("def f(a: int): int return a; end", "void\n"),
        (
            "def f(): void end def f(): void end",
            "void\nerror: 'f' is already declared in this scope\n",
        ),
        (
            "def g(a: int, a: string): int end",
            "error: 'a' is already declared in this scope\n",
        ),
    ];

    for (input, expected) in tests {
        assert_eq!(run(input), expected, "input: {}", input);
    }
}
