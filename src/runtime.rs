use crate::ast::{BinaryOp, Expr, FunctionDecl, Literal, LogicalOp, Stmt, UnaryOp};
use crate::error::{runtime_error, Error};
use crate::{environment::Environment, error::Result, stack::ensure_sufficient_stack, stdlib};
use log::trace;
use std::{
    fmt::{self, Debug, Display, Formatter},
    io::Write,
    rc::Rc,
};

/// Deepest chain of user function calls before the interpreter gives up
/// instead of exhausting the native stack.
pub const MAX_CALL_DEPTH: usize = 1024;

#[derive(Clone)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Callable(Callable),
    Nil,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Callable(_) => "function",
            Value::Nil => "nil",
        }
    }

    /// Only `false` and `nil` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Nil)
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Nil => Value::Nil,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            // f64's Display already drops the fraction of integral values
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Callable(c) => write!(f, "{}", c),
            Value::Nil => write!(f, "nil"),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Value::String(s) = self {
            write!(f, "\"{}\"", s)
        } else {
            write!(f, "{}", self)
        }
    }
}

pub type NativeResult = std::result::Result<Value, String>;
pub type NativeFn = Rc<dyn Fn(&[Value]) -> NativeResult>;

#[derive(Clone)]
pub enum Callable {
    Function {
        declaration: Rc<FunctionDecl>,
        closure: Environment,
    },
    BuiltIn {
        name: String,
        arity: usize,
        func: NativeFn,
    },
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function { declaration, .. } => declaration.params.len(),
            Callable::BuiltIn { arity, .. } => *arity,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Callable::Function { declaration, .. } => &declaration.name.lexeme,
            Callable::BuiltIn { name, .. } => name,
        }
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function { .. } => write!(f, "<fn {}>", self.name()),
            Callable::BuiltIn { .. } => write!(f, "<native fn {}>", self.name()),
        }
    }
}

impl Debug for Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Callables compare by identity: the same declaration closed over the same
/// scope, or the same native function object.
impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Callable::Function {
                    declaration: a,
                    closure: a_closure,
                },
                Callable::Function {
                    declaration: b,
                    closure: b_closure,
                },
            ) => Rc::ptr_eq(a, b) && a_closure.ptr_eq(b_closure),
            (Callable::BuiltIn { func: a, .. }, Callable::BuiltIn { func: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

/// Outcome of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<W: Write> {
    globals: Environment,
    environment: Environment,
    call_depth: usize,
    out: W,
}

impl<W: Write> Interpreter<W> {
    /// Creates an interpreter whose global scope holds the native library and
    /// whose `print` output goes to `out`.
    pub fn new(out: W) -> Self {
        let globals = Environment::new();
        stdlib::define_natives(&globals);

        Interpreter {
            environment: globals.clone(),
            globals,
            call_depth: 0,
            out,
        }
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Executes `statements` in order, stopping at the first runtime error.
    /// Effects of statements that already ran are kept.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.execute(stmt)?;
        }

        self.out.flush()?;
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                Ok(Flow::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Block(statements) => {
                let block_env = self.environment.extend();
                self.execute_block(statements, block_env)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(declaration) => {
                let function = Value::Callable(Callable::Function {
                    declaration: Rc::clone(declaration),
                    closure: self.environment.clone(),
                });
                self.environment
                    .define(declaration.name.lexeme.clone(), function);
                Ok(Flow::Normal)
            }
            Stmt::Return { keyword, value } => {
                if self.call_depth == 0 {
                    return runtime_error(keyword.line, "Can't return from top-level code.");
                }

                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
        }
    }

    /// Runs `statements` with `environment` as the current scope. The previous
    /// scope is restored on every exit path, errors and returns included.
    fn execute_block(&mut self, statements: &[Stmt], environment: Environment) -> Result<Flow> {
        let previous = std::mem::replace(&mut self.environment, environment);
        trace!("entered scope at depth {}", self.environment.depth());

        let result = self.execute_all(statements);

        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),
            Expr::Variable(name) => self.environment.get(name),
            Expr::Assign { name, value } => {
                let new_value = self.evaluate(value)?;
                self.environment.assign(name, new_value.clone())?;
                Ok(new_value)
            }
            Expr::Binary {
                left,
                operator,
                right,
                line,
            } => self.evaluate_binary(left, *operator, right, *line),
            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => {
                let left_val = self.evaluate(left)?;

                match operator {
                    LogicalOp::Or if left_val.is_truthy() => Ok(Value::Boolean(true)),
                    LogicalOp::And if !left_val.is_truthy() => Ok(Value::Boolean(false)),
                    _ => Ok(Value::Boolean(self.evaluate(right)?.is_truthy())),
                }
            }
            Expr::Unary {
                operator,
                right,
                line,
            } => {
                let right_val = self.evaluate(right)?;

                match operator {
                    UnaryOp::Negate => match right_val {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => runtime_error(
                            *line,
                            format!(
                                "Operand of '{}' must be a number, got {}.",
                                operator,
                                other.type_name()
                            ),
                        ),
                    },
                    UnaryOp::Not => Ok(Value::Boolean(!right_val.is_truthy())),
                }
            }
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut evaluated_args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    evaluated_args.push(self.evaluate(arg)?);
                }

                match callee_val {
                    Value::Callable(callable) => self.call(&callable, evaluated_args, paren.line),
                    other => runtime_error(
                        paren.line,
                        format!("Can only call functions, got {}.", other.type_name()),
                    ),
                }
            }
        }
    }

    /// Invokes `callable` with already evaluated arguments. `line` locates
    /// errors raised by the call itself.
    pub fn call(&mut self, callable: &Callable, arguments: Vec<Value>, line: usize) -> Result<Value> {
        if arguments.len() != callable.arity() {
            return runtime_error(
                line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arguments.len()
                ),
            );
        }

        match callable {
            Callable::BuiltIn { name, func, .. } => {
                trace!("calling native {}", name);
                func(&arguments).map_err(|message| Error::Runtime { line, message })
            }
            Callable::Function {
                declaration,
                closure,
            } => {
                if self.call_depth >= MAX_CALL_DEPTH {
                    return runtime_error(line, "Stack overflow.");
                }
                trace!("calling {} at depth {}", declaration.name.lexeme, self.call_depth);

                // Parameters live in a fresh scope under the closure, not the caller
                let call_env = closure.extend();
                for (param, arg) in declaration.params.iter().zip(arguments) {
                    call_env.define(param.lexeme.clone(), arg);
                }

                self.call_depth += 1;
                let result = self.execute_block(&declaration.body, call_env);
                self.call_depth -= 1;

                match result? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::Nil),
                }
            }
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: BinaryOp,
        right: &Expr,
        line: usize,
    ) -> Result<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        let numbers = match (&left_val, &right_val) {
            (Value::Number(a), Value::Number(b)) => Some((*a, *b)),
            _ => None,
        };

        match (operator, numbers) {
            (BinaryOp::Equal, _) => Ok(Value::Boolean(left_val == right_val)),
            (BinaryOp::NotEqual, _) => Ok(Value::Boolean(left_val != right_val)),
            (BinaryOp::Add, Some((a, b))) => Ok(Value::Number(a + b)),
            (BinaryOp::Add, None) => match (&left_val, &right_val) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                _ => operand_error(operator, "two numbers or two strings", &left_val, &right_val, line),
            },
            (BinaryOp::Subtract, Some((a, b))) => Ok(Value::Number(a - b)),
            (BinaryOp::Multiply, Some((a, b))) => Ok(Value::Number(a * b)),
            // x / 0 follows IEEE 754: inf, -inf or NaN
            (BinaryOp::Divide, Some((a, b))) => Ok(Value::Number(a / b)),
            (BinaryOp::Less, Some((a, b))) => Ok(Value::Boolean(a < b)),
            (BinaryOp::LessEqual, Some((a, b))) => Ok(Value::Boolean(a <= b)),
            (BinaryOp::Greater, Some((a, b))) => Ok(Value::Boolean(a > b)),
            (BinaryOp::GreaterEqual, Some((a, b))) => Ok(Value::Boolean(a >= b)),
            (
                BinaryOp::Subtract
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual,
                None,
            ) => operand_error(operator, "numbers", &left_val, &right_val, line),
        }
    }
}

fn operand_error<T>(
    operator: BinaryOp,
    expected: &str,
    left: &Value,
    right: &Value,
    line: usize,
) -> Result<T> {
    runtime_error(
        line,
        format!(
            "Operands of '{}' must be {}, got {} and {}.",
            operator,
            expected,
            left.type_name(),
            right.type_name()
        ),
    )
}
