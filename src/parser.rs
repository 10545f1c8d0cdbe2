use crate::{
    ast::{BinaryOp, Expr, FunctionDecl, Literal, LogicalOp, Stmt, UnaryOp},
    error::{Error, Result},
    stack::ensure_sufficient_stack,
    tokenizer::{Token, TokenType},
};
use log::debug;
use std::rc::Rc;

const ASSIGNMENT: u8 = 1;
const OR: u8 = 2;
const AND: u8 = 3;
const EQUALITY: u8 = 4;
const COMPARISON: u8 = 5;
const TERM: u8 = 6;
const FACTOR: u8 = 7;
const UNARY: u8 = 8;

pub fn parse(tokens: &[Token]) -> Result<Vec<Stmt>> {
    assert!(
        tokens
            .last()
            .is_some_and(|t| t.token_type == TokenType::EOF),
        "Token slice must be terminated by EOF"
    );

    let mut consumed = 0;
    let mut statements = Vec::new();

    while tokens[consumed].token_type != TokenType::EOF {
        let (stmt, stmt_consumed) = parse_declaration(&tokens[consumed..])?;
        statements.push(stmt);
        consumed += stmt_consumed;
    }

    debug!("parsed {} top-level statements", statements.len());
    Ok(statements)
}

fn parser_error<T>(message: &str, token: &Token) -> Result<T> {
    let location = match token.token_type {
        TokenType::EOF => "at end".to_string(),
        _ => format!("at '{}'", token.lexeme),
    };

    Err(Error::Parse {
        line: token.line,
        location,
        message: message.to_string(),
    })
}

/// Checks that the first token is `expected` and returns it.
fn consume<'a>(tokens: &'a [Token], expected: &TokenType, message: &str) -> Result<&'a Token> {
    if &tokens[0].token_type == expected {
        Ok(&tokens[0])
    } else {
        parser_error(message, &tokens[0])
    }
}

fn consume_identifier(tokens: &[Token], message: &str) -> Result<Token> {
    match tokens[0].token_type {
        TokenType::Identifier(_) => Ok(tokens[0].clone()),
        _ => parser_error(message, &tokens[0]),
    }
}

fn check(tokens: &[Token], token_type: &TokenType) -> bool {
    &tokens[0].token_type == token_type
}

fn parse_declaration(tokens: &[Token]) -> Result<(Stmt, usize)> {
    match tokens[0].token_type {
        TokenType::Fun => parse_function(tokens),
        TokenType::Var => parse_var(tokens),
        _ => parse_statement(tokens),
    }
}

fn parse_function(tokens: &[Token]) -> Result<(Stmt, usize)> {
    let mut consumed = 1; // Skip 'fun'

    let name = consume_identifier(&tokens[consumed..], "Expect function name.")?;
    consumed += 1;

    consume(
        &tokens[consumed..],
        &TokenType::LeftParen,
        "Expect '(' after function name.",
    )?;
    consumed += 1;

    let mut params = Vec::new();
    if !check(&tokens[consumed..], &TokenType::RightParen) {
        loop {
            params.push(consume_identifier(
                &tokens[consumed..],
                "Expect parameter name.",
            )?);
            consumed += 1;

            if !check(&tokens[consumed..], &TokenType::Comma) {
                break;
            }
            consumed += 1;
        }
    }

    consume(
        &tokens[consumed..],
        &TokenType::RightParen,
        "Expect ')' after parameters.",
    )?;
    consumed += 1;

    consume(
        &tokens[consumed..],
        &TokenType::LeftBrace,
        "Expect '{' before function body.",
    )?;
    let (body, body_consumed) = parse_block(&tokens[consumed..])?;
    consumed += body_consumed;

    Ok((
        Stmt::Function(Rc::new(FunctionDecl { name, params, body })),
        consumed,
    ))
}

fn parse_var(tokens: &[Token]) -> Result<(Stmt, usize)> {
    let mut consumed = 1; // Skip 'var'

    let name = consume_identifier(&tokens[consumed..], "Expect variable name.")?;
    consumed += 1;

    let initializer = if check(&tokens[consumed..], &TokenType::Equal) {
        consumed += 1;
        let (expr, expr_consumed) = parse_expression(&tokens[consumed..], 0)?;
        consumed += expr_consumed;
        Some(expr)
    } else {
        None
    };

    consume(
        &tokens[consumed..],
        &TokenType::Semicolon,
        "Expect ';' after variable declaration.",
    )?;
    consumed += 1;

    Ok((Stmt::Var { name, initializer }, consumed))
}

fn parse_statement(tokens: &[Token]) -> Result<(Stmt, usize)> {
    ensure_sufficient_stack(|| parse_statement_at(tokens))
}

fn parse_statement_at(tokens: &[Token]) -> Result<(Stmt, usize)> {
    match tokens[0].token_type {
        TokenType::Print => {
            let (expr, mut consumed) = parse_expression(&tokens[1..], 0)?;
            consumed += 1;

            consume(
                &tokens[consumed..],
                &TokenType::Semicolon,
                "Expect ';' after value.",
            )?;
            Ok((Stmt::Print(expr), consumed + 1))
        }
        TokenType::LeftBrace => {
            let (statements, consumed) = parse_block(tokens)?;
            Ok((Stmt::Block(statements), consumed))
        }
        TokenType::If => parse_if(tokens),
        TokenType::While => parse_while(tokens),
        TokenType::For => parse_for(tokens),
        TokenType::Return => parse_return(tokens),
        _ => parse_expression_statement(tokens),
    }
}

fn parse_expression_statement(tokens: &[Token]) -> Result<(Stmt, usize)> {
    let (expr, consumed) = parse_expression(tokens, 0)?;

    consume(
        &tokens[consumed..],
        &TokenType::Semicolon,
        "Expect ';' after expression.",
    )?;
    Ok((Stmt::Expression(expr), consumed + 1))
}

/// Parses `{ declaration* }`, starting at the opening brace.
fn parse_block(tokens: &[Token]) -> Result<(Vec<Stmt>, usize)> {
    let mut consumed = 1; // Skip '{'
    let mut statements = Vec::new();

    while !check(&tokens[consumed..], &TokenType::RightBrace)
        && !check(&tokens[consumed..], &TokenType::EOF)
    {
        let (stmt, stmt_consumed) = parse_declaration(&tokens[consumed..])?;
        statements.push(stmt);
        consumed += stmt_consumed;
    }

    consume(
        &tokens[consumed..],
        &TokenType::RightBrace,
        "Expect '}' after block.",
    )?;
    consumed += 1;

    Ok((statements, consumed))
}

/// Parses `( expression )` and returns the inner expression.
fn parse_condition(tokens: &[Token], keyword: &str) -> Result<(Expr, usize)> {
    consume(
        tokens,
        &TokenType::LeftParen,
        &format!("Expect '(' after '{}'.", keyword),
    )?;

    let (condition, mut consumed) = parse_expression(&tokens[1..], 0)?;
    consumed += 1;

    consume(
        &tokens[consumed..],
        &TokenType::RightParen,
        &format!("Expect ')' after {} condition.", keyword),
    )?;

    Ok((condition, consumed + 1))
}

fn parse_if(tokens: &[Token]) -> Result<(Stmt, usize)> {
    let mut consumed = 1; // Skip 'if'

    let (condition, cond_consumed) = parse_condition(&tokens[consumed..], "if")?;
    consumed += cond_consumed;

    let (then_branch, then_consumed) = parse_statement(&tokens[consumed..])?;
    consumed += then_consumed;

    // A dangling else binds to the nearest if
    let else_branch = if check(&tokens[consumed..], &TokenType::Else) {
        consumed += 1;
        let (stmt, else_consumed) = parse_statement(&tokens[consumed..])?;
        consumed += else_consumed;
        Some(Box::new(stmt))
    } else {
        None
    };

    Ok((
        Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
        },
        consumed,
    ))
}

fn parse_while(tokens: &[Token]) -> Result<(Stmt, usize)> {
    let mut consumed = 1; // Skip 'while'

    let (condition, cond_consumed) = parse_condition(&tokens[consumed..], "while")?;
    consumed += cond_consumed;

    let (body, body_consumed) = parse_statement(&tokens[consumed..])?;
    consumed += body_consumed;

    Ok((
        Stmt::While {
            condition,
            body: Box::new(body),
        },
        consumed,
    ))
}

/// Desugars `for (init; cond; incr) body` into
/// `{ init; while (cond) { body; incr; } }`.
fn parse_for(tokens: &[Token]) -> Result<(Stmt, usize)> {
    let mut consumed = 1; // Skip 'for'

    consume(
        &tokens[consumed..],
        &TokenType::LeftParen,
        "Expect '(' after 'for'.",
    )?;
    consumed += 1;

    let initializer = match tokens[consumed].token_type {
        TokenType::Semicolon => {
            consumed += 1;
            None
        }
        TokenType::Var => {
            let (stmt, init_consumed) = parse_var(&tokens[consumed..])?;
            consumed += init_consumed;
            Some(stmt)
        }
        _ => {
            let (stmt, init_consumed) = parse_expression_statement(&tokens[consumed..])?;
            consumed += init_consumed;
            Some(stmt)
        }
    };

    let condition = if check(&tokens[consumed..], &TokenType::Semicolon) {
        None
    } else {
        let (expr, cond_consumed) = parse_expression(&tokens[consumed..], 0)?;
        consumed += cond_consumed;
        Some(expr)
    };
    consume(
        &tokens[consumed..],
        &TokenType::Semicolon,
        "Expect ';' after loop condition.",
    )?;
    consumed += 1;

    let increment = if check(&tokens[consumed..], &TokenType::RightParen) {
        None
    } else {
        let (expr, incr_consumed) = parse_expression(&tokens[consumed..], 0)?;
        consumed += incr_consumed;
        Some(expr)
    };
    consume(
        &tokens[consumed..],
        &TokenType::RightParen,
        "Expect ')' after for clauses.",
    )?;
    consumed += 1;

    let (mut body, body_consumed) = parse_statement(&tokens[consumed..])?;
    consumed += body_consumed;

    if let Some(increment) = increment {
        body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
    }

    let mut desugared = Stmt::While {
        condition: condition.unwrap_or(Expr::Literal(Literal::Boolean(true))),
        body: Box::new(body),
    };

    if let Some(initializer) = initializer {
        desugared = Stmt::Block(vec![initializer, desugared]);
    }

    Ok((desugared, consumed))
}

fn parse_return(tokens: &[Token]) -> Result<(Stmt, usize)> {
    let keyword = tokens[0].clone();
    let mut consumed = 1; // Skip 'return'

    let value = if check(&tokens[consumed..], &TokenType::Semicolon) {
        None
    } else {
        let (expr, expr_consumed) = parse_expression(&tokens[consumed..], 0)?;
        consumed += expr_consumed;
        Some(expr)
    };

    consume(
        &tokens[consumed..],
        &TokenType::Semicolon,
        "Expect ';' after return value.",
    )?;
    consumed += 1;

    Ok((Stmt::Return { keyword, value }, consumed))
}

/// Precedence climbing: keeps folding infix operators that bind tighter than
/// `precedence` into the left operand.
fn parse_expression(tokens: &[Token], precedence: u8) -> Result<(Expr, usize)> {
    ensure_sufficient_stack(|| parse_expression_at(tokens, precedence))
}

fn parse_expression_at(tokens: &[Token], precedence: u8) -> Result<(Expr, usize)> {
    let (mut left, mut consumed) = parse_prefix(tokens)?;

    loop {
        let op_precedence = get_precedence(&tokens[consumed].token_type);
        if op_precedence <= precedence {
            break;
        }

        let (new_expr, op_consumed) = parse_infix(&tokens[consumed..], op_precedence, left)?;
        left = new_expr;
        consumed += op_consumed;
    }

    Ok((left, consumed))
}

fn parse_prefix(tokens: &[Token]) -> Result<(Expr, usize)> {
    let operator = match tokens[0].token_type {
        TokenType::Minus => Some(UnaryOp::Negate),
        TokenType::Bang => Some(UnaryOp::Not),
        _ => None,
    };

    if let Some(operator) = operator {
        let (right, right_consumed) = parse_expression(&tokens[1..], UNARY)?;
        return Ok((
            Expr::Unary {
                operator,
                right: Box::new(right),
                line: tokens[0].line,
            },
            right_consumed + 1,
        ));
    }

    let (primary, consumed) = parse_primary(tokens)?;
    parse_call(tokens, primary, consumed)
}

/// Applies any number of trailing argument lists to `callee`.
fn parse_call(tokens: &[Token], mut callee: Expr, mut consumed: usize) -> Result<(Expr, usize)> {
    while check(&tokens[consumed..], &TokenType::LeftParen) {
        consumed += 1;
        let mut arguments = Vec::new();

        if !check(&tokens[consumed..], &TokenType::RightParen) {
            loop {
                let (arg, arg_consumed) = parse_expression(&tokens[consumed..], 0)?;
                arguments.push(arg);
                consumed += arg_consumed;

                if !check(&tokens[consumed..], &TokenType::Comma) {
                    break;
                }
                consumed += 1;
            }
        }

        let paren = consume(
            &tokens[consumed..],
            &TokenType::RightParen,
            "Expect ')' after arguments.",
        )?
        .clone();
        consumed += 1;

        callee = Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        };
    }

    Ok((callee, consumed))
}

fn parse_primary(tokens: &[Token]) -> Result<(Expr, usize)> {
    match &tokens[0].token_type {
        TokenType::Number(n) => Ok((Expr::Literal(Literal::Number(*n)), 1)),
        TokenType::String(s) => Ok((Expr::Literal(Literal::String(s.clone())), 1)),
        TokenType::True => Ok((Expr::Literal(Literal::Boolean(true)), 1)),
        TokenType::False => Ok((Expr::Literal(Literal::Boolean(false)), 1)),
        TokenType::Nil => Ok((Expr::Literal(Literal::Nil), 1)),
        TokenType::Identifier(_) => Ok((Expr::Variable(tokens[0].clone()), 1)),
        TokenType::LeftParen => {
            let mut consumed = 1; // Skip '('

            let (expr, expr_consumed) = parse_expression(&tokens[consumed..], 0)?;
            consumed += expr_consumed;

            consume(
                &tokens[consumed..],
                &TokenType::RightParen,
                "Expect ')' after expression.",
            )?;
            consumed += 1;

            Ok((Expr::Grouping(Box::new(expr)), consumed))
        }
        _ => parser_error("Expect expression.", &tokens[0]),
    }
}

fn parse_infix(tokens: &[Token], precedence: u8, left: Expr) -> Result<(Expr, usize)> {
    let line = tokens[0].line;

    let operator = match &tokens[0].token_type {
        TokenType::Plus => BinaryOp::Add,
        TokenType::Minus => BinaryOp::Subtract,
        TokenType::Star => BinaryOp::Multiply,
        TokenType::Slash => BinaryOp::Divide,
        TokenType::EqualEqual => BinaryOp::Equal,
        TokenType::BangEqual => BinaryOp::NotEqual,
        TokenType::Less => BinaryOp::Less,
        TokenType::LessEqual => BinaryOp::LessEqual,
        TokenType::Greater => BinaryOp::Greater,
        TokenType::GreaterEqual => BinaryOp::GreaterEqual,
        TokenType::And | TokenType::Or => {
            let operator = match tokens[0].token_type {
                TokenType::And => LogicalOp::And,
                _ => LogicalOp::Or,
            };

            let (right, right_consumed) = parse_expression(&tokens[1..], precedence)?;
            return Ok((
                Expr::Logical {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                    line,
                },
                right_consumed + 1,
            ));
        }
        TokenType::Equal => {
            let name = match left {
                Expr::Variable(name) => name,
                _ => return parser_error("Invalid assignment target.", &tokens[0]),
            };

            // Right-associative: the value may itself be an assignment
            let (value, consumed) = parse_expression(&tokens[1..], ASSIGNMENT - 1)?;
            return Ok((
                Expr::Assign {
                    name,
                    value: Box::new(value),
                },
                consumed + 1,
            ));
        }
        _ => return parser_error("Expect operator.", &tokens[0]),
    };

    let (right, right_consumed) = parse_expression(&tokens[1..], precedence)?;

    Ok((
        Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            line,
        },
        right_consumed + 1,
    ))
}

fn get_precedence(token: &TokenType) -> u8 {
    match token {
        TokenType::Star | TokenType::Slash => FACTOR,
        TokenType::Plus | TokenType::Minus => TERM,
        TokenType::Less
        | TokenType::LessEqual
        | TokenType::Greater
        | TokenType::GreaterEqual => COMPARISON,
        TokenType::EqualEqual | TokenType::BangEqual => EQUALITY,
        TokenType::And => AND,
        TokenType::Or => OR,
        TokenType::Equal => ASSIGNMENT,
        _ => 0,
    }
}
