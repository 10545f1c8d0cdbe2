use log::debug;
use std::ops::Range;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    Comma,
    Dot,
    Semicolon,

    Plus,
    Minus,
    Star,
    Slash,

    Bang,
    Equal,
    Greater,
    Less,

    BangEqual,
    EqualEqual,
    GreaterEqual,
    LessEqual,

    Identifier(String),
    String(String),
    Number(f64),

    And,
    Or,
    Var,
    If,
    Else,
    Nil,
    Print,
    Return,
    True,
    False,
    For,
    While,
    Fun,

    EOF,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    /// Decoded payload of a string or number literal, in text form.
    pub fn literal(&self) -> Option<String> {
        match &self.token_type {
            TokenType::String(s) => Some(s.clone()),
            TokenType::Number(_) => Some(self.lexeme.clone()),
            _ => None,
        }
    }

    pub fn is_keyword(&self) -> bool {
        keyword(self.lexeme.as_bytes()).is_some()
    }
}

/// Output of a full scan. `tokens` always ends with exactly one EOF token, even
/// when `errors` is non-empty.
#[derive(Debug)]
pub struct Scan {
    pub tokens: Vec<Token>,
    pub errors: Vec<Error>,
}

pub fn tokenize(source: &str) -> Scan {
    let bytes = source.as_bytes();
    let n = bytes.len();
    let mut cursor = 0;
    let mut line_number = 1;
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    loop {
        let (span, scanned) = next_token(&bytes[cursor..]);
        let start = cursor + span.start;
        let end = cursor + span.end;

        line_number += count_newlines(&bytes[cursor..start]);

        match scanned {
            Ok(TokenType::EOF) => {
                assert_eq!(end, n);

                tokens.push(Token {
                    token_type: TokenType::EOF,
                    lexeme: String::new(),
                    line: line_number,
                });
                debug!(
                    "scanned {} tokens with {} errors",
                    tokens.len(),
                    errors.len()
                );

                return Scan { tokens, errors };
            }
            Ok(token_type) => tokens.push(Token {
                token_type,
                lexeme: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
                line: line_number,
            }),
            Err(message) => {
                debug!("{} on line {}", message, line_number);
                errors.push(Error::Lexical {
                    line: line_number,
                    message,
                });
            }
        }

        // strings may span several lines
        line_number += count_newlines(&bytes[start..end]);
        cursor = end;
    }
}

fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

/// Skips whitespace and line comments, returning the number of bytes skipped.
fn skip_trivia(bytes: &[u8]) -> usize {
    let mut cursor = 0;

    loop {
        cursor += bytes[cursor..]
            .iter()
            .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            .count();

        if bytes[cursor..].starts_with(b"//") {
            cursor += bytes[cursor..].iter().take_while(|&&b| b != b'\n').count();
        } else {
            return cursor;
        }
    }
}

/// Scans one lexeme from the front of `bytes`. The returned range is the span
/// of the lexeme; everything before its start was trivia.
fn next_token(bytes: &[u8]) -> (Range<usize>, Result<TokenType, String>) {
    let n = bytes.len();
    let cursor = skip_trivia(bytes);

    if cursor == n {
        return (n..n, Ok(TokenType::EOF));
    }

    if cursor + 1 < n {
        let token = match &bytes[cursor..cursor + 2] {
            b"==" => Some(TokenType::EqualEqual),
            b"!=" => Some(TokenType::BangEqual),
            b"<=" => Some(TokenType::LessEqual),
            b">=" => Some(TokenType::GreaterEqual),
            _ => None,
        };

        if let Some(token) = token {
            return (cursor..cursor + 2, Ok(token));
        }
    }

    let token = match bytes[cursor] {
        b'(' => Some(TokenType::LeftParen),
        b')' => Some(TokenType::RightParen),
        b'{' => Some(TokenType::LeftBrace),
        b'}' => Some(TokenType::RightBrace),
        b',' => Some(TokenType::Comma),
        b'.' => Some(TokenType::Dot),
        b';' => Some(TokenType::Semicolon),
        b'+' => Some(TokenType::Plus),
        b'-' => Some(TokenType::Minus),
        b'*' => Some(TokenType::Star),
        b'/' => Some(TokenType::Slash),
        b'=' => Some(TokenType::Equal),
        b'!' => Some(TokenType::Bang),
        b'<' => Some(TokenType::Less),
        b'>' => Some(TokenType::Greater),
        _ => None,
    };

    if let Some(token) = token {
        return (cursor..cursor + 1, Ok(token));
    }

    if bytes[cursor] == b'"' {
        let start_byte = cursor + 1;

        return match bytes[start_byte..].iter().position(|&b| b == b'"') {
            Some(length) => {
                let end_byte = start_byte + length;
                (
                    cursor..end_byte + 1,
                    Ok(TokenType::String(
                        String::from_utf8_lossy(&bytes[start_byte..end_byte]).into_owned(),
                    )),
                )
            }
            None => (cursor..n, Err("Unterminated string.".to_string())),
        };
    }

    if bytes[cursor].is_ascii_digit() {
        let start_byte = cursor;
        let mut end_byte = cursor;

        while end_byte < n && bytes[end_byte].is_ascii_digit() {
            end_byte += 1;
        }

        // a trailing '.' without digits is left for the Dot token
        if end_byte + 1 < n && bytes[end_byte] == b'.' && bytes[end_byte + 1].is_ascii_digit() {
            end_byte += 1;

            while end_byte < n && bytes[end_byte].is_ascii_digit() {
                end_byte += 1;
            }
        }

        // digits with an optional fraction always form a valid f64
        let number = String::from_utf8_lossy(&bytes[start_byte..end_byte])
            .parse::<f64>()
            .unwrap_or_default();

        return (start_byte..end_byte, Ok(TokenType::Number(number)));
    }

    if bytes[cursor].is_ascii_alphabetic() || bytes[cursor] == b'_' {
        let start_byte = cursor;
        let mut end_byte = cursor + 1;

        while end_byte < n && (bytes[end_byte].is_ascii_alphanumeric() || bytes[end_byte] == b'_') {
            end_byte += 1;
        }

        let word = &bytes[start_byte..end_byte];
        let token = keyword(word).unwrap_or_else(|| {
            TokenType::Identifier(String::from_utf8_lossy(word).into_owned())
        });

        return (start_byte..end_byte, Ok(token));
    }

    let width = utf8_width(bytes[cursor]).min(n - cursor);
    (
        cursor..cursor + width,
        Err(format!(
            "Unexpected character '{}'.",
            String::from_utf8_lossy(&bytes[cursor..cursor + width])
        )),
    )
}

fn keyword(word: &[u8]) -> Option<TokenType> {
    let token = match word {
        b"and" => TokenType::And,
        b"or" => TokenType::Or,
        b"var" => TokenType::Var,
        b"if" => TokenType::If,
        b"else" => TokenType::Else,
        b"nil" => TokenType::Nil,
        b"print" => TokenType::Print,
        b"return" => TokenType::Return,
        b"true" => TokenType::True,
        b"false" => TokenType::False,
        b"for" => TokenType::For,
        b"while" => TokenType::While,
        b"fun" => TokenType::Fun,
        _ => return None,
    };

    Some(token)
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        tokenize(source)
            .tokens
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_empty_source_yields_only_eof() {
        let scan = tokenize("");
        assert_eq!(scan.tokens.len(), 1);
        assert_eq!(scan.tokens[0].token_type, TokenType::EOF);
        assert!(scan.errors.is_empty());

        let scan = tokenize("  \n // nothing here\n");
        assert_eq!(scan.tokens.len(), 1);
        assert_eq!(scan.tokens[0].line, 3);
    }

    #[test]
    fn test_two_character_operators_are_greedy() {
        assert_eq!(
            types("! != = == < <= > >="),
            vec![
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Equal,
                TokenType::EqualEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::EOF,
            ]
        );
        assert_eq!(
            types("a===b"),
            vec![
                TokenType::Identifier("a".to_string()),
                TokenType::EqualEqual,
                TokenType::Equal,
                TokenType::Identifier("b".to_string()),
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn test_comments_and_slash() {
        assert_eq!(
            types("1 / 2 // trailing comment / * +\n3"),
            vec![
                TokenType::Number(1.0),
                TokenType::Slash,
                TokenType::Number(2.0),
                TokenType::Number(3.0),
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            types("12 3.25 -4"),
            vec![
                TokenType::Number(12.0),
                TokenType::Number(3.25),
                TokenType::Minus,
                TokenType::Number(4.0),
                TokenType::EOF,
            ]
        );
        assert_eq!(
            types("1."),
            vec![TokenType::Number(1.0), TokenType::Dot, TokenType::EOF]
        );

        let scan = tokenize("3.50");
        assert_eq!(scan.tokens[0].lexeme, "3.50");
        assert_eq!(scan.tokens[0].literal(), Some("3.50".to_string()));
    }

    #[test]
    fn test_digit_runs_always_scan_as_numbers() {
        let scan = tokenize("123456789012345678901234567890.5 007 0.000");
        assert!(scan.errors.is_empty());
        assert_eq!(
            scan.tokens
                .iter()
                .map(|t| t.token_type.clone())
                .collect::<Vec<_>>(),
            vec![
                TokenType::Number(123456789012345678901234567890.5),
                TokenType::Number(7.0),
                TokenType::Number(0.0),
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert_eq!(
            types("var Var _under fun2 while"),
            vec![
                TokenType::Var,
                TokenType::Identifier("Var".to_string()),
                TokenType::Identifier("_under".to_string()),
                TokenType::Identifier("fun2".to_string()),
                TokenType::While,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn test_multiline_string_advances_line() {
        let scan = tokenize("\"one\ntwo\" x");
        assert!(scan.errors.is_empty());
        assert_eq!(
            scan.tokens[0].token_type,
            TokenType::String("one\ntwo".to_string())
        );
        assert_eq!(scan.tokens[0].line, 1);
        assert_eq!(scan.tokens[0].lexeme, "\"one\ntwo\"");
        assert_eq!(scan.tokens[1].line, 2);
        assert_eq!(scan.tokens[0].literal(), Some("one\ntwo".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let scan = tokenize("print 1;\n\"never closed\n");
        assert_eq!(scan.errors.len(), 1);
        assert_eq!(scan.errors[0].line(), Some(2));
        assert!(scan.errors[0].to_string().contains("Unterminated string."));
        assert_eq!(
            scan.tokens.last().map(|t| &t.token_type),
            Some(&TokenType::EOF)
        );
        assert_eq!(scan.tokens.last().map(|t| t.line), Some(3));
    }

    #[test]
    fn test_errors_do_not_stop_scanning() {
        let scan = tokenize("1 @\n2 # é 3");
        assert_eq!(scan.errors.len(), 3);
        assert_eq!(scan.errors[0].line(), Some(1));
        assert_eq!(scan.errors[1].line(), Some(2));
        assert!(scan.errors[2].to_string().contains("'é'"));

        let numbers: Vec<_> = scan
            .tokens
            .iter()
            .filter_map(|t| match t.token_type {
                TokenType::Number(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![1.0, 2.0, 3.0]);
        assert_eq!(scan.tokens.last().map(|t| t.line), Some(2));
    }

    #[test]
    fn test_lines_are_tracked() {
        let scan = tokenize("var a;\n\nprint a;");
        let lines: Vec<_> = scan.tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 1, 1, 3, 3, 3, 3]);
    }
}
