pub mod ast;
pub mod cli;
pub mod environment;
pub mod error;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stack;
pub mod stdlib;
pub mod tokenizer;

use error::Error;
use log::debug;
use runtime::Interpreter;
use std::io::Write;

/// One interpreter plus the pipeline that feeds it. Globals persist across
/// calls to [`Session::run`].
pub struct Session<W: Write> {
    interpreter: Interpreter<W>,
}

impl<W: Write> Session<W> {
    pub fn new(out: W) -> Self {
        Session {
            interpreter: Interpreter::new(out),
        }
    }

    /// Lexes, parses and executes `source`, returning every diagnostic. Any
    /// lexical or parse error skips execution entirely; a runtime error stops
    /// execution after the effects of earlier statements.
    pub fn run(&mut self, source: &str) -> Vec<Error> {
        let program = match check_source(source) {
            Ok(program) => program,
            Err(errors) => return errors,
        };

        match self.interpreter.interpret(&program) {
            Ok(()) => Vec::new(),
            Err(err) => {
                debug!("{}", err);
                vec![err]
            }
        }
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }
}

/// Lexes and parses `source` without running it.
pub fn check(source: &str) -> Vec<Error> {
    check_source(source).err().unwrap_or_default()
}

fn check_source(source: &str) -> Result<Vec<ast::Stmt>, Vec<Error>> {
    let mut scan = tokenizer::tokenize(source);

    // Tokens scanned around a lexical error are still parsed for syntax errors
    match parser::parse(&scan.tokens) {
        Ok(program) if scan.errors.is_empty() => Ok(program),
        Ok(_) => Err(scan.errors),
        Err(err) => {
            debug!("{}", err);
            scan.errors.push(err);
            Err(scan.errors)
        }
    }
}

/// Runs `source` in a fresh session and returns its diagnostics together with
/// everything it printed.
pub fn run(source: &str) -> (Vec<Error>, String) {
    let mut session = Session::new(Vec::new());
    let diagnostics = session.run(source);
    let output = String::from_utf8_lossy(&session.into_output()).into_owned();
    (diagnostics, output)
}
