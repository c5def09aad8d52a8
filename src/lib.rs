//! Evaluator for programs of integer assignments such as
//! `x = ( 4 - 2 ) * 3 ; y = x / 4 ;`.
//!
//! Each right-hand side runs through [`Lexer`] → [`Parser`] → [`eval::Evaluator`],
//! with variable references replaced by the values of earlier statements.
//! Set `RUST_LOG=arith_interpreter=debug` (or `trace`) to follow a run.

use miette::{Diagnostic, NamedSource};

pub mod eval;
pub mod interpret;
pub mod lex;
pub mod parse;

pub use interpret::{Binding, Environment, Interpreter};
pub use lex::Lexer;
pub use parse::{Node, Parser};

/// Every way a program run can fail.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnexpectedCharacter(#[from] lex::UnexpectedCharacter),

    #[error(transparent)]
    #[diagnostic(transparent)]
    LiteralTooLarge(#[from] lex::LiteralTooLarge),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] parse::SyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    NestingTooDeep(#[from] parse::NestingTooDeep),

    #[error(transparent)]
    #[diagnostic(transparent)]
    MissingTerminator(#[from] interpret::MissingTerminator),

    #[error(transparent)]
    #[diagnostic(transparent)]
    EmptyProgram(#[from] interpret::EmptyProgram),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Assignment(#[from] interpret::AssignmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    UndefinedVariable(#[from] interpret::UndefinedVariable),

    #[error(transparent)]
    #[diagnostic(transparent)]
    DivisionByZero(#[from] eval::DivisionByZero),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Overflow(#[from] eval::ArithmeticOverflow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Syntax,
    Format,
    Assignment,
    UndefinedVariable,
    DivisionByZero,
    Overflow,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedCharacter(_) | Error::LiteralTooLarge(_) => ErrorKind::Lex,
            Error::Syntax(_) | Error::NestingTooDeep(_) => ErrorKind::Syntax,
            Error::MissingTerminator(_) | Error::EmptyProgram(_) => ErrorKind::Format,
            Error::Assignment(_) => ErrorKind::Assignment,
            Error::UndefinedVariable(_) => ErrorKind::UndefinedVariable,
            Error::DivisionByZero(_) => ErrorKind::DivisionByZero,
            Error::Overflow(_) => ErrorKind::Overflow,
        }
    }
}

pub(crate) fn named_source(filename: Option<&str>, whole: &str) -> NamedSource<String> {
    NamedSource::new(filename.unwrap_or("<input>"), whole.to_string())
}

/// Runs `program` and returns its bindings in statement order.
pub fn process(program: &str) -> Result<Environment, Error> {
    Interpreter::new(None, program).run()
}
