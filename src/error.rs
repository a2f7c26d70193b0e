//! Typed error taxonomy for every pipeline stage (see spec §7).

use std::fmt;

/// A 1-based source position, carried by every error that can be pinned
/// to a specific character or token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub unit: std::rc::Rc<str>,
}

impl Position {
    pub fn new(line: u32, column: u32, unit: std::rc::Rc<str>) -> Self {
        Position { line, column, unit }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.unit, self.line, self.column)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("end of input")]
    EndOfInput,

    #[error("{0}: unexpected token kind: {1}")]
    UnexpectedTokenKind(Position, String),

    #[error("{0}: unexpected token value: {1}")]
    UnexpectedTokenValue(Position, String),

    #[error("{0}: unexpected directive: {1}")]
    UnexpectedDirective(Position, String),

    #[error("{0}: cannot resolve inherited class `{1}`")]
    UnresolvedInheritance(Position, String),

    #[error("{0}: duplicate key `{1}`")]
    DuplicateKey(Position, String),

    #[error("{0}: macro `{1}` expected {2} argument(s), got {3}")]
    MacroArity(Position, String, usize, usize),

    #[error("{0}: nested conditional compilation is not supported")]
    NestedConditional(Position),

    #[error("expected a dict-like value, got {0}")]
    NotAMapping(String),

    #[error("io error reading `{0}`: {1}")]
    Io(String, #[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
