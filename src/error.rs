//! Library error type and its mapping onto the negative status codes.

use std::io;

use crate::parse::{LexError, ParseError};

/// A failure of the library itself, as opposed to a failing child.
///
/// Every variant maps to one of the negative codes returned by
/// [`run_code`](crate::run_code).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("empty command")]
    Empty,
    #[error("tokenize failed: {0}")]
    Tokenize(#[from] LexError),
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("pipe setup failed: {0}")]
    Pipe(#[source] io::Error),
    #[error("spawn failed: {0}")]
    Spawn(#[source] io::Error),
    #[error("read failed during capture: {0}")]
    Read(#[source] io::Error),
    #[error("waiting for child failed: {0}")]
    Wait(#[source] io::Error),
}

impl Error {
    /// Generic failure.
    pub const GENERIC: i32 = -1;
    pub const TOKENIZE: i32 = -2;
    pub const PARSE: i32 = -3;
    pub const PIPE: i32 = -4;
    pub const SPAWN: i32 = -5;
    pub const READ: i32 = -6;

    /// The negative library code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Error::Empty | Error::Wait(_) => Self::GENERIC,
            Error::Tokenize(_) => Self::TOKENIZE,
            Error::Parse(_) => Self::PARSE,
            Error::Pipe(_) => Self::PIPE,
            Error::Spawn(_) => Self::SPAWN,
            Error::Read(_) => Self::READ,
        }
    }
}
