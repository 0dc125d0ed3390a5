//! Recursive-descent parser over the token vector.
//!
//! ```text
//! full    ::= pipe ( ';' full? | '&' full? )?
//! pipe    ::= cmd  ( '|' pipe )?
//! cmd     ::= simple ( '>' ATOM | '<' ATOM )?
//! simple  ::= ATOM ( ATOM )*
//! ```

use super::types::{Command, Direction, Node, Token, TokenKind};

/// The token stream does not match the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{reason}, found {} at byte {offset}", .found.as_str())]
pub struct ParseError {
    pub reason: &'static str,
    /// Kind of the token the parser stopped at.
    pub found: TokenKind,
    pub offset: usize,
}

/// Parse a token vector (as produced by [`tokenize`](super::tokenize)) into a tree.
///
/// The whole input must be consumed; trailing tokens are an error.
pub fn parse(tokens: &[Token]) -> Result<Node, ParseError> {
    let mut parser = Parser { tokens, pos: 0 };
    let root = parser.full()?;
    match parser.peek() {
        Some(tok) if tok.kind == TokenKind::End => Ok(root),
        Some(tok) => Err(ParseError {
            reason: "unexpected token",
            found: tok.kind,
            offset: tok.begin,
        }),
        None => Err(parser.error("missing end of input")),
    }
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn error(&self, reason: &'static str) -> ParseError {
        let found = self.peek().map_or(TokenKind::End, |t| t.kind);
        let offset = self
            .peek()
            .or_else(|| self.tokens.last().copied())
            .map_or(0, |t| t.begin);
        ParseError {
            reason,
            found,
            offset,
        }
    }

    fn expect_atom(&mut self, reason: &'static str) -> Result<Token, ParseError> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Atom => {
                self.pos += 1;
                Ok(tok)
            }
            _ => Err(self.error(reason)),
        }
    }

    fn full(&mut self) -> Result<Node, ParseError> {
        let first = self.pipe()?;
        match self.peek_kind() {
            Some(TokenKind::Semicolon) => {
                self.bump();
                if self.peek_kind() == Some(TokenKind::End) {
                    return Ok(first);
                }
                let rest = self.full()?;
                Ok(Node::Seq {
                    first: Box::new(first),
                    rest: Box::new(rest),
                })
            }
            Some(TokenKind::Ampersand) => {
                self.bump();
                let rest = if self.peek_kind() == Some(TokenKind::End) {
                    None
                } else {
                    Some(Box::new(self.full()?))
                };
                Ok(Node::Background {
                    first: Box::new(first),
                    rest,
                })
            }
            _ => Ok(first),
        }
    }

    fn pipe(&mut self) -> Result<Node, ParseError> {
        let producer = self.cmd()?;
        if self.peek_kind() != Some(TokenKind::Pipe) {
            return Ok(producer);
        }
        self.bump();
        if self.peek_kind() != Some(TokenKind::Atom) {
            return Err(self.error("expected command after '|'"));
        }
        let consumer = self.pipe()?;
        Ok(Node::Pipe {
            producer: Box::new(producer),
            consumer: Box::new(consumer),
        })
    }

    fn cmd(&mut self) -> Result<Node, ParseError> {
        let command = self.simple()?;
        let direction = match self.peek_kind() {
            Some(TokenKind::Greater) => Direction::Out,
            Some(TokenKind::Lesser) => Direction::In,
            _ => return Ok(Node::Cmd(command)),
        };
        self.bump();
        let target = self.expect_atom("expected file name after redirection")?;
        Ok(Node::Redirect {
            direction,
            target,
            command,
        })
    }

    fn simple(&mut self) -> Result<Command, ParseError> {
        let mut words = vec![self.expect_atom("expected command word")?];
        while let Some(tok) = self.peek().filter(|t| t.kind == TokenKind::Atom) {
            self.pos += 1;
            words.push(tok);
        }
        Ok(Command { words })
    }
}
