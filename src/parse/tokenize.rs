//! UTF-8 aware lexer: a single forward pass over the source bytes.
//!
//! The cursor decodes one code point at a time from its lead byte. Malformed
//! or truncated sequences decode as U+FFFD and never stop the scan; they can
//! only ever be part of an atom.

use super::types::{Token, TokenKind};

/// Why lexing stopped, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{reason} at byte {offset}")]
pub struct LexError {
    pub reason: &'static str,
    pub offset: usize,
}

/// Lexer output: tokens ending in `End` or `Error`, plus the error record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub tokens: Vec<Token>,
    pub error: Option<LexError>,
}

impl Tokens {
    pub fn into_result(self) -> Result<Vec<Token>, LexError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.tokens),
        }
    }
}

const REPLACEMENT: u32 = 0xFFFD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BetweenTokens,
    InAtom,
    /// Holds the opening quote byte.
    InQuote(u8),
    Done,
    Error,
}

struct Lexer<'a> {
    src: &'a [u8],
    /// Offset of the current code point.
    pos: usize,
    /// Current decoded code point.
    cp: u32,
    /// Byte length of the current code point (1-6, 0 at end of input).
    cp_len: usize,
    /// Start of the token being built.
    start: usize,
    state: State,
    error: Option<LexError>,
}

/// Tokenize `src`. The token vector always ends with `End` or `Error`.
pub fn tokenize(src: &[u8]) -> Tokens {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::with_capacity(16);
    loop {
        let tok = lexer.next_token();
        tokens.push(tok);
        if matches!(tok.kind, TokenKind::End | TokenKind::Error) {
            break;
        }
    }
    log::trace!("tokenized {} bytes into {} tokens", src.len(), tokens.len());
    Tokens {
        tokens,
        error: lexer.error,
    }
}

/// Decode the code point starting at `bytes[0]`.
///
/// Returns the code point and how many bytes it spans. Continuation bytes in
/// lead position, bytes 0xFE/0xFF, truncated sequences and sequences broken
/// by a non-continuation byte all decode as U+FFFD spanning the bytes that
/// were consumed (at least one).
fn decode(bytes: &[u8]) -> (u32, usize) {
    let Some(&lead) = bytes.first() else {
        return (0, 0);
    };
    let (want, init) = match lead {
        0x00..=0x7F => return (u32::from(lead), 1),
        0xC0..=0xDF => (2, u32::from(lead & 0x1F)),
        0xE0..=0xEF => (3, u32::from(lead & 0x0F)),
        0xF0..=0xF7 => (4, u32::from(lead & 0x07)),
        0xF8..=0xFB => (5, u32::from(lead & 0x03)),
        0xFC..=0xFD => (6, u32::from(lead & 0x01)),
        _ => return (REPLACEMENT, 1),
    };
    let mut cp = init;
    for i in 1..want {
        match bytes.get(i) {
            Some(&b) if b & 0xC0 == 0x80 => cp = (cp << 6) | u32::from(b & 0x3F),
            _ => return (REPLACEMENT, i),
        }
    }
    (cp, want)
}

fn is_space(cp: u32) -> bool {
    matches!(cp, 0x20 | 0x09 | 0x0B | 0x0D | 0x0A | 0x0C)
}

fn metachar(cp: u32) -> Option<TokenKind> {
    match cp {
        0x7C => Some(TokenKind::Pipe),
        0x26 => Some(TokenKind::Ampersand),
        0x3E => Some(TokenKind::Greater),
        0x3C => Some(TokenKind::Lesser),
        0x3B => Some(TokenKind::Semicolon),
        _ => None,
    }
}

impl<'a> Lexer<'a> {
    fn new(src: &'a [u8]) -> Self {
        let (cp, cp_len) = decode(src);
        Self {
            src,
            pos: 0,
            cp,
            cp_len,
            start: 0,
            state: State::BetweenTokens,
            error: None,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn advance(&mut self) {
        self.pos += self.cp_len;
        let (cp, len) = decode(&self.src[self.pos.min(self.src.len())..]);
        self.cp = cp;
        self.cp_len = len;
    }

    fn emit(&mut self, kind: TokenKind, begin: usize, len: usize) -> Token {
        self.state = State::BetweenTokens;
        Token::new(kind, begin, len)
    }

    fn next_token(&mut self) -> Token {
        loop {
            match self.state {
                State::BetweenTokens => {
                    if self.at_end() {
                        self.state = State::Done;
                    } else if is_space(self.cp) {
                        self.advance();
                    } else if let Some(kind) = metachar(self.cp) {
                        let (begin, len) = (self.pos, self.cp_len);
                        self.advance();
                        return self.emit(kind, begin, len);
                    } else if self.cp == u32::from(b'"') || self.cp == u32::from(b'\'') {
                        let quote = self.src[self.pos];
                        self.advance();
                        self.start = self.pos;
                        self.state = State::InQuote(quote);
                    } else {
                        self.start = self.pos;
                        self.state = State::InAtom;
                    }
                }
                State::InAtom => {
                    if self.at_end() || is_space(self.cp) || metachar(self.cp).is_some() {
                        return self.emit(TokenKind::Atom, self.start, self.pos - self.start);
                    }
                    self.advance();
                }
                State::InQuote(quote) => {
                    if self.at_end() {
                        self.error = Some(LexError {
                            reason: "unterminated quote",
                            offset: self.pos,
                        });
                        self.state = State::Error;
                    } else if self.cp == u32::from(quote) {
                        let (begin, len) = (self.start, self.pos - self.start);
                        self.advance();
                        return self.emit(TokenKind::Atom, begin, len);
                    } else {
                        self.advance();
                    }
                }
                State::Done => return Token::new(TokenKind::End, self.src.len(), 0),
                State::Error => {
                    let offset = self.error.map_or(self.pos, |e| e.offset);
                    return Token::new(TokenKind::Error, offset, 0);
                }
            }
        }
    }
}
