//! Types produced by the lexer and parser and consumed by the executor.

use std::fmt;

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Lexing stopped; the reason is in [`Tokens::error`](super::Tokens::error).
    Error,
    /// End of input.
    End,
    /// A bare word or the interior of a quoted literal.
    Atom,
    /// `|`
    Pipe,
    /// `&`
    Ampersand,
    /// `>`
    Greater,
    /// `<`
    Lesser,
    /// `;`
    Semicolon,
}

impl TokenKind {
    /// Short name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Error => "error",
            TokenKind::End => "end of input",
            TokenKind::Atom => "word",
            TokenKind::Pipe => "|",
            TokenKind::Ampersand => "&",
            TokenKind::Greater => ">",
            TokenKind::Lesser => "<",
            TokenKind::Semicolon => ";",
        }
    }
}

/// A token: its kind plus a byte span into the source buffer.
///
/// Tokens never copy source bytes. For an atom that came from a quoted
/// literal the span covers the interior only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first byte.
    pub begin: usize,
    /// Byte count.
    pub len: usize,
}

impl Token {
    pub fn new(kind: TokenKind, begin: usize, len: usize) -> Self {
        Self { kind, begin, len }
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> usize {
        self.begin + self.len
    }

    /// The bytes this token covers in `source`.
    pub fn bytes<'s>(&self, source: &'s [u8]) -> &'s [u8] {
        &source[self.begin..self.end()]
    }
}

/// Kind of an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Cmd,
    Seq,
    Background,
    Pipe,
    RedirIn,
    RedirOut,
}

/// Which standard stream a redirection replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `< file`: stdin, opened read-only.
    In,
    /// `> file`: stdout, created or truncated.
    Out,
}

/// A simple command: program name followed by its arguments.
///
/// Always holds at least one word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub words: Vec<Token>,
}

impl Command {
    /// The argument vector, `argv[0]` first.
    pub fn argv<'s>(&self, source: &'s [u8]) -> Vec<&'s [u8]> {
        self.words.iter().map(|w| w.bytes(source)).collect()
    }
}

/// A node of the syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `word word ...`
    Cmd(Command),
    /// `command > target` or `command < target`.
    Redirect {
        direction: Direction,
        target: Token,
        command: Command,
    },
    /// `producer | consumer`; the consumer is another pipe, a command or a redirect.
    Pipe {
        producer: Box<Node>,
        consumer: Box<Node>,
    },
    /// `first ; rest`
    Seq { first: Box<Node>, rest: Box<Node> },
    /// `first & rest`, or a trailing `first &` when `rest` is `None`.
    Background {
        first: Box<Node>,
        rest: Option<Box<Node>>,
    },
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Cmd(_) => NodeKind::Cmd,
            Node::Redirect {
                direction: Direction::In,
                ..
            } => NodeKind::RedirIn,
            Node::Redirect {
                direction: Direction::Out,
                ..
            } => NodeKind::RedirOut,
            Node::Pipe { .. } => NodeKind::Pipe,
            Node::Seq { .. } => NodeKind::Seq,
            Node::Background { .. } => NodeKind::Background,
        }
    }
}

/// A parsed command line: the source it borrows from and its tree.
#[derive(Debug, Clone)]
pub struct Script<'s> {
    pub source: &'s [u8],
    pub root: Node,
}

impl Script<'_> {
    /// Render the tree as an S-expression, e.g. `(pipe (cmd ls) (cmd wc -l))`.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
        match node {
            Node::Cmd(cmd) => self.write_command(f, cmd),
            Node::Redirect {
                direction,
                target,
                command,
            } => {
                let op = match direction {
                    Direction::In => "<",
                    Direction::Out => ">",
                };
                write!(
                    f,
                    "(redir{op} {} ",
                    String::from_utf8_lossy(target.bytes(self.source))
                )?;
                self.write_command(f, command)?;
                f.write_str(")")
            }
            Node::Pipe { producer, consumer } => self.write_pair(f, "pipe", producer, Some(consumer)),
            Node::Seq { first, rest } => self.write_pair(f, "seq", first, Some(rest)),
            Node::Background { first, rest } => self.write_pair(f, "bg", first, rest.as_deref()),
        }
    }

    fn write_pair(
        &self,
        f: &mut fmt::Formatter<'_>,
        tag: &str,
        left: &Node,
        right: Option<&Node>,
    ) -> fmt::Result {
        write!(f, "({tag} ")?;
        self.write_node(f, left)?;
        if let Some(right) = right {
            f.write_str(" ")?;
            self.write_node(f, right)?;
        }
        f.write_str(")")
    }

    fn write_command(&self, f: &mut fmt::Formatter<'_>, cmd: &Command) -> fmt::Result {
        f.write_str("(cmd")?;
        for word in cmd.argv(self.source) {
            write!(f, " {}", String::from_utf8_lossy(word))?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for Script<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bytes_slice_source() {
        let src = b"echo hello";
        let tok = Token::new(TokenKind::Atom, 5, 5);
        assert_eq!(tok.bytes(src), b"hello");
        assert_eq!(tok.end(), 10);
    }

    #[test]
    fn command_argv_in_order() {
        let src = b"ls -la /tmp";
        let cmd = Command {
            words: vec![
                Token::new(TokenKind::Atom, 0, 2),
                Token::new(TokenKind::Atom, 3, 3),
                Token::new(TokenKind::Atom, 7, 4),
            ],
        };
        assert_eq!(cmd.argv(src), vec![&b"ls"[..], b"-la", b"/tmp"]);
    }

    #[test]
    fn redirect_kind_follows_direction() {
        let cmd = Command {
            words: vec![Token::new(TokenKind::Atom, 0, 3)],
        };
        let node = Node::Redirect {
            direction: Direction::In,
            target: Token::new(TokenKind::Atom, 6, 1),
            command: cmd,
        };
        assert_eq!(node.kind(), NodeKind::RedirIn);
    }

    #[test]
    fn render_trailing_background() {
        let src = b"sleep 1 &";
        let script = Script {
            source: src,
            root: Node::Background {
                first: Box::new(Node::Cmd(Command {
                    words: vec![
                        Token::new(TokenKind::Atom, 0, 5),
                        Token::new(TokenKind::Atom, 6, 1),
                    ],
                })),
                rest: None,
            },
        };
        assert_eq!(script.render(), "(bg (cmd sleep 1))");
    }
}
