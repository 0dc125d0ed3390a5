pub mod shell;
pub mod tokenize;
pub mod types;

pub use shell::{ParseError, parse};
pub use tokenize::{LexError, Tokens, tokenize};
pub use types::{Command, Direction, Node, NodeKind, Script, Token, TokenKind};

use crate::error::Error;

/// Lex and parse a command line.
///
/// Blank input is [`Error::Empty`]; lexer and grammar failures keep their
/// own variants so callers can tell them apart.
pub fn parse_script(source: &[u8]) -> Result<Script<'_>, Error> {
    let tokens = tokenize(source).into_result()?;
    if tokens.first().is_some_and(|t| t.kind == TokenKind::End) {
        return Err(Error::Empty);
    }
    let root = parse(&tokens)?;
    let script = Script { source, root };
    log::debug!("parsed {script}");
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_is_empty() {
        assert!(matches!(parse_script(b"  \n"), Err(Error::Empty)));
    }

    #[test]
    fn unterminated_quote_is_tokenize_error() {
        let err = parse_script(b"echo 'oops").unwrap_err();
        assert_eq!(err.code(), Error::TOKENIZE);
    }

    #[test]
    fn grammar_failure_is_parse_error() {
        let err = parse_script(b"a |").unwrap_err();
        assert_eq!(err.code(), Error::PARSE);
    }

    #[test]
    fn accepted_script_renders() {
        let script = parse_script(b"echo one; echo two").unwrap();
        assert_eq!(script.render(), "(seq (cmd echo one) (cmd echo two))");
    }
}
