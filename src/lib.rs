//! shcore: an embeddable command-shell core.
//!
//! Takes a single command line (words, quotes, `|`, `<`, `>`, `;`, `&`),
//! lexes and parses it into a syntax tree and runs that tree against the
//! host, either with inherited stdio or with stdio captured into buffers or
//! streamed to callbacks.
//!
//! # Architecture
//!
//! - **[`parse`]**: byte-span lexer, recursive-descent parser, AST types.
//! - **[`exec`]**: tree-walking executor, execution context, child status.
//! - **[`builtins`]**: `cd`, `pwd` and `exit`, run inside the shell process.
//! - **[`capture`]**: the I/O-control record and the fork-and-poll capture loop.
//! - **[`config`]**: embedded defaults + user overlay merge.
//! - **[`logging`]**: logger setup for the `shcore` binary.
//!
//! ```no_run
//! let mut io = shcore::IoControl::new();
//! let status = shcore::run(b"echo hello | tr a-z A-Z", Some(&mut io))?;
//! assert!(status.success());
//! assert_eq!(io.stdout(), b"HELLO\n");
//! # Ok::<(), shcore::Error>(())
//! ```

#[cfg(not(unix))]
compile_error!("shcore supports unix hosts only");

/// Built-in commands and their registry.
pub mod builtins;
/// Captured execution: `IoControl`, options and the poll loop.
pub mod capture;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Library error type and status codes.
pub mod error;
/// Executor, execution context and child status.
pub mod exec;
/// Logger initialisation.
pub mod logging;
/// Lexer, parser and syntax tree.
pub mod parse;

pub use capture::{IoControl, Options};
pub use error::Error;
pub use exec::{Executor, Status};

/// Run `command` with default [`Options`].
///
/// With `io` set to `None` the command runs in this process with inherited
/// stdio. With `Some`, it runs in a forked child whose stdin is fed from the
/// record's input blob and whose stdout and stderr are captured or streamed.
pub fn run(command: &[u8], io: Option<&mut IoControl<'_>>) -> Result<Status, Error> {
    run_with(command, io, &Options::default())
}

/// Like [`run`], with explicit tuning options.
pub fn run_with(command: &[u8], io: Option<&mut IoControl<'_>>, options: &Options) -> Result<Status, Error> {
    let script = parse::parse_script(command)?;
    match io {
        None => {
            let mut executor = Executor::new(script.source)?;
            executor.execute(&script.root)
        }
        Some(io) => capture::poll::run(script, io, options),
    }
}

/// Like [`run`], flattened into a single integer.
///
/// A child's exit status is returned as is (`>= 0`), a signalled child
/// gives `-1`, and library failures give the negative codes on [`Error`].
pub fn run_code(command: &[u8], io: Option<&mut IoControl<'_>>) -> i32 {
    match run(command, io) {
        Ok(status) => status.code(),
        Err(e) => {
            log::debug!("run failed: {e}");
            e.code()
        }
    }
}

/// Format a command line and [`run`] it.
///
/// ```no_run
/// let name = "world";
/// let status = shcore::run_fmt!(None, "echo hello {name}")?;
/// # Ok::<(), shcore::Error>(())
/// ```
#[macro_export]
macro_rules! run_fmt {
    ($io:expr, $($arg:tt)*) => {
        $crate::run(::std::format!($($arg)*).as_bytes(), $io)
    };
}
