//! Built-in commands run inside the shell process.
//!
//! The set is fixed: `cd`, `pwd` and `exit`. Built-ins ignore any pipe or
//! redirection wiring and always talk to the shell's own stdout/stderr.

/// `cd [dir]`
pub mod cd;
/// `exit`
pub mod exit;
/// `pwd`
pub mod pwd;

use std::collections::HashMap;
use std::io::Write;

use crate::exec::Status;

/// What the executor should do after a built-in returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep executing; this is the built-in's status.
    Continue(Status),
    /// Stop the script; the call returns success.
    Exit,
}

/// Output handles for a built-in.
pub struct BuiltinIo<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

/// A command implemented in-process.
pub trait Builtin: Send + Sync {
    /// Run with `args` (not including the command name).
    fn run(&self, args: &[&[u8]], io: &mut BuiltinIo<'_>) -> Flow;
}

/// Built-ins keyed by command name.
pub struct BuiltinRegistry {
    builtins: HashMap<&'static str, Box<dyn Builtin>>,
}

impl BuiltinRegistry {
    /// The standard set: `cd`, `pwd`, `exit`.
    pub fn standard() -> Self {
        let mut builtins: HashMap<&'static str, Box<dyn Builtin>> = HashMap::new();
        builtins.insert("cd", Box::new(cd::Cd));
        builtins.insert("pwd", Box::new(pwd::Pwd));
        builtins.insert("exit", Box::new(exit::Exit));
        Self { builtins }
    }

    /// Look up a built-in by its exact name.
    pub fn get(&self, name: &[u8]) -> Option<&dyn Builtin> {
        let name = std::str::from_utf8(name).ok()?;
        self.builtins.get(name).map(|b| b.as_ref())
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
