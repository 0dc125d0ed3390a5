use std::env;
use std::ffi::OsStr;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::builtins::{Builtin, BuiltinIo, Flow};
use crate::exec::Status;

/// Change the working directory of the shell process.
///
/// No argument goes to `$HOME`; more than one argument is an error.
pub struct Cd;

impl Builtin for Cd {
    fn run(&self, args: &[&[u8]], io: &mut BuiltinIo<'_>) -> Flow {
        let target = match args {
            [] => match env::var_os("HOME") {
                Some(home) => PathBuf::from(home),
                None => {
                    let _ = writeln!(io.err, "cd: HOME not set");
                    return Flow::Continue(Status::FAILURE);
                }
            },
            [dir] => PathBuf::from(OsStr::from_bytes(dir)),
            _ => {
                let _ = writeln!(io.err, "cd: too many arguments");
                return Flow::Continue(Status::FAILURE);
            }
        };
        match env::set_current_dir(&target) {
            Ok(()) => {
                log::debug!("cd {}", target.display());
                Flow::Continue(Status::SUCCESS)
            }
            Err(e) => {
                let _ = writeln!(io.err, "cd: {}: {e}", target.display());
                Flow::Continue(Status::FAILURE)
            }
        }
    }
}
