use std::env;
use std::io::Write;
use std::os::unix::ffi::OsStringExt;

use crate::builtins::{Builtin, BuiltinIo, Flow};
use crate::exec::Status;

/// Print the working directory followed by a newline.
pub struct Pwd;

impl Builtin for Pwd {
    fn run(&self, args: &[&[u8]], io: &mut BuiltinIo<'_>) -> Flow {
        if !args.is_empty() {
            let _ = writeln!(io.err, "pwd: too many arguments");
            return Flow::Continue(Status::FAILURE);
        }
        match env::current_dir() {
            Ok(dir) => {
                let mut line = dir.into_os_string().into_vec();
                line.push(b'\n');
                let _ = io.out.write_all(&line);
                Flow::Continue(Status::SUCCESS)
            }
            Err(e) => {
                let _ = writeln!(io.err, "pwd: {e}");
                Flow::Continue(Status::FAILURE)
            }
        }
    }
}
