use crate::builtins::{Builtin, BuiltinIo, Flow};

/// End the script. Arguments are ignored and the status is always 0.
pub struct Exit;

impl Builtin for Exit {
    fn run(&self, _args: &[&[u8]], _io: &mut BuiltinIo<'_>) -> Flow {
        Flow::Exit
    }
}
