use std::os::fd::BorrowedFd;

/// Stdio wiring for the next command the executor starts.
///
/// Passed down the walk by value: a node that rewires a stream hands its
/// children a modified copy, and the caller's copy is untouched when the
/// child returns. `None` means the stream is inherited.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context<'f> {
    pub input: Option<BorrowedFd<'f>>,
    pub output: Option<BorrowedFd<'f>>,
    /// Set only while executing the left side of a `&`.
    pub background: bool,
}

impl<'f> Context<'f> {
    pub fn with_input(self, fd: BorrowedFd<'f>) -> Self {
        Self {
            input: Some(fd),
            ..self
        }
    }

    pub fn with_output(self, fd: BorrowedFd<'f>) -> Self {
        Self {
            output: Some(fd),
            ..self
        }
    }

    pub fn in_background(self) -> Self {
        Self {
            background: true,
            ..self
        }
    }
}
