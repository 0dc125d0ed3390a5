//! Captured execution: the I/O-control record and the loop that fills it.
//!
//! A captured call forks. The child runs the script with its stdio wired to
//! three pipes; the parent feeds the input blob into one and drains the other
//! two from a single readiness poll (see [`poll`]).

pub mod poll;

/// Default bound on a single read from an output pipe.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Tuning knobs for a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Upper bound on one read from the child's stdout or stderr.
    pub chunk_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Where one output stream goes.
enum Sink<'a> {
    /// Growing buffer. Always ends with exactly one NUL that is not part of
    /// the captured bytes.
    Buffer(Vec<u8>),
    Callback(Box<dyn FnMut(&[u8]) + 'a>),
}

impl Sink<'_> {
    fn buffer() -> Self {
        Sink::Buffer(vec![0])
    }

    /// Drop previously captured bytes.
    fn reset(&mut self) {
        if let Sink::Buffer(buf) = self {
            buf.clear();
            buf.push(0);
        }
    }

    fn deliver(&mut self, chunk: &[u8]) {
        match self {
            Sink::Buffer(buf) => {
                buf.pop();
                buf.extend_from_slice(chunk);
                buf.push(0);
            }
            Sink::Callback(f) => f(chunk),
        }
    }

    fn captured(&self) -> &[u8] {
        match self {
            Sink::Buffer(buf) => &buf[..buf.len() - 1],
            Sink::Callback(_) => &[],
        }
    }

    fn nul_terminated(&self) -> Option<&[u8]> {
        match self {
            Sink::Buffer(buf) => Some(buf),
            Sink::Callback(_) => None,
        }
    }
}

/// Caller-side record for a captured call.
///
/// Holds the bytes to feed to the child's stdin and, per output stream,
/// either a capture buffer (the default) or a streaming callback. Installing
/// a callback replaces the buffer for that stream, so the buffer accessors
/// return nothing for it.
///
/// ```no_run
/// let mut io = shcore::IoControl::new().input(b"ping");
/// let status = shcore::run(b"cat", Some(&mut io)).unwrap();
/// assert!(status.success());
/// assert_eq!(io.stdout(), b"ping");
/// ```
pub struct IoControl<'a> {
    input: &'a [u8],
    stdout: Sink<'a>,
    stderr: Sink<'a>,
}

impl<'a> IoControl<'a> {
    /// Capture both streams; no input.
    pub fn new() -> Self {
        Self {
            input: &[],
            stdout: Sink::buffer(),
            stderr: Sink::buffer(),
        }
    }

    /// Bytes written to the child's stdin. An empty blob closes it at once.
    pub fn input(mut self, input: &'a [u8]) -> Self {
        self.input = input;
        self
    }

    /// Stream stdout chunks to `f` as they arrive instead of capturing them.
    pub fn on_stdout(mut self, f: impl FnMut(&[u8]) + 'a) -> Self {
        self.stdout = Sink::Callback(Box::new(f));
        self
    }

    /// Stream stderr chunks to `f` as they arrive instead of capturing them.
    pub fn on_stderr(mut self, f: impl FnMut(&[u8]) + 'a) -> Self {
        self.stderr = Sink::Callback(Box::new(f));
        self
    }

    /// Captured stdout, without the terminating NUL. Empty when streamed.
    pub fn stdout(&self) -> &[u8] {
        self.stdout.captured()
    }

    /// Captured stderr, without the terminating NUL. Empty when streamed.
    pub fn stderr(&self) -> &[u8] {
        self.stderr.captured()
    }

    pub fn stdout_len(&self) -> usize {
        self.stdout().len()
    }

    pub fn stderr_len(&self) -> usize {
        self.stderr().len()
    }

    /// Captured stdout including its single terminating NUL, or `None` when
    /// stdout is streamed to a callback.
    pub fn stdout_nul_terminated(&self) -> Option<&[u8]> {
        self.stdout.nul_terminated()
    }

    /// Captured stderr including its single terminating NUL, or `None` when
    /// stderr is streamed to a callback.
    pub fn stderr_nul_terminated(&self) -> Option<&[u8]> {
        self.stderr.nul_terminated()
    }

    fn reset(&mut self) {
        self.stdout.reset();
        self.stderr.reset();
    }
}

impl Default for IoControl<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_empty_and_terminated() {
        let io = IoControl::new();
        assert!(io.stdout().is_empty());
        assert_eq!(io.stdout_len(), 0);
        assert_eq!(io.stdout_nul_terminated(), Some(&b"\0"[..]));
        assert_eq!(io.stderr_nul_terminated(), Some(&b"\0"[..]));
    }

    #[test]
    fn buffer_keeps_single_trailing_nul() {
        let mut sink = Sink::buffer();
        sink.deliver(b"hel");
        sink.deliver(b"lo");
        assert_eq!(sink.captured(), b"hello");
        assert_eq!(sink.nul_terminated(), Some(&b"hello\0"[..]));
    }

    #[test]
    fn buffer_holds_interior_nul_bytes() {
        let mut sink = Sink::buffer();
        sink.deliver(b"a\0b");
        assert_eq!(sink.captured(), b"a\0b");
        assert_eq!(sink.nul_terminated(), Some(&b"a\0b\0"[..]));
    }

    #[test]
    fn reset_clears_previous_capture() {
        let mut io = IoControl::new();
        io.stdout.deliver(b"old");
        io.stderr.deliver(b"old");
        io.reset();
        assert!(io.stdout().is_empty());
        assert!(io.stderr().is_empty());
        assert_eq!(io.stdout_nul_terminated(), Some(&b"\0"[..]));
    }

    #[test]
    fn callback_replaces_buffer() {
        let mut seen = Vec::new();
        {
            let mut io = IoControl::new().on_stdout(|chunk| seen.extend_from_slice(chunk));
            io.stdout.deliver(b"abc");
            io.stdout.deliver(b"def");
            assert!(io.stdout().is_empty());
            assert_eq!(io.stdout_nul_terminated(), None);
            assert_eq!(io.stderr_nul_terminated(), Some(&b"\0"[..]));
        }
        assert_eq!(seen, b"abcdef");
    }

    #[test]
    fn default_options() {
        assert_eq!(Options::default().chunk_size, 4096);
    }
}
