//! Fork-and-poll orchestration of a captured call.
//!
//! The parent makes its pipe ends non-blocking and services all three from
//! one `poll`: input is written as the child's stdin drains, output and error
//! are read in bounded chunks as they fill. Neither side can stall the other
//! on a full pipe.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, PipeReader, PipeWriter, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::panic::{self, AssertUnwindSafe};

use log::LevelFilter;
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, dup2, fork};

use super::{IoControl, Options, Sink};
use crate::error::Error;
use crate::exec::{Executor, Status};
use crate::parse::Script;

/// Exit code of the capture child when the script could not be started.
const CHILD_FAILED: i32 = 1;
/// Exit code of the capture child after a panic.
const CHILD_PANICKED: i32 = 101;

/// First descriptor number past stdin, stdout and stderr.
const STDIO_FDS: RawFd = 3;

/// Descriptors beyond this are not probed when no fd directory is available.
const FALLBACK_FD_LIMIT: RawFd = 1024;

#[derive(Debug, Clone, Copy)]
enum Slot {
    Stdout,
    Stderr,
    Stdin,
}

/// Run `script` in a forked child with captured stdio.
pub fn run(script: Script<'_>, io: &mut IoControl<'_>, options: &Options) -> Result<Status, Error> {
    io.reset();
    let (stdin_r, stdin_w) = stdio_pipe()?;
    let (stdout_r, stdout_w) = stdio_pipe()?;
    let (stderr_r, stderr_w) = stdio_pipe()?;

    // Buffered output would otherwise be flushed by both processes.
    let _ = io::stdout().flush();

    // SAFETY: the child only rewires descriptors and runs the parsed script,
    // then leaves through `_exit` without returning to the caller.
    let forked = unsafe { fork() }.map_err(|e| Error::Spawn(e.into()))?;
    match forked {
        ForkResult::Child => {
            drop((stdin_w, stdout_r, stderr_r));
            let code = child_main(&script, stdin_r, stdout_w, stderr_w);
            // SAFETY: skips exit handlers and buffers that belong to the parent.
            unsafe { nix::libc::_exit(code) }
        }
        ForkResult::Parent { child } => {
            drop(script);
            drop((stdin_r, stdout_w, stderr_w));
            log::debug!("capture child pid {child}");
            let failure = pump(io, stdin_w, stdout_r, stderr_r, options.chunk_size.max(1));
            collect(child, failure)
        }
    }
}

/// A pipe whose ends sit above the standard descriptors, so wiring them onto
/// 0, 1 and 2 in the child cannot clobber one another. A host that closed
/// one of its own standard streams would otherwise get it back from `pipe`.
fn stdio_pipe() -> Result<(PipeReader, PipeWriter), Error> {
    let (reader, writer) = io::pipe().map_err(Error::Pipe)?;
    let reader = lift(reader, STDIO_FDS).map_err(Error::Pipe)?;
    let writer = lift(writer, STDIO_FDS).map_err(Error::Pipe)?;
    Ok((reader, writer))
}

/// Move `end` to a descriptor number of at least `floor`.
fn lift<T: AsFd + From<OwnedFd>>(end: T, floor: RawFd) -> io::Result<T> {
    let fd = end.as_fd().as_raw_fd();
    if fd >= floor {
        return Ok(end);
    }
    let moved = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(floor))?;
    // SAFETY: `moved` is a fresh descriptor returned by fcntl and owned by nobody else.
    Ok(T::from(unsafe { OwnedFd::from_raw_fd(moved) }))
}

fn child_main(script: &Script<'_>, stdin: PipeReader, stdout: PipeWriter, stderr: PipeWriter) -> i32 {
    // Host loggers must not write into the captured stderr.
    log::set_max_level(LevelFilter::Off);

    let wired = dup2(stdin.as_raw_fd(), 0)
        .and_then(|_| dup2(stdout.as_raw_fd(), 1))
        .and_then(|_| dup2(stderr.as_raw_fd(), 2));
    drop((stdin, stdout, stderr));
    if let Err(e) = wired {
        report(format_args!("cannot wire stdio: {e}"));
        return CHILD_FAILED;
    }
    close_inherited_fds();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut executor = Executor::new(script.source)?;
        executor.execute(&script.root)
    }));
    match outcome {
        Ok(Ok(status)) => exit_code(status),
        Ok(Err(e)) => {
            report(e);
            CHILD_FAILED
        }
        Err(_) => CHILD_PANICKED,
    }
}

fn report(message: impl Display) {
    if let Ok(fd) = io::stderr().as_fd().try_clone_to_owned() {
        let _ = writeln!(File::from(fd), "shcore: {message}");
    }
}

/// Close every descriptor above stderr that the fork copied from the parent,
/// including pipe ends of unrelated calls running on other threads.
fn close_inherited_fds() {
    let listed = ["/proc/self/fd", "/dev/fd"].iter().find_map(|dir| {
        let entries = std::fs::read_dir(dir).ok()?;
        Some(
            entries
                .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse::<RawFd>().ok())
                .collect::<Vec<_>>(),
        )
    });
    let fds = listed.unwrap_or_else(|| (STDIO_FDS..FALLBACK_FD_LIMIT).collect());
    for fd in fds.into_iter().filter(|&fd| fd >= STDIO_FDS) {
        let _ = close(fd);
    }
}

/// Exit code that makes the parent observe `status`.
///
/// A signalled status is re-raised with the default disposition so the
/// parent sees the same signal; `128 + signo` is the fallback when the
/// signal does not terminate.
fn exit_code(status: Status) -> i32 {
    match status {
        Status::Exited(code) => code,
        Status::Signaled(signo) => {
            if let Ok(sig) = Signal::try_from(signo) {
                // SAFETY: installs the default disposition, no handler code runs.
                let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
                let _ = signal::raise(sig);
            }
            128 + signo
        }
    }
}

fn set_nonblocking(fd: BorrowedFd<'_>) -> nix::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL)?);
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Feed stdin and drain stdout/stderr until both outputs reach end-of-file.
///
/// Returns the first fatal I/O error, if any. Transient errors are retried.
fn pump(
    io: &mut IoControl<'_>,
    stdin: PipeWriter,
    stdout: PipeReader,
    stderr: PipeReader,
    chunk_size: usize,
) -> Option<io::Error> {
    for fd in [stdin.as_fd(), stdout.as_fd(), stderr.as_fd()] {
        if let Err(e) = set_nonblocking(fd) {
            log::warn!("cannot make capture pipe non-blocking: {e}");
            return Some(e.into());
        }
    }

    let input = io.input;
    let mut written = 0;
    let mut stdin = (!input.is_empty()).then_some(stdin);
    let mut stdout = Some(stdout);
    let mut stderr = Some(stderr);
    let mut chunk = vec![0u8; chunk_size];
    let mut failure = None;

    while stdout.is_some() || stderr.is_some() {
        let mut slots = Vec::with_capacity(3);
        let mut fds = Vec::with_capacity(3);
        if let Some(r) = &stdout {
            slots.push(Slot::Stdout);
            fds.push(PollFd::new(r.as_fd(), PollFlags::POLLIN));
        }
        if let Some(r) = &stderr {
            slots.push(Slot::Stderr);
            fds.push(PollFd::new(r.as_fd(), PollFlags::POLLIN));
        }
        if let Some(w) = &stdin {
            slots.push(Slot::Stdin);
            fds.push(PollFd::new(w.as_fd(), PollFlags::POLLOUT));
        }

        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR | Errno::EAGAIN) => continue,
            Err(e) => {
                log::warn!("poll on capture pipes failed: {e}");
                failure = Some(e.into());
                break;
            }
        }
        let ready: Vec<Slot> = slots
            .into_iter()
            .zip(&fds)
            .filter(|(_, fd)| fd.revents().is_some_and(|r| !r.is_empty()))
            .map(|(slot, _)| slot)
            .collect();
        drop(fds);

        for slot in ready {
            match slot {
                Slot::Stdout => read_ready(&mut stdout, &mut io.stdout, &mut chunk, &mut failure, "stdout"),
                Slot::Stderr => read_ready(&mut stderr, &mut io.stderr, &mut chunk, &mut failure, "stderr"),
                Slot::Stdin => write_ready(&mut stdin, input, &mut written),
            }
        }
    }

    if stdin.is_some() {
        log::debug!("child finished after reading {written} of {} input bytes", input.len());
    }
    failure
}

fn read_ready(
    pipe: &mut Option<PipeReader>,
    sink: &mut Sink<'_>,
    chunk: &mut [u8],
    failure: &mut Option<io::Error>,
    name: &str,
) {
    let Some(reader) = pipe.as_mut() else {
        return;
    };
    match reader.read(chunk) {
        Ok(0) => {
            log::trace!("captured {name} reached end of file");
            *pipe = None;
        }
        Ok(n) => {
            log::trace!("captured {n} bytes of {name}");
            sink.deliver(&chunk[..n]);
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {}
        Err(e) => {
            log::warn!("reading captured {name} failed: {e}");
            *pipe = None;
            failure.get_or_insert(e);
        }
    }
}

fn write_ready(pipe: &mut Option<PipeWriter>, input: &[u8], written: &mut usize) {
    let Some(writer) = pipe.as_mut() else {
        return;
    };
    match writer.write(&input[*written..]) {
        Ok(n) => {
            *written += n;
            if *written >= input.len() {
                log::trace!("wrote all {} input bytes", input.len());
                *pipe = None;
            }
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {}
        Err(e) => {
            log::warn!(
                "writing child stdin failed after {} of {} bytes: {e}",
                *written,
                input.len()
            );
            *pipe = None;
        }
    }
}

/// Wait for the capture child. Its status wins over a capture failure; the
/// read error only surfaces when no status can be had.
fn collect(child: Pid, failure: Option<io::Error>) -> Result<Status, Error> {
    let status = loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, code)) => break Status::Exited(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => break Status::Signaled(sig as i32),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => {
                return Err(match failure {
                    Some(read) => Error::Read(read),
                    None => Error::Wait(e.into()),
                });
            }
        }
    };
    if let Some(e) = failure {
        log::warn!("capture incomplete ({e}); reporting child {status}");
    }
    log::debug!("capture child pid {child} finished: {status}");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_pipe_end_is_moved_up() {
        let (reader, writer) = io::pipe().unwrap();
        let mut reader = lift(reader, 100).unwrap();
        let mut writer = lift(writer, 100).unwrap();
        assert!(reader.as_raw_fd() >= 100);
        assert!(writer.as_raw_fd() >= 100);

        writer.write_all(b"moved").unwrap();
        drop(writer);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"moved");
    }

    #[test]
    fn high_pipe_end_is_kept() {
        let (reader, _writer) = io::pipe().unwrap();
        let fd = reader.as_raw_fd();
        let reader = lift(reader, 0).unwrap();
        assert_eq!(reader.as_raw_fd(), fd);
    }

    #[test]
    fn stdio_pipe_ends_avoid_standard_descriptors() {
        let (reader, writer) = stdio_pipe().unwrap();
        assert!(reader.as_raw_fd() >= STDIO_FDS);
        assert!(writer.as_raw_fd() >= STDIO_FDS);
    }

    #[test]
    fn exited_status_is_exit_code() {
        assert_eq!(exit_code(Status::Exited(4)), 4);
    }
}
