//! Tree-walking executor.
//!
//! Walks a parsed [`Script`](crate::parse::Script), wiring pipes and
//! redirections through a [`Context`] passed down by value, running built-ins
//! in-process and everything else as child processes.

pub mod context;
pub mod status;

pub use context::Context;
pub use status::Status;

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{self, Child, Stdio};

use crate::builtins::{BuiltinIo, BuiltinRegistry, Flow};
use crate::error::Error;
use crate::parse::{Command, Direction, Node, Token};

/// A stage that has been started but not necessarily finished.
enum Launched {
    /// Built-ins, failed redirections and unrunnable programs finish at launch.
    Done(Status),
    Running(Child),
}

/// Executes syntax trees against the host.
///
/// Built-ins and diagnostics write to duplicates of the process's stdout and
/// stderr taken at construction time, unbuffered.
pub struct Executor<'s> {
    source: &'s [u8],
    builtins: BuiltinRegistry,
    out: File,
    err: File,
    /// Background children not yet reaped.
    background: Vec<Child>,
    /// Set by the `exit` built-in; the rest of the script is skipped.
    exited: bool,
}

impl<'s> Executor<'s> {
    /// Create an executor for trees whose tokens point into `source`.
    pub fn new(source: &'s [u8]) -> Result<Self, Error> {
        let out = io::stdout().as_fd().try_clone_to_owned().map_err(Error::Pipe)?;
        let err = io::stderr().as_fd().try_clone_to_owned().map_err(Error::Pipe)?;
        Ok(Self {
            source,
            builtins: BuiltinRegistry::standard(),
            out: File::from(out),
            err: File::from(err),
            background: Vec::new(),
            exited: false,
        })
    }

    /// Whether the `exit` built-in has run.
    pub fn exited(&self) -> bool {
        self.exited
    }

    /// Run `root` to completion and return the status of its last statement.
    pub fn execute(&mut self, root: &Node) -> Result<Status, Error> {
        let status = self.exec(root, Context::default())?;
        if self.exited {
            return Ok(Status::SUCCESS);
        }
        Ok(status)
    }

    fn exec(&mut self, node: &Node, ctx: Context<'_>) -> Result<Status, Error> {
        if self.exited {
            return Ok(Status::SUCCESS);
        }
        match node {
            Node::Seq { first, rest } => {
                self.exec(first, Context::default())?;
                self.reap_background();
                self.exec(rest, Context::default())
            }
            Node::Background { first, rest } => {
                self.exec(first, ctx.in_background())?;
                self.reap_background();
                match rest {
                    Some(rest) => self.exec(rest, ctx),
                    None => Ok(Status::SUCCESS),
                }
            }
            Node::Pipe { producer, consumer } => self.pipeline(producer, consumer, ctx),
            Node::Cmd(_) | Node::Redirect { .. } => {
                let launched = self.launch(node, ctx)?;
                self.finish(vec![launched], ctx.background)
            }
        }
    }

    /// Start every stage of `producer | consumer`, then wait for all of them.
    fn pipeline(&mut self, producer: &Node, consumer: &Node, ctx: Context<'_>) -> Result<Status, Error> {
        let mut launched = Vec::new();
        let setup = self.launch_stages(producer, consumer, ctx, &mut launched);
        let status = self.finish(launched, ctx.background);
        setup?;
        status
    }

    fn launch_stages(
        &mut self,
        producer: &Node,
        consumer: &Node,
        ctx: Context<'_>,
        launched: &mut Vec<Launched>,
    ) -> Result<(), Error> {
        let (reader, writer) = io::pipe().map_err(Error::Pipe)?;
        launched.push(self.launch(producer, ctx.with_output(writer.as_fd()))?);
        drop(writer);

        let mut upstream = reader;
        let mut rest = consumer;
        while let Node::Pipe { producer, consumer } = rest {
            // `exit` in an earlier stage ends the script here.
            if self.exited {
                return Ok(());
            }
            let (reader, writer) = io::pipe().map_err(Error::Pipe)?;
            let stage = ctx.with_input(upstream.as_fd()).with_output(writer.as_fd());
            launched.push(self.launch(producer, stage)?);
            drop(writer);
            upstream = reader;
            rest = consumer;
        }
        if !self.exited {
            launched.push(self.launch(rest, ctx.with_input(upstream.as_fd()))?);
        }
        Ok(())
    }

    /// Start a single stage without waiting for it.
    fn launch(&mut self, node: &Node, ctx: Context<'_>) -> Result<Launched, Error> {
        match node {
            Node::Cmd(command) => self.launch_command(command, ctx),
            Node::Redirect {
                direction,
                target,
                command,
            } => self.launch_redirect(*direction, target, command, ctx),
            other => self.exec(other, ctx).map(Launched::Done),
        }
    }

    fn launch_redirect(
        &mut self,
        direction: Direction,
        target: &Token,
        command: &Command,
        ctx: Context<'_>,
    ) -> Result<Launched, Error> {
        let path = Path::new(OsStr::from_bytes(target.bytes(self.source)));
        let opened = match direction {
            Direction::In => File::open(path),
            Direction::Out => OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o644)
                .open(path),
        };
        let file = match opened {
            Ok(file) => file,
            Err(e) => {
                self.diagnose(format_args!("{}: {e}", path.display()));
                return Ok(Launched::Done(Status::FAILURE));
            }
        };
        let ctx = match direction {
            Direction::In => ctx.with_input(file.as_fd()),
            Direction::Out => ctx.with_output(file.as_fd()),
        };
        self.launch_command(command, ctx)
    }

    fn launch_command(&mut self, command: &Command, ctx: Context<'_>) -> Result<Launched, Error> {
        let argv = command.argv(self.source);
        let Some((&name, args)) = argv.split_first() else {
            return Ok(Launched::Done(Status::SUCCESS));
        };

        if let Some(builtin) = self.builtins.get(name) {
            let mut io = BuiltinIo {
                out: &mut self.out,
                err: &mut self.err,
            };
            return Ok(Launched::Done(match builtin.run(args, &mut io) {
                Flow::Continue(status) => status,
                Flow::Exit => {
                    self.exited = true;
                    Status::SUCCESS
                }
            }));
        }

        let program = OsStr::from_bytes(name);
        let mut cmd = process::Command::new(program);
        cmd.args(args.iter().map(|a| OsStr::from_bytes(a)));
        match ctx.input {
            Some(fd) => {
                cmd.stdin(dup(fd)?);
            }
            None if ctx.background => {
                cmd.stdin(Stdio::null());
            }
            None => {}
        }
        if let Some(fd) = ctx.output {
            cmd.stdout(dup(fd)?);
        }
        if ctx.background {
            cmd.process_group(0);
        }

        match cmd.spawn() {
            Ok(child) => {
                log::debug!(
                    "spawned {} (pid {}){}",
                    program.to_string_lossy(),
                    child.id(),
                    if ctx.background { " in background" } else { "" }
                );
                Ok(Launched::Running(child))
            }
            Err(e) if is_resource_exhaustion(&e) => Err(Error::Spawn(e)),
            Err(e) => {
                let display = program.to_string_lossy();
                if e.kind() == io::ErrorKind::NotFound {
                    self.diagnose(format_args!("{display}: command not found"));
                    Ok(Launched::Done(Status::NOT_FOUND))
                } else {
                    self.diagnose(format_args!("{display}: {e}"));
                    Ok(Launched::Done(Status::NOT_EXECUTABLE))
                }
            }
        }
    }

    /// Wait for foreground stages (or park background ones) and return the
    /// status of the last stage.
    fn finish(&mut self, launched: Vec<Launched>, background: bool) -> Result<Status, Error> {
        let mut status = Status::SUCCESS;
        let mut failure = None;
        for stage in launched {
            status = match stage {
                Launched::Done(status) => status,
                Launched::Running(child) if background => {
                    self.background.push(child);
                    Status::SUCCESS
                }
                Launched::Running(mut child) => match child.wait() {
                    Ok(exit) => Status::from(exit),
                    Err(e) => {
                        log::warn!("wait for pid {} failed: {e}", child.id());
                        failure.get_or_insert(e);
                        Status::FAILURE
                    }
                },
            };
        }
        match failure {
            Some(e) => Err(Error::Wait(e)),
            None => Ok(status),
        }
    }

    /// Collect background children that have already exited.
    fn reap_background(&mut self) {
        self.background.retain_mut(|child| match child.try_wait() {
            Ok(Some(exit)) => {
                log::debug!("background pid {} finished: {}", child.id(), Status::from(exit));
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::warn!("try_wait for background pid {} failed: {e}", child.id());
                false
            }
        });
    }

    fn diagnose(&mut self, message: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.err, "{message}");
    }
}

impl Drop for Executor<'_> {
    /// Background children still running are waited for on a detached thread
    /// so they never linger as zombies.
    fn drop(&mut self) {
        self.reap_background();
        for mut child in self.background.drain(..) {
            let pid = child.id();
            let reaper = std::thread::Builder::new()
                .name(format!("shcore-reap-{pid}"))
                .spawn(move || {
                    let _ = child.wait();
                });
            if let Err(e) = reaper {
                log::warn!("could not start reaper for background pid {pid}: {e}");
            }
        }
    }
}

fn dup(fd: BorrowedFd<'_>) -> Result<Stdio, Error> {
    fd.try_clone_to_owned().map(Stdio::from).map_err(Error::Pipe)
}

/// Spawn failures caused by the host running out of processes or memory are
/// library errors; anything else means the program itself could not be run.
fn is_resource_exhaustion(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(nix::libc::EAGAIN) | Some(nix::libc::ENOMEM)
    )
}
