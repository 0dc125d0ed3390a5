use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// How the last command of a script finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Normal exit with this code.
    Exited(i32),
    /// Killed by this signal number.
    Signaled(i32),
}

impl Status {
    pub const SUCCESS: Status = Status::Exited(0);
    pub const FAILURE: Status = Status::Exited(1);
    /// Program could not be found.
    pub const NOT_FOUND: Status = Status::Exited(127);
    /// Program was found but could not be executed.
    pub const NOT_EXECUTABLE: Status = Status::Exited(126);

    /// Integer form: the exit code, or -1 when the child did not exit normally.
    pub fn code(self) -> i32 {
        match self {
            Status::Exited(code) => code,
            Status::Signaled(_) => -1,
        }
    }

    pub fn success(self) -> bool {
        self == Status::SUCCESS
    }
}

impl From<ExitStatus> for Status {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Status::Exited(code),
            (None, Some(signo)) => Status::Signaled(signo),
            (None, None) => Status::Exited(-1),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Exited(code) => write!(f, "exit {code}"),
            Status::Signaled(signo) => write!(f, "signal {signo}"),
        }
    }
}
