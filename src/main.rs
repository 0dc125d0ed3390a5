use std::env;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;

use serde::{Deserialize, Serialize};
use shcore::config::Config;
use shcore::{Error, IoControl, Status};

const USAGE: &str = "usage: shcore -c COMMAND
       shcore --stream -c COMMAND   (stdin is fed to COMMAND, output streamed)
       shcore --json                (JSON request on stdin, JSON response on stdout)
       shcore --dump-config";

/// Exit code used when the library itself fails.
const LIBRARY_FAILURE: i32 = 2;

// ─── JSON mode ───────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Request {
    command: String,
    #[serde(default)]
    stdin: String,
}

#[derive(Debug, Serialize)]
struct Response {
    /// Shell-style status: exit code, or 128 + signal number.
    status: Option<i32>,
    /// Library integer convention: exit code, -1 when signalled, negative error code.
    code: i32,
    stdout: String,
    stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Response {
    fn new(result: Result<Status, Error>, io: &IoControl<'_>) -> Self {
        let (status, code, error) = match result {
            Ok(status) => (Some(shell_status(status)), status.code(), None),
            Err(e) => (None, e.code(), Some(e.to_string())),
        };
        Self {
            status,
            code,
            stdout: String::from_utf8_lossy(io.stdout()).into_owned(),
            stderr: String::from_utf8_lossy(io.stderr()).into_owned(),
            error,
        }
    }
}

fn shell_status(status: Status) -> i32 {
    match status {
        Status::Exited(code) => code,
        Status::Signaled(signo) => 128 + signo,
    }
}

fn exit_with(result: Result<Status, Error>) -> i32 {
    match result {
        Ok(status) => shell_status(status),
        Err(e) => {
            eprintln!("shcore: {e}");
            LIBRARY_FAILURE
        }
    }
}

// ─── Modes ───────────────────────────────────────────

fn run_inherited(command: &[u8]) -> i32 {
    exit_with(shcore::run(command, None))
}

fn run_streamed(command: &[u8], config: &Config) -> i32 {
    let mut input = Vec::new();
    if let Err(e) = io::stdin().read_to_end(&mut input) {
        eprintln!("shcore: failed to read stdin: {e}");
        return LIBRARY_FAILURE;
    }
    let mut io = IoControl::new()
        .input(&input)
        .on_stdout(|chunk| {
            let mut out = io::stdout().lock();
            let _ = out.write_all(chunk);
            let _ = out.flush();
        })
        .on_stderr(|chunk| {
            let _ = io::stderr().write_all(chunk);
        });
    exit_with(shcore::run_with(command, Some(&mut io), &config.options()))
}

fn run_json(config: &Config) -> i32 {
    let mut input = String::new();
    if io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("shcore: failed to read stdin");
        return LIBRARY_FAILURE;
    }
    let request: Request = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("shcore: JSON parse error: {e}");
            return LIBRARY_FAILURE;
        }
    };

    let mut io = IoControl::new().input(request.stdin.as_bytes());
    let result = shcore::run_with(request.command.as_bytes(), Some(&mut io), &config.options());
    let response = Response::new(result, &io);
    match serde_json::to_string(&response) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("shcore: cannot encode response: {e}");
            LIBRARY_FAILURE
        }
    }
}

fn dump_config(config: &Config) -> i32 {
    match toml::to_string_pretty(config) {
        Ok(text) => {
            print!("{text}");
            0
        }
        Err(e) => {
            eprintln!("shcore: cannot encode config: {e}");
            LIBRARY_FAILURE
        }
    }
}

fn main() {
    let config = Config::load();
    shcore::logging::init(&config.logging);

    let args: Vec<OsString> = env::args_os().skip(1).collect();
    let args: Vec<&[u8]> = args.iter().map(|a| a.as_bytes()).collect();
    let code = match args.as_slice() {
        [b"-c", command] => run_inherited(command),
        [b"--stream", b"-c", command] => run_streamed(command, &config),
        [b"--json"] => run_json(&config),
        [b"--dump-config"] => dump_config(&config),
        _ => {
            eprintln!("{USAGE}");
            LIBRARY_FAILURE
        }
    };
    std::process::exit(code);
}

// ─── Tests ───────────────────────────────────────────
