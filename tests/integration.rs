use shcore::{Error, IoControl, Status};

/// Run `command` captured, with `input` on stdin. Returns (status, stdout, stderr).
fn captured(command: &str, input: &[u8]) -> (Status, String, String) {
    let mut io = IoControl::new().input(input);
    let status = shcore::run(command.as_bytes(), Some(&mut io))
        .unwrap_or_else(|e| panic!("command {command:?} failed: {e}"));
    (
        status,
        String::from_utf8_lossy(io.stdout()).into_owned(),
        String::from_utf8_lossy(io.stderr()).into_owned(),
    )
}

fn code_for(command: &str) -> i32 {
    let mut io = IoControl::new();
    shcore::run_code(command.as_bytes(), Some(&mut io))
}

macro_rules! stdout_test {
    ($name:ident, $cmd:expr, $expected:expr) => {
        stdout_test!($name, $cmd, b"", $expected);
    };
    ($name:ident, $cmd:expr, $input:expr, $expected:expr) => {
        #[test]
        fn $name() {
            let (status, stdout, stderr) = captured($cmd, $input);
            assert_eq!(status, Status::SUCCESS, "command: {}, stderr: {}", $cmd, stderr);
            assert_eq!(stdout, $expected, "command: {}", $cmd);
        }
    };
}

macro_rules! code_test {
    ($name:ident, $cmd:expr, $code:expr) => {
        #[test]
        fn $name() {
            assert_eq!(code_for($cmd), $code, "command: {:?}", $cmd);
        }
    };
}

// ── Captured output ──

stdout_test!(echo_hello, "echo hello", "hello\n");
stdout_test!(pipe_through_tr, "echo hello | tr a-z A-Z", "HELLO\n");
stdout_test!(sequence_in_order, "echo one; echo two", "one\ntwo\n");
stdout_test!(cat_reads_input, "cat", b"ping", "ping");
stdout_test!(quoted_word_kept_whole, "echo 'a b  c'", "a b  c\n");
stdout_test!(double_quotes, "echo \"x  y\" z", "x  y z\n");
stdout_test!(quotes_end_their_word, "echo 'ab'\"cd\"ef", "ab cd ef\n");
stdout_test!(three_stage_pipe, "printf 'b\\na\\nb\\n' | sort | uniq", "a\nb\n");
stdout_test!(pipe_from_input, "tr a-z A-Z | cat", b"shout", "SHOUT");
stdout_test!(trailing_semicolon, "echo done;", "done\n");
stdout_test!(background_then_foreground, "cat & echo done", b"ignored", "done\n");
stdout_test!(cd_then_pwd, "cd /; pwd", "/\n");
stdout_test!(exit_skips_rest, "echo before; exit; echo after", "before\n");
stdout_test!(utf8_words, "echo héllo wörld", "héllo wörld\n");

#[test]
fn background_pipeline_output_is_captured() {
    let (status, stdout, _) = captured("echo hi | cat & echo done", b"");
    assert_eq!(status, Status::SUCCESS);
    let mut lines: Vec<&str> = stdout.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["done", "hi"]);
}

#[test]
fn exit_in_pipeline_skips_later_stages() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let mut io = IoControl::new();
    let status = shcore::run_fmt!(Some(&mut io), "exit | touch '{}'", marker.display()).unwrap();
    assert_eq!(status, Status::SUCCESS);
    assert!(!marker.exists());
}

// ── Integer convention ──

code_test!(empty_is_generic, "", Error::GENERIC);
code_test!(blank_is_generic, " \t\n", Error::GENERIC);
code_test!(unterminated_quote_is_tokenize, "echo 'oops", Error::TOKENIZE);
code_test!(dangling_pipe_is_parse, "a |", Error::PARSE);
code_test!(double_pipe_is_parse, "a b ||c", Error::PARSE);
code_test!(lone_redirect_is_parse, "> out", Error::PARSE);
code_test!(child_status_passes_through, "sh -c 'exit 42'", 42);
code_test!(last_statement_wins, "false; true", 0);
code_test!(pipeline_last_stage_wins, "true | false", 1);
code_test!(exit_returns_zero, "false; exit; false", 0);
code_test!(missing_program_is_127, "definitely-not-a-command-xyz", 127);
code_test!(signalled_child_is_minus_one, "sh -c 'kill -9 $$'", -1);

// ── Streams ──

#[test]
fn stderr_is_captured_separately() {
    let (status, stdout, stderr) = captured("sh -c 'echo out; echo err >&2'", b"");
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(stdout, "out\n");
    assert_eq!(stderr, "err\n");
}

#[test]
fn missing_program_reports_on_stderr() {
    let (status, stdout, stderr) = captured("definitely-not-a-command-xyz arg", b"");
    assert_eq!(status, Status::NOT_FOUND);
    assert!(stdout.is_empty());
    assert_eq!(stderr, "definitely-not-a-command-xyz: command not found\n");
}

#[test]
fn signalled_status_is_reported() {
    let (status, _, _) = captured("sh -c 'kill -9 $$'", b"");
    assert_eq!(status, Status::Signaled(9));
}

#[test]
fn callbacks_take_precedence_over_buffers() {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let status = {
        let mut io = IoControl::new()
            .on_stdout(|chunk| out.extend_from_slice(chunk))
            .on_stderr(|chunk| err.extend_from_slice(chunk));
        let status = shcore::run(b"sh -c 'echo out; echo err >&2'", Some(&mut io)).unwrap();
        assert!(io.stdout().is_empty());
        assert!(io.stderr().is_empty());
        assert_eq!(io.stdout_nul_terminated(), None);
        assert_eq!(io.stderr_nul_terminated(), None);
        status
    };
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(out, b"out\n");
    assert_eq!(err, b"err\n");
}

#[test]
fn one_callback_leaves_other_stream_buffered() {
    let mut out = Vec::new();
    let mut io = IoControl::new().on_stdout(|chunk| out.extend_from_slice(chunk));
    shcore::run(b"sh -c 'echo out; echo err >&2'", Some(&mut io)).unwrap();
    assert_eq!(io.stderr(), b"err\n");
    assert_eq!(io.stderr_nul_terminated(), Some(&b"err\n\0"[..]));
    drop(io);
    assert_eq!(out, b"out\n");
}

#[test]
fn buffers_are_nul_terminated() {
    let mut io = IoControl::new();
    shcore::run(b"echo hi", Some(&mut io)).unwrap();
    assert_eq!(io.stdout_len(), 3);
    assert_eq!(io.stdout_nul_terminated(), Some(&b"hi\n\0"[..]));
    assert_eq!(io.stderr_len(), 0);
    assert_eq!(io.stderr_nul_terminated(), Some(&b"\0"[..]));
}

#[test]
fn record_is_reset_between_calls() {
    let mut io = IoControl::new();
    shcore::run(b"echo first", Some(&mut io)).unwrap();
    shcore::run(b"echo second", Some(&mut io)).unwrap();
    assert_eq!(io.stdout(), b"second\n");
}

#[test]
fn large_input_and_output_do_not_deadlock() {
    let input: Vec<u8> = (0..1 << 20).map(|i| b'a' + (i % 26) as u8).collect();
    let mut io = IoControl::new().input(&input);
    let status = shcore::run(b"tee /dev/stderr", Some(&mut io)).unwrap();
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(io.stdout(), input.as_slice());
    assert_eq!(io.stderr(), input.as_slice());
}

#[test]
fn small_chunk_size_still_captures_everything() {
    let mut io = IoControl::new().input(b"0123456789");
    let options = shcore::Options { chunk_size: 3 };
    let status = shcore::run_with(b"cat", Some(&mut io), &options).unwrap();
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(io.stdout(), b"0123456789");
}

#[test]
fn child_may_ignore_input() {
    let input = vec![b'x'; 1 << 20];
    let mut io = IoControl::new().input(&input);
    let status = shcore::run(b"echo ignored", Some(&mut io)).unwrap();
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(io.stdout(), b"ignored\n");
}

#[test]
fn binary_output_with_nul_bytes() {
    let mut io = IoControl::new().input(b"a\0b");
    shcore::run(b"cat", Some(&mut io)).unwrap();
    assert_eq!(io.stdout(), b"a\0b");
    assert_eq!(io.stdout_nul_terminated(), Some(&b"a\0b\0"[..]));
}

// ── Built-ins ──

#[test]
fn cd_without_argument_goes_home() {
    let Some(home) = std::env::var_os("HOME") else {
        return;
    };
    let (status, stdout, _) = captured("cd; pwd", b"");
    assert_eq!(status, Status::SUCCESS);
    let home = std::fs::canonicalize(home).unwrap();
    let printed = std::fs::canonicalize(stdout.trim_end()).unwrap();
    assert_eq!(printed, home);
}

#[test]
fn cd_too_many_arguments() {
    let (status, stdout, stderr) = captured("cd / /tmp", b"");
    assert_eq!(status, Status::FAILURE);
    assert!(stdout.is_empty());
    assert_eq!(stderr, "cd: too many arguments\n");
}

#[test]
fn pwd_with_arguments() {
    let (status, _, stderr) = captured("pwd -L", b"");
    assert_eq!(status, Status::FAILURE);
    assert_eq!(stderr, "pwd: too many arguments\n");
}

#[test]
fn cd_in_captured_run_does_not_move_host() {
    let before = std::env::current_dir().unwrap();
    let (status, _, _) = captured("cd /", b"");
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(std::env::current_dir().unwrap(), before);
}

// ── Redirections ──

#[test]
fn redirect_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.txt");
    let mut io = IoControl::new();
    let status = shcore::run_fmt!(Some(&mut io), "echo saved > '{}'", path.display()).unwrap();
    assert_eq!(status, Status::SUCCESS);
    assert!(io.stdout().is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "saved\n");

    let status = shcore::run_fmt!(Some(&mut io), "cat < '{}'", path.display()).unwrap();
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(io.stdout(), b"saved\n");
}

#[test]
fn failed_redirect_reports_and_continues() {
    let (status, stdout, stderr) = captured("cat < /definitely/not/here; echo next", b"");
    assert_eq!(status, Status::SUCCESS);
    assert_eq!(stdout, "next\n");
    assert!(stderr.starts_with("/definitely/not/here: "), "{stderr}");
}

// ── Uncaptured ──

#[test]
fn uncaptured_run_returns_status() {
    assert_eq!(shcore::run(b"true", None).unwrap(), Status::SUCCESS);
    assert_eq!(shcore::run(b"false", None).unwrap(), Status::FAILURE);
}

#[test]
fn uncaptured_exit_does_not_end_host() {
    assert_eq!(shcore::run(b"exit; false", None).unwrap(), Status::SUCCESS);
}

#[test]
fn uncaptured_errors_keep_their_kind() {
    assert!(matches!(shcore::run(b"", None), Err(Error::Empty)));
    assert!(matches!(shcore::run(b"echo 'x", None), Err(Error::Tokenize(_))));
    assert!(matches!(shcore::run(b"a | | b", None), Err(Error::Parse(_))));
}
