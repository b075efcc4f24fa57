use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};

use crate::constants::{EXIT_GRACE, STDERR_CAPTURE_BYTES};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("empty command line")]
    EmptyCommand,
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write to the process: {source}")]
    Write {
        #[source]
        source: io::Error,
    },
    #[error("failed to read from the process: {source}")]
    Read {
        #[source]
        source: io::Error,
    },
    #[error("timed out")]
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited(ExitStatus),
    Killed,
}

/// Output of a process that ran to completion.
#[derive(Clone, Debug)]
pub struct Completed {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Sole owner of one external process and its pipes.
///
/// The process is started in its own process group so that [`kill`]
/// takes down everything it spawned. Stderr is drained in the background
/// so a chatty process never blocks on it.
///
/// [`kill`]: ProcessHandle::kill
#[derive(Debug)]
pub struct ProcessHandle {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    state: ProcessState,
    /// Process group id until the group has been signalled.
    pgid: Option<u32>,
}

impl ProcessHandle {
    #[tracing::instrument(level = "debug")]
    pub fn spawn(argv: &[String]) -> Result<Self, ProcessError> {
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| ProcessError::Spawn {
            program: program.clone(),
            source: io::Error::other("stdout is not piped"),
        })?;
        let stderr = child.stderr.take().map(drain);

        let pgid = child.id();
        tracing::debug!("Spawned `{}` with pid {:?}", program, pgid);
        Ok(Self {
            program: program.clone(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
            state: ProcessState::Running,
            pgid,
        })
    }

    /// Runs `argv` to completion, feeding it `input` and collecting its output.
    /// The process is killed if it is still running at `until`.
    pub async fn communicate(
        argv: &[String],
        input: &str,
        until: Instant,
    ) -> Result<Completed, ProcessError> {
        let mut process = Self::spawn(argv)?;

        let finished = timeout_at(until, async {
            match process.write_all(input.as_bytes()).await {
                // The process may legitimately stop reading early.
                Err(ProcessError::Write { source })
                    if source.kind() == io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
            process.close_stdin();

            let mut stdout = Vec::new();
            process
                .stdout
                .read_to_end(&mut stdout)
                .await
                .map_err(|source| ProcessError::Read { source })?;
            let status = process
                .child
                .wait()
                .await
                .map_err(|source| ProcessError::Read { source })?;
            Ok::<_, ProcessError>((status, stdout))
        })
        .await;

        match finished {
            Ok(Ok((status, stdout))) => {
                process.state = ProcessState::Exited(status);
                Ok(Completed {
                    status,
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: process.stderr().await,
                })
            }
            Ok(Err(e)) => {
                process.kill().await;
                Err(e)
            }
            Err(_) => {
                process.kill().await;
                Err(ProcessError::TimedOut)
            }
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Writes `bytes` and flushes. Fails if the input pipe has been closed.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ProcessError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| ProcessError::Write {
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        })?;
        stdin
            .write_all(bytes)
            .await
            .map_err(|source| ProcessError::Write { source })?;
        stdin
            .flush()
            .await
            .map_err(|source| ProcessError::Write { source })
    }

    /// Like [`write_all`](ProcessHandle::write_all), giving up at `until`.
    pub async fn write_until(&mut self, bytes: &[u8], until: Instant) -> Result<(), ProcessError> {
        timeout_at(until, self.write_all(bytes))
            .await
            .map_err(|_| ProcessError::TimedOut)?
    }

    pub async fn write_line(&mut self, line: &str, until: Instant) -> Result<(), ProcessError> {
        self.write_until(format!("{}\n", line).as_bytes(), until).await
    }

    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    /// Next line of output without its line terminator, or `None` at end of
    /// stream. Gives up at `until`; a partially read line is then lost, so
    /// callers are expected to stop talking to the process.
    pub async fn read_line(&mut self, until: Instant) -> Result<Option<String>, ProcessError> {
        let mut buf = Vec::new();
        let read = timeout_at(until, self.stdout.read_until(b'\n', &mut buf))
            .await
            .map_err(|_| ProcessError::TimedOut)?
            .map_err(|source| ProcessError::Read { source })?;
        if read == 0 {
            return Ok(None);
        }

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Exit status if the process has already exited. Never blocks.
    pub fn try_wait(&mut self) -> Option<ExitStatus> {
        if let ProcessState::Exited(status) = self.state {
            return Some(status);
        }
        if self.state == ProcessState::Killed {
            return None;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.state = ProcessState::Exited(status);
                Some(status)
            }
            _ => None,
        }
    }

    /// Waits for the process to exit on its own, at most until `until`.
    pub async fn wait(&mut self, until: Instant) -> Result<ExitStatus, ProcessError> {
        if let Some(status) = self.try_wait() {
            return Ok(status);
        }
        if self.state == ProcessState::Killed {
            return Err(ProcessError::Read {
                source: io::Error::other("process was killed"),
            });
        }

        let status = timeout_at(until, self.child.wait())
            .await
            .map_err(|_| ProcessError::TimedOut)?
            .map_err(|source| ProcessError::Read { source })?;
        self.state = ProcessState::Exited(status);
        Ok(status)
    }

    /// Kills the process and its group. Children that outlived the process
    /// itself are killed too. Idempotent, never fails.
    pub async fn kill(&mut self) {
        self.close_stdin();
        if self.state == ProcessState::Killed {
            return;
        }

        let running = self.try_wait().is_none();
        self.signal_group();
        if !running {
            return;
        }

        tracing::debug!("Killing `{}`", self.program);
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("start_kill on `{}` failed: {}", self.program, e);
        }
        let _ = tokio::time::timeout(EXIT_GRACE, self.child.wait()).await;
        self.state = ProcessState::Killed;
    }

    /// Whatever the process wrote to stderr, up to a fixed capture size.
    /// Waits briefly for the stream to close.
    pub async fn stderr(&mut self) -> String {
        let Some(mut task) = self.stderr.take() else {
            return String::new();
        };
        match tokio::time::timeout(EXIT_GRACE, &mut task).await {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            _ => {
                task.abort();
                String::new()
            }
        }
    }

    /// SIGKILL to the whole group, at most once. The group id stays reserved
    /// while any member is alive, even after the leader has been reaped.
    fn signal_group(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            // Negative pid addresses the process group created at spawn.
            let rc = unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
            if rc != 0 {
                tracing::trace!("Process group {} is already gone", pgid);
            }
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.signal_group();
    }
}

fn drain<R>(mut stream: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut kept = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = STDERR_CAPTURE_BYTES.saturating_sub(kept.len());
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
        kept
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    #[cfg(target_os = "linux")]
    use crate::testing::dies_soon;
    use crate::testing::sh;

    fn soon(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let result = ProcessHandle::spawn(&["/nonexistent/interjudge-binary".to_string()]);
        assert!(matches!(
            result,
            Err(ProcessError::Spawn { program, .. }) if program == "/nonexistent/interjudge-binary"
        ));

        assert!(matches!(ProcessHandle::spawn(&[]), Err(ProcessError::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_line_round_trip() {
        let mut process = ProcessHandle::spawn(&["cat".to_string()]).unwrap();

        process.write_line("? 500", soon(1000)).await.unwrap();
        process.write_line("! 42\r", soon(1000)).await.unwrap();
        assert_eq!(process.read_line(soon(1000)).await.unwrap(), Some("? 500".into()));
        assert_eq!(process.read_line(soon(1000)).await.unwrap(), Some("! 42".into()));

        process.close_stdin();
        assert_eq!(process.read_line(soon(1000)).await.unwrap(), None);
        assert!(process.wait(soon(1000)).await.unwrap().success());
    }

    #[tokio::test]
    async fn test_read_line_respects_deadline() {
        let mut process = ProcessHandle::spawn(&sh("sleep 5")).unwrap();

        let started = std::time::Instant::now();
        let result = process.read_line(soon(200)).await;
        assert!(matches!(result, Err(ProcessError::TimedOut)));
        assert!(started.elapsed() < Duration::from_secs(2));

        process.kill().await;
        assert_eq!(process.state(), ProcessState::Killed);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_kill_reaches_children_of_exited_process() {
        let mut process = ProcessHandle::spawn(&sh("sleep 30 & echo $!; exit 0")).unwrap();
        let child: u32 = process
            .read_line(soon(2000))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        assert!(process.wait(soon(2000)).await.unwrap().success());

        process.kill().await;

        assert!(dies_soon(child).await, "pid {} survived kill", child);
        assert!(matches!(process.state(), ProcessState::Exited(_)));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_drop_reaches_children() {
        let mut process = ProcessHandle::spawn(&sh("sleep 30 & echo $!; sleep 30")).unwrap();
        let child: u32 = process
            .read_line(soon(2000))
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();

        drop(process);

        assert!(dies_soon(child).await, "pid {} survived drop", child);
    }

    #[tokio::test]
    async fn test_kill_is_idempotent() {
        let mut process = ProcessHandle::spawn(&sh("sleep 5")).unwrap();
        process.kill().await;
        process.kill().await;
        assert_eq!(process.state(), ProcessState::Killed);
        assert!(process.try_wait().is_none());

        let mut finished = ProcessHandle::spawn(&sh("exit 0")).unwrap();
        finished.wait(soon(2000)).await.unwrap();
        finished.kill().await;
        assert!(matches!(finished.state(), ProcessState::Exited(status) if status.success()));
    }

    #[tokio::test]
    async fn test_write_after_exit_fails() {
        let mut process = ProcessHandle::spawn(&sh("exit 3")).unwrap();
        let status = process.wait(soon(2000)).await.unwrap();
        assert_eq!(status.code(), Some(3));

        let mut result = Ok(());
        // The pipe buffer may swallow the first small writes.
        for _ in 0..64 {
            result = process.write_line(&"x".repeat(4096), soon(1000)).await;
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(ProcessError::Write { .. })));
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let mut process = ProcessHandle::spawn(&sh("echo oops >&2; exit 1")).unwrap();
        let status = process.wait(soon(2000)).await.unwrap();
        assert!(!status.success());
        assert_eq!(process.stderr().await.trim(), "oops");
    }

    #[tokio::test]
    async fn test_communicate() {
        let done =
            ProcessHandle::communicate(&sh("read a; read b; echo \"$b $a\""), "1\n2\n", soon(2000))
            .await
            .unwrap();
        assert!(done.status.success());
        assert_eq!(done.stdout, "2 1\n");

        let slow = ProcessHandle::communicate(&sh("sleep 5"), "", soon(200)).await;
        assert!(matches!(slow, Err(ProcessError::TimedOut)));
    }
}
