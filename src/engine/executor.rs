use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::foundation::error::{AudiogramError, AudiogramResult};

const STDERR_TAIL_LINES: usize = 12;

/// Origin of an engine log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogKind {
    /// Engine bookkeeping (load, fs operations, command echo).
    Info,
    /// ffmpeg standard output.
    FfOut,
    /// ffmpeg standard error (where ffmpeg writes its log and status lines).
    FfErr,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::FfOut => "ffout",
            Self::FfErr => "fferr",
        }
    }
}

/// One line of engine output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LogKind,
    pub message: String,
}

impl LogLine {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of one ffmpeg invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExitReport {
    pub success: bool,
    pub code: Option<i32>,
    /// Last few stderr lines, kept for error reporting.
    pub stderr_tail: Vec<String>,
}

/// Seam between the engine and the program that actually runs ffmpeg commands.
///
/// `execute` runs with `workdir` as the current directory: every argument path is relative to
/// the staged copy of the virtual filesystem.
pub trait Executor: Send + Sync {
    /// Probe the backing binary. Called once from `Engine::load`.
    fn version(&self) -> AudiogramResult<String>;

    /// Run one command to completion, streaming log lines to `on_line`.
    fn execute(
        &self,
        args: &[String],
        workdir: &Path,
        on_line: &mut dyn FnMut(LogLine),
    ) -> AudiogramResult<ExitReport>;

    /// Forcibly stop the in-flight command, if any.
    fn terminate(&self) {}
}

/// [`Executor`] backed by the system `ffmpeg` binary.
pub struct FfmpegExecutor {
    program: PathBuf,
    /// Kill handle of the command currently in flight.
    active: Mutex<Option<Arc<RunHandle>>>,
}

/// Per-command kill handle shared between `execute` and `terminate`.
#[derive(Default)]
struct RunHandle {
    /// Taken by `execute` once stderr closes; `None` afterwards.
    child: Mutex<Option<Child>>,
    terminated: AtomicBool,
}

impl RunHandle {
    fn kill(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(child) = child.as_mut()
            && let Err(e) = child.kill()
        {
            tracing::warn!(target: "audiogram::engine", "failed to kill ffmpeg: {e}");
        }
    }
}

impl FfmpegExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            active: Mutex::new(None),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<Arc<RunHandle>>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Unregister `handle` unless a later command already replaced it.
    fn release(&self, handle: &Arc<RunHandle>) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|h| Arc::ptr_eq(h, handle)) {
            *active = None;
        }
    }
}

impl Default for FfmpegExecutor {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Executor for FfmpegExecutor {
    fn version(&self) -> AudiogramResult<String> {
        let out = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                AudiogramError::engine(format!(
                    "failed to run '{}' (is ffmpeg installed and on PATH?): {e}",
                    self.program.display()
                ))
            })?;
        if !out.status.success() {
            return Err(AudiogramError::engine(format!(
                "'{} -version' exited with status {}",
                self.program.display(),
                out.status
            )));
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    fn execute(
        &self,
        args: &[String],
        workdir: &Path,
        on_line: &mut dyn FnMut(LogLine),
    ) -> AudiogramResult<ExitReport> {
        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AudiogramError::engine(format!(
                    "failed to spawn '{}' (is ffmpeg installed and on PATH?): {e}",
                    self.program.display()
                ))
            })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let handle = Arc::new(RunHandle::default());
        *handle.child.lock().unwrap_or_else(|e| e.into_inner()) = Some(child);
        *self.lock_active() = Some(Arc::clone(&handle));

        let mut tail = Vec::<String>::new();
        let (read_result, out_lines) = std::thread::scope(|scope| {
            let out_reader = stdout.map(|stdout| {
                scope.spawn(move || {
                    let mut lines = Vec::new();
                    let _ = read_lines(stdout, |line| lines.push(line));
                    lines
                })
            });
            let read_result = match stderr {
                Some(stderr) => read_lines(stderr, |line| {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                    tail.push(line.clone());
                    on_line(LogLine::new(LogKind::FfErr, line));
                }),
                None => Ok(()),
            };
            let out_lines = out_reader
                .and_then(|reader| reader.join().ok())
                .unwrap_or_default();
            (read_result, out_lines)
        });
        for line in out_lines {
            on_line(LogLine::new(LogKind::FfOut, line));
        }

        let child = handle.child.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.release(&handle);
        let Some(mut child) = child else {
            return Err(AudiogramError::engine("ffmpeg child handle vanished (unexpected)"));
        };
        let status = child
            .wait()
            .map_err(|e| AudiogramError::engine(format!("failed to wait for ffmpeg: {e}")))?;
        read_result
            .map_err(|e| AudiogramError::engine(format!("ffmpeg stderr read failed: {e}")))?;

        if handle.terminated.load(Ordering::SeqCst) {
            return Err(AudiogramError::engine("ffmpeg was terminated by exit()"));
        }

        Ok(ExitReport {
            success: status.success(),
            code: status.code(),
            stderr_tail: tail,
        })
    }

    fn terminate(&self) {
        let handle = self.lock_active().take();
        if let Some(handle) = handle {
            handle.kill();
        }
    }
}

/// Feed every line of `reader` to `emit` until EOF.
fn read_lines(mut reader: impl Read, mut emit: impl FnMut(String)) -> std::io::Result<()> {
    let mut splitter = LineSplitter::default();
    let mut buf = [0u8; 8192];
    let result = loop {
        match reader.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => splitter.push(&buf[..n], &mut emit),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };
    splitter.finish(&mut emit);
    result
}

/// Splits a byte stream into lines on `\n` or `\r`.
///
/// ffmpeg rewrites its status line in place with `\r`, so both count as terminators.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub(crate) fn push(&mut self, bytes: &[u8], emit: &mut impl FnMut(String)) {
        for &b in bytes {
            if b == b'\n' || b == b'\r' {
                self.flush(emit);
            } else {
                self.pending.push(b);
            }
        }
    }

    pub(crate) fn finish(&mut self, emit: &mut impl FnMut(String)) {
        self.flush(emit);
    }

    fn flush(&mut self, emit: &mut impl FnMut(String)) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        emit(line);
    }
}
