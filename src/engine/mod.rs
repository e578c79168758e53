//! FFmpeg engine: a loadable core with a virtual filesystem and a single-flight `run`.
//!
//! The engine mirrors the contract of an in-process ffmpeg core:
//!
//! - [`Engine::load`] must be called exactly once before use; a second call fails.
//! - Inputs are written into the in-memory [`MemFs`] and outputs are read back from it.
//! - [`Engine::run`] executes one command at a time; a concurrent call fails with
//!   [`AudiogramError::Busy`] instead of queueing. [`Engine::run_staged`] holds that same slot
//!   while it writes inputs, runs and reads the output back.
//! - [`Engine::exit`] hard-stops the engine and discards all of its state.

/// Command execution seam and the system `ffmpeg` implementation.
pub mod executor;
/// In-memory virtual filesystem.
pub mod fs;
/// Progress parsing from ffmpeg log lines.
pub mod progress;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::foundation::error::{AudiogramError, AudiogramResult};

use self::executor::{Executor, LogKind, LogLine};
use self::fs::MemFs;
use self::progress::{Progress, ProgressParser};

/// Arguments prepended to every command.
pub const DEFAULT_ARGS: [&str; 2] = ["-nostdin", "-y"];

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;
pub type LoggerFn = Arc<dyn Fn(&LogLine) + Send + Sync>;

struct Core {
    generation: u64,
    version: String,
    fs: MemFs,
}

/// Singleton handle to the ffmpeg core.
pub struct Engine {
    executor: Box<dyn Executor>,
    core: Mutex<Option<Core>>,
    /// Generation of the core whose command is in flight; zero when idle.
    running: AtomicU64,
    generation: AtomicU64,
    progress: Mutex<Option<ProgressFn>>,
    logger: Mutex<Option<LoggerFn>>,
}

/// Clears the running marker on every exit path of [`Engine::run`] and [`Engine::run_staged`].
///
/// Only the marker of its own generation is cleared, so a run interrupted by `exit()` cannot
/// release the guard of a run started on a freshly loaded core.
struct RunGuard<'a> {
    running: &'a AtomicU64,
    generation: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let _ = self.running.compare_exchange(
            self.generation,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

/// Borrowed access to the loaded engine's virtual filesystem.
pub struct FsHandle<'a> {
    guard: MutexGuard<'a, Option<Core>>,
}

impl std::ops::Deref for FsHandle<'_> {
    type Target = MemFs;

    fn deref(&self) -> &MemFs {
        match self.guard.as_ref() {
            Some(core) => &core.fs,
            None => unreachable!("FsHandle is only created for a loaded core"),
        }
    }
}

impl std::ops::DerefMut for FsHandle<'_> {
    fn deref_mut(&mut self) -> &mut MemFs {
        match self.guard.as_mut() {
            Some(core) => &mut core.fs,
            None => unreachable!("FsHandle is only created for a loaded core"),
        }
    }
}

impl Engine {
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self {
            executor: Box::new(executor),
            core: Mutex::new(None),
            running: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            progress: Mutex::new(None),
            logger: Mutex::new(None),
        }
    }

    /// Probe the executor and create an empty virtual filesystem.
    pub fn load(&self) -> AudiogramResult<()> {
        self.log(LogKind::Info, "load ffmpeg-core");
        let mut core = self.lock_core();
        if core.is_some() {
            return Err(AudiogramError::AlreadyLoaded);
        }
        self.log(LogKind::Info, "loading ffmpeg-core");
        let version = self.executor.version()?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *core = Some(Core {
            generation,
            version: version.clone(),
            fs: MemFs::new(),
        });
        self.log(LogKind::Info, format!("ffmpeg-core loaded ({version})"));
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.lock_core().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) != 0
    }

    /// Version string reported by the executor at load time.
    pub fn version(&self) -> AudiogramResult<String> {
        self.lock_core()
            .as_ref()
            .map(|c| c.version.clone())
            .ok_or(AudiogramError::NotReady)
    }

    /// Lock and borrow the virtual filesystem.
    ///
    /// The handle holds the engine lock; drop it before calling [`Engine::run`].
    pub fn fs(&self) -> AudiogramResult<FsHandle<'_>> {
        let guard = self.lock_core();
        if guard.is_none() {
            return Err(AudiogramError::NotReady);
        }
        Ok(FsHandle { guard })
    }

    /// Run one ffmpeg command against the virtual filesystem.
    ///
    /// [`DEFAULT_ARGS`] are prepended and empty arguments are dropped. Files created or changed
    /// by the command are copied back into the virtual filesystem.
    pub fn run<S: AsRef<str>>(&self, args: &[S]) -> AudiogramResult<()> {
        let args = self.command_args(args);
        let guard = self.begin_run()?;
        self.execute_guarded(guard.generation, &args)
    }

    /// Stage `files`, run one command and read back `output`, all under a single run guard.
    ///
    /// A concurrent `run` or `run_staged` fails with [`AudiogramError::Busy`] before it can touch
    /// the staged files. Staged inputs and the output are unlinked afterwards, on success and on
    /// failure.
    pub fn run_staged<S: AsRef<str>>(
        &self,
        files: Vec<(String, Vec<u8>)>,
        args: &[S],
        output: &str,
    ) -> AudiogramResult<Vec<u8>> {
        let args = self.command_args(args);
        let guard = self.begin_run()?;
        let generation = guard.generation;

        let mut staged: Vec<String> = Vec::with_capacity(files.len() + 1);
        let result = self
            .with_core(generation, |core| {
                for (path, data) in files {
                    core.fs.write_file(&path, data)?;
                    staged.push(path);
                }
                Ok(())
            })
            .and_then(|()| self.execute_guarded(generation, &args))
            .and_then(|()| self.with_core(generation, |core| core.fs.read_file(output)));

        staged.push(output.to_string());
        let _ = self.with_core(generation, |core| {
            for path in &staged {
                if core.fs.exists(path)
                    && let Err(e) = core.fs.unlink(path)
                {
                    tracing::warn!(
                        target: "audiogram::engine",
                        "failed to remove staged file '{path}': {e}"
                    );
                }
            }
            Ok(())
        });
        result
    }

    fn command_args<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        let args: Vec<String> = DEFAULT_ARGS
            .iter()
            .copied()
            .chain(args.iter().map(AsRef::as_ref))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self.log(LogKind::Info, format!("run ffmpeg command: {}", args.join(" ")));
        args
    }

    /// Claim the single run slot for the loaded core.
    fn begin_run(&self) -> AudiogramResult<RunGuard<'_>> {
        let core = self.lock_core();
        let Some(core) = core.as_ref() else {
            return Err(AudiogramError::NotReady);
        };
        if self
            .running
            .compare_exchange(0, core.generation, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AudiogramError::Busy);
        }
        Ok(RunGuard {
            running: &self.running,
            generation: core.generation,
        })
    }

    /// Apply `f` to the core of `generation`; `NotReady` if it was exited in the meantime.
    fn with_core<T>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut Core) -> AudiogramResult<T>,
    ) -> AudiogramResult<T> {
        let mut core = self.lock_core();
        match core.as_mut().filter(|c| c.generation == generation) {
            Some(core) => f(core),
            None => Err(AudiogramError::NotReady),
        }
    }

    fn execute_guarded(&self, generation: u64, args: &[String]) -> AudiogramResult<()> {
        let mut snapshot = self.with_core(generation, |core| Ok(core.fs.clone()))?;

        let scratch = tempfile::Builder::new()
            .prefix("audiogram-fs-")
            .tempdir()
            .map_err(|e| AudiogramError::engine(format!("create scratch dir: {e}")))?;
        snapshot.materialize(scratch.path())?;

        let mut parser = ProgressParser::new();
        let progress = self.progress.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let mut on_line = |line: LogLine| {
            if let Some(p) = parser.parse_line(&line.message)
                && let Some(cb) = progress.as_ref()
            {
                cb(p);
            }
            self.emit(&line);
        };
        let report = self.executor.execute(args, scratch.path(), &mut on_line)?;

        let mut core = self.lock_core();
        let Some(core) = core.as_mut().filter(|c| c.generation == generation) else {
            tracing::warn!(
                target: "audiogram::engine",
                "engine exited during run; dropping results"
            );
            return Err(AudiogramError::NotReady);
        };
        if !report.success {
            let code = report
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(AudiogramError::engine(format!(
                "ffmpeg exited with status {code}: {}",
                report.stderr_tail.join("\n").trim()
            )));
        }
        let changed = snapshot.absorb(scratch.path())?;
        for key in &changed {
            core.fs.write_file(key, snapshot.read_file(key)?)?;
        }
        self.log(
            LogKind::Info,
            format!("ffmpeg command finished; {} file(s) written", changed.len()),
        );
        Ok(())
    }

    /// Forcibly terminate ffmpeg and discard the core, including its virtual filesystem.
    pub fn exit(&self) -> AudiogramResult<()> {
        let mut core = self.lock_core();
        if core.is_none() {
            return Err(AudiogramError::NotReady);
        }
        self.executor.terminate();
        *core = None;
        self.running.store(0, Ordering::SeqCst);
        self.log(LogKind::Info, "ffmpeg-core exited");
        Ok(())
    }

    pub fn set_progress(&self, progress: impl Fn(Progress) + Send + Sync + 'static) {
        *self.progress.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(progress));
    }

    /// Install a logger that receives every engine log line in addition to `tracing`.
    pub fn set_logger(&self, logger: impl Fn(&LogLine) + Send + Sync + 'static) {
        *self.logger.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(logger));
    }

    fn lock_core(&self) -> MutexGuard<'_, Option<Core>> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log(&self, kind: LogKind, message: impl Into<String>) {
        self.emit(&LogLine::new(kind, message));
    }

    fn emit(&self, line: &LogLine) {
        tracing::debug!(target: "audiogram::engine", "[{}] {}", line.kind.as_str(), line.message);
        let logger = self.logger.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(logger) = logger {
            logger(line);
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("loaded", &self.is_loaded())
            .field("running", &self.is_running())
            .finish()
    }
}
