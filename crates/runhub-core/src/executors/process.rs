//! Local process backend.
//!
//! Stages a job's files into a temporary directory and runs the runtime's
//! commands there as ordinary child processes. There is no isolation beyond a
//! cleared environment and a process group per stage, so this backend is for
//! development and trusted deployments.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use runhub_protocol::{
    ExecutionResult, ExitStatus, FileEncoding, FileInput, OutputStream, Signal, Stage, StageResult,
};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use super::{ExecutionBackend, JobChannels, JobEvent, JobInput, PrimedJob};
use crate::errors::BackendError;
use crate::job::{JobSpec, StageLimits};

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone)]
pub struct ProcessBackendConfig {
    /// Bytes kept per output stream and stage before the stage is killed.
    pub output_limit: usize,
    /// Jobs that may be primed at once. Further primes wait for a slot.
    pub max_concurrent_jobs: usize,
    /// Where job directories are created. Defaults to the system temp dir.
    pub staging_root: Option<PathBuf>,
}

impl Default for ProcessBackendConfig {
    fn default() -> Self {
        Self {
            output_limit: 64 * 1024,
            max_concurrent_jobs: 64,
            staging_root: None,
        }
    }
}

pub struct ProcessBackend {
    config: ProcessBackendConfig,
    permits: Arc<Semaphore>,
}

impl ProcessBackend {
    pub fn new(config: ProcessBackendConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self { config, permits }
    }

    pub fn config(&self) -> &ProcessBackendConfig {
        &self.config
    }

    fn staging_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("runhub-");
        match &self.config.staging_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new(ProcessBackendConfig::default())
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    fn name(&self) -> &str {
        "process"
    }

    async fn prime(&self, spec: Arc<JobSpec>) -> Result<Box<dyn PrimedJob>, BackendError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BackendError::prime("backend is shutting down"))?;

        let dir = self.staging_dir()?;
        let names = stage_files(dir.path(), &spec.files).await?;
        log::debug!(
            "Staged {} file(s) for {}-{} in {}",
            names.len(),
            spec.runtime.language,
            spec.runtime.version,
            dir.path().display()
        );

        Ok(Box::new(ProcessJob {
            spec,
            names,
            output_limit: self.config.output_limit,
            dir: Some(dir),
            permit: Some(permit),
            live_group: None,
        }))
    }
}

/// Write `files` under `dir`, returning the name each was staged as.
async fn stage_files(dir: &Path, files: &[FileInput]) -> Result<Vec<String>, BackendError> {
    let mut names = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        let name = file
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("file{}.code", i));
        let relative = contained_path(&name).ok_or_else(|| {
            BackendError::prime(format!("file name {} escapes the job directory", name))
        })?;

        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, decode(file, &name)?).await?;
        names.push(name);
    }
    Ok(names)
}

/// `name` as a path that stays inside the job directory, if it does.
fn contained_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let contained = path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    (contained && path.components().next().is_some()).then(|| path.to_path_buf())
}

fn decode(file: &FileInput, name: &str) -> Result<Vec<u8>, BackendError> {
    match file.encoding() {
        FileEncoding::Utf8 => Ok(file.content.as_bytes().to_vec()),
        FileEncoding::Base64 => base64::engine::general_purpose::STANDARD
            .decode(&file.content)
            .map_err(|e| BackendError::prime(format!("{} is not valid base64: {}", name, e))),
        FileEncoding::Hex => hex::decode(&file.content)
            .map_err(|e| BackendError::prime(format!("{} is not valid hex: {}", name, e))),
        FileEncoding::Other(encoding) => Err(BackendError::prime(format!(
            "{} uses unsupported encoding {}",
            name, encoding
        ))),
    }
}

/// How a stage's output collection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Exited,
    TimedOut,
    OutputLimit(OutputStream),
}

/// Buffered output of one stage.
#[derive(Debug, Default)]
struct Capture {
    stdout: String,
    stderr: String,
    output: String,
    limit: usize,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    /// Record a chunk. Returns false once `stream` has gone over the limit.
    fn push(&mut self, stream: OutputStream, data: &str) -> bool {
        let buffer = match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        };
        buffer.push_str(data);
        self.output.push_str(data);
        buffer.len() <= self.limit
    }

    async fn drain(&mut self, chunks: &mut mpsc::UnboundedReceiver<(OutputStream, String)>) -> Ending {
        while let Some((stream, data)) = chunks.recv().await {
            if !self.push(stream, &data) {
                return Ending::OutputLimit(stream);
            }
        }
        Ending::Exited
    }
}

struct Spawned {
    child: Child,
    stdin: Option<ChildStdin>,
    chunks: mpsc::UnboundedReceiver<(OutputStream, String)>,
}

struct ProcessJob {
    spec: Arc<JobSpec>,
    names: Vec<String>,
    output_limit: usize,
    dir: Option<TempDir>,
    permit: Option<OwnedSemaphorePermit>,
    /// Process group of the stage currently running, if any.
    live_group: Option<i32>,
}

impl ProcessJob {
    fn compile_command(&self) -> Option<Vec<String>> {
        let mut command = self.spec.runtime.commands.compile.clone()?;
        command.extend(self.names.iter().cloned());
        Some(command)
    }

    fn run_command(&self) -> Vec<String> {
        let mut command = self.spec.runtime.commands.run.clone();
        command.extend(self.names.first().cloned());
        command.extend(self.spec.args.iter().cloned());
        command
    }

    fn spawn(&mut self, command: &[String], limits: StageLimits) -> Result<Spawned, BackendError> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| BackendError::execution("job has already been cleaned up"))?;
        let (program, args) = command
            .split_first()
            .ok_or_else(|| BackendError::execution("runtime has an empty command"))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(dir.path())
            .env_clear()
            .envs(&self.spec.runtime.commands.env)
            .env("RUNHUB_MEMORY_LIMIT", limits.memory.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| BackendError::execution(format!("failed to spawn {}: {}", program, e)))?;
        self.live_group = child.id().map(|pid| pid as i32);

        let (tx, chunks) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, OutputStream::Stderr, tx));
        }
        let stdin = child.stdin.take();

        Ok(Spawned {
            child,
            stdin,
            chunks,
        })
    }

    /// Kill the running stage's process group, if there is one.
    fn kill_live_group(&mut self) {
        if let Some(pgid) = self.live_group.take() {
            kill_group(pgid);
        }
    }

    async fn finish(
        &mut self,
        child: &mut Child,
        ending: Ending,
        started: Instant,
    ) -> Result<StageResult, BackendError> {
        if ending != Ending::Exited {
            self.kill_live_group();
        }
        let status = child.wait().await?;
        // Anything the stage left running in its group goes with it.
        self.kill_live_group();

        let (code, signal) = exit_parts(status);
        let mut result = StageResult {
            code,
            signal,
            wall_time: Some(started.elapsed().as_millis() as u64),
            ..Default::default()
        };
        match ending {
            Ending::TimedOut => {
                result.code = None;
                result.signal = Some("SIGKILL".to_string());
                result.status = Some("TO".to_string());
                result.message = Some("Timeout".to_string());
            }
            Ending::OutputLimit(stream) => {
                result.code = None;
                result.signal = Some("SIGKILL".to_string());
                result.status = Some("OL".to_string());
                result.message = Some(format!("{} length exceeded", stream_name(stream)));
            }
            Ending::Exited if result.signal.is_some() => {
                result.status = Some("SG".to_string());
            }
            Ending::Exited => {}
        }
        Ok(result)
    }

    async fn run_stage(
        &mut self,
        stage: Stage,
        command: &[String],
        stdin: &str,
        limits: StageLimits,
    ) -> Result<StageResult, BackendError> {
        log::debug!("Running {} stage: {:?}", stage, command);
        let started = Instant::now();
        let Spawned {
            mut child,
            stdin: pipe,
            mut chunks,
        } = self.spawn(command, limits)?;

        if let Some(mut pipe) = pipe {
            let input = stdin.to_string();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    log::debug!("Failed to write stdin: {}", e);
                }
            });
        }

        let mut capture = Capture::new(self.output_limit);
        let ending = match stage_timeout(limits) {
            Some(limit) => tokio::time::timeout(limit, capture.drain(&mut chunks))
                .await
                .unwrap_or(Ending::TimedOut),
            None => capture.drain(&mut chunks).await,
        };

        let mut result = self.finish(&mut child, ending, started).await?;
        result.stdout = capture.stdout;
        result.stderr = capture.stderr;
        result.output = capture.output;
        Ok(result)
    }

    async fn run_interactive_stage(
        &mut self,
        stage: Stage,
        command: &[String],
        limits: StageLimits,
        channels: &mut JobChannels,
    ) -> Result<ExitStatus, BackendError> {
        log::debug!("Running interactive {} stage: {:?}", stage, command);
        let started = Instant::now();
        let _ = channels.events.send(JobEvent::Stage(stage));
        let Spawned {
            mut child,
            stdin: mut pipe,
            mut chunks,
        } = self.spawn(command, limits)?;

        let deadline = stage_timeout(limits);
        let sleep = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(sleep);

        let mut capture = Capture::new(self.output_limit);
        let mut inputs_open = true;
        let ending = loop {
            tokio::select! {
                chunk = chunks.recv() => match chunk {
                    Some((stream, data)) => {
                        let within_limit = capture.push(stream, &data);
                        let event = match stream {
                            OutputStream::Stdout => JobEvent::Stdout(data),
                            OutputStream::Stderr => JobEvent::Stderr(data),
                        };
                        let _ = channels.events.send(event);
                        if !within_limit {
                            break Ending::OutputLimit(stream);
                        }
                    }
                    None => break Ending::Exited,
                },
                input = channels.inputs.recv(), if inputs_open => match input {
                    Some(JobInput::Stdin(data)) => {
                        if let Some(stdin) = pipe.as_mut() {
                            if let Err(e) = stdin.write_all(data.as_bytes()).await {
                                log::debug!("Stdin of {} stage closed: {}", stage, e);
                                pipe = None;
                            }
                        }
                    }
                    Some(JobInput::Signal(signal)) => self.deliver(signal),
                    None => inputs_open = false,
                },
                _ = &mut sleep => break Ending::TimedOut,
            }
        };
        drop(pipe);

        let result = self.finish(&mut child, ending, started).await?;
        let status = result.exit_status();
        let _ = channels.events.send(JobEvent::Exit {
            stage,
            status: status.clone(),
        });
        Ok(status)
    }

    fn deliver(&self, signal: Signal) {
        let Some(pgid) = self.live_group else {
            log::debug!("Dropping {}: no stage is running", signal);
            return;
        };
        signal_group(pgid, signal);
    }
}

#[async_trait]
impl PrimedJob for ProcessJob {
    async fn execute(&mut self) -> Result<ExecutionResult, BackendError> {
        let spec = self.spec.clone();
        let mut result = ExecutionResult::default();

        if let Some(command) = self.compile_command() {
            let compile = self
                .run_stage(Stage::Compile, &command, "", spec.limits.compile)
                .await?;
            let compiled = compile.exit_status().success();
            result.compile = Some(compile);
            if !compiled {
                return Ok(result);
            }
        }

        let command = self.run_command();
        result.run = Some(
            self.run_stage(Stage::Run, &command, &spec.stdin, spec.limits.run)
                .await?,
        );
        Ok(result)
    }

    async fn execute_interactive(&mut self, mut channels: JobChannels) -> Result<(), BackendError> {
        let spec = self.spec.clone();

        if let Some(command) = self.compile_command() {
            let status = self
                .run_interactive_stage(Stage::Compile, &command, spec.limits.compile, &mut channels)
                .await?;
            if !status.success() {
                return Ok(());
            }
        }

        let command = self.run_command();
        self.run_interactive_stage(Stage::Run, &command, spec.limits.run, &mut channels)
            .await?;
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), BackendError> {
        self.kill_live_group();
        if let Some(dir) = self.dir.take() {
            let path = dir.path().display().to_string();
            tokio::task::spawn_blocking(move || dir.close())
                .await
                .map_err(|e| BackendError::Cleanup(e.to_string()))?
                .map_err(|e| BackendError::Cleanup(format!("failed to remove {}: {}", path, e)))?;
        }
        self.permit.take();
        Ok(())
    }
}

impl Drop for ProcessJob {
    fn drop(&mut self) {
        self.kill_live_group();
    }
}

async fn forward_output<R>(
    mut reader: R,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<(OutputStream, String)>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if tx.send((stream, chunk)).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::debug!("Failed to read {}: {}", stream_name(stream), e);
                break;
            }
        }
    }
}

fn stage_timeout(limits: StageLimits) -> Option<Duration> {
    (limits.timeout > 0).then(|| Duration::from_millis(limits.timeout as u64))
}

fn stream_name(stream: OutputStream) -> &'static str {
    match stream {
        OutputStream::Stdout => "stdout",
        OutputStream::Stderr => "stderr",
    }
}

#[cfg(unix)]
fn exit_parts(status: std::process::ExitStatus) -> (Option<i32>, Option<String>) {
    use std::os::unix::process::ExitStatusExt;

    let signal = status.signal().map(|number| {
        nix::sys::signal::Signal::try_from(number)
            .map(|signal| signal.as_str().to_string())
            .unwrap_or_else(|_| format!("SIG{}", number))
    });
    (status.code(), signal)
}

#[cfg(not(unix))]
fn exit_parts(status: std::process::ExitStatus) -> (Option<i32>, Option<String>) {
    (status.code(), None)
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    use nix::sys::signal::{killpg, Signal as NixSignal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pgid), NixSignal::SIGKILL) {
        log::debug!("Process group {} already gone: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {}

#[cfg(unix)]
fn signal_group(pgid: i32, signal: Signal) {
    use std::str::FromStr;

    use nix::sys::signal::{killpg, Signal as NixSignal};
    use nix::unistd::Pid;

    match NixSignal::from_str(signal.as_str()) {
        Ok(native) => {
            if let Err(e) = killpg(Pid::from_raw(pgid), native) {
                log::debug!("Failed to deliver {} to group {}: {}", signal, pgid, e);
            }
        }
        Err(_) => log::warn!("{} is not supported on this platform, ignoring", signal),
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: i32, signal: Signal) {
    log::warn!("{} is not supported on this platform, ignoring", signal);
}
