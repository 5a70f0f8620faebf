use std::{
    collections::HashMap,
    io,
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    sync::OnceCell,
    task::JoinHandle,
    time::Instant,
};

use crate::str_interp::{interp_args, InterpError};

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error(transparent)]
    Interp(#[from] InterpError),

    #[error("Empty run command for '{0}'")]
    EmptyCommand(PathBuf),

    #[error("'{0}' has not been compiled yet")]
    NotCompiled(PathBuf),

    #[error("Failed to spawn '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("Compile error in '{filename}' ({status}):\n{stderr}")]
    Compile {
        filename: PathBuf,
        status: ExitKind,
        stderr: String,
    },

    #[error("Failed to wait for '{0}': {1}")]
    Wait(PathBuf, #[source] io::Error),
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitKind {
    Exited(i32),
    Signaled(i32),
    TimedOut,
}

impl ExitKind {
    pub fn success(self) -> bool {
        self == ExitKind::Exited(0)
    }

    pub fn code(self) -> Option<i32> {
        match self {
            ExitKind::Exited(code) => Some(code),
            _ => None,
        }
    }
}

impl From<ExitStatus> for ExitKind {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitKind::Exited(code),
            (None, Some(sig)) => ExitKind::Signaled(sig),
            (None, None) => ExitKind::Exited(-1),
        }
    }
}

impl std::fmt::Display for ExitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitKind::Exited(code) => write!(f, "exit code {}", code),
            ExitKind::Signaled(sig) => write!(f, "killed by signal {}", sig),
            ExitKind::TimedOut => f.write_str("timed out"),
        }
    }
}

#[derive(Debug)]
pub struct RunResult {
    pub status: ExitKind,
    /// Present only when measuring was requested.
    pub elapsed: Option<Duration>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Settings for one run. Unset stdio streams are connected to `/dev/null`;
/// piped stdout/stderr are captured into the [`RunResult`].
#[derive(Debug, Default)]
pub struct RunOptions {
    args: Vec<String>,
    stdin: Option<Stdio>,
    stdout: Option<Stdio>,
    stderr: Option<Stdio>,
    timeout: Option<Duration>,
    measure_time: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, stdin: impl Into<Stdio>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn stdout(mut self, stdout: impl Into<Stdio>) -> Self {
        self.stdout = Some(stdout.into());
        self
    }

    pub fn stderr(mut self, stderr: impl Into<Stdio>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn measure_time(mut self, yes: bool) -> Self {
        self.measure_time = yes;
        self
    }
}

/// A source file with a compile step (possibly none) and a run command.
///
/// Commands are argv templates; `#{filePath}`, `#{fileName}`, `#{fileDir}`,
/// `#{fileStem}` and `#{fileExt}` expand to parts of `filename`.
/// [`Program::compile`] must succeed once before the program can be run;
/// later calls return immediately.
#[derive(Debug)]
pub struct Program {
    filename: PathBuf,
    compile: Vec<String>,
    run: Vec<String>,
    working_dir: PathBuf,
    compiled: OnceCell<()>,
}

impl Program {
    pub fn new(filename: impl Into<PathBuf>, run: Vec<String>) -> Self {
        Self {
            filename: filename.into(),
            compile: Vec::new(),
            run,
            working_dir: PathBuf::from("."),
            compiled: OnceCell::new(),
        }
    }

    pub fn compile_command(mut self, cmd: Vec<String>) -> Self {
        self.compile = cmd;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.initialized()
    }

    fn interp_vars(&self) -> HashMap<&'static str, String> {
        let path = &self.filename;
        let lossy = |s: Option<&std::ffi::OsStr>| {
            s.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
        };
        let mut m = HashMap::new();
        m.insert("filePath", path.to_string_lossy().into_owned());
        m.insert("fileName", lossy(path.file_name()));
        m.insert(
            "fileDir",
            match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_string_lossy().into_owned(),
                _ => ".".to_owned(),
            },
        );
        m.insert("fileStem", lossy(path.file_stem()));
        m.insert("fileExt", lossy(path.extension()));
        m
    }

    fn argv(&self, template: &[String], extra: &[String]) -> Result<Vec<String>, ProgramError> {
        let mut argv = interp_args(template, &self.interp_vars())?;
        if argv.is_empty() {
            return Err(ProgramError::EmptyCommand(self.filename.clone()));
        }
        argv.extend(extra.iter().cloned());
        Ok(argv)
    }

    pub async fn compile(&self) -> Result<(), ProgramError> {
        self.compiled
            .get_or_try_init(|| async {
                if self.compile.is_empty() {
                    return Ok(());
                }
                let argv = self.argv(&self.compile, &[])?;
                log::info!("Compiling {}: {}", self.filename.display(), argv.join(" "));
                let output = Command::new(&argv[0])
                    .args(&argv[1..])
                    .current_dir(&self.working_dir)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await
                    .map_err(|source| ProgramError::Spawn {
                        cmd: argv.join(" "),
                        source,
                    })?;
                if output.status.success() {
                    Ok(())
                } else {
                    Err(ProgramError::Compile {
                        filename: self.filename.clone(),
                        status: output.status.into(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    })
                }
            })
            .await
            .map(|_| ())
    }

    /// A command ready to spawn, with `extra_args` appended to the run command.
    /// The process is killed if the returned handle is dropped.
    pub fn command(&self, extra_args: &[String]) -> Result<Command, ProgramError> {
        if !self.is_compiled() {
            return Err(ProgramError::NotCompiled(self.filename.clone()));
        }
        let argv = self.argv(&self.run, extra_args)?;
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(&self.working_dir)
            .kill_on_drop(true);
        Ok(cmd)
    }

    fn spawn(
        &self,
        extra_args: &[String],
        stdin: Stdio,
        stdout: Stdio,
        stderr: Stdio,
    ) -> Result<Child, ProgramError> {
        // The command owns the parent's copies of the stdio handles; it is
        // dropped right after spawning so pipe ends do not stay open here.
        let mut cmd = self.command(extra_args)?;
        cmd.stdin(stdin).stdout(stdout).stderr(stderr);
        cmd.spawn().map_err(|source| ProgramError::Spawn {
            cmd: format!("{} {}", self.run.join(" "), extra_args.join(" ")),
            source,
        })
    }

    pub async fn run(&self, opts: RunOptions) -> Result<RunResult, ProgramError> {
        let RunOptions {
            args,
            stdin,
            stdout,
            stderr,
            timeout,
            measure_time,
        } = opts;
        let mut child = self.spawn(
            &args,
            stdin.unwrap_or_else(Stdio::null),
            stdout.unwrap_or_else(Stdio::null),
            stderr.unwrap_or_else(Stdio::null),
        )?;
        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());

        let (status, elapsed) = wait_with_limit(&mut child, timeout)
            .await
            .map_err(|e| ProgramError::Wait(self.filename.clone(), e))?;
        log::debug!(
            "{} finished: {} in {:?}",
            self.filename.display(),
            status,
            elapsed
        );

        Ok(RunResult {
            status,
            elapsed: measure_time.then_some(elapsed),
            stdout: collect(stdout).await,
            stderr: collect(stderr).await,
        })
    }
}

/// Waits for `child`, killing it when `limit` passes first.
pub(crate) async fn wait_with_limit(
    child: &mut Child,
    limit: Option<Duration>,
) -> io::Result<(ExitKind, Duration)> {
    let start_at = Instant::now();
    let status = match limit {
        None => Some(child.wait().await?),
        Some(limit) => tokio::time::timeout(limit, child.wait())
            .await
            .ok()
            .transpose()?,
    };
    let elapsed = start_at.elapsed();
    match status {
        Some(status) => Ok((status.into(), elapsed)),
        None => {
            child
                .kill()
                .await
                .unwrap_or_else(|e| log::warn!("Failed to kill timed-out process: {:#}", e));
            Ok((ExitKind::TimedOut, elapsed))
        }
    }
}

pub(crate) fn capture<R>(reader: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|mut r| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = r.read_to_end(&mut buf).await {
                log::warn!("Failed to capture child output: {:#}", e);
            }
            buf
        })
    })
}

pub(crate) async fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    match handle {
        Some(h) => h.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn python(script: &str) -> Program {
        Program::new(
            "script.py",
            vec!["python3".to_owned(), "-c".to_owned(), script.to_owned()],
        )
    }

    #[tokio::test]
    async fn run_requires_compile() {
        let p = python("print(1)");
        assert!(matches!(
            p.run(RunOptions::new()).await,
            Err(ProgramError::NotCompiled(_))
        ));
        p.compile().await.unwrap();
        p.compile().await.unwrap();
        assert!(p.is_compiled());
    }

    #[tokio::test]
    async fn run_captures_and_passes_args() {
        let p = python("import sys; print(sys.argv[1:]); sys.exit(3)");
        p.compile().await.unwrap();
        let res = p
            .run(
                RunOptions::new()
                    .args(["a", "b"])
                    .stdout(Stdio::piped())
                    .measure_time(true),
            )
            .await
            .unwrap();
        assert_eq!(res.status, ExitKind::Exited(3));
        assert_eq!(String::from_utf8_lossy(&res.stdout), "['a', 'b']\n");
        assert!(res.elapsed.is_some());
    }

    #[tokio::test]
    async fn run_times_out() {
        let p = python("import time; time.sleep(5)");
        p.compile().await.unwrap();
        let res = p
            .run(RunOptions::new().timeout(Duration::from_millis(200)))
            .await
            .unwrap();
        assert_eq!(res.status, ExitKind::TimedOut);
        assert_eq!(res.elapsed, None);
    }

    #[tokio::test]
    async fn run_reports_signal() {
        let p = python("import os, signal; os.kill(os.getpid(), signal.SIGKILL)");
        p.compile().await.unwrap();
        let res = p.run(RunOptions::new()).await.unwrap();
        assert_eq!(res.status, ExitKind::Signaled(9));
        assert!(!res.status.success());
    }

    #[tokio::test]
    async fn compile_failure_is_reported_once() {
        let p = python("print(1)").compile_command(vec![
            "python3".to_owned(),
            "-c".to_owned(),
            "import sys; sys.stderr.write('boom'); sys.exit(1)".to_owned(),
        ]);
        match p.compile().await {
            Err(ProgramError::Compile { stderr, status, .. }) => {
                assert_eq!(stderr, "boom");
                assert_eq!(status, ExitKind::Exited(1));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!p.is_compiled());
    }

    #[test]
    fn interp_vars_from_filename() {
        let p = Program::new("src/main.cpp", vec!["./#{fileDir}/#{fileStem}.#{fileExt}".to_owned()]);
        assert_eq!(p.argv(&p.run, &[]).unwrap(), ["./src/main.cpp"]);
        let p = Program::new("main.cpp", vec!["#{fileDir}/#{fileName}".to_owned()]);
        assert_eq!(p.argv(&p.run, &["x".to_owned()]).unwrap(), ["./main.cpp", "x"]);
        let p = Program::new("main.cpp", vec![]);
        assert!(matches!(p.argv(&p.run, &[]), Err(ProgramError::EmptyCommand(_))));
    }
}
