use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::{ensure, Context as _};
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::harness::{builtin, Aggregate, CompatRetry, ExternalChecker, JudgeStep};
use crate::interaction::{StderrSink, Wiring};
use crate::program::Program;
use crate::testing::{FsTestcase, GlobPattern, InteractiveSetup, JudgeRunner};
use crate::verdict::ExitCodeTable;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub candidate: ProgramConfig,
    pub interaction: Option<InteractionConfig>,
    #[serde(default)]
    pub checker: CheckerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub testcases: TestcasesConfig,
    #[serde(default)]
    pub exit_codes: ExitCodeTable,
    #[serde(default)]
    pub aggregate: Aggregate,
}

/// A program as written in the config. Paths are relative to the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramConfig {
    pub file: PathBuf,
    #[serde(default)]
    pub compile: Vec<String>,
    pub run: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProgramConfig {
    pub fn to_program(&self, base_dir: &Path) -> Program {
        let working_dir = match &self.working_dir {
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_owned(),
        };
        Program::new(base_dir.join(&self.file), self.run.clone())
            .compile_command(self.compile.clone())
            .working_dir(working_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionConfig {
    pub interactor: ProgramConfig,
    #[serde(default = "one")]
    pub nodes: usize,
    #[serde(default)]
    pub wiring: Wiring,
    #[serde(default)]
    pub pass_node_id: bool,
    #[serde(default = "default_interactor_args")]
    pub args: Vec<String>,
    pub timeout_ms: Option<u64>,
}

fn one() -> usize {
    1
}

fn default_interactor_args() -> Vec<String> {
    vec!["#{inputFile}".to_owned(), "#{outputFile}".to_owned()]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckerConfig {
    None,
    #[default]
    Tokens,
    External(ExternalCheckerConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalCheckerConfig {
    pub program: ProgramConfig,
    pub args: Option<Vec<String>>,
    pub timeout_ms: Option<u64>,
    pub compat_retry: Option<CompatRetry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub time_ms: u64,
    pub slack_ms: u64,
    pub max_workers: usize,
    pub stderr_capture_max_bytes: usize,
    pub show_candidate_stderr: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            time_ms: 2000,
            slack_ms: 1000,
            max_workers: 16,
            stderr_capture_max_bytes: 64 * 1024,
            show_candidate_stderr: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestcasesConfig {
    pub dir: PathBuf,
    /// Input files to pick up; `*.in` when unset.
    pub include: Option<GlobPattern>,
    pub judge_extension: String,
}

impl Default for TestcasesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("tests"),
            include: None,
            judge_extension: "ans".to_owned(),
        }
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "kjudge.toml";

    pub fn example_toml() -> String {
        Asset::get(Self::FILENAME)
            .map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
            .unwrap_or_default()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> anyhow::Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let cur_dir = cur_dir.as_ref();
        cur_dir
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
            .with_context(|| format!("Not in a problem dir: Cannot find '{}'", Self::FILENAME))
    }

    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_filepath = Config::find_file_in_ancestors(cur_dir)?;
        Self::from_toml_file(config_filepath)
    }

    /// Directory relative paths in the config are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.source_config_file
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_owned)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.limits.time_ms)
    }

    pub fn testcases(&self) -> anyhow::Result<Vec<FsTestcase>> {
        let dir = self.base_dir().join(&self.testcases.dir);
        let t = &self.testcases;
        let cases = FsTestcase::enumerate(&dir, t.include.as_ref(), &t.judge_extension)
            .context("Cannot list testcases")?;
        log::debug!("Found {} testcase(s) in {}", cases.len(), dir.display());
        Ok(cases)
    }

    pub fn judge_step(&self, verbose: bool) -> anyhow::Result<Option<Box<dyn JudgeStep>>> {
        let base = self.base_dir();
        let step: Box<dyn JudgeStep> = match &self.checker {
            CheckerConfig::None => return Ok(None),
            CheckerConfig::Tokens => Box::new(builtin::tokens()?),
            CheckerConfig::External(ext) => {
                ensure!(
                    !self.exit_codes.is_empty(),
                    "An external checker needs an [exit_codes] table"
                );
                let mut checker = ExternalChecker::new(ext.program.to_program(&base), self.exit_codes.clone())
                    .compat_retry(ext.compat_retry.clone())
                    .timeout(ext.timeout_ms.map(Duration::from_millis))
                    .verbose(verbose);
                if let Some(args) = &ext.args {
                    checker = checker.args(args.clone());
                }
                Box::new(checker)
            }
        };
        Ok(Some(step))
    }

    pub fn build_runner(&self, verbose: bool) -> anyhow::Result<JudgeRunner> {
        let base = self.base_dir();
        let mut runner = JudgeRunner::new(self.candidate.to_program(&base))
            .execution_time_limit(self.time_limit())
            .slack(Duration::from_millis(self.limits.slack_ms))
            .max_workers(self.limits.max_workers)
            .stderr_capture_max_bytes(self.limits.stderr_capture_max_bytes)
            .candidate_stderr(if self.limits.show_candidate_stderr {
                StderrSink::Inherit
            } else {
                StderrSink::Discard
            })
            .aggregate(self.aggregate)
            .verbose(verbose);

        if let Some(ia) = &self.interaction {
            ensure!(
                !self.exit_codes.is_empty(),
                "An interactive problem needs an [exit_codes] table"
            );
            runner = runner.interactive(InteractiveSetup {
                interactor: ia.interactor.to_program(&base),
                nodes: ia.nodes,
                wiring: ia.wiring,
                pass_node_id: ia.pass_node_id,
                args: ia.args.clone(),
                interactor_timeout: ia.timeout_ms.map(Duration::from_millis),
                exit_codes: self.exit_codes.clone(),
            });
        }
        if let Some(step) = self.judge_step(verbose)? {
            runner = runner.judge_step(step);
        }
        Ok(runner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::verdict::Verdict;

    #[test]
    fn example_toml_should_be_parsable() {
        let toml = Config::example_toml();
        let cfg = Config::from_toml(&toml).unwrap();
        assert_eq!(cfg.candidate.file, PathBuf::from("main.py"));
        assert_eq!(cfg.checker, CheckerConfig::Tokens);
        assert_eq!(cfg.exit_codes.code_for(Verdict::Fail), Some(3));
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = Config::from_toml("[candidate]\nfile = \"a.py\"\nrun = [\"python3\", \"#{filePath}\"]").unwrap();
        assert_eq!(cfg.limits, LimitsConfig::default());
        assert_eq!(cfg.testcases.judge_extension, "ans");
        assert!(cfg.testcases.include.is_none());
        assert!(cfg.interaction.is_none());
        assert!(matches!(cfg.aggregate, Aggregate::Minimum));
    }

    #[test]
    fn interactive_external_config() {
        let cfg = Config::from_toml(
            r##"
            aggregate = "mean"

            [candidate]
            file = "sol.py"
            run = ["python3", "#{filePath}"]

            [interaction]
            nodes = 3
            wiring = "fifo"
            pass_node_id = true
            args = ["#{inputFile}"]
            [interaction.interactor]
            file = "interactor.py"
            run = ["python3", "#{filePath}"]

            [checker]
            kind = "external"
            compat_retry = { on_exit_code = 7, args = ["#{outputFile}"] }
            [checker.program]
            file = "check.py"
            run = ["python3", "#{filePath}"]

            [exit_codes]
            Accepted = 0
            Wrong = 1
            "##,
        )
        .unwrap();
        let ia = cfg.interaction.as_ref().unwrap();
        assert_eq!((ia.nodes, ia.wiring, ia.pass_node_id), (3, Wiring::Fifo, true));
        let CheckerConfig::External(ext) = &cfg.checker else {
            panic!("expected an external checker");
        };
        assert_eq!(ext.compat_retry.as_ref().unwrap().on_exit_code, 7);
        assert!(cfg.build_runner(false).is_ok());
    }

    #[test]
    fn interaction_needs_exit_codes() {
        let cfg = Config::from_toml(
            r##"
            [candidate]
            file = "sol.py"
            run = ["python3", "#{filePath}"]
            [interaction.interactor]
            file = "i.py"
            run = ["python3", "#{filePath}"]
            "##,
        )
        .unwrap();
        assert!(cfg.build_runner(false).is_err());
    }

    #[test]
    fn paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a/b");
        fsutil::mkdir_all(&sub).unwrap();
        fsutil::write(dir.path().join(Config::FILENAME), Config::example_toml()).unwrap();

        let found = Config::find_file_in_ancestors(&sub).unwrap();
        assert_eq!(found, dir.path().join(Config::FILENAME));
        let cfg = Config::from_file_finding_in_ancestors(&sub).unwrap();
        assert_eq!(cfg.base_dir(), dir.path());
        let p = cfg.candidate.to_program(&cfg.base_dir());
        assert_eq!(p.filename(), dir.path().join("main.py"));
    }
}
