use std::{collections::HashMap, path::Path, time::Duration};

use anyhow::Context as _;

use super::{result::*, testcase::*};
use crate::{
    harness::{Aggregate, CaseFiles, JudgeStep},
    interaction::{Interaction, InteractionReport, StderrSink, Wiring},
    program::{ExitKind, Program, RunOptions},
    str_interp::interp_args,
    verdict::{ExitCodeTable, JudgeError, Verdict, VerdictRecord},
};

/// Everything about the interactor side of an interactive problem.
#[derive(Debug)]
pub struct InteractiveSetup {
    pub interactor: Program,
    pub nodes: usize,
    pub wiring: Wiring,
    pub pass_node_id: bool,
    /// Templates over `#{inputFile}`, `#{outputFile}` and `#{judgeFile}`.
    pub args: Vec<String>,
    pub interactor_timeout: Option<Duration>,
    pub exit_codes: ExitCodeTable,
}

/// Runs a candidate over testcases and judges every case.
pub struct JudgeRunner {
    candidate: Program,
    interactive: Option<InteractiveSetup>,
    judge: Option<Box<dyn JudgeStep>>,
    execution_time_limit: Duration,
    slack: Duration,
    max_workers: usize,
    stderr_capture_max_bytes: usize,
    candidate_stderr: StderrSink,
    aggregate: Aggregate,
    verbose: bool,
}

impl JudgeRunner {
    const DEFAULT_EXEC_TIME_LIMIT: Duration = Duration::from_millis(2000);

    pub fn new(candidate: Program) -> Self {
        Self {
            candidate,
            interactive: None,
            judge: None,
            execution_time_limit: Self::DEFAULT_EXEC_TIME_LIMIT,
            slack: Interaction::DEFAULT_SLACK,
            max_workers: Interaction::DEFAULT_MAX_WORKERS,
            stderr_capture_max_bytes: 64 * 1024,
            candidate_stderr: StderrSink::Discard,
            aggregate: Aggregate::Minimum,
            verbose: false,
        }
    }

    pub fn interactive(mut self, setup: InteractiveSetup) -> Self {
        self.interactive = Some(setup);
        self
    }

    pub fn judge_step(mut self, step: Box<dyn JudgeStep>) -> Self {
        self.judge = Some(step);
        self
    }

    pub fn execution_time_limit(mut self, limit: Duration) -> Self {
        self.execution_time_limit = limit;
        self
    }

    pub fn slack(mut self, slack: Duration) -> Self {
        self.slack = slack;
        self
    }

    pub fn max_workers(mut self, cap: usize) -> Self {
        self.max_workers = cap;
        self
    }

    pub fn stderr_capture_max_bytes(mut self, n: usize) -> Self {
        self.stderr_capture_max_bytes = n;
        self
    }

    pub fn candidate_stderr(mut self, sink: StderrSink) -> Self {
        self.candidate_stderr = sink;
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// Puts the full error chain into engine failure messages.
    pub fn verbose(mut self, yes: bool) -> Self {
        self.verbose = yes;
        self
    }

    pub fn get_aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    /// Compiles every program involved. A failure here ends the whole run.
    pub async fn compile(&self) -> anyhow::Result<()> {
        self.candidate
            .compile()
            .await
            .context("Failed to compile the candidate")?;
        if let Some(setup) = &self.interactive {
            setup
                .interactor
                .compile()
                .await
                .context("Failed to compile the interactor")?;
        }
        Ok(())
    }

    /// Runs and judges one case. `scratch` receives the candidate's output.
    /// The programs must be compiled already. Failures of the engine itself
    /// end up as an `EngineException` row instead of aborting the run.
    pub async fn run_case(&mut self, testcase: &FsTestcase, scratch: &Path) -> TestOutcome {
        let files = CaseFiles {
            input: testcase.input_path().to_owned(),
            output: scratch.join(format!("{}.out", testcase.name())),
            judge: testcase.judge_path().map(Path::to_owned),
        };
        log::info!("Running testcase {}", testcase.name());

        let executed = match &self.interactive {
            None => self.run_batch(&files).await,
            Some(setup) => self.run_interactive(setup, &files).await,
        };
        let (record, elapsed) = match executed {
            Ok((Some(rejected), elapsed)) => (rejected, Some(elapsed)),
            Ok((None, elapsed)) => {
                let record = match &mut self.judge {
                    Some(step) => step.judge(&files).await,
                    None => VerdictRecord::accepted(1.0),
                };
                (record, Some(elapsed))
            }
            Err(e) => {
                log::error!("Testcase {}: {:#}", testcase.name(), e);
                (VerdictRecord::from_error(&JudgeError::Engine(e), self.verbose), None)
            }
        };
        TestOutcome {
            name: testcase.name().to_owned(),
            record,
            elapsed,
        }
    }

    async fn run_batch(&self, files: &CaseFiles) -> anyhow::Result<(Option<VerdictRecord>, Duration)> {
        let stdin = fsutil::open_file(&files.input)?;
        let stdout = fsutil::create_file(&files.output)?;
        let res = self
            .candidate
            .run(
                RunOptions::new()
                    .stdin(stdin)
                    .stdout(stdout)
                    .stderr(self.candidate_stderr.stdio())
                    .timeout(self.execution_time_limit)
                    .measure_time(true),
            )
            .await?;
        let elapsed = res.elapsed.unwrap_or_default();
        let rejected = match res.status {
            ExitKind::TimedOut => Some(VerdictRecord::rejected(
                Verdict::TimeLimitExceeded,
                format!("exceeded {:?}", self.execution_time_limit),
            )),
            ExitKind::Exited(0) => None,
            status => Some(VerdictRecord::rejected(Verdict::RuntimeError, status.to_string())),
        };
        Ok((rejected, elapsed))
    }

    async fn run_interactive(
        &self,
        setup: &InteractiveSetup,
        files: &CaseFiles,
    ) -> anyhow::Result<(Option<VerdictRecord>, Duration)> {
        let mut vars = HashMap::new();
        vars.insert("inputFile", files.input.to_string_lossy().into_owned());
        vars.insert("outputFile", files.output.to_string_lossy().into_owned());
        if let Some(judge) = &files.judge {
            vars.insert("judgeFile", judge.to_string_lossy().into_owned());
        }
        let args = interp_args(&setup.args, &vars)?;

        let report = Interaction::new(&setup.interactor, &self.candidate)
            .nodes(setup.nodes)
            .wiring(setup.wiring)
            .pass_node_id(setup.pass_node_id)
            .interactor_args(args)
            .timeout(self.execution_time_limit)
            .interactor_timeout(setup.interactor_timeout)
            .slack(self.slack)
            .max_workers(self.max_workers)
            .stderr_capture_max_bytes(self.stderr_capture_max_bytes)
            .candidate_stderr(self.candidate_stderr)
            .run()
            .await
            .context("Interaction failed")?;

        let elapsed = report
            .nodes
            .iter()
            .map(|n| n.elapsed)
            .max()
            .unwrap_or_default();
        Ok((classify(&report, &setup.exit_codes), elapsed))
    }

    pub async fn run_all(&mut self, testcases: &[FsTestcase]) -> anyhow::Result<RunSummary> {
        self.compile().await?;
        let scratch = fsutil::scratch_dir("kjudge-run-")?;
        let mut outcomes = Vec::with_capacity(testcases.len());
        for t in testcases {
            outcomes.push(self.run_case(t, scratch.path()).await);
        }
        Ok(RunSummary::from_outcomes(outcomes, &self.aggregate))
    }
}

/// Decides the verdict of an interaction before any judge step runs.
/// `None` means the interaction went through and the judge step decides.
pub fn classify(report: &InteractionReport, exit_codes: &ExitCodeTable) -> Option<VerdictRecord> {
    if let Some((i, _)) = report
        .nodes
        .iter()
        .enumerate()
        .find(|(_, n)| n.status == ExitKind::TimedOut)
    {
        return Some(VerdictRecord::rejected(
            Verdict::TimeLimitExceeded,
            format!("node {} exceeded the time limit", i),
        ));
    }

    let stderr = String::from_utf8_lossy(&report.interactor_stderr)
        .trim_end()
        .to_owned();
    match report.interactor.status {
        ExitKind::Exited(code) => match exit_codes.verdict_for(code) {
            Some(Verdict::Accepted) => {}
            Some(verdict) => return Some(VerdictRecord::rejected(verdict, stderr)),
            None => {
                return Some(VerdictRecord::rejected(
                    Verdict::Fail,
                    format!("interactor exited with unmapped code {}: {}", code, stderr),
                ))
            }
        },
        status => {
            return Some(VerdictRecord::rejected(
                Verdict::Fail,
                format!("interactor {}", status),
            ))
        }
    }

    report.first_failed_node().map(|(i, n)| {
        VerdictRecord::rejected(Verdict::RuntimeError, format!("node {}: {}", i, n.status))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{harness::builtin, interaction::ParticipantResult};

    fn python(script: &str) -> Program {
        Program::new(
            "main.py",
            vec!["python3".to_owned(), "-c".to_owned(), script.to_owned()],
        )
    }

    fn table() -> ExitCodeTable {
        ExitCodeTable::new([
            (Verdict::Accepted, 0),
            (Verdict::Wrong, 1),
            (Verdict::ParseError, 2),
            (Verdict::Fail, 3),
        ])
        .unwrap()
    }

    fn report(nodes: &[ExitKind], interactor: ExitKind) -> InteractionReport {
        let p = |status| ParticipantResult {
            status,
            elapsed: Duration::ZERO,
        };
        InteractionReport {
            nodes: nodes.iter().copied().map(p).collect(),
            interactor: p(interactor),
            interactor_stderr: b"bad answer\n".to_vec(),
        }
    }

    #[test]
    fn classify_short_circuits_in_order() {
        use ExitKind::*;
        let t = table();
        let v = |r: InteractionReport| classify(&r, &t).map(|r| r.verdict);

        assert_eq!(v(report(&[Exited(0)], Exited(0))), None);
        assert_eq!(v(report(&[Exited(0), TimedOut], Exited(1))), Some(Verdict::TimeLimitExceeded));
        assert_eq!(v(report(&[Exited(1)], Exited(1))), Some(Verdict::Wrong));
        assert_eq!(v(report(&[Signaled(9)], Exited(0))), Some(Verdict::RuntimeError));
        assert_eq!(v(report(&[Exited(0)], Exited(99))), Some(Verdict::Fail));
        assert_eq!(v(report(&[Exited(0)], TimedOut)), Some(Verdict::Fail));

        let r = classify(&report(&[Exited(0)], Exited(3)), &t).unwrap();
        assert_eq!(r, VerdictRecord::rejected(Verdict::Fail, "bad answer"));
    }

    async fn batch(script: &str, input: &str, answer: &str) -> RunSummary {
        let dir = tempfile::tempdir().unwrap();
        fsutil::write(dir.path().join("01.in"), input).unwrap();
        fsutil::write(dir.path().join("01.ans"), answer).unwrap();
        let cases =
            FsTestcase::enumerate(dir.path(), None, "ans").unwrap();
        JudgeRunner::new(python(script))
            .judge_step(Box::new(builtin::tokens().unwrap()))
            .execution_time_limit(Duration::from_millis(500))
            .run_all(&cases)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn batch_verdicts() {
        let s = batch("print('hello_' + input())", "123\n", "hello_123\n").await;
        assert_eq!(s.verdict, VerdictRecord::accepted(1.0));
        assert!(s.outcomes[0].elapsed.is_some());

        let s = batch("print('hello_124')", "123\n", "hello_123\n").await;
        assert_eq!(s.verdict.verdict, Verdict::Wrong);

        let s = batch("print('hello_123'); exit(42)", "123\n", "hello_123\n").await;
        assert_eq!(s.verdict.verdict, Verdict::RuntimeError);
        assert_eq!(s.verdict.message, "01: exit code 42");

        let s = batch("import time; time.sleep(3)", "123\n", "hello_123\n").await;
        assert_eq!(s.verdict.verdict, Verdict::TimeLimitExceeded);
    }

    #[tokio::test]
    async fn spawn_failure_becomes_an_engine_exception() {
        let dir = tempfile::tempdir().unwrap();
        fsutil::write(dir.path().join("01.in"), "1\n").unwrap();
        fsutil::write(dir.path().join("02.in"), "2\n").unwrap();
        let cases = FsTestcase::enumerate(dir.path(), None, "ans").unwrap();

        let candidate = Program::new("main", vec!["/nonexistent/bin".to_owned()]);
        let s = JudgeRunner::new(candidate).run_all(&cases).await.unwrap();
        assert_eq!(s.outcomes.len(), 2);
        assert_eq!(s.count(Verdict::EngineException), 2);
        assert_eq!(s.verdict.verdict, Verdict::EngineException);
        assert!(s.verdict.message.starts_with("01: "), "{}", s.verdict.message);
        assert!(s.outcomes[0].elapsed.is_none());
    }

    #[tokio::test]
    async fn compile_errors_are_fatal() {
        let candidate = python("pass").compile_command(vec!["false".to_owned()]);
        let mut runner = JudgeRunner::new(candidate);
        assert!(runner.run_all(&[]).await.is_err());
    }

    #[tokio::test]
    async fn interactive_direct() {
        let dir = tempfile::tempdir().unwrap();
        fsutil::write(dir.path().join("01.in"), "6\n").unwrap();
        let cases =
            FsTestcase::enumerate(dir.path(), None, "ans").unwrap();

        let interactor = python(
            "import sys\n\
             n = open(sys.argv[1]).read().split()[0]\n\
             print(n, flush=True)\n\
             got = sys.stdin.readline().strip()\n\
             sys.exit(0 if got == str(int(n) * 2) else 1)",
        );
        let setup = InteractiveSetup {
            interactor,
            nodes: 1,
            wiring: Wiring::Direct,
            pass_node_id: false,
            args: vec!["#{inputFile}".to_owned()],
            interactor_timeout: None,
            exit_codes: table(),
        };
        let mut runner = JudgeRunner::new(python("print(int(input()) * 2)")).interactive(setup);
        let s = runner.run_all(&cases).await.unwrap();
        assert_eq!(s.verdict, VerdictRecord::accepted(1.0));
    }
}
