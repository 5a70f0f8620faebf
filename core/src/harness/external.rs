use std::{collections::HashMap, process::Stdio, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use super::{CaseFiles, JudgeStep};
use crate::{
    program::{ExitKind, Program, RunOptions},
    str_interp::interp_args,
    verdict::{ExitCodeTable, Verdict, VerdictRecord},
};

/// Re-invokes a checker once with other arguments when it exits with
/// `on_exit_code`. Some checker libraries use a reserved exit code to ask for
/// a different argument order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompatRetry {
    pub on_exit_code: i32,
    pub args: Vec<String>,
}

/// A checker run as a separate program. Its exit code is looked up in
/// `exit_codes`; argument templates may use `#{inputFile}`, `#{outputFile}`
/// and `#{judgeFile}`.
#[derive(Debug)]
pub struct ExternalChecker {
    program: Program,
    args: Vec<String>,
    exit_codes: ExitCodeTable,
    compat_retry: Option<CompatRetry>,
    timeout: Option<Duration>,
    verbose: bool,
}

impl ExternalChecker {
    pub fn new(program: Program, exit_codes: ExitCodeTable) -> Self {
        Self {
            program,
            args: vec![
                "#{inputFile}".to_owned(),
                "#{outputFile}".to_owned(),
                "#{judgeFile}".to_owned(),
            ],
            exit_codes,
            compat_retry: None,
            timeout: None,
            verbose: false,
        }
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn compat_retry(mut self, retry: Option<CompatRetry>) -> Self {
        self.compat_retry = retry;
        self
    }

    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn verbose(mut self, yes: bool) -> Self {
        self.verbose = yes;
        self
    }

    async fn invoke(&self, template: &[String], files: &CaseFiles) -> anyhow::Result<(ExitKind, String)> {
        let mut vars = HashMap::new();
        vars.insert("inputFile", files.input.to_string_lossy().into_owned());
        vars.insert("outputFile", files.output.to_string_lossy().into_owned());
        if let Some(judge) = &files.judge {
            vars.insert("judgeFile", judge.to_string_lossy().into_owned());
        }
        let args = interp_args(template, &vars)?;

        let mut opts = RunOptions::new().args(args).stderr(Stdio::piped());
        if let Some(limit) = self.timeout {
            opts = opts.timeout(limit);
        }
        let res = self.program.run(opts).await?;
        Ok((res.status, String::from_utf8_lossy(&res.stderr).trim_end().to_owned()))
    }

    fn classify(&self, status: ExitKind, message: String) -> VerdictRecord {
        match status {
            ExitKind::Exited(code) => match self.exit_codes.verdict_for(code) {
                Some(Verdict::Accepted) => VerdictRecord {
                    message,
                    ..VerdictRecord::accepted(1.0)
                },
                Some(v) => VerdictRecord::rejected(v, message),
                None => VerdictRecord::rejected(
                    Verdict::Fail,
                    format!("checker exited with unmapped code {}: {}", code, message),
                ),
            },
            ExitKind::Signaled(_) | ExitKind::TimedOut => {
                VerdictRecord::rejected(Verdict::Fail, format!("checker {}", status))
            }
        }
    }

    async fn run_checker(&self, files: &CaseFiles) -> anyhow::Result<VerdictRecord> {
        self.program.compile().await?;
        let (status, message) = self.invoke(&self.args, files).await?;
        match &self.compat_retry {
            Some(retry) if status == ExitKind::Exited(retry.on_exit_code) => {
                log::warn!(
                    "Checker exited with {}; retrying with compatibility arguments",
                    retry.on_exit_code
                );
                let (status, message) = self.invoke(&retry.args, files).await?;
                Ok(self.classify(status, message))
            }
            _ => Ok(self.classify(status, message)),
        }
    }
}

#[async_trait]
impl JudgeStep for ExternalChecker {
    async fn judge(&mut self, files: &CaseFiles) -> VerdictRecord {
        match self.run_checker(files).await {
            Ok(record) => record,
            Err(e) => VerdictRecord::from_error(&e.into(), self.verbose),
        }
    }
}
