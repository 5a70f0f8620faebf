pub mod aggregate;
pub mod builtin;
pub mod checker;
pub mod external;
pub mod interactor;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::verdict::VerdictRecord;

pub use aggregate::Aggregate;
pub use checker::{CaseCount, Checker, CheckerBuilder};
pub use external::{CompatRetry, ExternalChecker};
pub use interactor::{run_interactor, run_session, InteractorSession, NodeChannel};

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Checker step '{0}' is not set")]
    MissingStep(&'static str),
}

/// The files one case is judged from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFiles {
    pub input: PathBuf,
    pub output: PathBuf,
    pub judge: Option<PathBuf>,
}

/// Judges one case after the candidate has produced its output.
#[async_trait]
pub trait JudgeStep: Send {
    async fn judge(&mut self, files: &CaseFiles) -> VerdictRecord;
}
