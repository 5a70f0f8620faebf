use std::path::PathBuf;

use anyhow::bail;
use kjudge_core::harness::CaseFiles;

use super::{GlobalArgs, SubcmdResult};

/// Judge an existing output file with the configured checker.
#[derive(Debug, clap::Args)]
pub struct Args {
    pub input: PathBuf,
    pub output: PathBuf,
    pub judge: Option<PathBuf>,
}

pub async fn exec(args: &Args, global: &GlobalArgs) -> SubcmdResult {
    let cfg = global.load_config()?;
    let Some(mut step) = cfg.judge_step(global.verbose)? else {
        bail!("No checker configured: [checker] kind is \"none\"");
    };
    let files = CaseFiles {
        input: args.input.clone(),
        output: args.output.clone(),
        judge: args.judge.clone(),
    };
    let record = step.judge(&files).await;
    global.print_record(&record)?;
    Ok(super::exit_code(&cfg, record.verdict))
}
