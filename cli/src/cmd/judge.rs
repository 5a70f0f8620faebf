use std::path::PathBuf;

use anyhow::{ensure, Context as _};
use kjudge_core::testing::RunSummary;

use super::{GlobalArgs, OutputFormat, SubcmdResult};
use crate::{style, util};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Run only testcases whose name contains this string.
    #[arg()] // positional argument
    pub filter: Option<String>,

    #[arg(short = 'd', long)]
    pub testcase_dir: Option<PathBuf>,

    /// Keep candidate outputs in this directory instead of a temporary one.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

pub async fn exec(args: &Args, global: &GlobalArgs) -> SubcmdResult {
    let mut cfg = global.load_config()?;
    if let Some(dir) = &args.testcase_dir {
        cfg.testcases.dir = util::current_dir().join(dir);
    }

    let mut testcases = cfg.testcases()?;
    if let Some(filter) = &args.filter {
        testcases.retain(|t| t.name().contains(filter.as_str()));
    }
    ensure!(
        !testcases.is_empty(),
        "No testcases found in {}",
        cfg.base_dir().join(&cfg.testcases.dir).display()
    );

    let mut runner = cfg.build_runner(global.verbose)?;
    runner.compile().await?;

    let scratch = fsutil::scratch_dir("kjudge-out-").context("Cannot create a scratch dir")?;
    let out_dir = match &args.output_dir {
        Some(dir) => {
            fsutil::mkdir_all(dir)?;
            dir.clone()
        }
        None => scratch.path().to_owned(),
    };

    let show_progress = global.format == OutputFormat::Text;
    let mut outcomes = Vec::with_capacity(testcases.len());
    for t in &testcases {
        let bar = show_progress.then(|| style::spinner(format!("Testcase {} ...", t.name())));
        let outcome = runner.run_case(t, &out_dir).await;
        if let Some(bar) = bar {
            bar.finish_with_message(style::outcome_line(&outcome));
        }
        outcomes.push(outcome);
    }

    let summary = RunSummary::from_outcomes(outcomes, runner.get_aggregate());
    match global.format {
        OutputFormat::Text => style::print_summary(&summary),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Cannot serialize the summary")?
        ),
        OutputFormat::Xml => println!("{}", summary.verdict.to_xml()),
    }
    Ok(super::exit_code(&cfg, summary.verdict.verdict))
}
