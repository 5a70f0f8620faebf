pub mod check;
pub mod init;
pub mod judge;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use kjudge_core::{
    verdict::{Verdict, VerdictRecord},
    Config,
};

use crate::{style, util};

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Config file to use instead of searching for kjudge.toml upwards.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Init(init::Args),

    #[command(alias("j"))]
    Judge(judge::Args),

    #[command(alias("c"))]
    Check(check::Args),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum OutputFormat {
    Text,
    Json,
    Xml,
}

pub type SubcmdResult = anyhow::Result<ExitCode>;

impl GlobalArgs {
    pub fn init_logger(&self) {
        let default_filter = if self.verbose { "debug" } else { "warn" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .format_timestamp(None)
            .init();
    }

    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Init(args) => init::exec(args, self),
            Judge(args) => judge::exec(args, self).await,
            Check(args) => check::exec(args, self).await,
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        let cfg = match &self.config {
            Some(path) => Config::from_toml_file(path.clone()),
            None => Config::from_file_finding_in_ancestors(util::current_dir()),
        }?;
        log::debug!("Using config {:?}", cfg.source_config_file);
        Ok(cfg)
    }

    pub fn print_record(&self, record: &VerdictRecord) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Text => style::print_record(record),
            OutputFormat::Json => {
                println!("{}", record.to_json().context("Cannot serialize the verdict")?)
            }
            OutputFormat::Xml => println!("{}", record.to_xml()),
        }
        Ok(())
    }
}

pub fn exit_code(cfg: &Config, verdict: Verdict) -> ExitCode {
    ExitCode::from(exit_status(cfg, verdict))
}

/// The process status for a verdict, looked up in the configured table.
/// Verdicts missing from the table (or out of range) exit with 0 or 1.
fn exit_status(cfg: &Config, verdict: Verdict) -> u8 {
    match cfg.exit_codes.code_for(verdict).and_then(|c| u8::try_from(c).ok()) {
        Some(code) => code,
        None if verdict.is_accepted() => 0,
        None => 1,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let app = GlobalArgs::try_parse_from(["kjudge", "judge", "--format", "json", "-v"]).unwrap();
        assert!(app.verbose);
        assert_eq!(app.format, OutputFormat::Json);
        assert!(matches!(app.subcmd, Subcommand::Judge(_)));

        assert!(GlobalArgs::try_parse_from(["kjudge", "judge", "--format", "yaml"]).is_err());
    }

    #[test]
    fn exit_code_comes_from_the_table() {
        let cfg = Config::from_toml(&Config::example_toml()).unwrap();
        assert_eq!(exit_status(&cfg, Verdict::Fail), 3);
        assert_eq!(exit_status(&cfg, Verdict::Accepted), 0);
        assert_eq!(exit_status(&cfg, Verdict::TimeLimitExceeded), 1);
    }
}
