use std::{path::PathBuf, process::ExitCode};

use anyhow::{ensure, Context as _};
use kjudge_core::Config;

use super::{GlobalArgs, SubcmdResult};
use crate::print_success;

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    dir: PathBuf,

    /// Overwrite an existing config file.
    #[arg(short, long)]
    force: bool,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let path = args.dir.join(Config::FILENAME);
    ensure!(
        args.force || !path.exists(),
        "{} already exists (use --force to overwrite)",
        path.display()
    );
    let toml = Config::example_toml();
    let cfg = Config::from_toml(&toml).context("Embedded example config is broken")?;

    fsutil::write(&path, &toml)?;
    fsutil::mkdir_all(args.dir.join(&cfg.testcases.dir))?;
    print_success!("Wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser;

    fn global() -> GlobalArgs {
        GlobalArgs::try_parse_from(["kjudge", "init"]).unwrap()
    }

    #[test]
    fn writes_example_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args {
            dir: dir.path().to_owned(),
            force: false,
        };
        exec(&args, &global()).unwrap();
        assert!(dir.path().join("tests").is_dir());
        let written = fsutil::read_to_string(dir.path().join(Config::FILENAME)).unwrap();
        assert_eq!(written, Config::example_toml());

        assert!(exec(&args, &global()).is_err());
        let args = Args { force: true, ..args };
        assert!(exec(&args, &global()).is_ok());
    }
}
