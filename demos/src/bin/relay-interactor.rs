use std::process::ExitCode;

use kjudge_core::harness::run_interactor;

fn main() -> ExitCode {
    env_logger::init();
    run_interactor(&kjudge_demos::exit_codes(), false, kjudge_demos::relay::play)
}
