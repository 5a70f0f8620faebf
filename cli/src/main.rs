use clap::Parser;
use kjudge_cli::cmd::GlobalArgs;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let app = GlobalArgs::parse();
    app.init_logger();
    app.exec_subcmd().await.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        ExitCode::FAILURE
    })
}
