//! PersonaPlex launcher - starts `moshi.server` from environment configuration

use clap::Parser;
use personaplex_launcher::config::{LaunchConfig, LaunchMode, ProcessEnv};
use personaplex_launcher::events::TracingObserver;
use personaplex_launcher::init_tracing;
use personaplex_launcher::launcher;
use std::process::ExitCode;
use tracing::error;

/// Launch the PersonaPlex model server.
///
/// Configuration comes from the environment: CPU_OFFLOAD, USE_FLOAT16,
/// HF_REPO, CFG_COEF, HF_TOKEN, PORT, SUPERVISE, PYTHON_BIN, SERVER_MODULE
/// and SSL_ROOT.
#[derive(Parser, Debug)]
#[command(name = "personaplex-launch", version, about)]
struct Args {
    /// Print the resolved invocation as JSON instead of launching
    #[arg(long)]
    dry_run: bool,

    /// Run the server as a supervised child regardless of SUPERVISE
    #[arg(long)]
    supervise: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    let mut config = LaunchConfig::from_env(&ProcessEnv);
    if args.supervise {
        config.mode = LaunchMode::Supervise;
    }

    let observer = TracingObserver;

    if args.dry_run {
        return match launcher::dry_run(&config, &observer) {
            Ok(invocation) => match serde_json::to_string_pretty(&invocation) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("failed to render invocation: {}", err);
                    ExitCode::FAILURE
                }
            },
            Err(err) => fail(&err),
        };
    }

    match launcher::launch(&config, &observer) {
        Ok(code) => ExitCode::from(clamp_exit_code(code)),
        Err(err) => fail(&err),
    }
}

fn fail(err: &personaplex_launcher::error::LaunchError) -> ExitCode {
    error!("{}", err);
    ExitCode::from(clamp_exit_code(err.exit_code()))
}

fn clamp_exit_code(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
