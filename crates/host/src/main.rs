// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entry point the editor's Extension Host execs as the child process.
//! Reads `CHILD_TRANSPORT_ADDR`/`POOL_DEBUG` from the environment (set by
//! the pool's launcher) and drives `ehp_worker::run` with the fixture host.

use clap::Parser;
use ehp_host::FixtureHost;
use ehp_worker::WorkerRuntimeConfig;

/// Worker-side runtime for the extension-host test pool.
#[derive(Parser, Debug)]
#[command(name = "ehp-host")]
#[command(about = "Runs inside the editor Extension Host and bridges test execution to the pool")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let config = WorkerRuntimeConfig::from_env();
    match ehp_worker::run(config, FixtureHost::new()).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "worker runtime exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}
