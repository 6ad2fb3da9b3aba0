//! netback command line.
//!
//! ```bash
//! netback --routerdb routerdb.yaml --model models.yaml --output ./configs --workers 10
//! ```
//!
//! Set `RUST_LOG=debug` (or pass `-vv`) for per-command logging.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser};

use netback::config::parse_duration;
use netback::orchestrator::DEFAULT_WORKERS;
use netback::{
    HostKeyVerification, ModelSet, Orchestrator, OutputWriter, RouterDb, SshConnector, SshOptions,
    Summary,
};

/// Back up network device configurations over SSH.
#[derive(Debug, Parser)]
#[command(name = "netback", version, about)]
struct Args {
    /// Device descriptor file.
    #[arg(long, value_name = "FILE")]
    routerdb: PathBuf,

    /// Model descriptor file.
    #[arg(long, value_name = "FILE")]
    model: PathBuf,

    /// Output root directory.
    #[arg(long, value_name = "DIR", default_value = "./configs")]
    output: PathBuf,

    /// Maximum number of devices backed up at once (at least 1).
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Timeout for devices that do not set their own (e.g. 30s, 1500ms, 1m30s).
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    timeout: Duration,

    /// Host key policy.
    #[arg(long, value_enum, default_value_t = HostKeyVerification::Disabled)]
    host_key_checking: HostKeyVerification,

    /// known_hosts file used by accept-new and strict checking.
    #[arg(long, value_name = "FILE")]
    known_hosts: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level())).init();

    let devices = match RouterDb::load(&args.routerdb) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error loading routerdb: {e}");
            return ExitCode::FAILURE;
        }
    };

    let models = match ModelSet::load(&args.model) {
        Ok(models) => models,
        Err(e) => {
            eprintln!("Error loading models: {e}");
            return ExitCode::FAILURE;
        }
    };

    let writer = OutputWriter::new(&args.output);
    if let Err(e) = writer.ensure_root().await {
        eprintln!("Error creating output directory: {e}");
        return ExitCode::FAILURE;
    }

    let connector = SshConnector::new(SshOptions {
        host_key_verification: args.host_key_checking,
        known_hosts_path: args.known_hosts.clone(),
        ..SshOptions::default()
    });

    let orchestrator = Orchestrator::new(connector, models, writer)
        .with_workers(args.workers)
        .with_default_timeout(args.timeout);
    orchestrator.check_models(&devices.devices);

    let results = orchestrator.run(devices.devices).await;

    for result in &results {
        match &result.outcome {
            Ok(artifact) => println!("OK   {} -> {}", result.name(), artifact.path.display()),
            Err(e) => eprintln!("FAIL {}: {}", result.name(), e),
        }
    }

    let summary = Summary::from_results(&results);
    println!("\nCompleted: {} success, {} failed", summary.succeeded, summary.failed);

    if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
