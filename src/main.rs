//! preproc-test - command line entry point
//!
//! Reads a JSON test request from a file or stdin, runs it and prints the
//! JSON response on stdout. Logs go to stderr.

use anyhow::Context;
use clap::Parser;
use preproc_test::service::StructuralReport;
use preproc_test::{EngineConfig, PreprocError, TestRequest, TestService};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Dry-run a preprocessing chain against a value
#[derive(Parser, Debug)]
#[command(name = "preproc-test", version, about)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overall timeout in milliseconds, overriding the configuration
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,

    /// Request file; stdin when omitted
    request: Option<PathBuf>,
}

/// Exit code for requests rejected before any step ran
const EXIT_STRUCTURAL: u8 = 2;

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,preproc_test=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);

            let structural = e
                .downcast_ref::<PreprocError>()
                .and_then(|e| e.structural_errors());
            let Some(errors) = structural else {
                return ExitCode::FAILURE;
            };
            match StructuralReport::new(errors).to_json(args.pretty) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!("failed to encode structural errors: {}", e),
            }
            ExitCode::from(EXIT_STRUCTURAL)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::load_or_default(),
    };
    if let Some(ms) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }

    let input = match &args.request {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read request from stdin")?;
            buf
        }
    };

    let request = TestRequest::from_json(&input)?;
    tracing::debug!("request with {} step(s)", request.steps.len());

    let service = TestService::new(config);
    let response = service.evaluate(&request)?;
    println!("{}", response.to_json(args.pretty)?);
    Ok(())
}
