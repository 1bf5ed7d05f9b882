//! # customs-calc
//!
//! Command-line front end over the customs service.
//!
//! ## Usage
//! ```bash
//! # Full calculation from a file (or `-` for stdin)
//! customs-calc --db ./customs_dev.db calculate --request request.json
//!
//! # CIF valuation only
//! echo '{"product_price": "1000", ...}' | customs-calc cif --request -
//!
//! # Snapshot currently in use
//! customs-calc rates
//!
//! # One JSON request per line, one JSON result per line
//! customs-calc batch --requests requests.ndjson
//! ```
//!
//! ## Exit Codes
//! - `0` every request succeeded
//! - `1` at least one request was rejected (the `ApiError` is printed)
//! - `2` the service could not start

use clap::{Parser, Subcommand};
use customs_service::logging::init_logging;
use customs_service::{ApiError, CustomsCalculator, CustomsService, ServiceConfig, ServiceResult};
use serde::Serialize;
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "customs-calc", about = "Compute customs duties and taxes for an import")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// CIF, every applicable charge, and the total
    Calculate {
        /// Request JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        request: String,
    },

    /// CIF valuation only
    Cif {
        #[arg(short, long, default_value = "-")]
        request: String,
    },

    /// Print the loaded rate snapshot
    Rates,

    /// Newline-delimited requests, with the snapshot refreshed in the background
    Batch {
        #[arg(short, long, default_value = "-")]
        requests: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging("warn");
    let cli = Cli::parse();

    let mut service = match open_service(&cli).await {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "Failed to start customs service");
            eprintln!("customs-calc: {}", e);
            return ExitCode::from(2);
        }
    };

    let code = match run(&cli.command, &mut service).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("customs-calc: {}", e);
            ExitCode::from(2)
        }
    };

    if let Err(e) = service.shutdown().await {
        error!(error = %e, "Shutdown failed");
    }
    code
}

async fn open_service(cli: &Cli) -> ServiceResult<CustomsService> {
    let mut config = ServiceConfig::load(cli.config.clone())?;
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    CustomsService::open(&config).await
}

async fn run(command: &Command, service: &mut CustomsService) -> ServiceResult<ExitCode> {
    let calculator = service.calculator();

    let code = match command {
        Command::Calculate { request } => {
            let outcome = match read_input(request).map(|body| CustomsCalculator::parse_request(&body)) {
                Ok(Ok(raw)) => calculator.calculate(&raw).await,
                Ok(Err(e)) => Err(e),
                Err(e) => Err(ApiError::from(e)),
            };
            print_outcome(outcome)?
        }

        Command::Cif { request } => {
            let outcome = match read_input(request).map(|body| CustomsCalculator::parse_request(&body)) {
                Ok(Ok(raw)) => calculator.calculate_cif(&raw).await,
                Ok(Err(e)) => Err(e),
                Err(e) => Err(ApiError::from(e)),
            };
            print_outcome(outcome)?
        }

        Command::Rates => print_outcome(service.summary().await.map_err(ApiError::from))?,

        Command::Batch { requests } => {
            service.start_refresh();
            let input = read_input(requests)?;

            let mut failures = 0usize;
            for line in input.lines().filter(|l| !l.trim().is_empty()) {
                let outcome = match CustomsCalculator::parse_request(line) {
                    Ok(raw) => calculator.calculate(&raw).await,
                    Err(e) => Err(e),
                };
                let value = match outcome {
                    Ok(response) => serde_json::to_value(response)?,
                    Err(e) => {
                        failures += 1;
                        json!({ "error": e })
                    }
                };
                println!("{}", serde_json::to_string(&value)?);
            }

            if failures == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
    };

    Ok(code)
}

/// Reads a whole file, or stdin for `-`.
fn read_input(source: &str) -> ServiceResult<String> {
    if source == "-" {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        Ok(body)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

fn print_outcome<T: Serialize>(outcome: Result<T, ApiError>) -> ServiceResult<ExitCode> {
    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&json!({ "error": e }))?);
            Ok(ExitCode::from(1))
        }
    }
}
