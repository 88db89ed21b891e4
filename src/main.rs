//! Command-line front end for generating OpenAPI 3.1 documents.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-routes [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation from a route manifest:
//! ```bash
//! openapi-from-routes ./my-service -r routes.yaml -o openapi.yaml
//! ```
//!
//! Generate JSON with a config file and a version override:
//! ```bash
//! openapi-from-routes ./my-service -r routes.yaml -c openapi-config.yaml --api-version 2.0.0 -f json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_routes::cli;

fn main() -> Result<()> {
    // Parse once to read the verbose flag before the logger exists
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-from-routes starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
