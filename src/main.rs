//! service-apidoc - generate Swagger 2.0 documentation for service classes.
//!
//! # Usage
//!
//! ```bash
//! service-apidoc [OPTIONS] <MANIFEST>
//! ```
//!
//! # Examples
//!
//! Generate YAML with comments read from a source tree:
//! ```bash
//! service-apidoc manifest.yaml -c apidoc.yaml -s src/main/java -o swagger.yaml
//! ```
//!
//! Document RPC providers as JSON:
//! ```bash
//! service-apidoc manifest.yaml --title Orders --api-version 1 --reader rpc -f json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use service_apidoc::cli;

fn main() -> Result<()> {
    // Parse once so the verbose flag can configure the logger before validation logs anything
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("service-apidoc starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("API document generation completed successfully");

    Ok(())
}
