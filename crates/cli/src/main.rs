//! recordlayer demo client
//!
//! Builds the order/flower schema in a fresh in-memory database, saves three
//! orders, loads a present and a missing key, and runs a nested-field query.
//!
//! ```text
//! recordlayer-demo [--config PATH] [--explain] [--json | --raw]
//! ```
//!
//! Logging goes to stderr through `tracing`; `RUST_LOG` overrides the
//! default `info` level.

mod commands;
mod demo;
mod format;

use std::process;

use tracing_subscriber::{fmt, EnvFilter};

use commands::{build_cli, Options};
use format::format_error;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let matches = build_cli().get_matches();
    let opts = Options::from_matches(&matches);
    init_logging();

    let result = demo::open_database(&opts).and_then(|db| demo::run_demo(&db, &opts));
    match result {
        Ok(blocks) => {
            for block in blocks {
                if !block.is_empty() {
                    println!("{}", block);
                }
            }
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, opts.mode));
            process::exit(1);
        }
    }
}
