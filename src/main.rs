mod args;
mod tally;

use std::error::Error;

use clap::Parser;
use log::{debug, warn};
use snafu::ErrorCompat;

use crate::args::Args;

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    debug!("args: {:?}", args);

    if let Err(e) = tally::run_election(&args) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        let mut source = e.source();
        while let Some(inner) = source {
            eprintln!("  caused by: {}", inner);
            source = inner.source();
        }
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
