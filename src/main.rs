// Several types here are part of the pipeline's internal vocabulary and are
// only read by the writer or by tests, not by every caller.
#![allow(dead_code)]

mod cmd;
mod config;
mod db;
mod determinant;
mod error;
mod fake;
mod fd;
mod keys;
mod normalize;
mod profile;
mod proposal;
mod quoting;
mod runner;
mod sampling;
mod value;
mod writer;

use clap::Parser;
use cmd::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
