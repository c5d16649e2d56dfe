#![warn(rust_2018_idioms, unused_lifetimes)]
#![allow(clippy::print_stderr, clippy::print_stdout)]

pub mod handlers;
pub mod models;

use crate::handlers::{build, index, scaffold};
use crate::models::args::{Cli, Commands, IndexAction};

use anyhow::Result;
use clap::Parser;
use qobs_logger::Logger;
use std::env;
use std::io::IsTerminal;
use std::process::ExitCode;

/// Directory for rolling log files, when set.
const LOG_DIR_ENV: &str = "QOBS_LOG_DIR";

fn init_logger(cli: &Cli) -> Result<Logger> {
    let log_dir = env::var_os(LOG_DIR_ENV).filter(|dir| !dir.is_empty());
    let logger = Logger::builder("qobs")
        .verbosity(cli.verbose, cli.quiet)
        .ansi(std::io::stderr().is_terminal())
        .log_dir(log_dir)
        .init()?;
    Ok(logger)
}

fn run(cli: Cli) -> Result<()> {
    let _logger = init_logger(&cli)?;

    match cli.command {
        None => build::build(&cli.build)?,
        Some(Commands::Build { build }) => build::build(&build)?,
        Some(Commands::Run { build, args }) => build::run(&build, &args)?,
        Some(Commands::Init { name, lib }) => scaffold::init(&name, lib)?,
        Some(Commands::New { path, lib }) => scaffold::new(&path, lib)?,
        Some(Commands::Index { action }) => match action {
            IndexAction::Add { url, dir } => index::add(&url, &dir)?,
            IndexAction::Remove { url } => index::remove(&url)?,
            IndexAction::Update => index::update()?,
            IndexAction::Search { term } => index::search(&term)?,
        },
    }

    Ok(())
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}
