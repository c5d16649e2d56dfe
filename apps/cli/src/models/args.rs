//! # CLI Argument Definitions
//!
//! `qobs [path]` builds, subcommands do everything else.

use clap::{ArgAction, Args, Parser, Subcommand};
use qobs_builder::{BuildOptions, GeneratorKind};
use std::path::PathBuf;
use strum::VariantNames;

/// The main CLI structure parsing command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "qobs")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Quite OK Build System")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Build the package when no subcommand is given.
    #[command(flatten)]
    pub build: BuildArgs,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the package
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build and run the package
    Run {
        #[command(flatten)]
        build: BuildArgs,
        /// Arguments passed to the program
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Create a new package in the current directory
    Init {
        name: String,
        /// Create a library target
        #[arg(short, long)]
        lib: bool,
    },
    /// Create a new package in a new directory
    New {
        path: PathBuf,
        /// Create a library target
        #[arg(short, long)]
        lib: bool,
    },
    /// Manage the dependency index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum IndexAction {
    /// Add a dependency to the local index
    Add { url: String, dir: String },
    /// Remove a dependency from the local index
    Remove { url: String },
    /// Update the global cached index
    Update,
    /// Search the global index for dependencies
    Search { term: String },
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Package directory
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Build with the given profile
    #[arg(short, long, default_value = "debug")]
    pub profile: String,

    /// Generator to build with
    #[arg(short = 'g', long = "gen", default_value = "qobs", value_parser = parse_generator)]
    pub generator: GeneratorKind,

    /// Comma-separated features to enable
    #[arg(short = 'F', long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Do not enable the `default` feature
    #[arg(long)]
    pub no_default_features: bool,

    /// Parallel compile jobs (qobs generator only)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl BuildArgs {
    #[must_use]
    pub fn options(&self) -> BuildOptions {
        BuildOptions { profile: self.profile.clone(), generator: self.generator, jobs: self.jobs }
    }
}

fn parse_generator(value: &str) -> Result<GeneratorKind, String> {
    value.parse().map_err(|_| format!("must be one of: {}", GeneratorKind::VARIANTS.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_path_builds() {
        let cli = Cli::parse_from(["qobs", "demo", "-p", "release", "-g", "ninja", "-F", "cats,dogs", "-j", "3"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.build.path, PathBuf::from("demo"));
        assert_eq!(cli.build.features, ["cats", "dogs"]);
        let options = cli.build.options();
        assert_eq!(options.profile, "release");
        assert_eq!(options.generator, GeneratorKind::Ninja);
        assert_eq!(options.jobs, Some(3));
    }

    #[test]
    fn test_run_passes_trailing_args() {
        let cli = Cli::parse_from(["qobs", "-v", "run", "app", "--no-default-features", "--", "--flag", "x"]);
        let Some(Commands::Run { build, args }) = cli.command else { panic!("expected run") };
        assert_eq!(build.path, PathBuf::from("app"));
        assert!(build.no_default_features);
        assert_eq!(args, ["--flag", "x"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["qobs", "build"]);
        let Some(Commands::Build { build }) = cli.command else { panic!("expected build") };
        assert_eq!(build.path, PathBuf::from("."));
        assert_eq!(build.options(), BuildOptions::default());
    }

    #[test]
    fn test_unknown_generator() {
        let err = Cli::try_parse_from(["qobs", "-g", "make"]).unwrap_err();
        assert!(err.to_string().contains("must be one of: qobs, ninja, vs2022"));
    }
}
