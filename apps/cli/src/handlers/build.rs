use crate::models::args::BuildArgs;
use anyhow::Result;
use qobs_builder::Builder;
use tracing::info;

fn load(args: &BuildArgs) -> Result<Builder> {
    Ok(Builder::in_directory(&args.path, &args.features, !args.no_default_features)?)
}

/// Builds the package in `args.path`.
///
/// # Errors
/// Returns an error if the manifest is invalid or the build fails.
pub fn build(args: &BuildArgs) -> Result<()> {
    let builder = load(args)?;
    let artifact = builder.build(&args.options())?;
    info!(artifact = %artifact.display(), "build finished");
    Ok(())
}

/// Builds the package in `args.path` and runs it with `program_args`.
///
/// # Errors
/// Returns an error for library packages, failed builds and programs that
/// exit unsuccessfully.
pub fn run(args: &BuildArgs, program_args: &[String]) -> Result<()> {
    let builder = load(args)?;
    builder.build_and_run(program_args, &args.options())?;
    Ok(())
}
