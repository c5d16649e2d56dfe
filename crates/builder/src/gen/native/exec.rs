use super::plan::{CompileJob, LinkJob, Plan};
use crate::error::{BuilderError, BuilderErrorExt, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tokio::runtime::Builder;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Upper bound on runtime worker threads.
const MAX_WORKER_THREADS: usize = 64;

/// Runs every compile job, at most `jobs` at once, then the link jobs in order.
///
/// The first failing compile aborts the remaining ones.
///
/// # Errors
/// Returns the first job failure.
pub(super) fn run(plan: Plan, jobs: usize) -> Result<()> {
    let jobs = jobs.max(1);
    let runtime = Builder::new_multi_thread()
        .worker_threads(jobs.min(MAX_WORKER_THREADS))
        .thread_name("qobs-worker")
        .enable_all()
        .build()
        .context("Failed to start the job runtime")?;
    debug!(jobs, compile = plan.compile.len(), link = plan.link.len(), "running build jobs");

    runtime.block_on(async move {
        compile_all(plan.compile, jobs).await?;
        for job in plan.link {
            link(job).await?;
        }
        Ok(())
    })
}

async fn compile_all(jobs: Vec<CompileJob>, limit: usize) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(limit));
    let mut set = JoinSet::new();
    for job in jobs {
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|e| BuilderError::from(e.to_string()))?;
            compile(job).await
        });
    }

    while let Some(joined) = set.join_next().await {
        let outcome = joined.map_err(|e| BuilderError::from(format!("compile job did not finish: {e}")));
        if let Err(e) = outcome.and_then(|result| result) {
            set.abort_all();
            return Err(e);
        }
    }
    Ok(())
}

async fn compile(job: CompileJob) -> Result<()> {
    if let Some(parent) = job.obj.parent() {
        fs::create_dir_all(parent).context("Failed to create object directory")?;
    }
    println!("CC {}", job.src.display());
    run_command(&job.command).await.context(format!("Compiling {}", job.src.display()))
}

async fn link(job: LinkJob) -> Result<()> {
    if let Some(parent) = job.out.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    let verb = if job.is_lib { "AR" } else { "LINK" };
    println!("{verb} {}", job.out.display());
    run_command(&job.command).await.context(format!("Building `{}`", job.target))
}

/// Runs `command` with inherited stdio. The child is killed if the job is aborted.
async fn run_command(command: &[String]) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        return Err(BuilderError::from("empty command"));
    };
    let program_name = Path::new(program).file_name().map_or_else(|| program.clone(), |n| n.to_string_lossy().into_owned());

    let status = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .status()
        .await
        .context(format!("Failed to run `{program}`"))?;
    if !status.success() {
        return Err(BuilderError::command_failed(program_name, status.code()));
    }
    Ok(())
}
