use qobs_logger::{Logger, LoggerError};
use std::fs;
use std::time::Duration;

// One subscriber per process, so everything global lives in a single test.
#[test]
fn file_logging_and_second_init() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    let log_dir = tmp.path().join("logs");

    let logger = Logger::builder("qobs-test").console(false).log_dir(Some(&log_dir)).init()?;
    assert!(logger.writes_files());

    tracing::info!(target_name = "app", "build finished");
    tracing::debug!("filtered out at the default level");

    let err = Logger::builder("qobs-test-again").init().unwrap_err();
    assert!(matches!(err, LoggerError::Subscriber { .. }));

    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let log_file = fs::read_dir(&log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.extension().is_some_and(|ext| ext == "log"))
        .expect("log file should be created");
    let text = fs::read_to_string(log_file)?;
    assert!(text.contains("build finished"));
    assert!(!text.contains("filtered out"));

    Ok(())
}
