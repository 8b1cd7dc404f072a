use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};
use parking_lot::Mutex;

// The file writer stops once the handle is dropped.
static LOGGER_HANDLE: Mutex<Option<LoggerHandle>> = parking_lot::const_mutex(None);

/// Installs the global logger: rotating files under `logs/`, warnings mirrored
/// to stderr and everything mirrored to stdout.
///
/// `base_level` is a `flexi_logger` spec such as `"info"` or `"warn, datakit=debug"`.
/// Calling it a second time is a no-op.
pub fn setup_logging(base_level: &str) -> anyhow::Result<()> {
    let mut guard = LOGGER_HANDLE.lock();
    if guard.is_some() {
        return Ok(());
    }

    let handle = Logger::try_with_str(base_level)?
        .log_to_file(FileSpec::default().directory("logs").basename("datakit"))
        .duplicate_to_stderr(Duplicate::Warn)
        .duplicate_to_stdout(Duplicate::All)
        .rotate(
            Criterion::Size(1024 * 1024), //1MB
            Naming::Timestamps,
            Cleanup::KeepLogFiles(5),
        )
        .start()?;

    *guard = Some(handle);
    Ok(())
}
