use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

/// Upper bound on how long a writer waits for an advisory lock before
/// giving up. Contention in practice lasts milliseconds; a wait this
/// long means a wedged process is holding the file.
pub const LOCK_WAIT_LIMIT: Duration = Duration::from_secs(30);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub enum FsError {
    Io(std::io::Error),
    LockTimeout { path: String, waited: Duration },
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsError::Io(err) => write!(f, "IO error: {}", err),
            FsError::LockTimeout { path, waited } => write!(
                f,
                "lock wait exceeded {}s on {}",
                waited.as_secs(),
                path
            ),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Io(err) => Some(err),
            FsError::LockTimeout { .. } => None,
        }
    }
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::Io(err)
    }
}

/// Acquire an exclusive advisory lock with a bounded wait.
fn lock_exclusive_bounded(file: &File, path: &Path) -> Result<(), FsError> {
    let start = Instant::now();
    let contended = fs2::lock_contended_error();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.raw_os_error() == contended.raw_os_error() =>
            {
                if start.elapsed() >= LOCK_WAIT_LIMIT {
                    return Err(FsError::LockTimeout {
                        path: path.display().to_string(),
                        waited: start.elapsed(),
                    });
                }
                std::thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(err) => return Err(FsError::Io(err)),
        }
    }
}

/// Append bytes under an exclusive advisory lock, flushing and
/// fsyncing before the lock is released. One call is one commit:
/// concurrent writers interleave whole payloads, never partial lines.
pub fn locked_append(path: &Path, bytes: &[u8]) -> Result<(), FsError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    lock_exclusive_bounded(&file, path)?;
    let result = (|| -> Result<(), FsError> {
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    })();
    let _ = fs2::FileExt::unlock(&file);
    result
}

/// Write a file atomically: temp sibling in the same directory, then
/// rename over the target. Readers always see a complete file.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), FsError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string()),
        std::process::id()
    ));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
