use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use samara_types::EventRecord;

/// Iterate the decoded records of one shard file, skipping blank and
/// malformed lines. A partial trailing line (concurrent appender mid
/// write) decodes as malformed and is skipped the same way.
pub(crate) fn for_each_record<F>(path: &Path, mut visit: F) -> std::io::Result<()>
where
    F: FnMut(EventRecord) -> std::ops::ControlFlow<()>,
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = match serde_json::from_str(trimmed) {
            Ok(value) => match EventRecord::from_value(value) {
                Some(record) => record,
                None => {
                    tracing::debug!(
                        component = "stream",
                        path = %path.display(),
                        "skipping non-object line"
                    );
                    continue;
                }
            },
            Err(err) => {
                tracing::debug!(
                    component = "stream",
                    path = %path.display(),
                    error = %err,
                    "skipping malformed line"
                );
                continue;
            }
        };
        if visit(record).is_break() {
            break;
        }
    }
    Ok(())
}

/// Count non-blank lines in a shard file.
pub(crate) fn count_nonblank_lines(path: &Path) -> std::io::Result<usize> {
    let file = File::open(path)?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
