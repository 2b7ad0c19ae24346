//! Persisting ids that failed so a later run can retry just those

use crate::error::Result;
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};
use taxtally_common::ObservationId;
use tracing::info;

/// File name for a run started at `at`, e.g.
/// `failed_observations_20250317_142501.txt`.
pub fn failed_ids_file_name(at: DateTime<Local>) -> String {
    format!("failed_observations_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// Write `ids` one per line into `dir`. Nothing is written, and `None` is
/// returned, when `ids` is empty.
pub fn write_failed_ids(
    dir: &Path,
    ids: &[ObservationId],
    at: DateTime<Local>,
) -> Result<Option<PathBuf>> {
    if ids.is_empty() {
        return Ok(None);
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(failed_ids_file_name(at));

    let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
    for id in ids {
        writeln!(file, "{}", id)?;
    }
    file.flush()?;

    info!(path = %path.display(), count = ids.len(), "Wrote failed observation ids");
    Ok(Some(path))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 17, 14, 25, 1).unwrap()
    }

    #[test]
    fn test_file_name_embeds_timestamp() {
        assert_eq!(
            failed_ids_file_name(at()),
            "failed_observations_20250317_142501.txt"
        );
    }

    #[test]
    fn test_write_failed_ids() {
        let dir = TempDir::new().unwrap();
        let ids = vec![ObservationId::from(11u64), ObservationId::from(22u64)];

        let path = write_failed_ids(dir.path(), &ids, at()).unwrap().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "11\n22\n");
        assert!(path.ends_with("failed_observations_20250317_142501.txt"));
    }

    #[test]
    fn test_nothing_written_without_failures() {
        let dir = TempDir::new().unwrap();
        assert!(write_failed_ids(dir.path(), &[], at()).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
