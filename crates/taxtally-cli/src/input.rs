//! Reading observation ids from arguments and files

use crate::error::{CliError, Result};
use std::path::Path;
use taxtally_common::ObservationId;
use tracing::warn;

/// Read ids from a file, one per line.
///
/// Blank lines and `#` comments are ignored. Lines that are not usable ids
/// are skipped with a warning. An unreadable file is fatal.
pub fn read_ids_from_file(path: &Path) -> Result<Vec<ObservationId>> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::InputFile {
        path: path.display().to_string(),
        source,
    })?;

    Ok(parse_ids(content.lines()))
}

/// Parse raw values into ids, skipping blanks, comments and invalid values.
pub fn parse_ids<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<ObservationId> {
    raw.into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match line.parse::<ObservationId>() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Skipping invalid observation id");
                None
            },
        })
        .collect()
}

/// Collect the ids for a run from `--file` or positional arguments.
pub fn collect_ids(file: Option<&Path>, args: &[String]) -> Result<Vec<ObservationId>> {
    let ids = match file {
        Some(path) => {
            let ids = read_ids_from_file(path)?;
            if ids.is_empty() {
                return Err(CliError::NoObservations(format!(
                    "no valid observation ids found in file '{}'",
                    path.display()
                )));
            }
            ids
        },
        None => parse_ids(args.iter().map(String::as_str)),
    };

    if ids.is_empty() {
        return Err(CliError::NoObservations(
            "you must provide observation ids either as arguments or with --file".to_string(),
        ));
    }

    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_ids_skips_blank_and_comment_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# collection trip 2025-03").unwrap();
        writeln!(file, "12345").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  67890  ").unwrap();
        writeln!(file, "bad id").unwrap();

        let ids = read_ids_from_file(file.path()).unwrap();
        let ids: Vec<_> = ids.iter().map(ObservationId::as_str).collect();
        assert_eq!(ids, vec!["12345", "67890"]);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = read_ids_from_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, CliError::InputFile { .. }));
    }

    #[test]
    fn test_collect_ids_from_args() {
        let args = vec!["1".to_string(), "2".to_string()];
        let ids = collect_ids(None, &args).unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_collect_ids_requires_something() {
        assert!(matches!(
            collect_ids(None, &[]),
            Err(CliError::NoObservations(_))
        ));

        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            collect_ids(Some(file.path()), &[]),
            Err(CliError::NoObservations(_))
        ));
    }
}
