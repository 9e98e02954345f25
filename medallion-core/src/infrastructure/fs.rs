// medallion-core/src/infrastructure/fs.rs

use crate::infrastructure::error::InfrastructureError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write content to a file atomically using a temporary file.
///
/// This function:
/// 1. Creates a temporary file in the same directory as the target path.
/// 2. Writes the content to the temporary file.
/// 3. Persists (renames) the temporary file to the target path.
///
/// This ensures that the target file is either fully written or not written at all,
/// preventing partial data corruption.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    // Create a temporary file in the same directory to ensure atomic rename works across filesystems
    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(InfrastructureError::Io)?;

    temp_file
        .write_all(content.as_ref())
        .map_err(InfrastructureError::Io)?;

    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;

    Ok(())
}

/// Appends one line to a file, creating it (and its parents) if needed.
/// Existing content is never rewritten.
pub fn append_line<P: AsRef<Path>>(path: P, line: &str) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

/// Creates an empty staging directory next to `target`.
/// It is removed on drop unless handed over to [`swap_dir`].
pub fn staging_dir(target: &Path) -> Result<tempfile::TempDir, InfrastructureError> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "layer".to_string());
    tempfile::Builder::new()
        .prefix(&format!(".{}.staging-", name))
        .tempdir_in(parent)
        .map_err(InfrastructureError::Io)
}

/// Moves a fully written staging directory into place.
///
/// The previous `target` is renamed aside first and only deleted once the new one
/// is in place, so readers see either the old directory or the new one.
pub fn swap_dir(staged: tempfile::TempDir, target: &Path) -> Result<(), InfrastructureError> {
    let staged_path: PathBuf = staged.keep();
    let backup = target.with_extension("previous");

    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }
    let had_previous = target.exists();
    if had_previous {
        fs::rename(target, &backup)?;
    }

    if let Err(e) = fs::rename(&staged_path, target) {
        // 🔙 Restore the previous output before surfacing the error
        if had_previous {
            fs::rename(&backup, target)?;
        }
        let _ = fs::remove_dir_all(&staged_path);
        return Err(InfrastructureError::Io(e));
    }

    if had_previous {
        fs::remove_dir_all(&backup)?;
    }
    debug!(target = ?target, "Directory swapped into place");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("quality/report.json");

        atomic_write(&file_path, "{}")?;

        assert!(file_path.exists());
        assert_eq!(fs::read_to_string(file_path)?, "{}");
        Ok(())
    }

    #[test]
    fn test_atomic_write_overwrites_existing() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.txt");

        atomic_write(&file_path, "Initial")?;
        atomic_write(&file_path, "Updated")?;

        assert_eq!(fs::read_to_string(file_path)?, "Updated");
        Ok(())
    }

    #[test]
    fn test_append_line_keeps_history() -> Result<()> {
        let dir = tempdir()?;
        let log = dir.path().join("logs/ingestion_runs.jsonl");

        append_line(&log, r#"{"attempt":1}"#)?;
        append_line(&log, r#"{"attempt":2}"#)?;

        let content = fs::read_to_string(log)?;
        assert_eq!(content.lines().count(), 2);
        assert!(content.starts_with(r#"{"attempt":1}"#));
        Ok(())
    }

    #[test]
    fn test_swap_dir_replaces_previous_content() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("silver");
        fs::create_dir_all(target.join("old_table"))?;

        let staged = staging_dir(&target)?;
        fs::create_dir_all(staged.path().join("new_table"))?;
        swap_dir(staged, &target)?;

        assert!(target.join("new_table").exists());
        assert!(!target.join("old_table").exists());
        assert!(!target.with_extension("previous").exists());
        Ok(())
    }

    #[test]
    fn test_dropped_staging_dir_leaves_target_untouched() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("gold");
        fs::create_dir_all(target.join("fact_sales"))?;

        {
            let staged = staging_dir(&target)?;
            fs::create_dir_all(staged.path().join("half_written"))?;
            // dropped without swap
        }

        assert!(target.join("fact_sales").exists());
        let leftovers = fs::read_dir(dir.path())?.count();
        assert_eq!(leftovers, 1);
        Ok(())
    }
}
