use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;

use crate::error::StorageError;

/// Restrict a record id to `[A-Za-z0-9_-]`, replacing any other byte with
/// `_` and truncating to 200 bytes, so it is always a safe filename.
pub fn sanitize_id(id: &str) -> String {
    let mut out: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.len() > 200 {
        out.truncate(200);
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Write `value` to `path` atomically: serialize to a temp file in the
/// same directory, then `rename` over the destination. A rename within
/// one filesystem is atomic, so a reader never observes a partially
/// written file.
pub async fn atomic_write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), StorageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await?;

    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|s| s.to_str()).unwrap_or("record"),
        uuid::Uuid::new_v4()
    );
    let tmp_path = dir.join(tmp_name);

    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(&tmp_path, &bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// List every `*.json` file directly under `dir`, parse it as `T`, and
/// return the successfully-parsed records sorted by `updated_at`
/// descending. A record that fails to parse is logged at `warn`
/// (filename only, never contents) and skipped, never rewritten.
pub async fn read_json_dir_sorted<T, F>(dir: &Path, updated_at: F) -> Result<Vec<T>, StorageError>
where
    T: DeserializeOwned,
    F: Fn(&T) -> OffsetDateTime,
{
    tokio::fs::create_dir_all(dir).await?;
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut out: Vec<T> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path: PathBuf = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(record) => out.push(record),
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping corrupt record");
                }
            },
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "failed to read record file");
            }
        }
    }

    out.sort_by(|a, b| updated_at(b).cmp(&updated_at(a)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_unsafe_characters() {
        assert_eq!(sanitize_id("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_id("abc-123_DEF"), "abc-123_DEF");
        assert_eq!(sanitize_id(""), "_");
    }
}
