//! Restricted JSON-line codec shared by the hot tier and the warm tier.
//!
//! Supersedes the source's substring-based (`strstr`) JSON scanning (see
//! `DESIGN.md`): every line is parsed with `serde_json`, a real parser.
//! Unknown keys are ignored and missing optional keys default, because every
//! on-disk type derives `Deserialize` over `Option<T>`/`#[serde(default)]`
//! fields rather than rejecting unrecognized shapes.
//!
//! `serde_json`'s writer already restricts output escaping to the five
//! characters required by the wire format (`\"`, `\\`, `\n`, `\r`, `\t`, plus
//! `\u00XX` for other control characters) and emits arrays of strings with no
//! interior whitespace, so no custom serializer is needed — this module's
//! job is the file-scanning policy, not re-implementing JSON.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{EngineError, Result};

/// Serialize one record as a single JSONL line (including trailing `\n`).
pub fn to_line<T: Serialize>(value: &T) -> Result<String> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

/// Parse a single JSONL line. Leading/trailing whitespace is trimmed first.
pub fn from_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    serde_json::from_str(line.trim()).map_err(EngineError::from)
}

/// List the `.jsonl` files directly under `dir`, sorted lexically descending
/// (newest first, since filenames are date/period stamps). A directory that
/// does not exist yields an empty list rather than an error.
pub fn list_jsonl_files_desc(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .collect();
    files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(files)
}

/// Append one line to `path`, creating parent directories and the file as
/// needed. Returns the new total size in bytes of the file after the write.
///
/// Opens and closes the file per append (no cached handle) so callers that
/// want a pooled handle (the hot tier's per-day cache) own their own
/// `BufWriter` instead.
pub fn append_line(path: &Path, line: &str) -> Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())?;
    file.sync_data()?;
    Ok(file.metadata()?.len())
}

/// Current size in bytes of `path`, or 0 if it does not exist.
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read every line of `path` top to bottom, calling `f` for each
/// successfully parsed record. Parse failures on individual lines are
/// skipped (not fatal) so one corrupt line does not block a scan; a file
/// that cannot be opened at all is also skipped, per the scan policy.
///
/// `f` returns `false` to stop scanning early (e.g. once `limit` is hit).
pub fn scan_file<T, F>(path: &Path, mut f: F) -> Result<()>
where
    T: DeserializeOwned,
    F: FnMut(T) -> bool,
{
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Ok(()),
    };
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record: T = match from_line(line) {
            Ok(r) => r,
            Err(_) => continue,
        };
        if !f(record) {
            break;
        }
    }
    Ok(())
}

/// Rewrite `path` atomically with only the lines for which `keep` returns
/// `true`, preserving original line order. Used by compaction.
pub fn rewrite_file<T, F>(path: &Path, mut keep: F) -> Result<()>
where
    T: DeserializeOwned + Serialize,
    F: FnMut(&T) -> bool,
{
    let content = fs::read_to_string(path)?;
    let mut kept_lines = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let record: T = from_line(line)?;
        if keep(&record) {
            kept_lines.push(to_line(&record)?);
        }
    }
    let tmp_path = path.with_extension("jsonl.tmp");
    {
        let mut tmp = fs::File::create(&tmp_path)?;
        for line in &kept_lines {
            tmp.write_all(line.as_bytes())?;
        }
        tmp.sync_data()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Ensure a directory exists, creating all parents (used by stores at open time).
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Atomically write `value` as one pretty-printed JSON document to `path`,
/// creating parent directories as needed. For current-state mirror files
/// (one object per file, overwritten whole on each mutation) rather than the
/// append-only JSONL logs the rest of this module serves.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, body)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        id: String,
        tags: Vec<String>,
    }

    #[test]
    fn round_trip_preserves_fields() {
        let sample = Sample {
            id: "r1".into(),
            tags: vec!["a".into(), "b".into()],
        };
        let line = to_line(&sample).unwrap();
        assert!(line.ends_with('\n'));
        assert!(line.contains("\"tags\":[\"a\",\"b\"]"));
        let parsed: Sample = from_line(&line).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn unreadable_file_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.jsonl");
        let mut seen = 0;
        scan_file::<Sample, _>(&path, |_| {
            seen += 1;
            true
        })
        .unwrap();
        assert_eq!(seen, 0);
    }

    #[test]
    fn corrupt_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d.jsonl");
        fs::write(&path, "not json\n{\"id\":\"r1\",\"tags\":[]}\n").unwrap();
        let mut seen = Vec::new();
        scan_file::<Sample, _>(&path, |r| {
            seen.push(r.id);
            true
        })
        .unwrap();
        assert_eq!(seen, vec!["r1".to_string()]);
    }

    #[test]
    fn list_files_sorted_descending() {
        let dir = TempDir::new().unwrap();
        for name in ["2025-01-01.jsonl", "2025-01-03.jsonl", "2025-01-02.jsonl"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let files = list_jsonl_files_desc(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "2025-01-03.jsonl".to_string(),
                "2025-01-02.jsonl".to_string(),
                "2025-01-01.jsonl".to_string(),
            ]
        );
    }
}
