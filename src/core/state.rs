// src/core/state.rs — Flat-file persistence for plans, reports and boards
//
// Every artifact is a whole JSON document that is rewritten wholesale.
// Writes go through a temp file + rename so readers never see a torn file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::infra::errors::ForgeError;

/// Atomically write `value` as pretty JSON to `path` (temp file + rename).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

/// Atomically replace `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".into());
    let tmp = dir.join(format!(".{file_name}.tmp"));

    let mut f = std::fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.flush()?;
    f.sync_all()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read and parse a JSON document. A missing file is a `MissingFile` error.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ForgeError::MissingFile {
                path: path.to_path_buf(),
            }
        } else {
            ForgeError::Io(e)
        }
    })?;
    let value = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
    Ok(value)
}

/// Like `read_json`, but a missing file yields `T::default()`.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/doc.json");
        let doc = Doc {
            name: "board".into(),
            count: 2,
        };
        write_json_atomic(&path, &doc).unwrap();
        let back: Doc = read_json(&path).unwrap();
        assert_eq!(back, doc);
        // temp file is gone after rename
        assert!(!dir.path().join("nested/.doc.json.tmp").exists());
    }

    #[test]
    fn test_read_missing_is_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_json::<Doc>(&dir.path().join("absent.json")).unwrap_err();
        let forge = err.downcast_ref::<ForgeError>().unwrap();
        assert!(forge.is_fatal());
    }

    #[test]
    fn test_read_or_default() {
        let dir = TempDir::new().unwrap();
        let doc: Doc = read_json_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(doc, Doc::default());
    }

    #[test]
    fn test_overwrite_is_wholesale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &Doc { name: "a".repeat(100), count: 1 }).unwrap();
        write_json_atomic(&path, &Doc { name: "b".into(), count: 2 }).unwrap();
        let back: Doc = read_json(&path).unwrap();
        assert_eq!(back.name, "b");
        assert_eq!(back.count, 2);
    }
}
