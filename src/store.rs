use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Check that `path` holds a well-formed JSON document without touching it.
pub fn validate(path: &Path) -> Result<()> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => bail!("{} is empty or missing", path.display()),
    };
    if metadata.len() == 0 {
        bail!("{} is empty or missing", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str::<Value>(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(())
}

pub fn is_missing_or_empty(path: &Path) -> bool {
    fs::metadata(path).map_or(true, |m| m.len() == 0)
}

/// Only called after `validate`.
pub fn load(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Replace `path` via write-to-temp-then-rename. The rename is the only
/// mutation the target ever sees, so a half-written document is never
/// observable at `path`.
pub fn save_atomic(path: &Path, doc: &Value) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;

    let content = serde_json::to_string_pretty(doc)?;
    // Last gate before anything lands on disk.
    serde_json::from_str::<Value>(&content)
        .context("Computed document is not valid JSON")?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(content.as_bytes())
        .context("Failed to write temp file")?;
    tmp.write_all(b"\n").context("Failed to write temp file")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_rejects_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(validate(&missing).is_err());

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "").unwrap();
        let err = validate(&empty).unwrap_err();
        assert!(err.to_string().contains("empty or missing"));
    }

    #[test]
    fn validate_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let err = validate(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn save_atomic_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let doc = json!({"env": {"FOO": "bar"}, "model": "opus"});

        save_atomic(&path, &doc).unwrap();
        assert!(validate(&path).is_ok());
        assert_eq!(load(&path).unwrap(), doc);
    }
}
