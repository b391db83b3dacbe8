use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::profile::{self, Profile};
use crate::store;

const BACKUP_PREFIX: &str = "settings_";
const RESTORE_MARKER: &str = "before_restore_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub struct BackupEntry {
    pub path: PathBuf,
    pub file_name: String,
    pub created: DateTime<Local>,
}

pub struct BackupManager<'a> {
    config: &'a Config,
}

impl<'a> BackupManager<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// All backups, newest first. A missing backup directory is simply an
    /// empty list. Display indices shown to the user are 1-based positions
    /// into this ordering and are only stable within one listing.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        let mut backups = Vec::new();

        if self.config.backups_dir.exists() {
            for entry in fs::read_dir(&self.config.backups_dir)? {
                let entry = entry?;
                let path = entry.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !name.starts_with(BACKUP_PREFIX) || !name.ends_with(".json") {
                    continue;
                }

                let created = embedded_timestamp(name)
                    .or_else(|| modified_time(&path))
                    .unwrap_or_else(|| DateTime::from(std::time::SystemTime::UNIX_EPOCH));

                backups.push(BackupEntry {
                    file_name: name.to_string(),
                    path,
                    created,
                });
            }
        }

        backups.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(backups)
    }

    /// Snapshot the live settings before a profile switch. A glm document is
    /// reduced to its clean baseline first so backups always hold the state
    /// worth returning to; a cc document is copied as-is. The written file is
    /// re-validated; on failure it is removed and the whole operation aborts.
    pub fn snapshot_before_mutation(&self) -> Result<PathBuf> {
        let doc = store::load(&self.config.settings_file)?;
        let snapshot = match profile::classify(&doc) {
            Profile::Glm => profile::clean_baseline(&doc),
            Profile::Cc => doc,
        };
        self.write_snapshot(&snapshot, None)
    }

    /// Byte-exact copy of whatever is currently live, taken right before a
    /// restore overwrites it. Not clean-baselined and not parsed: this one
    /// exists to undo the restore itself, even when the live file no longer
    /// holds valid JSON.
    pub fn snapshot_before_restore(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.backups_dir)
            .context("Failed to create backups directory")?;

        let bytes = fs::read(&self.config.settings_file).with_context(|| {
            format!("Failed to read {}", self.config.settings_file.display())
        })?;

        let path = self.next_backup_path(Some(RESTORE_MARKER));
        let mut tmp = NamedTempFile::new_in(&self.config.backups_dir)
            .context("Failed to create temp file in backups directory")?;
        tmp.write_all(&bytes).context("Failed to write temp file")?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to finalize {}", path.display()))?;
        Ok(path)
    }

    fn write_snapshot(&self, doc: &serde_json::Value, marker: Option<&str>) -> Result<PathBuf> {
        fs::create_dir_all(&self.config.backups_dir)
            .context("Failed to create backups directory")?;

        let path = self.next_backup_path(marker);
        store::save_atomic(&path, doc)?;

        if let Err(err) = store::validate(&path) {
            let _ = fs::remove_file(&path);
            return Err(err.context("Backup failed validation after write"));
        }
        Ok(path)
    }

    fn next_backup_path(&self, marker: Option<&str>) -> PathBuf {
        let stamp = Local::now().format(TIMESTAMP_FORMAT);
        let base = format!("{}{}{}", BACKUP_PREFIX, marker.unwrap_or(""), stamp);

        let mut path = self.config.backups_dir.join(format!("{base}.json"));
        // Two snapshots within the same second get a numeric suffix.
        let mut n = 2;
        while path.exists() {
            path = self.config.backups_dir.join(format!("{base}_{n}.json"));
            n += 1;
        }
        path
    }

    /// Promote `entry` to be the live settings. The backup file itself is
    /// moved into place, so it disappears from the listing afterwards; the
    /// pre-restore snapshot taken by the caller is what preserves history.
    pub fn restore(&self, entry: &BackupEntry, settings_file: &Path) -> Result<()> {
        store::validate(&entry.path)?;
        fs::rename(&entry.path, settings_file).with_context(|| {
            format!(
                "Failed to move {} over {}",
                entry.path.display(),
                settings_file.display()
            )
        })?;
        Ok(())
    }

    /// Delete every backup beyond the `keep` newest. Returns what was
    /// removed so the caller can report it.
    pub fn prune(&self, keep: usize) -> Result<Vec<PathBuf>> {
        let backups = self.list()?;
        let mut removed = Vec::new();

        for entry in backups.into_iter().skip(keep) {
            fs::remove_file(&entry.path)
                .with_context(|| format!("Failed to remove {}", entry.path.display()))?;
            removed.push(entry.path);
        }
        Ok(removed)
    }
}

/// Map a 1-based display index from `list` output back to its entry.
pub fn resolve_index(backups: &[BackupEntry], index: usize) -> Result<&BackupEntry> {
    if index == 0 || index > backups.len() {
        bail!(
            "Invalid backup index {} (expected 1-{})",
            index,
            backups.len()
        );
    }
    Ok(&backups[index - 1])
}

fn embedded_timestamp(file_name: &str) -> Option<DateTime<Local>> {
    // settings_20250101_120000.json, settings_before_restore_20250101_120000.json
    let stem = file_name.strip_suffix(".json")?;
    let mut parts = stem.rsplitn(3, '_');
    let time = parts.next()?;
    let date = parts.next()?;
    let naive = NaiveDateTime::parse_from_str(&format!("{date}_{time}"), TIMESTAMP_FORMAT).ok()?;
    Local.from_local_datetime(&naive).single()
}

fn modified_time(path: &Path) -> Option<DateTime<Local>> {
    let mtime = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(mtime))
}
