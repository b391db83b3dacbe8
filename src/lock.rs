use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Single-instance advisory lock. The file is created with `create_new`, so
/// acquisition fails fast when another invocation holds it; no waiting, no
/// retry. The guard removes the file on drop, and a signal handler covers
/// Ctrl-C and SIGTERM, so only a hard crash (SIGKILL, power loss) can leave
/// the file behind.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())
                    .with_context(|| format!("Failed to write lock file {}", path.display()))?;

                let lock_path = path.to_path_buf();
                ctrlc::set_handler(move || {
                    let _ = fs::remove_file(&lock_path);
                    std::process::exit(130);
                })
                .context("Failed to set interrupt handler")?;

                Ok(Self {
                    path: path.to_path_buf(),
                })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(path).unwrap_or_default();
                let owner = owner.trim();
                if owner.is_empty() {
                    bail!(
                        "Another ccglm instance is running (lock file {}). \
                         Delete it manually if that process is gone.",
                        path.display()
                    );
                }
                bail!(
                    "Another ccglm instance is running (pid {}, lock file {}). \
                     Delete it manually if that process is gone.",
                    owner,
                    path.display()
                );
            }
            Err(err) => Err(err)
                .with_context(|| format!("Failed to create lock file {}", path.display())),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_pid_and_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".test.lock");

        {
            let _guard = LockGuard::acquire(&path).unwrap();
            let content = fs::read_to_string(&path).unwrap();
            assert_eq!(content.trim(), std::process::id().to_string());
        }
        assert!(!path.exists());
    }

    #[test]
    fn contention_reports_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".test.lock");
        fs::write(&path, "4242\n").unwrap();

        let err = LockGuard::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("4242"));
        // A failed acquisition must not remove someone else's lock.
        assert!(path.exists());
    }
}
