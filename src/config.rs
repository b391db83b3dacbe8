use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Backups kept when no BACKUP_LIMIT override is present.
pub const DEFAULT_BACKUP_LIMIT: usize = 5;

const SECRETS_FILE_NAME: &str = ".ccglm.env";

pub struct Config {
    pub settings_file: PathBuf,
    pub backups_dir: PathBuf,
    pub lock_file: PathBuf,
    pub secrets_paths: Vec<PathBuf>,
}

impl Config {
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let claude_dir = home.join(".claude");

        Ok(Self {
            settings_file: claude_dir.join("settings.json"),
            backups_dir: claude_dir.join("backups"),
            lock_file: claude_dir.join(".ccglm.lock"),
            // Working directory first, then the fixed per-user location.
            secrets_paths: vec![
                PathBuf::from(SECRETS_FILE_NAME),
                claude_dir.join("ccglm.env"),
            ],
        })
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.backups_dir)
            .context("Failed to create backups directory")?;
        if let Some(parent) = self.settings_file.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create settings directory")?;
        }
        Ok(())
    }
}

/// Values sourced from the first `.ccglm.env` found. The file is plain
/// KEY=VALUE lines and must stay shell-sourceable, so `export` prefixes,
/// comments, and quoting are tolerated; anything unparseable is skipped.
#[derive(Default)]
pub struct Secrets {
    pub auth_token: Option<String>,
    backup_limit: Option<usize>,
}

impl Secrets {
    pub fn load(paths: &[PathBuf]) -> Self {
        for path in paths {
            if let Ok(content) = fs::read_to_string(path) {
                return Self::parse(&content);
            }
        }
        Self::default()
    }

    fn parse(content: &str) -> Self {
        let mut secrets = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(value.trim());

            match key.trim() {
                "GLM_AUTH_TOKEN" => secrets.auth_token = Some(value.to_string()),
                // Non-numeric or non-positive limits fall back to the default.
                "BACKUP_LIMIT" => {
                    secrets.backup_limit = value.parse::<usize>().ok().filter(|n| *n > 0);
                }
                _ => {}
            }
        }

        secrets
    }

    pub fn backup_limit(&self) -> usize {
        self.backup_limit.unwrap_or(DEFAULT_BACKUP_LIMIT)
    }
}

fn unquote(value: &str) -> &str {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    stripped.unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_and_limit() {
        let secrets = Secrets::parse("GLM_AUTH_TOKEN=abc123\nBACKUP_LIMIT=9\n");
        assert_eq!(secrets.auth_token.as_deref(), Some("abc123"));
        assert_eq!(secrets.backup_limit(), 9);
    }

    #[test]
    fn tolerates_export_comments_and_quotes() {
        let secrets = Secrets::parse(
            "# shell-style file\nexport GLM_AUTH_TOKEN=\"tok.en-1\"\n\ngarbage line\n",
        );
        assert_eq!(secrets.auth_token.as_deref(), Some("tok.en-1"));
        assert_eq!(secrets.backup_limit(), DEFAULT_BACKUP_LIMIT);
    }

    #[test]
    fn bad_backup_limit_falls_back() {
        for content in ["BACKUP_LIMIT=0", "BACKUP_LIMIT=-3", "BACKUP_LIMIT=five"] {
            let secrets = Secrets::parse(content);
            assert_eq!(secrets.backup_limit(), DEFAULT_BACKUP_LIMIT);
        }
    }
}
