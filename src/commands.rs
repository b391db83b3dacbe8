use anyhow::{bail, Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Select};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::io;

use crate::backup::{self, BackupManager};
use crate::cli::Cli;
use crate::config::{Config, Secrets};
use crate::lock::LockGuard;
use crate::profile::{self, Profile};
use crate::store;

/// Switch the live settings to `target`. This is the mutating path: it runs
/// under the lock and never touches the live file except through the final
/// atomic replace, so any failure on the way leaves it byte-identical.
pub fn switch(target: Profile, verbose: bool, dry_run: bool) -> Result<()> {
    let config = Config::new()?;
    let secrets = Secrets::load(&config.secrets_paths);

    let _lock = LockGuard::acquire(&config.lock_file)?;
    if verbose {
        println!(
            "{}",
            format!("· lock acquired ({})", config.lock_file.display()).dimmed()
        );
    }

    store::validate(&config.settings_file)?;
    let current = store::load(&config.settings_file)?;
    if !current.is_object() {
        bail!(
            "Settings root in {} is not a JSON object",
            config.settings_file.display()
        );
    }

    let active = profile::classify(&current);
    if verbose {
        println!("{}", format!("· current profile: {}", active).dimmed());
    }

    // Token problems are input errors: catch them before any file is touched.
    let token = match target {
        Profile::Glm => {
            let token = secrets.auth_token.clone().context(
                "No GLM auth token found. Set GLM_AUTH_TOKEN in ./.ccglm.env or ~/.claude/ccglm.env",
            )?;
            profile::validate_auth_token(&token)?;
            Some(token)
        }
        Profile::Cc => None,
    };

    let baseline = profile::clean_baseline(&current);
    let target_doc = profile::apply_profile(&baseline, target, token.as_deref())?;

    if dry_run {
        println!(
            "{} Dry run: would switch '{}' → '{}'",
            "·".dimmed(),
            active,
            target.to_string().cyan()
        );
        print_diff(&current, &target_doc)?;
        println!("{}", "No files were changed.".yellow());
        return Ok(());
    }

    let manager = BackupManager::new(&config);
    let backup_path = manager.snapshot_before_mutation()?;
    if verbose {
        println!(
            "{}",
            format!("· backup created: {}", backup_path.display()).dimmed()
        );
    }

    store::save_atomic(&config.settings_file, &target_doc)?;

    let removed = manager.prune(secrets.backup_limit())?;
    if verbose && !removed.is_empty() {
        println!(
            "{}",
            format!("· pruned {} old backup(s)", removed.len()).dimmed()
        );
    }

    println!(
        "{} Switched to '{}' profile",
        "✓".green(),
        target.to_string().cyan()
    );
    Ok(())
}

pub fn list() -> Result<()> {
    let config = Config::new()?;
    let manager = BackupManager::new(&config);
    let backups = manager.list()?;

    if backups.is_empty() {
        println!("{}", "No backups found.".yellow());
        return Ok(());
    }

    println!("{}", "Available backups:".bold());
    for (i, entry) in backups.iter().enumerate() {
        println!(
            "  {:>2}. {}  {}",
            i + 1,
            entry.file_name.cyan(),
            entry
                .created
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
    }
    Ok(())
}

pub fn restore(index: Option<usize>, verbose: bool, dry_run: bool) -> Result<()> {
    let config = Config::new()?;
    let secrets = Secrets::load(&config.secrets_paths);
    let manager = BackupManager::new(&config);
    let backups = manager.list()?;

    if backups.is_empty() {
        bail!("No backups found");
    }

    let selected = match index {
        Some(n) => backup::resolve_index(&backups, n)?,
        None => {
            let items: Vec<String> = backups
                .iter()
                .map(|b| {
                    format!(
                        "{}  ({})",
                        b.file_name,
                        b.created.format("%Y-%m-%d %H:%M:%S")
                    )
                })
                .collect();

            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Select backup to restore")
                .items(&items)
                .default(0)
                .interact_opt()?;

            match selection {
                Some(idx) => &backups[idx],
                None => {
                    println!("Cancelled");
                    return Ok(());
                }
            }
        }
    };

    store::validate(&selected.path)?;

    if dry_run {
        println!(
            "{} Dry run: would restore '{}' over {}",
            "·".dimmed(),
            selected.file_name,
            config.settings_file.display()
        );
        if !store::is_missing_or_empty(&config.settings_file) {
            let current = store::load(&config.settings_file)?;
            let target = store::load(&selected.path)?;
            print_diff(&current, &target)?;
        }
        println!("{}", "No files were changed.".yellow());
        return Ok(());
    }

    let _lock = LockGuard::acquire(&config.lock_file)?;

    // Keep a way back to the pre-restore state. Byte copy, not baselined:
    // this snapshot exists to undo the restore itself, even if the live
    // file no longer parses.
    if !store::is_missing_or_empty(&config.settings_file) {
        let safety = manager.snapshot_before_restore()?;
        println!(
            "{} Created pre-restore backup '{}'",
            "ℹ".blue(),
            safety
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        );
    }

    manager.restore(selected, &config.settings_file)?;

    let removed = manager.prune(secrets.backup_limit())?;
    if verbose && !removed.is_empty() {
        println!(
            "{}",
            format!("· pruned {} old backup(s)", removed.len()).dimmed()
        );
    }

    println!("{} Restored '{}'", "✓".green(), selected.file_name.cyan());
    Ok(())
}

pub fn show() -> Result<()> {
    let config = Config::new()?;

    if store::is_missing_or_empty(&config.settings_file) {
        println!(
            "{}",
            format!("No settings found at {}", config.settings_file.display()).yellow()
        );
        return Ok(());
    }

    let doc = store::load(&config.settings_file)?;
    let active = profile::classify(&doc);

    let label = match active {
        Profile::Cc => "cc (Anthropic API)".green().bold(),
        Profile::Glm => "glm (Zhipu GLM)".magenta().bold(),
    };
    println!("{} {}", "Active profile:".bold(), label);
    println!(
        "{} {}",
        "Settings file:".bold(),
        config.settings_file.display()
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

pub fn completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

fn print_diff(before: &Value, after: &Value) -> Result<()> {
    let old = serde_json::to_string_pretty(&mask_auth_token(before))?;
    let new = serde_json::to_string_pretty(&mask_auth_token(after))?;

    if old == new {
        println!("{} Settings are already in the target state", "=".green());
        return Ok(());
    }

    let diff = TextDiff::from_lines(&old, &new);
    for change in diff.iter_all_changes() {
        let line = change.value();
        match change.tag() {
            ChangeTag::Delete => print!("{}", format!("- {}", line).red()),
            ChangeTag::Insert => print!("{}", format!("+ {}", line).green()),
            ChangeTag::Equal => print!("  {}", line),
        }
    }
    Ok(())
}

fn mask_auth_token(doc: &Value) -> Value {
    let mut doc = doc.clone();
    if let Some(Value::Object(env)) = doc.get_mut("env") {
        if let Some(Value::String(token)) = env.get_mut("ANTHROPIC_AUTH_TOKEN") {
            *token = mask(token);
        }
    }
    doc
}

fn mask(token: &str) -> String {
    match (token.get(..6), token.get(token.len().saturating_sub(4)..)) {
        (Some(head), Some(tail)) if token.len() > 10 => format!("{}...{}", head, tail),
        _ => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_only_edges() {
        assert_eq!(mask("abcdef123456wxyz"), "abcdef...wxyz");
        assert_eq!(mask("short"), "***");
    }
}
