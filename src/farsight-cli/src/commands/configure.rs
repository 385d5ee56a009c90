//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up farsight defaults.

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Handle the configure command
///
/// # Arguments
/// * `process` - Process name to save as default
/// * `layout` - Layout table path to save as default
/// * `show` - If true, show current configuration
pub fn handle(process: Option<String>, layout: Option<PathBuf>, show: bool) -> Result<()> {
    let path = Config::config_path()?;
    let mut config = Config::load_from(&path)?;

    if show {
        show_config(&config, &path);
        return Ok(());
    }

    if process.is_none() && layout.is_none() {
        show_usage();
        return Ok(());
    }

    apply(&mut config, process, layout)?;
    config.save_to(&path)?;
    show_config(&config, &path);
    println!("Config saved to: {}", path.display());
    Ok(())
}

/// Update `config` with the given values, checking a layout file parses first
fn apply(config: &mut Config, process: Option<String>, layout: Option<PathBuf>) -> Result<()> {
    if let Some(name) = process {
        config.process_name = Some(name);
    }
    if let Some(path) = layout {
        let path = path
            .canonicalize()
            .with_context(|| format!("Layout file {} not found", path.display()))?;
        let candidate = Config {
            layout_path: Some(path.clone()),
            ..Config::default()
        };
        candidate.layout()?;
        config.layout_path = Some(path);
    }
    Ok(())
}

/// Display current configuration
fn show_config(config: &Config, path: &Path) {
    println!("Process: {}", config.process_name());
    match &config.layout_path {
        Some(layout) => println!("Layout: {}", layout.display()),
        None => println!("Layout: built-in"),
    }

    let session = config.session_config();
    println!(
        "Intervals: world {}ms, explosives {}ms, quests {}ms",
        session.world_interval.as_millis(),
        session.explosives_interval.as_millis(),
        session.quests_interval.as_millis()
    );
    println!(
        "Cache TTL: {}ms, dynamic sleep: {}",
        session.cache_ttl.as_millis(),
        session.dynamic_sleep
    );
    println!("Config file: {}", path.display());
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: farsight --process NAME configure");
    println!("   or: farsight --layout PATH configure");
    println!("   or: farsight configure --show");
    println!();
    println!("Timings (world_interval_ms, cache_ttl_ms, ...) can be edited");
    println!("directly in the config file.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_apply_sets_process() {
        let mut config = Config::default();
        apply(&mut config, Some("Other.exe".into()), None).unwrap();
        assert_eq!(config.process_name(), "Other.exe");
        assert!(config.layout_path.is_none());
    }

    #[test]
    fn test_apply_rejects_invalid_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.toml");
        fs::write(&path, "[collections.broken]\nkind = \"list\"").unwrap();

        let mut config = Config::default();
        assert!(apply(&mut config, None, Some(path)).is_err());
        assert!(config.layout_path.is_none());
    }

    #[test]
    fn test_apply_accepts_valid_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("layout.toml");
        fs::write(&path, farsight::layout::BUILTIN_LAYOUT).unwrap();

        let mut config = Config::default();
        apply(&mut config, None, Some(path.clone())).unwrap();
        assert_eq!(config.layout_path, Some(path.canonicalize().unwrap()));
    }

    #[test]
    fn test_apply_missing_layout_file() {
        let mut config = Config::default();
        let missing = PathBuf::from("/definitely/not/here.toml");
        assert!(apply(&mut config, None, Some(missing)).is_err());
    }

    #[test]
    fn test_show_usage_does_not_panic() {
        show_usage();
    }
}
