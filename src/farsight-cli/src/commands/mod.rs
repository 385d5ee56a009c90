//! Command handlers for the farsight CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod configure;
pub mod info;
pub mod layout;
pub mod raw;
pub mod watch;

use crate::config::Config;
use crate::process::ProcessSource;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Saved configuration with command-line overrides applied
pub fn effective_config(process: Option<String>, layout: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load()?;
    if process.is_some() {
        config.process_name = process;
    }
    if layout.is_some() {
        config.layout_path = layout;
    }
    Ok(config)
}

/// Attach to the configured process
pub fn attach(config: &Config) -> Result<Arc<ProcessSource>> {
    let name = config.process_name();
    let source =
        ProcessSource::attach(name).with_context(|| format!("Failed to attach to {}", name))?;
    Ok(Arc::new(source))
}

/// Parse a hex (`0x` prefix) or decimal number
pub fn parse_number(text: &str) -> Result<u64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).with_context(|| format!("Invalid hex number: {}", text))
    } else {
        text.parse::<u64>()
            .with_context(|| format!("Invalid number: {}", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x1F").unwrap(), 0x1F);
        assert_eq!(parse_number("0X7ff0").unwrap(), 0x7ff0);
        assert_eq!(parse_number("4096").unwrap(), 4096);
        assert!(parse_number("0xZZ").is_err());
        assert!(parse_number("twelve").is_err());
    }
}
