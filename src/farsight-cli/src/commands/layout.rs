//! Layout command handler

use crate::config::Config;

use anyhow::Result;

/// Handle the Layout command
///
/// Prints the effective layout table as TOML, or just where it comes from.
pub fn handle(config: &Config, path_only: bool) -> Result<()> {
    if path_only {
        match &config.layout_path {
            Some(path) => println!("{}", path.display()),
            None => println!("built-in"),
        }
        return Ok(());
    }

    let layout = config.layout()?;
    print!("{}", layout.to_toml_string()?);
    Ok(())
}
