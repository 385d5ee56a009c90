//! CLI argument definitions

mod core;

pub use self::core::{Cli, Commands};
