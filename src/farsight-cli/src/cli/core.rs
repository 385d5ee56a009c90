//! Core CLI definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "farsight")]
#[command(about = "Remote memory reader and structure reconstruction", long_about = None)]
pub struct Cli {
    /// Process to attach to (overrides the configured name)
    #[arg(short, long, global = true, env = "FARSIGHT_PROCESS")]
    pub process: Option<String>,

    /// Layout table to use (overrides the configured path)
    #[arg(short, long, global = true, env = "FARSIGHT_LAYOUT")]
    pub layout: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Attach and print tracked entities until interrupted
    #[command(visible_alias = "w")]
    Watch {
        /// Milliseconds between printed snapshots
        #[arg(short, long, default_value = "1000")]
        interval: u64,

        /// Print snapshots as JSON lines
        #[arg(long)]
        json: bool,

        /// Print a single snapshot and exit
        #[arg(long)]
        once: bool,
    },

    /// Show info about the attached process
    Info,

    /// Hex dump memory at an address
    #[command(visible_alias = "r")]
    Read {
        /// Address (hex with 0x prefix, or decimal)
        address: String,

        /// Number of bytes to read
        #[arg(short, long, default_value = "64")]
        size: usize,
    },

    /// Follow a pointer chain and print every hop
    Chain {
        /// Base address, or a module name when `--name` is used
        base: String,

        /// Offsets to follow (hex or decimal)
        offsets: Vec<String>,

        /// Use a named chain from the layout table
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Decode a layout collection at an address
    Collection {
        /// Collection name in the layout table
        name: String,

        /// Collection object address
        address: String,

        /// Maximum number of entries to print
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Print the effective layout table
    Layout {
        /// Only print where the layout comes from
        #[arg(long)]
        path: bool,
    },

    /// Configure default settings
    ///
    /// Saves the global `--process` and `--layout` values as defaults.
    #[command(visible_alias = "c")]
    Configure {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}
