use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Apply theme bundles to a sandboxed device.
#[derive(Debug, Parser)]
#[command(name = "thememgr", version, about)]
pub struct Cli {
    /// Configuration file (default: ./config.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Sandbox root, overriding the configured one
    #[arg(long, global = true, value_name = "DIR")]
    pub sandbox: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a bundle and print its descriptor
    Inspect {
        bundle: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List every valid bundle under a directory
    List { dir: PathBuf },
    /// Apply a bundle to the sandbox
    Apply(ApplyArgs),
    /// Disable every theme overlay
    Reset {
        /// Also uninstall the disabled overlays
        #[arg(long)]
        uninstall: bool,
        /// Target whose overlay is left alone
        #[arg(long = "keep", value_name = "TARGET")]
        keep: Vec<String>,
    },
    /// Print the sandbox overlay registry
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    pub bundle: PathBuf,

    /// Resource key or overlay target to leave out
    #[arg(long = "skip", value_name = "KEY")]
    pub skip: Vec<String>,

    /// Uninstall stale theme overlays instead of only disabling them
    #[arg(long)]
    pub remove_stale: bool,

    /// Crop backgrounds to the display around the center
    #[arg(long)]
    pub center_wallpaper: bool,

    /// Print status events as JSON lines
    #[arg(long)]
    pub json: bool,
}
