use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deck")]
#[command(about = "widget-deck - A terminal dashboard built from shell script widgets")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to widget-deck.yaml in this or a parent directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Allow custom widgets without a pinned fingerprint
    #[arg(long, global = true)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive dashboard (default)
    Tui,
    /// Refresh one widget once and print its document
    Run {
        /// Widget identifier from the config
        widget: String,

        /// Print the parsed document as JSON
        #[arg(long)]
        json: bool,

        /// Pass --extended to the widget
        #[arg(long)]
        extended: bool,
    },
    /// Check whether a script would be allowed to run
    Validate {
        /// Script path
        path: PathBuf,

        /// Expected SHA-256 of the script
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },
    /// Print a script's SHA-256 and the config snippet that pins it
    Checksum {
        /// Script path
        path: PathBuf,
    },
    /// List configured widgets and their validation status
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
