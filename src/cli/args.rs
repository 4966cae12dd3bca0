//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Declarative YAML configuration trees: inspect, resolve and query documents
#[derive(Parser, Debug)]
#[command(name = "conftree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Engine settings file (TOML)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub settings: Option<PathBuf>,

    /// Interpolation value available to `%(KEY)s` in strings
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", global = true)]
    pub defines: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a document and print the tree
    Show {
        /// YAML document
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Print placeholders as written, without resolving them
        #[arg(long)]
        raw: bool,
        /// Draw the tree with box characters
        #[arg(long)]
        tree: bool,
    },

    /// Resolve a document and print the value at a path
    Get {
        /// YAML document
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Dotted path, e.g. `database.url`
        path: String,
    },

    /// Manage engine settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,

    /// Print a settings template
    Template,

    /// Show settings paths
    Path,
}
