use clap::{Parser, Subcommand};
use clipforge::naming::RenameMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clipforge")]
#[command(author, version, about = "WebM to MP4 conversion engine")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the conversion engine and drop-folder watcher until Ctrl-C
    Start,

    /// Convert local files and wait for the results
    Convert {
        /// Input files to convert
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// How to name the output files
        #[arg(long, value_enum, default_value_t = RenameMode::Original)]
        rename: RenameMode,

        /// Output name (without extension) for `--rename custom`
        #[arg(long)]
        name: Option<String>,

        /// Move inputs into the upload directory instead of copying them
        #[arg(long = "move")]
        move_inputs: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Where to write the file
        #[arg(default_value = "clipforge.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}
