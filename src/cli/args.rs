use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about,
    help_template(
        "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage}\n\n{all-args}{after-help}"
    )
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Characterize transistor models with the built-in square-law oracle.
    Characterize {
        /// Path to TOML sweep configuration file.
        #[arg(short, long, default_value = "gmid22.toml")]
        config: PathBuf,

        /// Directory to which output files should be saved.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Size a transistor against a design specification.
    Design {
        /// Path to TOML design specification file.
        #[arg(short, long, default_value = "design.toml")]
        config: PathBuf,

        /// Path to a previously saved characterization table file.
        #[arg(short, long)]
        tables: PathBuf,

        /// Directory to which output files should be saved.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Skip design-space chart generation.
        #[arg(long)]
        no_plots: bool,
    },
}
