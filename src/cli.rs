use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML config file. Environment variables override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scrape the source and write new chapters to the CMS.
    Run(RunArgs),
    /// Scrape and match without writing anything.
    Preview,
    /// Print the lookup candidates for a scraped title.
    Normalize(NormalizeArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Recorded in the audit record title.
    #[arg(long, default_value = "cli")]
    pub origin: String,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    #[arg(long)]
    pub title: String,
}
