use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Run prompt tests against an agent backend and check the returned rows"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every test in <project>/tests against each model
    Run(RunArgs),
    /// Browse saved run summaries in a local web viewer
    Server(ServerArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Model to test, as provider:model_id. Repeat for several models.
    #[arg(short = 'm', long = "model")]
    pub models: Vec<String>,

    /// Number of test runs in flight at once
    #[arg(short = 't', long, default_value_t = 1)]
    pub threads: usize,

    #[arg(long, env = "TALLY_PROJECT", default_value = ".")]
    pub project: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(short = 'p', long, env = "TALLY_VIEWER_PORT", default_value_t = tally_viewer::config::DEFAULT_PORT)]
    pub port: u16,

    /// Don't open a browser
    #[arg(long)]
    pub no_open: bool,

    #[arg(long, env = "TALLY_PROJECT", default_value = ".")]
    pub project: PathBuf,
}
