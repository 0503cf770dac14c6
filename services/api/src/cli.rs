use crate::demo::{run_demo, run_ingest, DemoArgs, IngestArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use gig_rewards::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Gig Rewards",
    about = "Run the gig-worker rewards engine or exercise it from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run a seeded end-to-end evaluation, claim, and recompute walkthrough
    Demo(DemoArgs),
    /// Upload an activity CSV for a seeded worker and print what it unlocked
    Ingest(IngestArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Start with an empty store instead of the demo worker and rule
    #[arg(long)]
    pub(crate) no_seed: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Ingest(args) => run_ingest(args),
    }
}
