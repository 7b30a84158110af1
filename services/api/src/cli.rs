use crate::preview::{run_act_preview, ActPreviewArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use inspection_service::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Field Inspection Service",
    about = "Run the field inspection service or preview acts from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and, when brokers are configured, the task consumer (default command)
    Serve(ServeArgs),
    /// Work with inspection acts offline
    Act {
        #[command(subcommand)]
        command: ActCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ActCommand {
    /// Compose an act from a JSON fixture and print its fields, optionally rendering the document
    Preview(ActPreviewArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Act {
            command: ActCommand::Preview(args),
        } => run_act_preview(args),
    }
}
