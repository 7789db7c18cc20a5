mod cmd;
mod config;
mod error;

use std::fmt;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

#[derive(Parser)]
#[command(name = "docdesk", version)]
struct Cli {
    #[command(flatten)]
    server: config::ServerArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload, process, list and delete documents
    #[command(subcommand)]
    Documents(cmd::DocumentsCommand),
    /// Print the stored chat history of a document
    History(cmd::HistoryArgs),
    /// Chat over the realtime channel, reading messages from stdin
    Chat(cmd::ChatArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays readable in chat mode.
    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Documents(command) => cmd::run_documents(&cli.server, command).await,
        Command::History(args) => cmd::run_history(&cli.server, args).await,
        Command::Chat(args) => cmd::run_chat(&cli.server, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
