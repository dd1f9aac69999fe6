use std::process;

use clap::{Parser, Subcommand};
use fineweb_filter_lib::config::{self, AppConfig};
use fineweb_filter_lib::pipeline::completion::ResponseOptions;

#[derive(Parser)]
#[command(name = "fineweb-filter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resumable LLM filtering helper for FineWeb batches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved snapshot and where each stage resumes
    Status,
    /// Send one prompt through the retrying completion client
    Ask {
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        /// Return only the first fenced block of the answer
        #[arg(long)]
        delimited: bool,
        #[arg(long, default_value_t = config::DEFAULT_MAX_RETRIES)]
        max_retries: u32,
    },
}

fn main() {
    fineweb_filter_lib::init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cli = Cli::parse();
    let result = AppConfig::from_env()
        .map_err(fineweb_filter_lib::AppError::from)
        .and_then(|config| match cli.command {
            Commands::Status => fineweb_filter_lib::run_status(&config).map(|statuses| {
                for s in statuses {
                    let latest = s
                        .latest
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "-".into());
                    let next = s
                        .next
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "none (scan ceiling reached)".into());
                    println!("{:<10} latest: {latest}  next: {next}", s.stage);
                }
            }),
            Commands::Ask {
                prompt,
                system,
                delimited,
                max_retries,
            } => {
                let options = ResponseOptions {
                    extract_delimited: delimited,
                    max_retries,
                };
                fineweb_filter_lib::run_ask(&config, system.as_deref(), &prompt, &options)
                    .map(|answer| println!("{answer}"))
            }
        });

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
