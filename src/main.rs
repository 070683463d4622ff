use std::process::ExitCode;

use clap::Parser;

use ticker_news::ai::{Provider, ResilientInvoker};
use ticker_news::config::Config;
use ticker_news::error::{AppError, Result};
use ticker_news::ingest::Ingestor;
use ticker_news::store::TickerStore;

mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // Progress goes to stderr through tracing; summaries go to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::InputNotFound(path)) => {
            eprintln!("Error: Could not find the input file '{}'", path.display());
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(provider) = &cli.provider {
        config.provider = provider.clone();
    }
    if let Some(output_dir) = &cli.output_dir {
        config.output_dir = output_dir.clone();
    }

    match cli.command() {
        Command::Ingest { file } => {
            let provider = Provider::new(&config.provider, config.provider_settings())?;
            tracing::info!(
                backend = provider.backend_id(),
                model = provider.model(),
                "using backend"
            );

            let store = TickerStore::open(&config.output_dir)?;
            let invoker = ResilientInvoker::new(provider, config.retry_policy());
            let ingestor = Ingestor::new(invoker, store, config.ingest_settings());
            let stats = ingestor.run(&file).await?;

            println!("\nCompleted processing {} rows", stats.processed);
            println!("Successful analyses: {}", stats.successful);
            println!(
                "New entries: {}, duplicates skipped: {}, empty rows skipped: {}",
                stats.entries_added, stats.duplicates, stats.skipped
            );
            if stats.store_failures > 0 {
                println!("Entries that could not be written: {}", stats.store_failures);
            }
            print_summary(ingestor.store())?;
        }
        Command::Summary => print_summary(&TickerStore::new(&config.output_dir))?,
        Command::Trends { ticker } => match TickerStore::new(&config.output_dir).trends(&ticker) {
            Some(trends) => println!("{}", trends),
            None => println!("No data found for ticker {}", ticker.to_uppercase()),
        },
    }

    Ok(())
}

fn print_summary(store: &TickerStore) -> Result<()> {
    let summary = store.summary()?;
    println!(
        "\nSummary of ticker files in '{}':",
        store.dir().display()
    );
    println!("{}", summary);
    Ok(())
}
