use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Extract tickers and sentiment from financial news")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend: openai, anthropic, ollama or huggingface
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Directory holding one JSON file per ticker
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Analyse a news file and file the results per ticker
    Ingest {
        #[arg(default_value = "news.csv")]
        file: PathBuf,
    },
    /// Print entry counts and sentiment per ticker
    Summary,
    /// Print score statistics and top themes for one ticker
    Trends { ticker: String },
}

impl Default for Command {
    fn default() -> Self {
        Command::Ingest {
            file: PathBuf::from("news.csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_is_the_default_command() {
        let cli = Cli::parse_from(["ticker-news"]);
        assert!(matches!(cli.command(), Command::Ingest { file } if file == PathBuf::from("news.csv")));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["ticker-news", "trends", "aapl", "--provider", "ollama"]);
        assert_eq!(cli.provider.as_deref(), Some("ollama"));
        assert!(matches!(cli.command(), Command::Trends { ticker } if ticker == "aapl"));
    }
}
