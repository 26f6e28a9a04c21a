use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mas_stream::cli::{chart, citations, replay, segment};
use mas_stream::config::Config;

#[derive(Parser)]
#[command(name = "mas-stream")]
#[command(about = "Interpret streamed assistant responses: blocks, charts and citations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "mas-stream.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract citations from a finished response
    Citations {
        /// Markdown/text file holding the response
        file: PathBuf,

        /// JSON array of retrieval sources to append
        #[arg(long)]
        sources: Option<PathBuf>,

        /// Print citations as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split a response into text and table blocks
    Segment {
        file: PathBuf,

        /// Message id used to derive block ids (random if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Print blocks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Infer charts for every table in a response
    Chart { file: PathBuf },

    /// Replay a JSON-lines event log through a streaming session
    Replay {
        /// One decoded event per line
        events: PathBuf,

        /// JSON array of retrieval sources used at finalization
        #[arg(long)]
        sources: Option<PathBuf>,

        /// JSON object mapping chart data references to specs. Applied after
        /// finalization, so only charts in text-free responses are hydrated.
        #[arg(long)]
        charts: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config)?;

    // Logs go to stderr; stdout is reserved for command output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Citations {
            file,
            sources,
            json,
        } => {
            citations::run(&config, &file, sources.as_deref(), json)?;
        }
        Commands::Segment { file, id, json } => {
            segment::run(&file, id, json)?;
        }
        Commands::Chart { file } => {
            chart::run(&config, &file)?;
        }
        Commands::Replay {
            events,
            sources,
            charts,
        } => {
            replay::run(&config, &events, sources.as_deref(), charts.as_deref()).await?;
        }
    }

    Ok(())
}
