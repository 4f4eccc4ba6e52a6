use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use quarry::commands::emit::Format;
use quarry::commands::{count, emit};
use quarry::consts::DEFAULT_ITERATOR_URI;
use quarry::iterate::{DocumentIterator, IteratorRegistry};
use quarry::logging::init_tracing;
use quarry::progress::Progress;

#[derive(Parser)]
#[command(
    name = "quarry",
    version,
    about = "Crawl GeoJSON documents stored in database tables."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Count the documents in one or more databases
    Count {
        /// Iterator URI, e.g. sql://sqlite3?processes=4&include=...
        #[arg(short, long, default_value = DEFAULT_ITERATOR_URI)]
        iterator_uri: String,

        /// Print the summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Databases to crawl (passed to the engine as DSNs)
        #[arg(required = true)]
        uris: Vec<String>,
    },
    /// Write the documents in one or more databases to stdout
    Emit {
        /// Iterator URI, e.g. sql://sqlite3?processes=4&include=...
        #[arg(short, long, default_value = DEFAULT_ITERATOR_URI)]
        iterator_uri: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Lines)]
        format: OutputFormat,

        /// Databases to crawl (passed to the engine as DSNs)
        #[arg(required = true)]
        uris: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One document per line
    Lines,
    /// A JSON array of documents
    Json,
    /// A GeoJSON FeatureCollection
    Geojson,
    /// Read every document, write nothing
    Null,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Lines => Format::Lines,
            OutputFormat::Json => Format::Json,
            OutputFormat::Geojson => Format::GeoJson,
            OutputFormat::Null => Format::Null,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let registry = IteratorRegistry::with_defaults();

    // Ctrl+C cancels the running call; records already in flight are dropped.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping iteration");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Count {
            iterator_uri,
            json,
            uris,
        } => {
            let iterator = registry.new_iterator(&iterator_uri)?;
            handle_count(iterator, &cancel, &uris, json).await
        }
        Command::Emit {
            iterator_uri,
            format,
            uris,
        } => {
            let iterator = registry.new_iterator(&iterator_uri)?;
            let stdout = io::stdout();
            let mut out = io::BufWriter::new(stdout.lock());
            let written =
                emit::run(iterator.as_ref(), &cancel, &uris, format.into(), &mut out).await?;
            out.flush()?;
            tracing::info!(records = written, seen = iterator.seen(), "Emitted records");
            iterator.close()
        }
    }
}

async fn handle_count(
    iterator: Arc<dyn DocumentIterator>,
    cancel: &CancellationToken,
    uris: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let progress = (!json && io::stderr().is_terminal())
        .then(|| Progress::start("counting", Arc::clone(&iterator)));

    let result = count::run(iterator.as_ref(), cancel, uris).await;

    if let Some(progress) = progress {
        progress.stop().await;
    }

    let summary = result?;
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{}", summary.describe());
    }

    iterator.close()
}
