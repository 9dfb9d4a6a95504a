use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use zipdensity_client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_USER_AGENT, ReqwestFetcher};
use zipdensity_core::batch::TracingBatchReporter;
use zipdensity_core::table::summary_lines;
use zipdensity_core::throttle::{BATCH_DELAY_RANGE, LOOKUP_DELAY_RANGE, RateLimitConfig};
use zipdensity_core::{BatchJob, BatchProcessor, DensityRecord, RecordStatus, Table, aggregate};

#[derive(Parser)]
#[command(
    name = "zipdensity",
    version,
    about = "Look up population density for U.S. zip codes"
)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ClientArgs {
    /// Reference host serving one page per zip code
    #[arg(long, global = true, env = "ZIPDENSITY_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "ZIPDENSITY_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// User-Agent header sent with every request
    #[arg(long, global = true, env = "ZIPDENSITY_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up one or more zip codes and print the results
    Lookup {
        /// Zip codes (4-digit, 5-digit, or ZIP+4)
        #[arg(required = true)]
        zipcodes: Vec<String>,

        /// Seconds to wait between lookups (0 to 3)
        #[arg(short, long, default_value_t = 0.0)]
        delay: f64,

        /// Print records as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Process a CSV with a `zipcode` column and write it back with densities
    Batch {
        /// Input CSV path, or `-` for stdin
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Concurrent workers (1 = sequential, max 5)
        #[arg(short, long, default_value_t = 1)]
        concurrency: usize,

        /// Seconds between requests per worker (0.5 to 5)
        #[arg(short, long, default_value_t = 1.0)]
        delay: f64,

        /// Random extra delay per request, in milliseconds
        #[arg(long, default_value_t = 0)]
        jitter_ms: u64,

        /// Omit the `Full Text` column
        #[arg(long, default_value_t = false)]
        no_full_text: bool,

        /// Log the first N input rows before processing
        #[arg(long)]
        preview: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("zipdensity=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let fetcher = build_fetcher(&cli.client)?;

    match cli.command {
        Commands::Lookup {
            zipcodes,
            delay,
            json,
        } => {
            let rate_limit = RateLimitConfig::from_secs_in(delay, LOOKUP_DELAY_RANGE)?;
            cmd_lookup(fetcher, zipcodes, rate_limit, json).await?;
        }
        Commands::Batch {
            input,
            output,
            concurrency,
            delay,
            jitter_ms,
            no_full_text,
            preview,
        } => {
            let rate_limit = RateLimitConfig::from_secs_in(delay, BATCH_DELAY_RANGE)?
                .with_jitter(Duration::from_millis(jitter_ms));
            let options = BatchOptions {
                concurrency,
                rate_limit,
                include_full_text: !no_full_text,
                preview,
            };
            cmd_batch(fetcher, &input, output.as_deref(), options).await?;
        }
    }

    Ok(())
}

fn build_fetcher(args: &ClientArgs) -> Result<ReqwestFetcher> {
    let config = ClientConfig::default()
        .with_base_url(args.base_url.as_str())
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_user_agent(args.user_agent.as_str());
    ReqwestFetcher::with_config(config).context("Failed to create HTTP client")
}

/// Cancel `token` on Ctrl-C so workers stop between records.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight lookups");
            token.cancel();
        }
    });
}

async fn cmd_lookup(
    fetcher: ReqwestFetcher,
    zipcodes: Vec<String>,
    rate_limit: RateLimitConfig,
    json: bool,
) -> Result<()> {
    let processor = BatchProcessor::new(fetcher);

    // A lone code has nothing to space out.
    let records = if let [zipcode] = zipcodes.as_slice() {
        vec![processor.lookup(zipcode).await]
    } else {
        let job = BatchJob::new(zipcodes).with_rate_limit(rate_limit);
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());
        processor
            .run_with_cancel(&job, &cancel, &TracingBatchReporter)
            .await
            .records
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!("{}", format_record(record));
        }
    }

    Ok(())
}

fn format_record(record: &DensityRecord) -> String {
    match (&record.status, record.density) {
        (RecordStatus::Found, Some(density)) => {
            let mut line = format!("{}: {density} people per square mile", record.zipcode);
            if let Some(text) = &record.full_text {
                line.push_str(&format!("\n  {text}"));
            }
            line
        }
        _ => format!("{}: {}", record.zipcode, record.density_cell()),
    }
}

struct BatchOptions {
    concurrency: usize,
    rate_limit: RateLimitConfig,
    include_full_text: bool,
    preview: Option<usize>,
}

async fn cmd_batch(
    fetcher: ReqwestFetcher,
    input: &Path,
    output: Option<&Path>,
    options: BatchOptions,
) -> Result<()> {
    // 1. Load table
    let table = read_table(input)?;
    let zipcodes = table.zip_inputs()?;
    tracing::info!(rows = table.len(), input = %input.display(), "Loaded input");

    if let Some(n) = options.preview {
        for row in table.rows.iter().take(n) {
            tracing::info!(row = %row.join(", "), "Preview");
        }
    }

    // 2. Resolve
    let job = BatchJob::new(zipcodes)
        .with_concurrency(options.concurrency)?
        .with_rate_limit(options.rate_limit);
    let processor = BatchProcessor::new(fetcher);

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let result = processor
        .run_with_cancel(&job, &cancel, &TracingBatchReporter)
        .await;

    // 3. Merge and write
    let augmented = aggregate(&table, &result, options.include_full_text)?;
    write_table(&augmented, output)?;

    for line in summary_lines(&result.summary) {
        eprintln!("{line}");
    }

    Ok(())
}

fn read_table(path: &Path) -> Result<Table> {
    if path == Path::new("-") {
        return Ok(Table::from_csv_reader(io::stdin().lock())?);
    }
    let file =
        File::open(path).with_context(|| format!("Failed to open input: {}", path.display()))?;
    Table::from_csv_reader(BufReader::new(file))
        .with_context(|| format!("Failed to read CSV: {}", path.display()))
}

fn write_table(table: &Table, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output: {}", path.display()))?;
            table.write_csv(BufWriter::new(file))?;
            tracing::info!(output = %path.display(), "Wrote results");
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            table.write_csv(&mut handle)?;
            handle.flush()?;
        }
    }
    Ok(())
}
