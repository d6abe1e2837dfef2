//! This program exports lexeme metadata from the OpenGloss dictionary
//! dataset, whose home you can find at
//! <https://huggingface.co/datasets/mjbommar/opengloss-dictionary>.

mod config;
mod export;
mod hub;
mod progress;
mod row;

use crate::{config::Config, progress::ProgressReport};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Export lexeme metadata from the OpenGloss dictionary dataset
///
/// The dataset rows are streamed once, in dataset order, and distilled into
/// two flat files inside the output directory: "lexemes.tsv", a tab-delimited
/// index assigning a stable sequential identifier to each distinct word, and
/// "entries.jsonl", one JSON detail record per indexed word.
///
/// A row only produces output the first time its word is seen: later rows
/// carrying the same word are skipped, as are rows whose word is empty.
#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    /// Hugging Face dataset identifier
    ///
    /// Ignored when local shards are provided through --input.
    #[arg(short, long, default_value = "mjbommar/opengloss-dictionary")]
    dataset: Box<str>,

    /// Dataset revision (branch, tag or commit hash)
    #[arg(long, default_value = "main")]
    revision: Box<str>,

    /// Local dataset shards to read instead of downloading from the Hub
    ///
    /// Shards must be line-delimited JSON, optionally gzip-compressed, and
    /// are processed in the order given. Lexeme identifiers depend on row
    /// order, so pass the shards in the same order on every run.
    #[arg(short, long, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Directory where the output files are written
    ///
    /// It is created if it does not exist, and any "lexemes.tsv" or
    /// "entries.jsonl" file inside of it is overwritten.
    #[arg(short, long, default_value = "data")]
    output_dir: PathBuf,

    /// Max number of dataset rows to consume
    ///
    /// Rows past the cutoff are not read at all. This truncates the export,
    /// but identifiers assigned to the rows that are consumed stay the same
    /// as in a full run, which makes this option handy for sampling the
    /// dataset or smoke-testing the pipeline without a full download.
    #[arg(short, long)]
    max_rows: Option<usize>,
}
//
#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    setup_logging().map_err(|e| anyhow::format_err!("{e}"))?;

    // Decode CLI arguments
    let args = Args::parse();
    let config = Config::new(args);

    // Set up progress reporting
    let report = ProgressReport::new();

    // Figure out where the dataset shards come from
    let client = reqwest::Client::new();
    let shards = if config.inputs.is_empty() {
        hub::resolve_shards(&config, client.clone(), &report).await?
    } else {
        hub::local_shards(&config)
    };

    // Stream the shards and write both output files
    let summary = export::run(config.clone(), client, shards, &report).await?;

    // Report on what was done, now that the progress bars are gone
    eprintln!(
        "Wrote {} lexemes to {}",
        summary.lexemes,
        config.lexemes_path().display()
    );
    eprintln!(
        "Wrote detailed entries to {}",
        config.entries_path().display()
    );
    Ok(())
}

/// Use anyhow for Result type erasure
pub use anyhow::Result;

/// Identifier of a distinct word, sequential in first-seen order
pub type LexemeId = u64;

/// Position of a row within the full dataset, counting every row seen
pub type RowIndex = u64;

/// Set up logging
fn setup_logging() -> syslog::Result<()> {
    syslog::init(
        syslog::Facility::LOG_USER,
        if cfg!(feature = "log-trace") {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        None,
    )
}
