//! Streaming export of dataset rows into the two output files
//!
//! The shards are consumed strictly one after another, in the order produced
//! by the [`hub`](crate::hub) module: lexeme identifiers are assigned to
//! words in first-seen order, so the row order must be the same on every run
//! and shards may not be downloaded into a concurrently merged pool the way
//! one would otherwise do it.

use crate::{
    config::Config,
    hub::{Shard, ShardLocation},
    progress::{ProgressReport, ProgressTracker, Work},
    row::{DatasetRow, IndexRecord},
    LexemeId, Result, RowIndex,
};
use anyhow::Context;
use async_compression::tokio::bufread::GzipDecoder;
use csv_async::{AsyncSerializer, AsyncWriterBuilder};
use futures::stream::StreamExt;
use reqwest::Response;
use std::{
    collections::HashSet,
    io::{self, ErrorKind},
    pin::Pin,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
};
use tokio_util::io::{InspectReader, StreamReader};

/// What an export run accomplished
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ExportSummary {
    /// Number of dataset rows that were consumed
    pub rows: RowIndex,

    /// Number of distinct lexemes written to both output files
    pub lexemes: LexemeId,
}

/// Stream all dataset shards and write both output files
pub async fn run(
    config: Arc<Config>,
    client: reqwest::Client,
    shards: Vec<Shard>,
    report: &ProgressReport,
) -> Result<ExportSummary> {
    // Set up the output directory and files
    fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;
    let lexemes_path = config.lexemes_path();
    let tsv = BufWriter::new(
        File::create(&lexemes_path)
            .await
            .with_context(|| format!("creating {}", lexemes_path.display()))?,
    );
    let entries_path = config.entries_path();
    let jsonl = BufWriter::new(
        File::create(&entries_path)
            .await
            .with_context(|| format!("creating {}", entries_path.display()))?,
    );
    let mut writer = ExportWriter::new(tsv, jsonl).await?;

    // Track progress across shards
    let shards_done = report.add("Processing shards", Work::Steps(shards.len()));
    let bytes = report.add("Reading shard bytes", Work::Bytes(0));

    // Consume the shards one at a time, and rows within a shard in order
    'shards: for shard in &shards {
        let reader = open_shard(shard, &client, &bytes).await?;
        let mut lines = reader.lines();
        let context = || format!("reading rows from {}", shard.name);
        loop {
            if (config.max_rows).is_some_and(|max_rows| writer.rows() >= max_rows as RowIndex) {
                log::info!("Reached the row cutoff, ignoring the rest of the dataset");
                break 'shards;
            }
            let Some(line) = lines.next_line().await.with_context(context)? else {
                break;
            };
            // Tolerate blank lines, e.g. a trailing newline at end of shard
            if line.trim().is_empty() {
                continue;
            }
            writer
                .process_row(&line)
                .await
                .with_context(|| format!("processing a row of {}", shard.name))?;
        }
        log::debug!("Done processing shard {}", shard.name);
        shards_done.make_progress(1);
    }
    shards_done.finish();
    bytes.finish();
    writer.finish().await
}

/// Open a shard as a buffered stream of uncompressed bytes
async fn open_shard(
    shard: &Shard,
    client: &reqwest::Client,
    bytes: &ProgressTracker,
) -> Result<BufReader<Pin<Box<dyn AsyncRead + Send>>>> {
    // Acquire the raw shard bytes
    let raw: Pin<Box<dyn AsyncBufRead + Send>> = match &shard.location {
        ShardLocation::Url(url) => {
            let context = || format!("initiating download of {url}");
            let response = client
                .get(&**url)
                .send()
                .await
                .and_then(Response::error_for_status)
                .with_context(context)?;
            if let Some(length) = response.content_length() {
                bytes.add_work(length);
            }
            let tracker = bytes.clone();
            Box::pin(StreamReader::new(response.bytes_stream().map(
                move |block| {
                    block
                        // Track how many input bytes have been downloaded so far
                        .inspect(|block| tracker.make_progress(block.len() as u64))
                        // Translate reqwest errors into I/O errors
                        .map_err(|e| io::Error::new(ErrorKind::Other, Box::new(e)))
                },
            )))
        }
        ShardLocation::Path(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            let metadata = (file.metadata().await)
                .with_context(|| format!("inspecting {}", path.display()))?;
            bytes.add_work(metadata.len());
            let tracker = bytes.clone();
            Box::pin(BufReader::new(InspectReader::new(file, move |block| {
                tracker.make_progress(block.len() as u64)
            })))
        }
    };

    // Decompress gzipped shards on the fly
    let data: Pin<Box<dyn AsyncRead + Send>> = if shard.gzip {
        Box::pin(GzipDecoder::new(raw))
    } else {
        Box::pin(raw)
    };
    Ok(BufReader::new(data))
}

/// Incremental writer for the lexeme index and the entry details
///
/// Feed dataset rows in order through [`process_row()`](Self::process_row),
/// then call [`finish()`](Self::finish) to flush both outputs and collect the
/// run summary.
pub struct ExportWriter<TsvOut: AsyncWrite + Unpin + Send, JsonOut: AsyncWrite + Unpin> {
    /// Tab-delimited lexeme index
    tsv: AsyncSerializer<TsvOut>,

    /// Line-delimited JSON entry details
    jsonl: JsonOut,

    /// Words that have already been assigned a lexeme identifier
    seen_words: HashSet<Box<str>>,

    /// Number of dataset rows consumed so far
    rows: RowIndex,

    /// Identifier that the next first-seen word will get
    next_lexeme_id: LexemeId,
}
//
impl<TsvOut: AsyncWrite + Unpin + Send, JsonOut: AsyncWrite + Unpin> ExportWriter<TsvOut, JsonOut> {
    /// Set up an export over freshly opened outputs
    ///
    /// The lexeme index header is written right away: it must be present
    /// even when no row ends up being accepted.
    pub async fn new(tsv: TsvOut, jsonl: JsonOut) -> Result<Self> {
        let mut tsv = AsyncWriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .create_serializer(tsv);
        tsv.serialize(&IndexRecord::HEADER)
            .await
            .context("writing the lexeme index header")?;
        Ok(Self {
            tsv,
            jsonl,
            seen_words: HashSet::new(),
            rows: 0,
            next_lexeme_id: 0,
        })
    }

    /// Number of dataset rows consumed so far
    pub fn rows(&self) -> RowIndex {
        self.rows
    }

    /// Consume one dataset row, emitting records if its word is first-seen
    pub async fn process_row(&mut self, json: &str) -> Result<()> {
        let row: DatasetRow = serde_json::from_str(json).context("decoding a dataset row")?;
        let row_index = self.rows;
        self.rows += 1;

        // Only the first occurrence of a non-empty word becomes a lexeme
        let word = row.word.as_deref().unwrap_or("").trim();
        if word.is_empty() {
            log::trace!("Skipped row {row_index} because its word is empty");
            return Ok(());
        }
        if self.seen_words.contains(word) {
            log::trace!("Skipped row {row_index} because {word:?} was already seen");
            return Ok(());
        }
        let word = Box::<str>::from(word);
        self.seen_words.insert(word.clone());
        let lexeme_id = self.next_lexeme_id;
        self.next_lexeme_id += 1;

        // Index record first, then the matching detail record
        self.tsv
            .serialize(&IndexRecord {
                lexeme_id,
                word: &word,
                entry_id: row.id.as_deref().unwrap_or(""),
                dataset_row_index: row_index,
            })
            .await
            .context("writing a lexeme index record")?;
        let entry = row.into_entry(lexeme_id, word);
        let json = serde_json::to_string(&entry).context("encoding an entry record")?;
        self.jsonl
            .write_all(json.as_bytes())
            .await
            .context("writing an entry record")?;
        self.jsonl
            .write_all(b"\n")
            .await
            .context("writing an entry record")?;
        Ok(())
    }

    /// Flush the outputs and report on what was done
    pub async fn finish(mut self) -> Result<ExportSummary> {
        self.tsv.flush().await.context("flushing the lexeme index")?;
        (self.jsonl.flush().await).context("flushing the entry details")?;
        Ok(ExportSummary {
            rows: self.rows,
            lexemes: self.next_lexeme_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io::Cursor;

    /// Run an in-memory export over the provided row lines
    async fn export_rows(rows: &[&str]) -> Result<(ExportSummary, String, String)> {
        let mut tsv_buf = Vec::new();
        let mut jsonl_buf = Vec::new();
        let summary = {
            let mut writer =
                ExportWriter::new(Cursor::new(&mut tsv_buf), Cursor::new(&mut jsonl_buf)).await?;
            for row in rows {
                writer.process_row(row).await?;
            }
            writer.finish().await?
        };
        Ok((
            summary,
            String::from_utf8(tsv_buf).context("lexeme index should be valid UTF-8")?,
            String::from_utf8(jsonl_buf).context("entry details should be valid UTF-8")?,
        ))
    }

    #[tokio::test]
    async fn first_seen_words_get_sequential_identifiers() -> Result<()> {
        let (summary, tsv, jsonl) = export_rows(&[
            r#"{"id": "e0", "word": "alpha"}"#,
            r#"{"id": "e1", "word": "beta"}"#,
            r#"{"id": "e2", "word": "alpha"}"#,
            r#"{"id": "e3", "word": "gamma"}"#,
        ])
        .await?;
        assert_eq!(summary, ExportSummary { rows: 4, lexemes: 3 });
        let lines = tsv.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            [
                "lexeme_id\tword\tentry_id\tdataset_row_index",
                "0\talpha\te0\t0",
                "1\tbeta\te1\t1",
                "2\tgamma\te3\t3",
            ]
        );
        let words = (jsonl.lines())
            .map(|line| {
                let entry: Value = serde_json::from_str(line)?;
                Ok((
                    entry["lexeme_id"].as_u64().unwrap(),
                    entry["word"].as_str().unwrap().to_owned(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(
            words,
            [
                (0, "alpha".to_owned()),
                (1, "beta".to_owned()),
                (2, "gamma".to_owned()),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_and_duplicate_words_are_skipped_from_both_outputs() -> Result<()> {
        let (summary, tsv, jsonl) = export_rows(&[
            r#"{"id": "e0", "word": ""}"#,
            r#"{"id": "e1", "word": "   "}"#,
            r#"{"id": "e2"}"#,
            r#"{"id": "e3", "word": null}"#,
            r#"{"id": "e4", "word": "delta"}"#,
            r#"{"id": "e5", "word": "delta"}"#,
        ])
        .await?;
        assert_eq!(summary, ExportSummary { rows: 6, lexemes: 1 });
        let lines = tsv.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            [
                "lexeme_id\tword\tentry_id\tdataset_row_index",
                "0\tdelta\te4\t4",
            ]
        );
        assert_eq!(jsonl.lines().count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn words_are_trimmed_but_deduplicated_case_sensitively() -> Result<()> {
        let (summary, tsv, _jsonl) = export_rows(&[
            r#"{"id": "e0", "word": "  Rust  "}"#,
            r#"{"id": "e1", "word": "Rust"}"#,
            r#"{"id": "e2", "word": "rust"}"#,
        ])
        .await?;
        assert_eq!(summary, ExportSummary { rows: 3, lexemes: 2 });
        let lines = tsv.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            [
                "lexeme_id\tword\tentry_id\tdataset_row_index",
                "0\tRust\te0\t0",
                "1\trust\te2\t2",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn detail_records_carry_the_projected_fields() -> Result<()> {
        let (_summary, _tsv, jsonl) = export_rows(&[concat!(
            r#"{"id": "e0", "word": "café", "text": "Café, a noun.", "is_stopword": false, "#,
            r#""parts_of_speech": ["noun"], "all_synonyms": ["coffeehouse"], "#,
            r#""senses": [{"part_of_speech": "noun", "sense_index": 1, "#,
            r#""definition": "a small restaurant"}], "embedding": [1.5]}"#
        )])
        .await?;
        let entry: Value = serde_json::from_str(jsonl.lines().next().unwrap())?;
        assert_eq!(entry["lexeme_id"], 0);
        assert_eq!(entry["entry_id"], "e0");
        assert_eq!(entry["word"], "café");
        assert_eq!(entry["text"], "Café, a noun.");
        assert_eq!(entry["is_stopword"], false);
        assert_eq!(entry["parts_of_speech"], serde_json::json!(["noun"]));
        assert_eq!(entry["all_synonyms"], serde_json::json!(["coffeehouse"]));
        assert_eq!(entry["all_antonyms"], serde_json::json!([]));
        assert_eq!(entry["senses"][0]["definition"], "a small restaurant");
        assert_eq!(entry["senses"][0]["synonyms"], serde_json::json!([]));
        // Dataset fields outside the projection must not leak through
        assert_eq!(entry.get("embedding"), None);
        // And non-ASCII text must be written unescaped
        assert!(jsonl.contains("café"));
        Ok(())
    }

    #[tokio::test]
    async fn header_is_written_even_when_no_lexeme_is_accepted() -> Result<()> {
        let (summary, tsv, jsonl) = export_rows(&[
            r#"{"id": "e0", "word": "  "}"#,
            r#"{"id": "e1"}"#,
        ])
        .await?;
        assert_eq!(summary, ExportSummary { rows: 2, lexemes: 0 });
        assert_eq!(tsv, "lexeme_id\tword\tentry_id\tdataset_row_index\n");
        assert!(jsonl.is_empty());

        // Same for a dataset with no rows at all
        let (summary, tsv, _jsonl) = export_rows(&[]).await?;
        assert_eq!(summary, ExportSummary::default());
        assert_eq!(tsv, "lexeme_id\tword\tentry_id\tdataset_row_index\n");
        Ok(())
    }

    /// Write shard fixtures into a scratch directory and run the pipeline
    async fn run_over_local_shards(
        dir: &std::path::Path,
        max_rows: Option<usize>,
    ) -> Result<(ExportSummary, String, String)> {
        let config = Arc::new(Config {
            dataset: "unused".into(),
            revision: "main".into(),
            inputs: vec![dir.join("shard-0.jsonl"), dir.join("shard-1.jsonl")].into(),
            output_dir: dir.join(if max_rows.is_some() { "truncated" } else { "full" }),
            max_rows,
        });
        let shards = crate::hub::local_shards(&config);
        let summary = run(
            config.clone(),
            reqwest::Client::new(),
            shards,
            &ProgressReport::new(),
        )
        .await?;
        let tsv = std::fs::read_to_string(config.lexemes_path())
            .context("reading back the lexeme index")?;
        let jsonl = std::fs::read_to_string(config.entries_path())
            .context("reading back the entry details")?;
        Ok((summary, tsv, jsonl))
    }

    #[tokio::test]
    async fn row_cutoff_truncates_without_perturbing_identifiers() -> Result<()> {
        let dir = tempfile::tempdir().context("creating a scratch directory")?;
        std::fs::write(
            dir.path().join("shard-0.jsonl"),
            concat!(
                r#"{"id": "e0", "word": "alpha"}"#,
                "\n",
                r#"{"id": "e1", "word": "beta"}"#,
                "\n",
            ),
        )?;
        std::fs::write(
            dir.path().join("shard-1.jsonl"),
            concat!(
                r#"{"id": "e2", "word": "alpha"}"#,
                "\n",
                r#"{"id": "e3", "word": "gamma"}"#,
                "\n",
                r#"{"id": "e4", "word": "delta"}"#,
                "\n",
            ),
        )?;
        let (full, full_tsv, full_jsonl) = run_over_local_shards(dir.path(), None).await?;
        assert_eq!(full, ExportSummary { rows: 5, lexemes: 4 });
        let (truncated, truncated_tsv, truncated_jsonl) =
            run_over_local_shards(dir.path(), Some(4)).await?;
        assert_eq!(truncated, ExportSummary { rows: 4, lexemes: 3 });

        // A truncated run must be a prefix of the full run: same rows, same
        // identifiers, just fewer of them
        assert!(full_tsv.starts_with(&truncated_tsv));
        assert!(full_jsonl.starts_with(&truncated_jsonl));
        assert!(truncated_tsv.ends_with("2\tgamma\te3\t3\n"));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_rows_abort_the_export() -> Result<()> {
        let result = export_rows(&[r#"{"id": "e0", "word": "#]).await;
        assert!(result.is_err());
        Ok(())
    }
}
