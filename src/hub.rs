//! Locating the dataset shards on the Hugging Face Hub

use crate::{
    config::Config,
    progress::{ProgressReport, Work},
    Result,
};
use anyhow::Context;
use reqwest::Response;
use serde::Deserialize;
use std::path::PathBuf;

/// Dataset shard, ready to be streamed
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Shard {
    /// Path of the shard within the dataset repository, or on disk
    pub name: Box<str>,

    /// Where the shard bytes come from
    pub location: ShardLocation,

    /// Truth that the shard is gzip-compressed
    pub gzip: bool,
}

/// Where the bytes of a [`Shard`] come from
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum ShardLocation {
    /// Download from this URL
    Url(Box<str>),

    /// Read from this local file
    Path(PathBuf),
}

/// Query the Hub for the dataset's line-delimited JSON shards
///
/// Shards are returned sorted by repository path: lexeme identifiers depend
/// on row order, so the shard order must be reproducible across runs.
pub async fn resolve_shards(
    config: &Config,
    client: reqwest::Client,
    report: &ProgressReport,
) -> Result<Vec<Shard>> {
    let tracker = report.add("Resolving dataset shards", Work::Steps(1));
    let api_url = format!(
        "https://huggingface.co/api/datasets/{}/revision/{}",
        config.dataset, config.revision
    );
    let info = client
        .get(&api_url)
        .send()
        .await
        .and_then(Response::error_for_status)
        .with_context(|| format!("querying the Hub API at {api_url}"))?
        .json::<DatasetInfo>()
        .await
        .with_context(|| format!("decoding the Hub API response for {}", config.dataset))?;
    tracker.make_progress(1);
    tracker.finish();

    let mut shards = (info.siblings.into_iter())
        .filter(|sibling| is_shard_path(&sibling.rfilename))
        .map(|sibling| {
            let url = format!(
                "https://huggingface.co/datasets/{}/resolve/{}/{}",
                config.dataset, config.revision, sibling.rfilename
            );
            Shard {
                gzip: is_gzipped(&sibling.rfilename),
                name: sibling.rfilename,
                location: ShardLocation::Url(url.into()),
            }
        })
        .collect::<Vec<_>>();
    shards.sort_unstable_by(|shard1, shard2| shard1.name.cmp(&shard2.name));
    anyhow::ensure!(
        !shards.is_empty(),
        "dataset {} revision {} exposes no line-delimited JSON shards",
        config.dataset,
        config.revision
    );
    log::debug!(
        "Will process {} shards of dataset {}",
        shards.len(),
        config.dataset
    );
    Ok(shards)
}

/// Treat the configured local input files as the dataset shards
///
/// Files are kept in the order given on the command line, which the user is
/// responsible for keeping stable across runs.
pub fn local_shards(config: &Config) -> Vec<Shard> {
    (config.inputs.iter())
        .map(|path| Shard {
            name: path.display().to_string().into(),
            gzip: path
                .extension()
                .is_some_and(|extension| extension == "gz"),
            location: ShardLocation::Path(path.clone()),
        })
        .collect()
}

/// Truth that a repository file is a dataset shard we know how to read
fn is_shard_path(rfilename: &str) -> bool {
    rfilename.ends_with(".jsonl")
        || rfilename.ends_with(".jsonl.gz")
        || rfilename.ends_with(".json.gz")
}

/// Truth that a shard needs gzip decompression
fn is_gzipped(rfilename: &str) -> bool {
    rfilename.ends_with(".gz")
}

/// Response of the Hub dataset API, reduced to the fields we use
#[derive(Debug, Deserialize)]
struct DatasetInfo {
    /// Files of the dataset repository
    siblings: Vec<Sibling>,
}

/// File of a Hub dataset repository
#[derive(Debug, Deserialize)]
struct Sibling {
    /// Path of the file within the repository
    rfilename: Box<str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_line_delimited_json_files_are_shards() {
        assert!(is_shard_path("data/train-00000.jsonl"));
        assert!(is_shard_path("data/train-00000.jsonl.gz"));
        assert!(is_shard_path("data/train-00000.json.gz"));
        assert!(!is_shard_path("data/train-00000.parquet"));
        assert!(!is_shard_path("README.md"));
        assert!(!is_shard_path(".gitattributes"));
    }

    #[test]
    fn hub_api_responses_decode_to_file_listings() {
        let info: DatasetInfo = serde_json::from_str(
            r#"{
                "id": "mjbommar/opengloss-dictionary",
                "downloads": 123,
                "siblings": [
                    {"rfilename": "README.md"},
                    {"rfilename": "data/train-00001.jsonl.gz"},
                    {"rfilename": "data/train-00000.jsonl.gz"}
                ]
            }"#,
        )
        .expect("unknown API fields should be ignored");
        let names = (info.siblings.iter())
            .map(|sibling| &*sibling.rfilename)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            ["README.md", "data/train-00001.jsonl.gz", "data/train-00000.jsonl.gz"]
        );
    }

    #[test]
    fn local_shards_follow_the_command_line_order() {
        let config = Config {
            dataset: "unused".into(),
            revision: "main".into(),
            inputs: vec![
                PathBuf::from("b/second.jsonl.gz"),
                PathBuf::from("a/first.jsonl"),
            ]
            .into(),
            output_dir: PathBuf::from("data"),
            max_rows: None,
        };
        let shards = local_shards(&config);
        assert_eq!(shards.len(), 2);
        assert_eq!(&*shards[0].name, "b/second.jsonl.gz");
        assert!(shards[0].gzip);
        assert_eq!(
            shards[0].location,
            ShardLocation::Path(PathBuf::from("b/second.jsonl.gz"))
        );
        assert_eq!(&*shards[1].name, "a/first.jsonl");
        assert!(!shards[1].gzip);
    }
}
