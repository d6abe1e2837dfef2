//! Export run configuration

use crate::Args;
use std::{path::PathBuf, sync::Arc};

/// Final process configuration
///
/// This is the result of digesting [`Args`]. Please refer to [`Args`] to know
/// more about the meaning of common fields.
#[allow(missing_docs)]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Config {
    // Fields have the same meaning as in Args
    pub dataset: Box<str>,
    pub revision: Box<str>,
    pub inputs: Box<[PathBuf]>,
    pub output_dir: PathBuf,
    pub max_rows: Option<usize>,
}
//
impl Config {
    /// Determine process configuration from CLI arguments
    pub(crate) fn new(args: Args) -> Arc<Self> {
        let Args {
            dataset,
            revision,
            input,
            output_dir,
            max_rows,
        } = args;
        Arc::new(Self {
            dataset,
            revision,
            inputs: input.into(),
            output_dir,
            max_rows,
        })
    }

    /// Location of the tab-delimited lexeme index
    pub fn lexemes_path(&self) -> PathBuf {
        self.output_dir.join(LEXEMES_FILE)
    }

    /// Location of the line-delimited JSON entry details
    pub fn entries_path(&self) -> PathBuf {
        self.output_dir.join(ENTRIES_FILE)
    }
}

/// Name of the lexeme index file within the output directory
pub const LEXEMES_FILE: &str = "lexemes.tsv";

/// Name of the entry details file within the output directory
pub const ENTRIES_FILE: &str = "entries.jsonl";

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn output_paths_live_in_the_output_dir() {
        let config = Config {
            dataset: "mjbommar/opengloss-dictionary".into(),
            revision: "main".into(),
            inputs: Box::default(),
            output_dir: PathBuf::from("data"),
            max_rows: None,
        };
        assert_eq!(config.lexemes_path(), Path::new("data").join("lexemes.tsv"));
        assert_eq!(
            config.entries_path(),
            Path::new("data").join("entries.jsonl")
        );
    }
}
