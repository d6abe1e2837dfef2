//! Data model of the dataset rows and of the exported records
//!
//! Dataset rows carry many more fields than we care about, and real-world
//! rows have missing or null values all over the place. Decoding therefore
//! treats every field as optional, and the projection into output records
//! applies the defaults that readers of the output files expect: false for
//! booleans, an empty list for list-valued fields, and null for everything
//! else.

use crate::{LexemeId, RowIndex};
use serde::{Deserialize, Serialize};

/// Row of the OpenGloss dictionary dataset, reduced to the exported fields
///
/// Unknown dataset fields are ignored during decoding.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetRow {
    /// Dataset-side identifier of this dictionary entry
    pub id: Option<Box<str>>,

    /// Word that the dictionary entry is about
    ///
    /// This is the deduplication key: only the first row carrying a given
    /// word (after whitespace trimming) becomes a lexeme.
    pub word: Option<Box<str>>,

    /// Full dictionary article text
    pub text: Option<Box<str>>,

    pub is_stopword: Option<bool>,
    pub stopword_reason: Option<Box<str>>,
    pub parts_of_speech: Option<Vec<Box<str>>>,

    /// Per-sense records, projected via [`RowSense`]
    pub senses: Option<Vec<RowSense>>,

    pub has_etymology: Option<bool>,
    pub etymology_summary: Option<Box<str>>,
    pub etymology_cognates: Option<Vec<Box<str>>>,
    pub has_encyclopedia: Option<bool>,
    pub encyclopedia_entry: Option<Box<str>>,
    pub all_definitions: Option<Vec<Box<str>>>,
    pub all_synonyms: Option<Vec<Box<str>>>,
    pub all_antonyms: Option<Vec<Box<str>>>,
    pub all_hypernyms: Option<Vec<Box<str>>>,
    pub all_hyponyms: Option<Vec<Box<str>>>,
    pub all_collocations: Option<Vec<Box<str>>>,
    pub all_inflections: Option<Vec<Box<str>>>,
    pub all_derivations: Option<Vec<Box<str>>>,
    pub all_examples: Option<Vec<Box<str>>>,
}
//
impl DatasetRow {
    /// Project this row into the detail record for a first-seen word
    ///
    /// The word is passed in separately because the caller has already
    /// trimmed it while checking the deduplication invariant.
    pub fn into_entry(self, lexeme_id: LexemeId, word: Box<str>) -> EntryRecord {
        EntryRecord {
            lexeme_id,
            entry_id: self.id.unwrap_or_default(),
            word,
            text: self.text,
            is_stopword: self.is_stopword.unwrap_or(false),
            stopword_reason: self.stopword_reason,
            parts_of_speech: self.parts_of_speech.unwrap_or_default(),
            senses: (self.senses.unwrap_or_default().into_iter())
                .map(RowSense::into_record)
                .collect(),
            has_etymology: self.has_etymology.unwrap_or(false),
            etymology_summary: self.etymology_summary,
            etymology_cognates: self.etymology_cognates.unwrap_or_default(),
            has_encyclopedia: self.has_encyclopedia.unwrap_or(false),
            encyclopedia_entry: self.encyclopedia_entry,
            all_definitions: self.all_definitions.unwrap_or_default(),
            all_synonyms: self.all_synonyms.unwrap_or_default(),
            all_antonyms: self.all_antonyms.unwrap_or_default(),
            all_hypernyms: self.all_hypernyms.unwrap_or_default(),
            all_hyponyms: self.all_hyponyms.unwrap_or_default(),
            all_collocations: self.all_collocations.unwrap_or_default(),
            all_inflections: self.all_inflections.unwrap_or_default(),
            all_derivations: self.all_derivations.unwrap_or_default(),
            all_examples: self.all_examples.unwrap_or_default(),
        }
    }
}

/// Sense of a dataset row, reduced to the exported fields
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RowSense {
    pub part_of_speech: Option<Box<str>>,
    pub sense_index: Option<i64>,
    pub definition: Option<Box<str>>,
    pub synonyms: Option<Vec<Box<str>>>,
    pub antonyms: Option<Vec<Box<str>>>,
    pub hypernyms: Option<Vec<Box<str>>>,
    pub hyponyms: Option<Vec<Box<str>>>,
    pub examples: Option<Vec<Box<str>>>,
}
//
impl RowSense {
    /// Apply output defaults to the list-valued fields
    fn into_record(self) -> SenseRecord {
        SenseRecord {
            part_of_speech: self.part_of_speech,
            sense_index: self.sense_index,
            definition: self.definition,
            synonyms: self.synonyms.unwrap_or_default(),
            antonyms: self.antonyms.unwrap_or_default(),
            hypernyms: self.hypernyms.unwrap_or_default(),
            hyponyms: self.hyponyms.unwrap_or_default(),
            examples: self.examples.unwrap_or_default(),
        }
    }
}

/// Record of the tab-delimited lexeme index
///
/// Field names become the TSV header, in declaration order.
#[allow(missing_docs)]
#[derive(Debug, Serialize)]
pub struct IndexRecord<'rec> {
    pub lexeme_id: LexemeId,
    pub word: &'rec str,
    pub entry_id: &'rec str,
    pub dataset_row_index: RowIndex,
}
//
impl IndexRecord<'_> {
    /// Header row of the lexeme index, in field declaration order
    ///
    /// Written once before any record, so that the index has a header even
    /// when no row ends up being accepted.
    pub const HEADER: [&'static str; 4] = ["lexeme_id", "word", "entry_id", "dataset_row_index"];
}

/// Detail record of the line-delimited JSON output
///
/// Fields are serialized in declaration order, so this declaration is also
/// the layout of the output objects.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryRecord {
    pub lexeme_id: LexemeId,
    pub entry_id: Box<str>,
    pub word: Box<str>,
    pub text: Option<Box<str>>,
    pub is_stopword: bool,
    pub stopword_reason: Option<Box<str>>,
    pub parts_of_speech: Vec<Box<str>>,
    pub senses: Vec<SenseRecord>,
    pub has_etymology: bool,
    pub etymology_summary: Option<Box<str>>,
    pub etymology_cognates: Vec<Box<str>>,
    pub has_encyclopedia: bool,
    pub encyclopedia_entry: Option<Box<str>>,
    pub all_definitions: Vec<Box<str>>,
    pub all_synonyms: Vec<Box<str>>,
    pub all_antonyms: Vec<Box<str>>,
    pub all_hypernyms: Vec<Box<str>>,
    pub all_hyponyms: Vec<Box<str>>,
    pub all_collocations: Vec<Box<str>>,
    pub all_inflections: Vec<Box<str>>,
    pub all_derivations: Vec<Box<str>>,
    pub all_examples: Vec<Box<str>>,
}

/// Sense subrecord of an [`EntryRecord`]
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SenseRecord {
    pub part_of_speech: Option<Box<str>>,
    pub sense_index: Option<i64>,
    pub definition: Option<Box<str>>,
    pub synonyms: Vec<Box<str>>,
    pub antonyms: Vec<Box<str>>,
    pub hypernyms: Vec<Box<str>>,
    pub hyponyms: Vec<Box<str>>,
    pub examples: Vec<Box<str>>,
}
