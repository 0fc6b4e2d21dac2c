//! N-gram dictionary loading and span annotation.

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::constants::ngram::{MAX_NGRAM_LEN, MIN_NGRAM_LEN, PAD_NGRAM};
use crate::errors::PretrainError;
use crate::tokenizer::Tokenizer;
use crate::types::{NgramId, SegmentId, Token};

/// Fixed mapping from token tuples to n-gram ids.
///
/// Id `0` is the `[pad]` placeholder; entry `i` of the source file gets id `i + 1`.
#[derive(Clone, Debug)]
pub struct NgramDictionary {
    id_to_ngram: Vec<Vec<Token>>,
    ngram_to_id: HashMap<Vec<Token>, NgramId>,
    ngram_to_freq: IndexMap<String, u64>,
}

impl Default for NgramDictionary {
    fn default() -> Self {
        let pad = vec![PAD_NGRAM.to_string()];
        Self {
            id_to_ngram: vec![pad.clone()],
            ngram_to_id: HashMap::from([(pad, 0)]),
            ngram_to_freq: IndexMap::new(),
        }
    }
}

impl NgramDictionary {
    /// Build from already tokenized n-grams, assigning ids from 1 in order.
    pub fn from_tuples<I>(ngrams: I) -> Self
    where
        I: IntoIterator<Item = Vec<Token>>,
    {
        let mut dictionary = Self::default();
        for tuple in ngrams {
            let raw = tuple.join(" ");
            dictionary.insert(raw, tuple, 0);
        }
        dictionary
    }

    /// Load an n-gram list, tokenizing each entry with `tokenizer`.
    ///
    /// Each line holds one n-gram optionally followed by its frequency, separated by
    /// a comma or whitespace (`ACGTAC,120` or `ACGTAC 120`).
    pub fn load(path: impl AsRef<Path>, tokenizer: &dyn Tokenizer) -> Result<Self, PretrainError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PretrainError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let raw = fs::read_to_string(path)?;
        let mut dictionary = Self::default();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (ngram, freq) = parse_ngram_line(line).map_err(|reason| {
                PretrainError::Configuration(format!(
                    "{}:{}: {reason}",
                    path.display(),
                    line_no + 1
                ))
            })?;
            let tuple = tokenizer.tokenize(ngram)?;
            if tuple.is_empty() {
                warn!(line = line_no + 1, ngram, "n-gram tokenized to nothing");
            }
            dictionary.insert(ngram.to_string(), tuple, freq);
        }
        debug!(
            path = %path.display(),
            ngrams = dictionary.len(),
            "loaded n-gram dictionary"
        );
        Ok(dictionary)
    }

    /// Write the dictionary back as `ngram,freq` lines.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PretrainError> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        for (ngram, freq) in &self.ngram_to_freq {
            writeln!(out, "{ngram},{freq}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn insert(&mut self, raw: String, tuple: Vec<Token>, freq: u64) {
        let id = self.id_to_ngram.len() as NgramId;
        self.id_to_ngram.push(tuple.clone());
        self.ngram_to_id.insert(tuple, id);
        self.ngram_to_freq.insert(raw, freq);
    }

    /// Id of the exact token tuple, if present.
    pub fn get(&self, tokens: &[Token]) -> Option<NgramId> {
        self.ngram_to_id.get(tokens).copied()
    }

    /// Token tuple registered under `id`.
    pub fn ngram(&self, id: NgramId) -> Option<&[Token]> {
        self.id_to_ngram.get(id as usize).map(Vec::as_slice)
    }

    /// Recorded frequency of a raw n-gram string.
    pub fn frequency(&self, ngram: &str) -> Option<u64> {
        self.ngram_to_freq.get(ngram).copied()
    }

    /// Number of ids, the `[pad]` entry included.
    pub fn len(&self) -> usize {
        self.id_to_ngram.len()
    }

    /// Whether only the `[pad]` entry is present.
    pub fn is_empty(&self) -> bool {
        self.id_to_ngram.len() <= 1
    }
}

fn parse_ngram_line(line: &str) -> Result<(&str, u64), String> {
    if let Some((ngram, freq)) = line.rsplit_once(',') {
        let ngram = ngram.trim();
        if ngram.is_empty() {
            return Err("missing n-gram before frequency".to_string());
        }
        let freq = freq
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("invalid n-gram frequency '{}'", freq.trim()))?;
        return Ok((ngram, freq));
    }
    // A non-numeric tail is part of a multi-word n-gram.
    if let Some((ngram, freq)) = line.rsplit_once(char::is_whitespace)
        && let Ok(freq) = freq.parse::<u64>()
    {
        return Ok((ngram.trim(), freq));
    }
    Ok((line, 0))
}

/// One dictionary hit inside a token sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NgramMatch {
    /// Dictionary id of the span.
    pub id: NgramId,
    /// Offset of the first token of the span.
    pub start: usize,
    /// Number of tokens in the span.
    pub length: usize,
    /// The matched tokens.
    pub tokens: Vec<Token>,
}

/// Parallel per-span fields attached to an instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NgramAnnotations {
    /// Dictionary id per span.
    pub ids: Vec<NgramId>,
    /// Start offset per span.
    pub positions: Vec<usize>,
    /// Token count per span.
    pub lengths: Vec<usize>,
    /// Matched tokens per span.
    pub tuples: Vec<Vec<Token>>,
    /// 0 when the span starts inside `[CLS] A [SEP]`, else 1.
    pub segment_ids: Vec<SegmentId>,
}

impl NgramAnnotations {
    /// Number of annotated spans.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no span was annotated.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Finds dictionary spans of length 2..=7 and keeps a bounded random subset.
#[derive(Clone, Debug)]
pub struct NgramAnnotator<'a> {
    dictionary: &'a NgramDictionary,
    max_spans: usize,
}

impl<'a> NgramAnnotator<'a> {
    /// Create an annotator keeping at most `max_spans` spans per sequence.
    pub fn new(dictionary: &'a NgramDictionary, max_spans: usize) -> Self {
        Self {
            dictionary,
            max_spans,
        }
    }

    /// Every dictionary hit, ordered by span length then offset.
    pub fn find_matches(&self, tokens: &[Token]) -> Vec<NgramMatch> {
        let mut matches = Vec::new();
        for length in MIN_NGRAM_LEN..=MAX_NGRAM_LEN {
            if length > tokens.len() {
                break;
            }
            for (start, window) in tokens.windows(length).enumerate() {
                if let Some(id) = self.dictionary.get(window) {
                    matches.push(NgramMatch {
                        id,
                        start,
                        length,
                        tokens: window.to_vec(),
                    });
                }
            }
        }
        matches
    }

    /// Annotate `tokens`, where positions before `segment_boundary` belong to
    /// segment A (`len(tokens_a) + 2` for an assembled pair).
    ///
    /// Matches are shuffled before truncation so the kept subset carries no
    /// positional bias.
    pub fn annotate<R: Rng + ?Sized>(
        &self,
        tokens: &[Token],
        segment_boundary: usize,
        rng: &mut R,
    ) -> NgramAnnotations {
        let mut matches = self.find_matches(tokens);
        matches.shuffle(rng);
        matches.truncate(self.max_spans);

        let mut annotations = NgramAnnotations::default();
        for hit in matches {
            annotations.ids.push(hit.id);
            annotations.positions.push(hit.start);
            annotations.lengths.push(hit.length);
            annotations
                .segment_ids
                .push(if hit.start < segment_boundary { 0 } else { 1 });
            annotations.tuples.push(hit.tokens);
        }
        annotations
    }
}
