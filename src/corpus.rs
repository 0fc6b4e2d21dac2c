//! Corpus ingestion: one sentence per line, blank lines between documents.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info};

use crate::errors::PretrainError;
use crate::store::DocumentStore;
use crate::tokenizer::Tokenizer;
use crate::types::Document;

/// Counts collected while loading a corpus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub documents: usize,
    pub sentences: usize,
    pub tokens: usize,
    /// Non-blank lines that tokenized to nothing and were dropped.
    pub skipped_lines: usize,
}

/// Tokenize the corpus at `path` into `store`.
///
/// Fails with `InsufficientData` when fewer than two documents were loaded.
pub fn load_corpus<S>(
    path: impl AsRef<Path>,
    tokenizer: &dyn Tokenizer,
    store: &mut S,
) -> Result<CorpusStats, PretrainError>
where
    S: DocumentStore + ?Sized,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(PretrainError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let reader = BufReader::new(File::open(path)?);
    let mut stats = CorpusStats::default();
    let mut document: Document = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            flush_document(store, &mut document, &mut stats)?;
            continue;
        }
        let sentence = tokenizer.tokenize(line)?;
        // Empty sentences would add sampling weight without contributing tokens.
        if sentence.is_empty() {
            stats.skipped_lines += 1;
            continue;
        }
        stats.tokens += sentence.len();
        document.push(sentence);
    }
    flush_document(store, &mut document, &mut stats)?;

    info!(
        path = %path.display(),
        documents = stats.documents,
        sentences = stats.sentences,
        tokens = stats.tokens,
        skipped_lines = stats.skipped_lines,
        "corpus loaded"
    );
    store.ensure_sampleable()?;
    Ok(stats)
}

fn flush_document<S>(
    store: &mut S,
    document: &mut Document,
    stats: &mut CorpusStats,
) -> Result<(), PretrainError>
where
    S: DocumentStore + ?Sized,
{
    if document.is_empty() {
        return Ok(());
    }
    stats.documents += 1;
    stats.sentences += document.len();
    debug!(
        document = stats.documents - 1,
        sentences = document.len(),
        "document added"
    );
    store.add(std::mem::take(document))
}
