//! Sentence-pair (A/B) construction for the next-sentence objective.

use rand::Rng;

use crate::constants::pairs::{
    MIN_TARGET_SEQ_LEN, RANDOM_NEXT_PROB, SPECIAL_TOKEN_SLOTS, TRUNCATE_FRONT_PROB,
};
use crate::constants::tokens::{CLS, SEP};
use crate::errors::PretrainError;
use crate::store::DocumentStore;
use crate::types::{DocIndex, SegmentId, Sentence, Token};

/// Segments A and B built from one chunk, before truncation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencePair {
    /// Tokens of segment A (leading sentences of the chunk).
    pub tokens_a: Vec<Token>,
    /// Tokens of segment B (rest of the chunk, or a slice of another document).
    pub tokens_b: Vec<Token>,
    /// Whether B was sampled from another document.
    pub is_random_next: bool,
    /// Chunk sentences after the split point that B did not use.
    ///
    /// The caller rewinds its sentence cursor by this amount so they are not lost.
    pub unused_sentences: usize,
}

/// Builds A/B pairs from chunks of one document, sampling random-next segments
/// from the other documents of the store.
pub struct SequencePairBuilder<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    sentence_weighted: bool,
}

impl<'a, S: DocumentStore + ?Sized> SequencePairBuilder<'a, S> {
    /// Create a builder over `store`.
    pub fn new(store: &'a S, sentence_weighted: bool) -> Self {
        Self {
            store,
            sentence_weighted,
        }
    }

    /// Split `chunk` into A and B.
    ///
    /// A chunk with a single sentence always takes a random next segment; otherwise
    /// the random branch is taken half of the time. A random B is filled from a random
    /// offset of another document until `target_seq_length - len(A)` tokens are
    /// reached or that document ends, so it may come out shorter than the target.
    pub fn build<R: Rng>(
        &self,
        doc_idx: DocIndex,
        chunk: &[&Sentence],
        target_seq_length: usize,
        rng: &mut R,
    ) -> Result<SequencePair, PretrainError> {
        let a_end = if chunk.len() >= 2 {
            rng.random_range(1..chunk.len())
        } else {
            1
        };
        let split = a_end.min(chunk.len());
        let tokens_a: Vec<Token> = chunk[..split]
            .iter()
            .flat_map(|sentence| sentence.iter().cloned())
            .collect();

        let mut tokens_b = Vec::new();
        if chunk.len() == 1 || rng.random::<f64>() < RANDOM_NEXT_PROB {
            let target_b_length = target_seq_length.saturating_sub(tokens_a.len());
            let random_document =
                self.store
                    .sample_document(doc_idx, self.sentence_weighted, rng)?;
            let random_start = rng.random_range(0..random_document.len());
            for sentence in &random_document[random_start..] {
                tokens_b.extend(sentence.iter().cloned());
                if tokens_b.len() >= target_b_length {
                    break;
                }
            }
            Ok(SequencePair {
                tokens_a,
                tokens_b,
                is_random_next: true,
                unused_sentences: chunk.len() - split,
            })
        } else {
            for sentence in &chunk[split..] {
                tokens_b.extend(sentence.iter().cloned());
            }
            Ok(SequencePair {
                tokens_a,
                tokens_b,
                is_random_next: false,
                unused_sentences: 0,
            })
        }
    }
}

/// Draw the target length for one document pass.
///
/// Usually the full `max_num_tokens`; with probability `short_seq_prob` a uniform
/// length in `[2, max_num_tokens]`.
pub fn target_seq_length<R: Rng + ?Sized>(
    max_num_tokens: usize,
    short_seq_prob: f64,
    rng: &mut R,
) -> usize {
    if rng.random::<f64>() < short_seq_prob && max_num_tokens >= MIN_TARGET_SEQ_LEN {
        rng.random_range(MIN_TARGET_SEQ_LEN..=max_num_tokens)
    } else {
        max_num_tokens
    }
}

/// Trim A and B until their combined length fits `max_num_tokens`.
///
/// Each step removes one token from the longer segment (B on ties), from the front
/// or the back with equal probability.
pub fn truncate_seq_pair<R: Rng + ?Sized>(
    tokens_a: &mut Vec<Token>,
    tokens_b: &mut Vec<Token>,
    max_num_tokens: usize,
    rng: &mut R,
) {
    while tokens_a.len() + tokens_b.len() > max_num_tokens {
        let trunc_tokens = if tokens_a.len() > tokens_b.len() {
            &mut *tokens_a
        } else {
            &mut *tokens_b
        };
        if rng.random::<f64>() < TRUNCATE_FRONT_PROB {
            trunc_tokens.remove(0);
        } else {
            trunc_tokens.pop();
        }
    }
}

/// Join A and B as `[CLS] A [SEP] B [SEP]` with matching segment ids.
pub fn assemble_pair(tokens_a: &[Token], tokens_b: &[Token]) -> (Vec<Token>, Vec<SegmentId>) {
    let mut tokens = Vec::with_capacity(tokens_a.len() + tokens_b.len() + SPECIAL_TOKEN_SLOTS);
    tokens.push(CLS.to_string());
    tokens.extend(tokens_a.iter().cloned());
    tokens.push(SEP.to_string());
    tokens.extend(tokens_b.iter().cloned());
    tokens.push(SEP.to_string());

    let mut segment_ids = vec![0; tokens_a.len() + 2];
    segment_ids.resize(tokens.len(), 1);
    (tokens, segment_ids)
}
