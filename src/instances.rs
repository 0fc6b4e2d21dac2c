//! Instance assembly: the per-document chunk loop and epoch-wide fan-out.
//!
//! A document pass walks its sentences with a cursor, growing a chunk until it
//! reaches the pass's target length (or the document ends). Each chunk becomes one
//! `SequencePair`; sentences a random-next pair did not use are handed back by
//! rewinding the cursor. The pair is truncated, wrapped in `[CLS]`/`[SEP]`, masked,
//! and annotated with dictionary n-grams.
//!
//! Epochs process documents in fixed windows on the rayon pool. Every document draws
//! from its own `DeterministicRng`, so the instance stream is identical for any
//! thread count.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::constants::output::WRITE_WINDOW_DOCUMENTS;
use crate::errors::PretrainError;
use crate::masking::MaskingPolicy;
use crate::metrics::EpochSummary;
use crate::ngram::{NgramAnnotator, NgramDictionary};
use crate::pairs::{
    SequencePair, SequencePairBuilder, assemble_pair, target_seq_length, truncate_seq_pair,
};
use crate::rng::DeterministicRng;
use crate::store::DocumentStore;
use crate::types::{DocIndex, NgramId, SegmentId, Sentence, Token};

/// One pretraining example, serialized as a JSON line in field order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub tokens: Vec<Token>,
    pub segment_ids: Vec<SegmentId>,
    pub is_random_next: bool,
    pub masked_lm_positions: Vec<usize>,
    pub masked_lm_labels: Vec<Token>,
    pub ngram_ids: Vec<NgramId>,
    pub ngram_positions: Vec<usize>,
    pub ngram_lengths: Vec<usize>,
    pub ngram_tuples: Vec<Vec<Token>>,
    pub ngram_segment_ids: Vec<SegmentId>,
}

/// Turns stored documents into `Instance`s.
#[derive(Clone, Debug)]
pub struct InstanceAssembler<'a> {
    seed: u64,
    max_num_tokens: usize,
    short_seq_prob: f64,
    sentence_weighted: bool,
    masking: MaskingPolicy<'a>,
    annotator: NgramAnnotator<'a>,
}

impl<'a> InstanceAssembler<'a> {
    /// Create an assembler. `replacements` feeds the random-substitution branch of
    /// masking (see `ReplacementVocab::tokens`).
    pub fn new(
        config: &GeneratorConfig,
        replacements: &'a [Token],
        dictionary: &'a NgramDictionary,
    ) -> Self {
        Self {
            seed: config.seed,
            max_num_tokens: config.max_num_tokens(),
            short_seq_prob: config.short_seq_prob,
            sentence_weighted: config.sentence_weighted,
            masking: MaskingPolicy::new(
                config.masked_lm_prob,
                config.max_predictions_per_seq,
                config.whole_word_mask,
                replacements,
            ),
            annotator: NgramAnnotator::new(dictionary, config.max_ngram_in_seq),
        }
    }

    /// Build every instance of one pass over document `doc_idx`.
    pub fn instances_from_document<S, R>(
        &self,
        store: &S,
        doc_idx: DocIndex,
        rng: &mut R,
    ) -> Result<Vec<Instance>, PretrainError>
    where
        S: DocumentStore + ?Sized,
        R: Rng,
    {
        let document = store.get(doc_idx)?;
        let target = target_seq_length(self.max_num_tokens, self.short_seq_prob, rng);
        let builder = SequencePairBuilder::new(store, self.sentence_weighted);

        let mut instances = Vec::new();
        let mut chunk: Vec<&Sentence> = Vec::new();
        let mut chunk_tokens = 0usize;
        let mut cursor = 0usize;
        while cursor < document.len() {
            let sentence = &document[cursor];
            chunk.push(sentence);
            chunk_tokens += sentence.len();
            if cursor == document.len() - 1 || chunk_tokens >= target {
                let pair = builder.build(doc_idx, &chunk, target, rng)?;
                // Chunk spans cursor-len+1..=cursor and unused < len, so this never underflows.
                cursor -= pair.unused_sentences;
                instances.push(self.assemble(pair, rng));
                chunk.clear();
                chunk_tokens = 0;
            }
            cursor += 1;
        }
        Ok(instances)
    }

    fn assemble<R: Rng>(&self, pair: SequencePair, rng: &mut R) -> Instance {
        let SequencePair {
            mut tokens_a,
            mut tokens_b,
            is_random_next,
            ..
        } = pair;
        truncate_seq_pair(&mut tokens_a, &mut tokens_b, self.max_num_tokens, rng);
        let (tokens, segment_ids) = assemble_pair(&tokens_a, &tokens_b);
        let masked = self.masking.apply(tokens, rng);
        let ngrams = self
            .annotator
            .annotate(&masked.tokens, tokens_a.len() + 2, rng);

        Instance {
            tokens: masked.tokens,
            segment_ids,
            is_random_next,
            masked_lm_positions: masked.positions,
            masked_lm_labels: masked.labels,
            ngram_ids: ngrams.ids,
            ngram_positions: ngrams.positions,
            ngram_lengths: ngrams.lengths,
            ngram_tuples: ngrams.tuples,
            ngram_segment_ids: ngrams.segment_ids,
        }
    }

    /// Generate one epoch, handing instances to `sink` in document order.
    pub fn generate_epoch<S, F>(
        &self,
        store: &S,
        epoch: u64,
        mut sink: F,
    ) -> Result<EpochSummary, PretrainError>
    where
        S: DocumentStore + ?Sized,
        F: FnMut(&Instance) -> Result<(), PretrainError>,
    {
        store.ensure_sampleable()?;
        let total = store.len();
        let mut summary = EpochSummary::default();
        let mut window_start = 0;
        while window_start < total {
            let window_end = (window_start + WRITE_WINDOW_DOCUMENTS).min(total);
            let batches = (window_start..window_end)
                .into_par_iter()
                .map(|doc_idx| {
                    let mut rng = DeterministicRng::for_document(self.seed, epoch, doc_idx);
                    self.instances_from_document(store, doc_idx, &mut rng)
                })
                .collect::<Result<Vec<_>, _>>()?;
            for instance in batches.iter().flatten() {
                summary.record(instance);
                sink(instance)?;
            }
            debug!(
                epoch,
                documents = window_end,
                total_documents = total,
                instances = summary.instances,
                "epoch window written"
            );
            window_start = window_end;
        }
        info!(
            epoch,
            instances = summary.instances,
            random_next_share = summary.random_next_share(),
            mean_masked = summary.mean_masked(),
            mean_ngrams = summary.mean_ngrams(),
            "epoch generated"
        );
        Ok(summary)
    }
}
