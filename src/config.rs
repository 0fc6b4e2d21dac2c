use crate::constants::masking::DEFAULT_REPLACEMENT_ALPHABET;
use crate::constants::pairs::{MIN_TARGET_SEQ_LEN, SPECIAL_TOKEN_SLOTS};
use crate::errors::PretrainError;
use crate::tokenizer::Vocabulary;
use crate::types::Token;

/// Source of tokens for the random-replacement branch of masking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplacementVocab {
    /// Draw uniformly from a small fixed alphabet (for example genomic bases).
    Alphabet(Vec<Token>),
    /// Draw uniformly from the tokenizer's full vocabulary.
    Vocabulary,
}

impl Default for ReplacementVocab {
    fn default() -> Self {
        Self::Alphabet(
            DEFAULT_REPLACEMENT_ALPHABET
                .iter()
                .map(|token| token.to_string())
                .collect(),
        )
    }
}

impl ReplacementVocab {
    /// Concrete replacement tokens, resolving `Vocabulary` against `vocab`.
    pub fn tokens(&self, vocab: &Vocabulary) -> Vec<Token> {
        match self {
            Self::Alphabet(alphabet) => alphabet.clone(),
            Self::Vocabulary => vocab.tokens().cloned().collect(),
        }
    }
}

/// Top-level instance generation configuration.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// RNG seed that controls every randomized step of generation.
    pub seed: u64,
    /// Number of epochs of data to pregenerate (one output file each).
    pub epochs_to_generate: usize,
    /// Hard limit on tokens per instance, including `[CLS]` and both `[SEP]`s.
    pub max_seq_len: usize,
    /// Probability of drawing a shorter target length for a document pass.
    ///
    /// Short sequences reduce the mismatch between pretraining and fine-tuning inputs.
    pub short_seq_prob: f64,
    /// Fraction of tokens to mask for the LM task.
    pub masked_lm_prob: f64,
    /// Maximum number of masked positions per instance.
    pub max_predictions_per_seq: usize,
    /// Maximum number of n-gram spans kept per instance.
    pub max_ngram_in_seq: usize,
    /// Mask all WordPiece pieces of a word together.
    pub whole_word_mask: bool,
    /// Sample random-next documents proportionally to their sentence counts.
    pub sentence_weighted: bool,
    /// Replacement tokens for the 10% random-substitution branch.
    pub replacement: ReplacementVocab,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            epochs_to_generate: 3,
            max_seq_len: 128,
            short_seq_prob: 0.1,
            masked_lm_prob: 0.15,
            max_predictions_per_seq: 20,
            max_ngram_in_seq: 20,
            whole_word_mask: false,
            sentence_weighted: true,
            replacement: ReplacementVocab::default(),
        }
    }
}

impl GeneratorConfig {
    /// Token budget for segments A and B combined.
    pub fn max_num_tokens(&self) -> usize {
        self.max_seq_len.saturating_sub(SPECIAL_TOKEN_SLOTS)
    }

    /// Validate parameter ranges, returning the config unchanged when usable.
    pub fn validated(self) -> Result<Self, PretrainError> {
        if self.max_num_tokens() < MIN_TARGET_SEQ_LEN {
            return Err(PretrainError::Configuration(format!(
                "max_seq_len must be at least {} (got {})",
                MIN_TARGET_SEQ_LEN + SPECIAL_TOKEN_SLOTS,
                self.max_seq_len
            )));
        }
        for (name, value) in [
            ("short_seq_prob", self.short_seq_prob),
            ("masked_lm_prob", self.masked_lm_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PretrainError::Configuration(format!(
                    "{name} must be within [0, 1] (got {value})"
                )));
            }
        }
        if let ReplacementVocab::Alphabet(alphabet) = &self.replacement
            && alphabet.is_empty()
        {
            return Err(PretrainError::Configuration(
                "replacement alphabet must not be empty".to_string(),
            ));
        }
        Ok(self)
    }
}
