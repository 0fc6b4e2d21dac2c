//! Masked-LM position selection and 80/10/10 substitution.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::constants::masking::{KEEP_ORIGINAL_PROB, MASK_TOKEN_PROB};
use crate::constants::tokens::{CLS, CONTINUATION_PREFIX, MASK, SEP};
use crate::types::Token;

/// Result of masking one assembled token sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskedLmOutput {
    /// Tokens after substitution.
    pub tokens: Vec<Token>,
    /// Masked positions, ascending.
    pub positions: Vec<usize>,
    /// Original token at each masked position.
    pub labels: Vec<Token>,
}

/// Chooses which positions to predict and how to corrupt them.
#[derive(Clone, Debug)]
pub struct MaskingPolicy<'a> {
    masked_lm_prob: f64,
    max_predictions: usize,
    whole_word_mask: bool,
    replacements: &'a [Token],
}

impl<'a> MaskingPolicy<'a> {
    /// Create a policy. `replacements` feeds the random-substitution branch and
    /// must not be empty.
    pub fn new(
        masked_lm_prob: f64,
        max_predictions: usize,
        whole_word_mask: bool,
        replacements: &'a [Token],
    ) -> Self {
        Self {
            masked_lm_prob,
            max_predictions,
            whole_word_mask,
            replacements,
        }
    }

    /// Number of positions this policy aims to mask in a sequence of `len` tokens.
    pub fn num_to_mask(&self, len: usize) -> usize {
        let scaled = (len as f64 * self.masked_lm_prob).round_ties_even() as usize;
        self.max_predictions.min(scaled.max(1))
    }

    /// Mask `tokens`, never touching `[CLS]` or `[SEP]`.
    ///
    /// Candidate groups are visited in random order and accepted while they fit the
    /// budget, so a sequence may end up with fewer masks than `num_to_mask` when
    /// whole-word groups do not fit.
    pub fn apply<R: Rng + ?Sized>(&self, mut tokens: Vec<Token>, rng: &mut R) -> MaskedLmOutput {
        let mut candidates = candidate_groups(&tokens, self.whole_word_mask);
        let num_to_mask = self.num_to_mask(tokens.len());
        candidates.shuffle(rng);

        let mut masked: Vec<(usize, Token)> = Vec::with_capacity(num_to_mask);
        let mut covered: HashSet<usize> = HashSet::new();
        for group in candidates {
            if masked.len() >= num_to_mask {
                break;
            }
            if masked.len() + group.len() > num_to_mask {
                continue;
            }
            if group.iter().any(|index| covered.contains(index)) {
                continue;
            }
            for index in group {
                covered.insert(index);
                let replacement = if rng.random::<f64>() < MASK_TOKEN_PROB {
                    MASK.to_string()
                } else if rng.random::<f64>() < KEEP_ORIGINAL_PROB {
                    tokens[index].clone()
                } else {
                    self.replacements
                        .choose(rng)
                        .cloned()
                        .unwrap_or_else(|| MASK.to_string())
                };
                let original = std::mem::replace(&mut tokens[index], replacement);
                masked.push((index, original));
            }
        }

        masked.sort_by_key(|(index, _)| *index);
        let (positions, labels) = masked.into_iter().unzip();
        MaskedLmOutput {
            tokens,
            positions,
            labels,
        }
    }
}

/// Group maskable positions.
///
/// Special tokens are skipped. With `whole_word_mask`, a `##` continuation joins the
/// group of the piece before it so a word is masked all-or-nothing.
pub fn candidate_groups(tokens: &[Token], whole_word_mask: bool) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        if token == CLS || token == SEP {
            continue;
        }
        if whole_word_mask
            && token.starts_with(CONTINUATION_PREFIX)
            && let Some(last) = groups.last_mut()
        {
            last.push(index);
            continue;
        }
        groups.push(vec![index]);
    }
    groups
}
