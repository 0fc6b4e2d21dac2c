use serde::{Deserialize, Serialize};

use crate::instances::Instance;

/// Sidecar written next to each epoch file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub num_training_examples: usize,
    pub max_seq_len: usize,
    pub max_ngram_in_sequence: usize,
}

/// Running counts over the instances of one epoch, used for the summary log line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpochSummary {
    pub instances: usize,
    pub random_next: usize,
    pub masked_positions: usize,
    pub ngram_spans: usize,
}

impl EpochSummary {
    /// Fold one instance into the counts.
    pub fn record(&mut self, instance: &Instance) {
        self.instances += 1;
        if instance.is_random_next {
            self.random_next += 1;
        }
        self.masked_positions += instance.masked_lm_positions.len();
        self.ngram_spans += instance.ngram_ids.len();
    }

    /// Share of instances whose B segment came from another document.
    pub fn random_next_share(&self) -> f64 {
        ratio(self.random_next, self.instances)
    }

    /// Mean masked positions per instance.
    pub fn mean_masked(&self) -> f64 {
        ratio(self.masked_positions, self.instances)
    }

    /// Mean n-gram spans per instance.
    pub fn mean_ngrams(&self) -> f64 {
        ratio(self.ngram_spans, self.instances)
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
