//! End-to-end generation: resolve inputs, load the corpus, write every epoch.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cache::cached_path;
use crate::config::GeneratorConfig;
use crate::corpus::load_corpus;
use crate::errors::PretrainError;
use crate::instances::InstanceAssembler;
use crate::metrics::EpochMetrics;
use crate::ngram::NgramDictionary;
use crate::output::EpochWriter;
use crate::store::open_document_store;
use crate::tokenizer::{Tokenizer, WordPieceTokenizer};

/// Inputs and settings of one generation run.
#[derive(Clone, Debug)]
pub struct PretrainJob {
    /// Corpus file: one sentence per line, blank lines between documents.
    pub train_corpus: PathBuf,
    /// Directory receiving `epoch_<n>.json` and `epoch_<n>_metrics.json`.
    pub output_dir: PathBuf,
    /// Vocabulary path or URL.
    pub vocab: String,
    /// N-gram list path or URL. Without one, instances carry no n-gram spans.
    pub ngram_list: Option<String>,
    pub do_lower_case: bool,
    /// Spill documents to a temporary key/value file instead of holding them in memory.
    pub reduce_memory: bool,
    /// Cache directory for remote inputs; defaults to `cache::default_cache_dir`.
    pub cache_dir: Option<PathBuf>,
    pub config: GeneratorConfig,
}

impl PretrainJob {
    /// Run every epoch and return the metrics written for each.
    pub fn run(&self) -> Result<Vec<EpochMetrics>, PretrainError> {
        let config = self.config.clone().validated()?;
        let cache_dir = self.cache_dir.as_deref();

        let vocab_path = cached_path(&self.vocab, cache_dir)?;
        let tokenizer = WordPieceTokenizer::from_vocab_file(&vocab_path, self.do_lower_case)?;
        let dictionary = self.load_dictionary(&tokenizer, cache_dir)?;

        let mut store = open_document_store(self.reduce_memory)?;
        load_corpus(&self.train_corpus, &tokenizer, store.as_mut())?;

        let replacements = config.replacement.tokens(tokenizer.vocab());
        let assembler = InstanceAssembler::new(&config, &replacements, &dictionary);
        let mut metrics = Vec::with_capacity(config.epochs_to_generate);
        for epoch in 0..config.epochs_to_generate as u64 {
            let mut writer = EpochWriter::create(&self.output_dir, epoch)?;
            assembler.generate_epoch(store.as_ref(), epoch, |instance| writer.write(instance))?;
            metrics.push(writer.finish(config.max_seq_len, config.max_ngram_in_seq)?);
        }
        info!(
            epochs = metrics.len(),
            output_dir = %self.output_dir.display(),
            "pretraining data written"
        );
        Ok(metrics)
    }

    fn load_dictionary(
        &self,
        tokenizer: &dyn Tokenizer,
        cache_dir: Option<&Path>,
    ) -> Result<NgramDictionary, PretrainError> {
        match &self.ngram_list {
            Some(ngram_list) => {
                let path = cached_path(ngram_list, cache_dir)?;
                let dictionary = NgramDictionary::load(&path, tokenizer)?;
                info!(path = %path.display(), ngrams = dictionary.len() - 1, "n-gram dictionary loaded");
                Ok(dictionary)
            }
            None => {
                warn!("no n-gram list given; instances will carry no n-gram spans");
                Ok(NgramDictionary::default())
            }
        }
    }
}
