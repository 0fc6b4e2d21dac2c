#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runner shared by the bundled binary.
pub mod apps;
/// Remote input cache (URL → local file).
pub mod cache;
/// Generation configuration.
pub mod config;
/// Centralized constants grouped by concern.
pub mod constants;
/// Corpus ingestion into a document store.
pub mod corpus;
mod hash;
/// Instance records and the per-document assembler.
pub mod instances;
/// Masked-LM position selection.
pub mod masking;
/// Epoch metrics and summaries.
pub mod metrics;
/// N-gram dictionary and span annotation.
pub mod ngram;
/// Epoch file writer and readers.
pub mod output;
/// Sentence-pair construction and truncation.
pub mod pairs;
/// End-to-end generation job.
pub mod pipeline;
/// Deterministic RNG and seed derivation.
pub mod rng;
/// Document stores and weighted sampling.
pub mod store;
/// Tokenizer contract and WordPiece implementation.
pub mod tokenizer;
/// Shared type aliases.
pub mod types;

mod errors;

pub use config::{GeneratorConfig, ReplacementVocab};
pub use errors::PretrainError;
pub use instances::{Instance, InstanceAssembler};
pub use masking::{MaskedLmOutput, MaskingPolicy};
pub use metrics::{EpochMetrics, EpochSummary};
pub use ngram::{NgramAnnotations, NgramAnnotator, NgramDictionary};
pub use output::EpochWriter;
pub use pairs::{SequencePair, SequencePairBuilder};
pub use pipeline::PretrainJob;
pub use rng::DeterministicRng;
pub use store::{DiskDocumentStore, DocumentStore, InMemoryDocumentStore, SentenceIndex};
pub use tokenizer::{Tokenizer, Vocabulary, WordPieceTokenizer};
pub use types::{DocIndex, Document, NgramId, SegmentId, Sentence, Token};
