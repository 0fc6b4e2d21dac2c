/// Special tokens and markers shared by the tokenizer, masking, and assembly.
pub mod tokens {
    /// Classification token prepended to every instance.
    pub const CLS: &str = "[CLS]";
    /// Separator token closing segment A and segment B.
    pub const SEP: &str = "[SEP]";
    /// Replacement token used for most masked positions.
    pub const MASK: &str = "[MASK]";
    /// Token emitted for words the vocabulary cannot cover.
    pub const UNK: &str = "[UNK]";
    /// Prefix marking a WordPiece continuation of the previous piece.
    pub const CONTINUATION_PREFIX: &str = "##";
}

/// Constants used by sentence-pair construction and truncation.
pub mod pairs {
    /// Positions reserved for `[CLS]`, the middle `[SEP]`, and the final `[SEP]`.
    pub const SPECIAL_TOKEN_SLOTS: usize = 3;
    /// Smallest target length drawn when a short sequence is requested.
    pub const MIN_TARGET_SEQ_LEN: usize = 2;
    /// Probability of replacing segment B with a random document slice.
    pub const RANDOM_NEXT_PROB: f64 = 0.5;
    /// Probability of trimming the front (instead of the back) of the longer segment.
    pub const TRUNCATE_FRONT_PROB: f64 = 0.5;
}

/// Constants used by the masked-LM policy.
pub mod masking {
    /// Probability an accepted position becomes `[MASK]`.
    pub const MASK_TOKEN_PROB: f64 = 0.8;
    /// Probability (within the non-`[MASK]` remainder) that the original token is kept.
    pub const KEEP_ORIGINAL_PROB: f64 = 0.5;
    /// Default substitution alphabet for the random-replacement branch.
    pub const DEFAULT_REPLACEMENT_ALPHABET: [&str; 4] = ["a", "c", "t", "g"];
}

/// Constants used by n-gram matching and dictionary loading.
pub mod ngram {
    /// Shortest span length scanned against the dictionary.
    pub const MIN_NGRAM_LEN: usize = 2;
    /// Longest span length scanned against the dictionary.
    pub const MAX_NGRAM_LEN: usize = 7;
    /// Placeholder entry occupying dictionary id `0`.
    pub const PAD_NGRAM: &str = "[pad]";
}

/// Constants used by the document stores.
pub mod store {
    /// Key prefix for persisted documents.
    pub const DOC_KEY_PREFIX: &[u8] = b"doc:";
    /// Filename of the spill-to-disk document store inside its temp directory.
    pub const DISK_STORE_FILENAME: &str = "documents.bin";
    /// Prefix marker for bitcode-encoded document payloads.
    pub const BITCODE_PREFIX: u8 = b'B';
}

/// Constants used for seed derivation.
pub mod rng {
    /// Offset mixed into per-epoch seed derivation.
    pub const EPOCH_SEED_OFFSET: u64 = 0xB4C3_5EED;
    /// Salt mixed into per-document seed derivation.
    pub const DOCUMENT_SEED_SALT: &str = "pretrain_document_seed";
}

/// Constants used by epoch output files.
pub mod output {
    /// Filename prefix for per-epoch instance and metrics files.
    pub const EPOCH_FILE_PREFIX: &str = "epoch_";
    /// Number of documents generated in parallel before the window is written out.
    pub const WRITE_WINDOW_DOCUMENTS: usize = 256;
}

/// Constants used by the file cache.
pub mod cache {
    /// Suffix of the sidecar metadata file stored next to each cached file.
    pub const META_SUFFIX: &str = ".json";
    /// Environment variable overriding the default cache directory.
    pub const CACHE_DIR_ENV: &str = "PRETRAIN_DATA_CACHE";
    /// Default cache directory used when no override is provided.
    pub const DEFAULT_CACHE_DIR: &str = ".cache/pretrain_data";
    /// Buffer size used when streaming downloads to disk.
    pub const DOWNLOAD_BUFFER_BYTES: usize = 1024 * 1024;
    /// Seed mixed into URL and ETag hashes when naming cached files.
    pub const FILENAME_HASH_SEED: u64 = 0x5EED_CAC4;
}

/// Constants used by the WordPiece tokenizer.
pub mod tokenizer {
    /// Words longer than this (in chars) become `[UNK]`.
    pub const MAX_INPUT_CHARS_PER_WORD: usize = 100;
}
