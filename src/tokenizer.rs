//! Tokenizer contract and a BERT WordPiece tokenizer driven by a vocabulary file.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::PostProcessorWrapper;
use tokenizers::{AddedToken, TokenizerBuilder, TokenizerImpl};

use crate::constants::tokenizer::MAX_INPUT_CHARS_PER_WORD;
use crate::constants::tokens::{CLS, CONTINUATION_PREFIX, MASK, SEP, UNK};
use crate::errors::PretrainError;
use crate::types::Token;

type BertPipeline =
    TokenizerImpl<WordPiece, BertNormalizer, BertPreTokenizer, PostProcessorWrapper, DecoderWrapper>;

/// Splits raw text into tokens known to a vocabulary.
pub trait Tokenizer: Send + Sync {
    /// Tokenize one line of text.
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, PretrainError>;
    /// Vocabulary backing this tokenizer.
    fn vocab(&self) -> &Vocabulary;
}

/// Ordered token → id mapping (ids follow file order).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: IndexMap<Token, u32>,
}

impl Vocabulary {
    /// Build from tokens in id order. Duplicates keep their first id.
    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Token>,
    {
        let mut map = IndexMap::new();
        for token in tokens {
            let token = token.into();
            let next_id = map.len() as u32;
            map.entry(token).or_insert(next_id);
        }
        Self { tokens: map }
    }

    /// Load a one-token-per-line vocabulary file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PretrainError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PretrainError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let raw = fs::read_to_string(path)?;
        let vocab = Self::from_tokens(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        );
        if vocab.is_empty() {
            return Err(PretrainError::Configuration(format!(
                "vocabulary file {} is empty",
                path.display()
            )));
        }
        Ok(vocab)
    }

    /// Whether `token` is part of the vocabulary.
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    /// Id of `token`, if known.
    pub fn id(&self, token: &str) -> Option<u32> {
        self.tokens.get(token).copied()
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens in id order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.keys()
    }
}

/// BERT tokenizer: `BertNormalizer` cleanup (lowercasing and accent stripping when
/// `do_lower_case`), whitespace and punctuation pre-tokenization, then greedy
/// longest-match-first WordPiece with `##` continuations.
#[derive(Clone, Debug)]
pub struct WordPieceTokenizer {
    vocab: Vocabulary,
    pipeline: BertPipeline,
}

impl WordPieceTokenizer {
    /// Create a tokenizer over an already loaded vocabulary.
    pub fn new(vocab: Vocabulary, do_lower_case: bool) -> Result<Self, PretrainError> {
        let model = WordPiece::builder()
            .vocab(
                vocab
                    .tokens
                    .iter()
                    .map(|(token, id)| (token.clone(), *id))
                    .collect::<ahash::AHashMap<_, _>>(),
            )
            .unk_token(UNK.to_string())
            .continuing_subword_prefix(CONTINUATION_PREFIX.to_string())
            .max_input_chars_per_word(MAX_INPUT_CHARS_PER_WORD)
            .build()
            .map_err(tokenizer_error)?;
        let mut pipeline: BertPipeline = TokenizerBuilder::new()
            .with_model(model)
            .with_normalizer(Some(BertNormalizer::new(
                true,
                true,
                Some(do_lower_case),
                do_lower_case,
            )))
            .with_pre_tokenizer(Some(BertPreTokenizer))
            .build()
            .map_err(tokenizer_error)?;
        let specials: Vec<AddedToken> = [CLS, SEP, MASK, UNK]
            .into_iter()
            .map(|token| AddedToken::from(token, true))
            .collect();
        pipeline.add_special_tokens(&specials);
        Ok(Self { vocab, pipeline })
    }

    /// Load the vocabulary file at `path`.
    pub fn from_vocab_file(
        path: impl AsRef<Path>,
        do_lower_case: bool,
    ) -> Result<Self, PretrainError> {
        Self::new(Vocabulary::load(path)?, do_lower_case)
    }
}

impl Tokenizer for WordPieceTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, PretrainError> {
        let encoding = self.pipeline.encode(text, false).map_err(tokenizer_error)?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }
}

fn tokenizer_error(err: tokenizers::Error) -> PretrainError {
    PretrainError::Tokenizer(err.to_string())
}
