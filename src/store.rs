//! Document stores and sentence-weighted document sampling.
//!
//! A store owns every tokenized document of the corpus plus a `SentenceIndex`
//! (per-document sentence counts and their lazily computed prefix sums). Two
//! backends share the `DocumentStore` contract:
//!
//! - `InMemoryDocumentStore` keeps documents in a vector.
//! - `DiskDocumentStore` spills documents into a simd-r-drive key/value file inside
//!   a private temp directory, trading lookup cost for memory on large corpora.
//!
//! Stores are written during ingestion only; afterwards every method used by
//! generation takes `&self`, so a store can be shared by worker threads.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

use rand::{Rng, RngCore};
use simd_r_drive::storage_engine::DataStore;
use simd_r_drive::storage_engine::traits::{DataStoreReader, DataStoreWriter};
use tempfile::TempDir;
use tracing::debug;

use crate::constants::store::{BITCODE_PREFIX, DISK_STORE_FILENAME, DOC_KEY_PREFIX};
use crate::errors::PretrainError;
use crate::types::{DocIndex, Document, Sentence};

/// Per-document sentence counts with a cached prefix-sum table.
#[derive(Debug, Default)]
pub struct SentenceIndex {
    lengths: Vec<usize>,
    cumsum: OnceLock<Vec<usize>>,
}

impl SentenceIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the sentence count of a newly added document.
    ///
    /// Invalidates the prefix sums; they are rebuilt before the next weighted sample.
    pub fn push(&mut self, sentence_count: usize) {
        self.lengths.push(sentence_count);
        self.cumsum = OnceLock::new();
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Whether no document has been indexed.
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Sentence count of document `index`, if present.
    pub fn sentence_count(&self, index: DocIndex) -> Option<usize> {
        self.lengths.get(index).copied()
    }

    /// Total number of sentences across all documents.
    pub fn total_sentences(&self) -> usize {
        self.prefix_sums().last().copied().unwrap_or(0)
    }

    fn prefix_sums(&self) -> &[usize] {
        self.cumsum.get_or_init(|| {
            let mut running = 0usize;
            self.lengths
                .iter()
                .map(|len| {
                    running += len;
                    running
                })
                .collect()
        })
    }

    /// Pick a document index different from `current`.
    ///
    /// With `weighted`, a virtual sentence position is drawn uniformly from every
    /// sentence outside `current`'s span (wrapping past the end of the corpus), and
    /// the document owning that sentence is returned. Documents are therefore chosen
    /// proportionally to their sentence counts. Without `weighted`, every other
    /// document is equally likely.
    pub fn sample_other_than(
        &self,
        current: DocIndex,
        weighted: bool,
        rng: &mut dyn RngCore,
    ) -> Result<DocIndex, PretrainError> {
        let count = self.len();
        if count < 2 {
            return Err(PretrainError::InsufficientData { documents: count });
        }
        if current >= count {
            return Err(PretrainError::NotFound {
                index: current,
                len: count,
            });
        }
        let sampled = if weighted {
            let cumsum = self.prefix_sums();
            let total = cumsum[count - 1];
            let start = cumsum[current];
            let end = start + total - self.lengths[current];
            let position = rng.random_range(start..end) % total;
            cumsum.partition_point(|&bound| bound <= position)
        } else {
            (current + rng.random_range(1..count)) % count
        };
        debug_assert_ne!(sampled, current);
        Ok(sampled)
    }
}

/// Storage contract shared by the in-memory and spill-to-disk backends.
pub trait DocumentStore: Send + Sync {
    /// Append a document. Empty documents are ignored.
    fn add(&mut self, document: Document) -> Result<(), PretrainError>;

    /// Return the document at `index`.
    fn get(&self, index: DocIndex) -> Result<Cow<'_, Document>, PretrainError>;

    /// Sentence counts and sampling index for the stored documents.
    fn sentence_index(&self) -> &SentenceIndex;

    /// Number of stored documents.
    fn len(&self) -> usize {
        self.sentence_index().len()
    }

    /// Whether the store holds no documents.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail with `InsufficientData` unless random-next sampling is possible.
    fn ensure_sampleable(&self) -> Result<(), PretrainError> {
        if self.len() < 2 {
            return Err(PretrainError::InsufficientData {
                documents: self.len(),
            });
        }
        Ok(())
    }

    /// Index of a document other than `current`; see `SentenceIndex::sample_other_than`.
    fn sample_other_than(
        &self,
        current: DocIndex,
        weighted: bool,
        rng: &mut dyn RngCore,
    ) -> Result<DocIndex, PretrainError> {
        self.sentence_index()
            .sample_other_than(current, weighted, rng)
    }

    /// A document other than `current`, sampled like `sample_other_than`.
    fn sample_document(
        &self,
        current: DocIndex,
        weighted: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Cow<'_, Document>, PretrainError> {
        let index = self.sample_other_than(current, weighted, rng)?;
        self.get(index)
    }
}

/// Open the backend selected by `reduce_memory`.
pub fn open_document_store(reduce_memory: bool) -> Result<Box<dyn DocumentStore>, PretrainError> {
    if reduce_memory {
        Ok(Box::new(DiskDocumentStore::open_temp()?))
    } else {
        Ok(Box::new(InMemoryDocumentStore::new()))
    }
}

/// Vector-backed document store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Vec<Document>,
    index: SentenceIndex,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from documents, skipping empty ones.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut store = Self::new();
        for document in documents {
            store.push(document);
        }
        store
    }

    fn push(&mut self, document: Document) {
        if document.is_empty() {
            return;
        }
        self.index.push(document.len());
        self.documents.push(document);
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn add(&mut self, document: Document) -> Result<(), PretrainError> {
        self.push(document);
        Ok(())
    }

    fn get(&self, index: DocIndex) -> Result<Cow<'_, Document>, PretrainError> {
        self.documents
            .get(index)
            .map(Cow::Borrowed)
            .ok_or(PretrainError::NotFound {
                index,
                len: self.documents.len(),
            })
    }

    fn sentence_index(&self) -> &SentenceIndex {
        &self.index
    }
}

#[derive(bitcode::Encode, bitcode::Decode)]
/// Persisted form of one document.
struct StoredDocument {
    sentences: Vec<Sentence>,
}

/// Spill-to-disk document store backed by a temporary simd-r-drive file.
///
/// The backing directory is removed when the store is dropped.
pub struct DiskDocumentStore {
    store: DataStore,
    index: SentenceIndex,
    path: PathBuf,
    _dir: TempDir,
}

impl fmt::Debug for DiskDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskDocumentStore")
            .field("path", &self.path)
            .field("documents", &self.index.len())
            .finish()
    }
}

impl DiskDocumentStore {
    /// Create a store in a fresh temp directory.
    pub fn open_temp() -> Result<Self, PretrainError> {
        let dir = TempDir::new()?;
        let path = dir.path().join(DISK_STORE_FILENAME);
        let store = DataStore::open(path.as_path()).map_err(map_store_err)?;
        debug!(path = %path.display(), "opened spill-to-disk document store");
        Ok(Self {
            store,
            index: SentenceIndex::new(),
            path,
            _dir: dir,
        })
    }

    /// Location of the backing key/value file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl DocumentStore for DiskDocumentStore {
    fn add(&mut self, document: Document) -> Result<(), PretrainError> {
        if document.is_empty() {
            return Ok(());
        }
        let key = doc_key(self.index.len());
        let sentence_count = document.len();
        let payload = encode_document(document);
        self.store
            .write(&key, payload.as_slice())
            .map_err(map_store_err)?;
        self.index.push(sentence_count);
        Ok(())
    }

    fn get(&self, index: DocIndex) -> Result<Cow<'_, Document>, PretrainError> {
        if index >= self.index.len() {
            return Err(PretrainError::NotFound {
                index,
                len: self.index.len(),
            });
        }
        let entry = self
            .store
            .read(&doc_key(index))
            .map_err(map_store_err)?
            .ok_or_else(|| PretrainError::Store(format!("missing entry for document {index}")))?;
        decode_document(entry.as_ref()).map(Cow::Owned)
    }

    fn sentence_index(&self) -> &SentenceIndex {
        &self.index
    }
}

fn doc_key(index: DocIndex) -> Vec<u8> {
    let mut key = Vec::with_capacity(DOC_KEY_PREFIX.len() + 8);
    key.extend_from_slice(DOC_KEY_PREFIX);
    key.extend_from_slice(&(index as u64).to_le_bytes());
    key
}

fn encode_document(sentences: Document) -> Vec<u8> {
    let encoded = bitcode::encode(&StoredDocument { sentences });
    let mut out = Vec::with_capacity(1 + encoded.len());
    out.push(BITCODE_PREFIX);
    out.extend_from_slice(&encoded);
    out
}

fn decode_document(bytes: &[u8]) -> Result<Document, PretrainError> {
    let Some((&BITCODE_PREFIX, raw)) = bytes.split_first() else {
        return Err(PretrainError::Store(
            "document payload missing expected prefix".into(),
        ));
    };
    let stored: StoredDocument = bitcode::decode(raw)
        .map_err(|err| PretrainError::Store(format!("failed to decode document: {err}")))?;
    Ok(stored.sentences)
}

fn map_store_err(err: io::Error) -> PretrainError {
    PretrainError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::DeterministicRng;

    fn document(sentences: usize, tag: &str) -> Document {
        (0..sentences)
            .map(|idx| vec![format!("{tag}{idx}"), "x".to_string()])
            .collect()
    }

    #[test]
    fn sentence_index_prefix_sums_follow_pushes() {
        let mut index = SentenceIndex::new();
        index.push(2);
        index.push(3);
        assert_eq!(index.total_sentences(), 5);
        index.push(4);
        assert_eq!(index.total_sentences(), 9);
        assert_eq!(index.sentence_count(1), Some(3));
        assert_eq!(index.sentence_count(3), None);
    }

    #[test]
    fn weighted_sampling_with_two_documents_always_picks_the_other() {
        let mut index = SentenceIndex::new();
        index.push(1);
        index.push(5);
        let mut rng = DeterministicRng::new(7);
        for _ in 0..200 {
            assert_eq!(index.sample_other_than(0, true, &mut rng).unwrap(), 1);
            assert_eq!(index.sample_other_than(1, true, &mut rng).unwrap(), 0);
        }
    }

    #[test]
    fn sampling_sees_documents_added_after_a_previous_sample() {
        let mut index = SentenceIndex::new();
        index.push(1);
        index.push(1);
        let mut rng = DeterministicRng::new(3);
        assert_eq!(index.sample_other_than(0, true, &mut rng).unwrap(), 1);
        index.push(50);
        let hits = (0..500)
            .filter(|_| index.sample_other_than(0, true, &mut rng).unwrap() == 2)
            .count();
        assert!(hits > 400, "new document sampled only {hits} times");
    }

    #[test]
    fn unweighted_sampling_covers_every_other_document() {
        let mut index = SentenceIndex::new();
        for len in [1, 10, 100, 1000] {
            index.push(len);
        }
        let mut rng = DeterministicRng::new(11);
        let mut counts = [0usize; 4];
        for _ in 0..3000 {
            counts[index.sample_other_than(2, false, &mut rng).unwrap()] += 1;
        }
        assert_eq!(counts[2], 0);
        for idx in [0, 1, 3] {
            assert!(
                (800..1200).contains(&counts[idx]),
                "document {idx} drawn {} times",
                counts[idx]
            );
        }
    }

    #[test]
    fn sampling_requires_two_documents_and_a_valid_index() {
        let mut index = SentenceIndex::new();
        let mut rng = DeterministicRng::new(1);
        index.push(3);
        assert!(matches!(
            index.sample_other_than(0, true, &mut rng),
            Err(PretrainError::InsufficientData { documents: 1 })
        ));
        index.push(3);
        assert!(matches!(
            index.sample_other_than(5, true, &mut rng),
            Err(PretrainError::NotFound { index: 5, len: 2 })
        ));
    }

    #[test]
    fn in_memory_store_skips_empty_documents_and_reports_missing_indices() {
        let mut store = InMemoryDocumentStore::new();
        store.add(document(2, "a")).unwrap();
        store.add(Vec::new()).unwrap();
        store.add(document(1, "b")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap()[0][0], "b0");
        assert!(matches!(
            store.get(2),
            Err(PretrainError::NotFound { index: 2, len: 2 })
        ));
    }

    #[test]
    fn disk_store_roundtrips_documents_and_samples_like_memory_store() {
        let mut disk = DiskDocumentStore::open_temp().unwrap();
        let mut memory = InMemoryDocumentStore::new();
        for (sentences, tag) in [(2, "a"), (0, "skip"), (3, "b"), (1, "c")] {
            disk.add(document(sentences, tag)).unwrap();
            memory.add(document(sentences, tag)).unwrap();
        }
        assert!(disk.path().exists());
        assert_eq!(disk.len(), 3);
        for idx in 0..3 {
            assert_eq!(disk.get(idx).unwrap(), memory.get(idx).unwrap());
        }
        assert!(matches!(disk.get(3), Err(PretrainError::NotFound { .. })));

        let mut rng_a = DeterministicRng::new(5);
        let mut rng_b = DeterministicRng::new(5);
        for _ in 0..50 {
            assert_eq!(
                disk.sample_document(1, true, &mut rng_a).unwrap(),
                memory.sample_document(1, true, &mut rng_b).unwrap()
            );
        }
    }

    #[test]
    fn decode_rejects_payloads_without_prefix() {
        let err = decode_document(b"xyz").unwrap_err();
        assert!(err.to_string().contains("prefix"));
        let err = decode_document(&[]).unwrap_err();
        assert!(matches!(err, PretrainError::Store(_)));
    }

    #[test]
    fn open_document_store_selects_backend() {
        let mut store = open_document_store(true).unwrap();
        store.add(document(1, "a")).unwrap();
        store.add(document(1, "b")).unwrap();
        store.ensure_sampleable().unwrap();
        let store = open_document_store(false).unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.ensure_sampleable(),
            Err(PretrainError::InsufficientData { documents: 0 })
        ));
    }
}
