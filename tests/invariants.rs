mod common;

use std::collections::HashMap;
use std::fs;

use pretrain_data::masking::candidate_groups;
use pretrain_data::output::{epoch_file_path, read_epoch, read_metrics};
use pretrain_data::pairs::truncate_seq_pair;
use pretrain_data::{
    DeterministicRng, DocumentStore, GeneratorConfig, InMemoryDocumentStore, Instance,
    MaskingPolicy, PretrainError, SequencePairBuilder, Token,
};
use tempfile::tempdir;

use common::{job, write_fixture};

fn tokens(raw: &[&str]) -> Vec<Token> {
    raw.iter().map(|token| token.to_string()).collect()
}

fn small_config(seed: u64) -> GeneratorConfig {
    GeneratorConfig {
        seed,
        epochs_to_generate: 2,
        max_seq_len: 32,
        short_seq_prob: 0.2,
        max_predictions_per_seq: 5,
        max_ngram_in_seq: 4,
        whole_word_mask: true,
        ..GeneratorConfig::default()
    }
}

fn pre_mask_tokens(instance: &Instance) -> Vec<Token> {
    let mut original = instance.tokens.clone();
    for (position, label) in instance
        .masked_lm_positions
        .iter()
        .zip(&instance.masked_lm_labels)
    {
        original[*position] = label.clone();
    }
    original
}

#[test]
fn generated_instances_hold_every_structural_invariant() {
    let dir = tempdir().unwrap();
    let fixture = write_fixture(dir.path());
    let output_dir = dir.path().join("out");
    let config = small_config(42);
    let metrics = job(&fixture, &output_dir, config.clone()).run().unwrap();
    assert_eq!(metrics.len(), 2);

    let mut saw_ngrams = false;
    let mut saw_random_next = false;
    let mut saw_true_next = false;
    for epoch in 0..2u64 {
        let instances = read_epoch(&epoch_file_path(&output_dir, epoch)).unwrap();
        let sidecar = read_metrics(&output_dir, epoch).unwrap();
        assert_eq!(sidecar.num_training_examples, instances.len());
        assert_eq!(sidecar.max_seq_len, 32);
        assert_eq!(sidecar.max_ngram_in_sequence, 4);
        assert!(!instances.is_empty());

        for instance in &instances {
            assert!(instance.tokens.len() <= config.max_seq_len);
            assert_eq!(instance.segment_ids.len(), instance.tokens.len());
            assert_eq!(instance.tokens[0], "[CLS]");
            assert_eq!(instance.tokens.last().map(String::as_str), Some("[SEP]"));

            let positions = &instance.masked_lm_positions;
            assert_eq!(positions.len(), instance.masked_lm_labels.len());
            assert!(positions.len() <= config.max_predictions_per_seq);
            assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
            let original = pre_mask_tokens(instance);
            for position in positions {
                assert_ne!(original[*position], "[CLS]");
                assert_ne!(original[*position], "[SEP]");
            }
            let first_sep = original.iter().position(|token| token == "[SEP]").unwrap();
            assert!(instance.segment_ids[..=first_sep].iter().all(|id| *id == 0));
            assert!(instance.segment_ids[first_sep + 1..].iter().all(|id| *id == 1));

            let spans = instance.ngram_ids.len();
            assert!(spans <= config.max_ngram_in_seq);
            assert_eq!(instance.ngram_positions.len(), spans);
            assert_eq!(instance.ngram_lengths.len(), spans);
            assert_eq!(instance.ngram_tuples.len(), spans);
            assert_eq!(instance.ngram_segment_ids.len(), spans);
            for span in 0..spans {
                let start = instance.ngram_positions[span];
                let length = instance.ngram_lengths[span];
                assert!((2..=7).contains(&length));
                assert_eq!(
                    &instance.tokens[start..start + length],
                    instance.ngram_tuples[span].as_slice()
                );
                assert_eq!(instance.ngram_segment_ids[span], instance.segment_ids[start]);
                assert!(instance.ngram_ids[span] > 0);
            }

            saw_ngrams |= spans > 0;
            saw_random_next |= instance.is_random_next;
            saw_true_next |= !instance.is_random_next;
        }
    }
    assert!(saw_ngrams);
    assert!(saw_random_next);
    assert!(saw_true_next);
}

#[test]
fn fixed_seed_reproduces_byte_identical_epochs() {
    let dir = tempdir().unwrap();
    let fixture = write_fixture(dir.path());
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    let other = dir.path().join("other");
    job(&fixture, &first, small_config(7)).run().unwrap();
    job(&fixture, &second, small_config(7)).run().unwrap();
    job(&fixture, &other, small_config(8)).run().unwrap();

    for epoch in 0..2u64 {
        let a = fs::read(epoch_file_path(&first, epoch)).unwrap();
        let b = fs::read(epoch_file_path(&second, epoch)).unwrap();
        assert_eq!(a, b);
    }
    assert_ne!(
        fs::read(epoch_file_path(&first, 0)).unwrap(),
        fs::read(epoch_file_path(&other, 0)).unwrap()
    );
    // Epochs draw fresh randomness.
    assert_ne!(
        fs::read(epoch_file_path(&first, 0)).unwrap(),
        fs::read(epoch_file_path(&first, 1)).unwrap()
    );
}

#[test]
fn two_document_corpus_is_reproducible_per_seed() {
    let dir = tempdir().unwrap();
    let mut fixture = write_fixture(dir.path());
    fixture.corpus = dir.path().join("two_docs.txt");
    fs::write(&fixture.corpus, "a c g t\nt t g\ng c a a\n\nc c g a t\n").unwrap();
    let run = |name: &str, seed: u64| {
        let config = GeneratorConfig {
            seed,
            epochs_to_generate: 1,
            ..GeneratorConfig::default()
        };
        let output_dir = dir.path().join(name);
        job(&fixture, &output_dir, config).run().unwrap();
        fs::read(epoch_file_path(&output_dir, 0)).unwrap()
    };
    let first = run("first", 12345);
    let second = run("second", 12345);
    let reseeded = run("reseeded", 54321);
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_ne!(first, reseeded);
}

#[test]
fn single_document_corpus_fails_with_insufficient_data() {
    let dir = tempdir().unwrap();
    let mut fixture = write_fixture(dir.path());
    fixture.corpus = dir.path().join("one_doc.txt");
    fs::write(&fixture.corpus, "a c g\nt t\n").unwrap();
    let err = job(&fixture, &dir.path().join("out"), GeneratorConfig::default())
        .run()
        .unwrap_err();
    assert!(matches!(err, PretrainError::InsufficientData { documents: 1 }));
}

#[test]
fn weighted_sampling_tracks_sentence_share_and_never_returns_current() {
    let sentence_counts = [1usize, 3, 12, 4];
    let store = InMemoryDocumentStore::from_documents(sentence_counts.iter().map(|count| {
        (0..*count)
            .map(|idx| vec![format!("s{idx}")])
            .collect::<Vec<_>>()
    }));
    let total: usize = sentence_counts.iter().sum();
    let trials = 10_000;
    let mut rng = DeterministicRng::new(99);
    for current in 0..sentence_counts.len() {
        let mut hits: HashMap<usize, usize> = HashMap::new();
        for _ in 0..trials {
            let sampled = store.sample_other_than(current, true, &mut rng).unwrap();
            assert_ne!(sampled, current);
            *hits.entry(sampled).or_default() += 1;
        }
        let remaining = (total - sentence_counts[current]) as f64;
        for (doc, count) in sentence_counts.iter().enumerate() {
            if doc == current {
                continue;
            }
            let expected = *count as f64 / remaining;
            let observed = hits.get(&doc).copied().unwrap_or(0) as f64 / trials as f64;
            assert!(
                (observed - expected).abs() < 0.02,
                "doc {doc} from {current}: observed {observed:.3}, expected {expected:.3}"
            );
        }
    }
}

#[test]
fn whole_word_pieces_form_one_group_masked_all_or_nothing() {
    let sequence = tokens(&["[CLS]", "un", "##aff", "##able", "[SEP]"]);
    assert_eq!(candidate_groups(&sequence, true), vec![vec![1, 2, 3]]);

    let alphabet = tokens(&["a", "c", "t", "g"]);
    let policy = MaskingPolicy::new(0.5, 2, true, &alphabet);
    let mut rng = DeterministicRng::new(5);
    for _ in 0..20 {
        let output = policy.apply(sequence.clone(), &mut rng);
        assert!(output.positions.is_empty());
    }
    let policy = MaskingPolicy::new(0.6, 3, true, &alphabet);
    for _ in 0..20 {
        let output = policy.apply(sequence.clone(), &mut rng);
        assert_eq!(output.positions, vec![1, 2, 3]);
    }
}

#[test]
fn single_sentence_chunk_is_always_random_next() {
    let store = InMemoryDocumentStore::from_documents(vec![
        vec![tokens(&["a", "b"])],
        vec![tokens(&["c", "d"]), tokens(&["e"])],
        vec![tokens(&["f"])],
    ]);
    let builder = SequencePairBuilder::new(&store, true);
    let document = store.get(0).unwrap();
    let chunk = vec![&document[0]];
    let mut rng = DeterministicRng::new(3);
    for _ in 0..500 {
        let pair = builder.build(0, &chunk, 10, &mut rng).unwrap();
        assert!(pair.is_random_next);
        assert!(!pair.tokens_b.is_empty());
        assert!(!pair.tokens_b.contains(&"a".to_string()));
    }
}

#[test]
fn truncating_ten_and_five_to_twelve_trims_the_longer_side() {
    let mut rng = DeterministicRng::new(11);
    for _ in 0..50 {
        let mut a: Vec<Token> = (0..10).map(|idx| format!("a{idx}")).collect();
        let mut b: Vec<Token> = (0..5).map(|idx| format!("b{idx}")).collect();
        truncate_seq_pair(&mut a, &mut b, 12, &mut rng);
        assert_eq!(a.len() + b.len(), 12);
        assert_eq!(a.len(), 7);
        assert_eq!(b.len(), 5);
    }
}
