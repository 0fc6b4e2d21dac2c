#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use pretrain_data::{DeterministicRng, GeneratorConfig, PretrainJob};
use rand::Rng;

const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Input files of one generation run.
pub struct Fixture {
    pub corpus: PathBuf,
    pub vocab: PathBuf,
    pub ngrams: PathBuf,
}

/// Write a small genomic-style corpus plus matching vocabulary and n-gram list.
///
/// Even-numbered documents spell bases as separate words; odd-numbered ones use
/// contiguous reads so WordPiece produces `##` continuation pieces.
pub fn write_fixture(dir: &Path) -> Fixture {
    let mut rng = DeterministicRng::new(1234);
    let sentence_counts = [1usize, 4, 7, 2, 9, 3];
    let mut corpus = String::new();
    for (doc, sentences) in sentence_counts.iter().enumerate() {
        for _ in 0..*sentences {
            let len = rng.random_range(5..20);
            let bases: Vec<char> = (0..len)
                .map(|_| BASES[rng.random_range(0..BASES.len())])
                .collect();
            if doc % 2 == 0 {
                let spaced: Vec<String> = bases.iter().map(char::to_string).collect();
                corpus.push_str(&spaced.join(" "));
            } else {
                corpus.extend(bases.iter());
            }
            corpus.push('\n');
        }
        corpus.push('\n');
    }

    let mut vocab = vec!["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];
    vocab.extend(["a", "c", "g", "t", "##a", "##c", "##g", "##t"]);
    let ngrams = "a c,40\nc g,35\ng t a,12\nt t g c,5\nacg,20\na c g t a c g,1\n";

    let fixture = Fixture {
        corpus: dir.join("corpus.txt"),
        vocab: dir.join("vocab.txt"),
        ngrams: dir.join("ngram.txt"),
    };
    fs::write(&fixture.corpus, corpus).unwrap();
    fs::write(&fixture.vocab, vocab.join("\n")).unwrap();
    fs::write(&fixture.ngrams, ngrams).unwrap();
    fixture
}

/// Job over `fixture` writing into `output_dir`.
pub fn job(fixture: &Fixture, output_dir: &Path, config: GeneratorConfig) -> PretrainJob {
    PretrainJob {
        train_corpus: fixture.corpus.clone(),
        output_dir: output_dir.to_path_buf(),
        vocab: fixture.vocab.to_string_lossy().into_owned(),
        ngram_list: Some(fixture.ngrams.to_string_lossy().into_owned()),
        do_lower_case: true,
        reduce_memory: false,
        cache_dir: Some(output_dir.join("cache")),
        config,
    }
}
