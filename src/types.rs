/// A single token produced by the tokenizer.
/// Examples: `un`, `##aff`, `[CLS]`, `a`
pub type Token = String;
/// Ordered tokens of one input line.
/// Example: `["the", "cat", "sat"]`
pub type Sentence = Vec<Token>;
/// Ordered sentences forming one coherent unit (an article, a genomic record).
pub type Document = Vec<Sentence>;
/// Position of a document inside a `DocumentStore`.
pub type DocIndex = usize;
/// Identifier assigned to an n-gram by the dictionary (`0` is reserved for padding).
pub type NgramId = u32;
/// Segment id of a token or n-gram span (`0` for segment A, `1` for segment B).
pub type SegmentId = u8;
