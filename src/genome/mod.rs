//! Per-species genome stores: compressed sequences plus optional annotations.

pub mod features;
pub mod seqs;

pub use features::{Feature, FeatureDb, FeatureError};
pub use seqs::{SequenceDb, SequenceError};

/// A species' sequence store and its optional feature annotations.
#[derive(Debug)]
pub struct Genome {
    pub species: String,
    pub seqs: SequenceDb,
    pub annots: Option<FeatureDb>,
}

impl Genome {
    pub fn new(species: &str, seqs: SequenceDb, annots: Option<FeatureDb>) -> Self {
        Self {
            species: species.to_string(),
            seqs,
            annots,
        }
    }
}
