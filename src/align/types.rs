//! Core types for alignment block records and materialized alignments.

use std::collections::BTreeMap;
use std::fmt;

use crate::align::gaps::{GapError, GapPositions, GapSpan};
use crate::genome::FeatureDb;

/// Strand of a genome that an alignment block record uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Plus => "+",
            Strand::Minus => "-",
        }
    }

    /// Parse the single-character strand symbol used on disk.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Strand::Plus),
            "-" => Some(Strand::Minus),
            _ => None,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an alignment block: a (species, seqid, strand) region plus the
/// gap spans of its sequence within the block.
///
/// `start`/`stop` are half-open coordinates on the plus strand of the species
/// genome, regardless of `strand`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignRecord {
    pub source: String,
    pub block_id: String,
    pub species: String,
    pub seqid: String,
    pub start: i64,
    pub stop: i64,
    pub strand: Strand,
    pub gap_spans: Vec<GapSpan>,
}

impl AlignRecord {
    /// Ungapped length of this record's sequence within the block.
    pub fn seq_length(&self) -> i64 {
        self.stop - self.start
    }

    pub fn gap_positions(&self) -> Result<GapPositions, GapError> {
        GapPositions::new(self.gap_spans.clone(), self.seq_length())
    }

    /// Number of alignment columns this record spans; identical across all
    /// records of a block.
    pub fn aligned_length(&self) -> i64 {
        self.seq_length()
            + self
                .gap_spans
                .iter()
                .map(|span| i64::from(span.length))
                .sum::<i64>()
    }
}

/// One named, gapped row of a materialized alignment.
#[derive(Debug, Clone)]
pub struct AlignedSeq {
    pub name: String,
    pub species: String,
    pub seqid: String,
    pub start: i64,
    pub stop: i64,
    pub strand: Strand,
    /// Gapped residues, alignment orientation.
    pub seq: Vec<u8>,
}

/// A materialized multi-species alignment region with projected annotations.
///
/// Rows are ordered by (species, seqid); the annotation store is keyed by row
/// name and holds spans in alignment-column coordinates.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub block_id: String,
    pub seqs: Vec<AlignedSeq>,
    pub annotations: FeatureDb,
}

impl Alignment {
    pub fn num_seqs(&self) -> usize {
        self.seqs.len()
    }

    /// Number of alignment columns (all rows agree by construction).
    pub fn num_cols(&self) -> usize {
        self.seqs.first().map(|s| s.seq.len()).unwrap_or(0)
    }

    /// Row name to gapped sequence, for comparisons and serialization.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.seqs
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    String::from_utf8_lossy(&s.seq).into_owned(),
                )
            })
            .collect()
    }

    /// The row belonging to `species`, if present.
    pub fn species_row(&self, species: &str) -> Option<&AlignedSeq> {
        self.seqs.iter().find(|s| s.species == species)
    }
}
