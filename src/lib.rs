//! Storage and retrieval engine for whole-genome multiple sequence alignments.
//!
//! Alignment blocks are stored as per-(species, seqid, strand) records whose
//! gap runs are kept in compact span arrays. Queries phrased in reference
//! genome coordinates locate the overlapping blocks, fetch the ungapped
//! substrings from each participating genome store, re-insert gaps, and yield
//! trimmed alignments with annotations projected into alignment coordinates.

pub mod align;
pub mod config;
pub mod genome;

pub use align::{
    AlignDb, AlignError, AlignRecord, AlignedSeq, Alignment, Alignments, GapError, GapPositions,
    GapSpan, RecordQuery, Strand, WriteOptions, default_namer, gap_coords, get_alignment,
    write_alignments,
};
pub use config::Config;
pub use genome::{Feature, FeatureDb, Genome, SequenceDb};
