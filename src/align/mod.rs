//! Alignment block storage, gap coordinate algebra, and reconstruction.

pub mod builder;
pub mod db;
pub mod gaps;
pub mod types;
pub mod writer;

#[cfg(test)]
pub(crate) mod testdata;

pub use builder::{AlignError, Alignments, default_namer, get_alignment};
pub use db::{AlignDb, DbError, RecordQuery};
pub use gaps::{GapError, GapPositions, GapSpan, gap_coords};
pub use types::{AlignRecord, AlignedSeq, Alignment, Strand};
pub use writer::{WriteOptions, write_alignments};
