//! Gap-run coordinate algebra for single sequences within alignment blocks.
//!
//! A sequence's gaps are stored as runs rather than per-column flags, so
//! conversion between ungapped (sequence) and gapped (alignment) coordinates
//! stays sub-linear even for blocks with 10^5+ columns.

use thiserror::Error;

/// Gap character used throughout alignment output.
pub const GAP: u8 = b'-';

#[derive(Error, Debug)]
pub enum GapError {
    #[error("invalid gap spans: {0}")]
    InvalidGaps(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("index {index} outside [0, {max}]")]
    OutOfRange { index: i64, max: i64 },
}

/// Malformed serialized gap-span blob.
#[derive(Error, Debug)]
#[error("malformed gap span blob: {0}")]
pub struct GapBlobError(pub String);

/// A run of gap characters preceding ungapped residue `index`.
///
/// `GapSpan { index: 0, length: 3 }` places three gaps before the first
/// residue; `index == seq_length` places them after the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapSpan {
    pub index: i32,
    pub length: i32,
}

impl GapSpan {
    pub fn new(index: i32, length: i32) -> Self {
        Self { index, length }
    }
}

/// Gap runs of one sequence plus its ungapped length.
///
/// Immutable once constructed; slicing returns a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct GapPositions {
    gaps: Vec<GapSpan>,
    seq_length: i64,
    /// Cumulative gap length up to and including each span.
    cum: Vec<i64>,
}

impl GapPositions {
    /// Validate and wrap a gap-span array for a sequence of `seq_length`
    /// ungapped residues.
    pub fn new(gaps: Vec<GapSpan>, seq_length: i64) -> Result<Self, GapError> {
        if seq_length < 0 {
            return Err(GapError::InvalidGaps(format!(
                "negative sequence length {seq_length}"
            )));
        }
        let mut prev: i64 = -1;
        for span in &gaps {
            if span.length <= 0 {
                return Err(GapError::InvalidGaps(format!(
                    "non-positive gap length {} at index {}",
                    span.length, span.index
                )));
            }
            let index = i64::from(span.index);
            if index <= prev {
                return Err(GapError::InvalidGaps(format!(
                    "gap indices not strictly increasing at index {index}"
                )));
            }
            if index < 0 || index > seq_length {
                return Err(GapError::InvalidGaps(format!(
                    "gap index {index} outside [0, {seq_length}]"
                )));
            }
            prev = index;
        }
        let mut cum = Vec::with_capacity(gaps.len());
        let mut total = 0i64;
        for span in &gaps {
            total += i64::from(span.length);
            cum.push(total);
        }
        Ok(Self {
            gaps,
            seq_length,
            cum,
        })
    }

    /// Aligned length: ungapped residues plus all gap characters.
    pub fn len(&self) -> i64 {
        self.seq_length + self.cum.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seq_length(&self) -> i64 {
        self.seq_length
    }

    pub fn gaps(&self) -> &[GapSpan] {
        &self.gaps
    }

    /// Alignment column of ungapped residue `i` (or the past-end column for
    /// `i == seq_length`, counting any trailing gaps).
    pub fn from_seq_to_align_index(&self, i: i64) -> Result<i64, GapError> {
        if i < 0 || i > self.seq_length {
            return Err(GapError::OutOfRange {
                index: i,
                max: self.seq_length,
            });
        }
        // All runs with index <= i sit before residue i in the alignment.
        let k = self.gaps.partition_point(|span| i64::from(span.index) <= i);
        let consumed = if k == 0 { 0 } else { self.cum[k - 1] };
        Ok(i + consumed)
    }

    /// Ungapped residue at alignment column `a`. Columns inside a gap run
    /// resolve to the next residue after the run (`seq_length` when the run
    /// trails the sequence).
    pub fn from_align_to_seq_index(&self, a: i64) -> Result<i64, GapError> {
        if a < 0 {
            return Err(GapError::Unsupported(format!(
                "negative alignment index {a}"
            )));
        }
        let aligned = self.len();
        if a > aligned {
            return Err(GapError::OutOfRange {
                index: a,
                max: aligned,
            });
        }
        // Run k occupies alignment columns [index_k + cum_{k-1}, index_k + cum_k).
        // Find the first run whose aligned end is past `a`.
        let (mut lo, mut hi) = (0usize, self.gaps.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            let end = i64::from(self.gaps[mid].index) + self.cum[mid];
            if end <= a {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo < self.gaps.len() {
            let consumed = if lo == 0 { 0 } else { self.cum[lo - 1] };
            let run_start = i64::from(self.gaps[lo].index) + consumed;
            if a >= run_start {
                return Ok(i64::from(self.gaps[lo].index));
            }
            return Ok(a - consumed);
        }
        Ok(a - self.cum.last().copied().unwrap_or(0))
    }

    /// Restrict to alignment columns `[start, stop)`. `None` bounds are
    /// unbounded. Retained runs are clipped to the window and rebased onto
    /// the new sequence origin.
    pub fn slice(&self, start: Option<i64>, stop: Option<i64>) -> Result<Self, GapError> {
        let aligned = self.len();
        let s = start.unwrap_or(0);
        let e = stop.unwrap_or(aligned);
        if s < 0 || e < 0 {
            return Err(GapError::Unsupported(format!(
                "negative slice bound in [{s}, {e})"
            )));
        }
        if e < s {
            return Err(GapError::Unsupported(format!(
                "slice stop {e} before start {s}"
            )));
        }
        if s > aligned || e > aligned {
            return Err(GapError::OutOfRange {
                index: s.max(e),
                max: aligned,
            });
        }
        let seq_start = self.from_align_to_seq_index(s)?;
        let seq_stop = self.from_align_to_seq_index(e)?;

        let mut gaps = Vec::new();
        let mut consumed = 0i64;
        for span in &self.gaps {
            let run_start = i64::from(span.index) + consumed;
            consumed += i64::from(span.length);
            let run_end = i64::from(span.index) + consumed;
            let clipped = run_end.min(e) - run_start.max(s);
            if clipped > 0 {
                gaps.push(GapSpan {
                    index: (i64::from(span.index) - seq_start) as i32,
                    length: clipped as i32,
                });
            }
        }
        Self::new(gaps, seq_stop - seq_start)
    }

    /// Re-insert gap characters into an ungapped sequence.
    pub fn gapped(&self, ungapped: &[u8]) -> Result<Vec<u8>, GapError> {
        if ungapped.len() as i64 != self.seq_length {
            return Err(GapError::InvalidGaps(format!(
                "sequence length {} does not match expected {}",
                ungapped.len(),
                self.seq_length
            )));
        }
        let mut out = Vec::with_capacity(self.len() as usize);
        let mut prev = 0usize;
        for span in &self.gaps {
            let index = span.index as usize;
            out.extend_from_slice(&ungapped[prev..index]);
            out.resize(out.len() + span.length as usize, GAP);
            prev = index;
        }
        out.extend_from_slice(&ungapped[prev..]);
        Ok(out)
    }
}

/// Split a gapped sequence into its gap spans and ungapped residues.
pub fn gap_coords(gapped: &[u8]) -> (Vec<GapSpan>, Vec<u8>) {
    let mut spans = Vec::new();
    let mut seq = Vec::with_capacity(gapped.len());
    let mut run = 0i32;
    for &byte in gapped {
        if byte == GAP {
            run += 1;
        } else {
            if run > 0 {
                spans.push(GapSpan::new(seq.len() as i32, run));
                run = 0;
            }
            seq.push(byte);
        }
    }
    if run > 0 {
        spans.push(GapSpan::new(seq.len() as i32, run));
    }
    (spans, seq)
}

/// Serialize gap spans as a little-endian count plus int32 pairs.
pub fn encode_gap_spans(spans: &[GapSpan]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + spans.len() * 8);
    out.extend_from_slice(&(spans.len() as u32).to_le_bytes());
    for span in spans {
        out.extend_from_slice(&span.index.to_le_bytes());
        out.extend_from_slice(&span.length.to_le_bytes());
    }
    out
}

/// Inverse of [`encode_gap_spans`].
pub fn decode_gap_spans(blob: &[u8]) -> Result<Vec<GapSpan>, GapBlobError> {
    if blob.len() < 4 {
        return Err(GapBlobError("missing span count".to_string()));
    }
    let count = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
    let body = &blob[4..];
    if body.len() != count * 8 {
        return Err(GapBlobError(format!(
            "expected {count} spans but blob holds {} bytes",
            body.len()
        )));
    }
    let mut spans = Vec::with_capacity(count);
    for pair in body.chunks_exact(8) {
        let index = i32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
        let length = i32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
        spans.push(GapSpan { index, length });
    }
    Ok(spans)
}
