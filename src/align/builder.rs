//! Reconstruction of aligned regions from stored blocks and genome stores.

use std::collections::{HashMap, VecDeque};

use log::warn;
use thiserror::Error;

use crate::align::db::{AlignDb, DbError, RecordQuery};
use crate::align::gaps::{GAP, GapError, GapPositions};
use crate::align::types::{AlignRecord, AlignedSeq, Alignment, Strand};
use crate::genome::seqs::SequenceError;
use crate::genome::{Feature, FeatureDb, Genome};

/// Mask character substituted for residues of masked features.
const MASK: u8 = b'?';

#[derive(Error, Debug)]
pub enum AlignError {
    #[error("species {0:?} is not in the supplied genomes")]
    UnknownSpecies(String),
    #[error(transparent)]
    Gap(#[from] GapError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default row naming: `species/seqid:start-stop(strand)`.
pub fn default_namer(species: &str, seqid: &str, strand: Strand, start: i64, stop: i64) -> String {
    format!("{species}/{seqid}:{start}-{stop}({strand})")
}

/// Lazily reconstruct the alignments overlapping `[ref_start, ref_end)` on
/// `seqid` of `ref_species`. A lone bound selects the blocks spanning that
/// position; with neither bound, every block on the seqid is selected.
///
/// Blocks are yielded in `block_id` order; rows within an alignment are
/// ordered by (species, seqid) and named by `namer`. `mask_features` lists
/// biotypes whose projected residues are masked in the output.
///
/// Genome and annotation reads happen per block as the iterator advances, so
/// dropping it halts all further I/O.
pub fn get_alignment<'a, F>(
    align_db: &'a AlignDb,
    genomes: &'a HashMap<String, Genome>,
    ref_species: &str,
    seqid: &str,
    ref_start: Option<i64>,
    ref_end: Option<i64>,
    namer: F,
    mask_features: Option<&'a [String]>,
) -> Result<Alignments<'a, F>, AlignError>
where
    F: Fn(&str, &str, Strand, i64, i64) -> String,
{
    if !genomes.contains_key(ref_species) {
        return Err(AlignError::UnknownSpecies(ref_species.to_string()));
    }
    let matching = align_db.get_records_matching(&RecordQuery {
        species: Some(ref_species.to_string()),
        seqid: Some(seqid.to_string()),
        start: ref_start,
        stop: ref_end,
    })?;
    let mut block_ids: Vec<String> = matching.into_iter().map(|r| r.block_id).collect();
    block_ids.sort();
    block_ids.dedup();
    Ok(Alignments {
        db: align_db,
        genomes,
        ref_species: ref_species.to_string(),
        ref_seqid: seqid.to_string(),
        ref_start,
        ref_end,
        namer,
        mask_features,
        pending: block_ids.into(),
    })
}

/// Lazy sequence of reconstructed alignments; see [`get_alignment`].
pub struct Alignments<'a, F> {
    db: &'a AlignDb,
    genomes: &'a HashMap<String, Genome>,
    ref_species: String,
    ref_seqid: String,
    ref_start: Option<i64>,
    ref_end: Option<i64>,
    namer: F,
    mask_features: Option<&'a [String]>,
    pending: VecDeque<String>,
}

impl<F> Iterator for Alignments<'_, F>
where
    F: Fn(&str, &str, Strand, i64, i64) -> String,
{
    type Item = Result<Alignment, AlignError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let block_id = self.pending.pop_front()?;
            let block = match self.db.get_records_for_block(&block_id) {
                Ok(block) => block,
                Err(err) => return Some(Err(err.into())),
            };
            let reference = block
                .iter()
                .find(|r| r.species == self.ref_species && r.seqid == self.ref_seqid)
                .cloned();
            let Some(reference) = reference else {
                // data-integrity fault: not fatal to the query
                warn!(
                    "block {block_id} has no record for {}/{}; skipping",
                    self.ref_species, self.ref_seqid
                );
                continue;
            };
            return Some(self.build(block_id, block, &reference));
        }
    }
}

impl<F> Alignments<'_, F>
where
    F: Fn(&str, &str, Strand, i64, i64) -> String,
{
    fn build(
        &self,
        block_id: String,
        mut block: Vec<AlignRecord>,
        reference: &AlignRecord,
    ) -> Result<Alignment, AlignError> {
        // intersect the request with the reference record, then convert into
        // in-block sequence offsets (block rows read in alignment
        // orientation, so a minus-strand reference flips the window)
        let ref_length = reference.seq_length();
        let q_start = self.ref_start.unwrap_or(reference.start).max(reference.start);
        let q_end = self.ref_end.unwrap_or(reference.stop).min(reference.stop);
        let (mut begin, mut end) = (q_start - reference.start, q_end - reference.start);
        if reference.strand == Strand::Minus {
            (begin, end) = (ref_length - end, ref_length - begin);
        }
        let ref_gaps = reference.gap_positions()?;
        let aln_begin = ref_gaps.from_seq_to_align_index(begin)?;
        let aln_end = ref_gaps.from_seq_to_align_index(end)?;

        block.sort_by(|a, b| {
            (a.species.as_str(), a.seqid.as_str()).cmp(&(b.species.as_str(), b.seqid.as_str()))
        });

        let mut seqs = Vec::with_capacity(block.len());
        let mut annotations = FeatureDb::new();
        for record in &block {
            let genome = self
                .genomes
                .get(&record.species)
                .ok_or_else(|| AlignError::UnknownSpecies(record.species.clone()))?;
            let gaps = record.gap_positions()?;
            let sliced = gaps.slice(Some(aln_begin), Some(aln_end))?;
            let seq_begin = gaps.from_align_to_seq_index(aln_begin)?;
            let seq_end = gaps.from_align_to_seq_index(aln_end)?;
            debug_assert_eq!(seq_end - seq_begin, sliced.seq_length());
            let (g_start, g_stop) = match record.strand {
                Strand::Plus => (record.start + seq_begin, record.start + seq_end),
                Strand::Minus => (record.stop - seq_end, record.stop - seq_begin),
            };
            let ungapped =
                genome
                    .seqs
                    .get_substring(&record.seqid, g_start, g_stop, record.strand)?;
            let mut seq = sliced.gapped(&ungapped)?;
            let name = (self.namer)(&record.species, &record.seqid, record.strand, g_start, g_stop);

            if let Some(feature_db) = &genome.annots {
                for feature in feature_db.query(&record.seqid, Some(g_start), Some(g_stop), None) {
                    let spans = project_spans(feature, record.strand, g_start, g_stop, &sliced);
                    if spans.is_empty() {
                        continue;
                    }
                    if self.should_mask(&feature.biotype) {
                        for &(b, e) in &spans {
                            mask_residues(&mut seq, b, e);
                        }
                    }
                    annotations.add_feature(Feature {
                        seqid: name.clone(),
                        biotype: feature.biotype.clone(),
                        name: feature.name.clone(),
                        spans,
                    });
                }
            }

            seqs.push(AlignedSeq {
                name,
                species: record.species.clone(),
                seqid: record.seqid.clone(),
                start: g_start,
                stop: g_stop,
                strand: record.strand,
                seq,
            });
        }
        Ok(Alignment {
            block_id,
            seqs,
            annotations,
        })
    }

    fn should_mask(&self, biotype: &str) -> bool {
        self.mask_features
            .is_some_and(|biotypes| biotypes.iter().any(|b| b == biotype))
    }
}

/// Translate a feature's genome spans into alignment columns of the sliced
/// block row, clipping to the fetched window.
fn project_spans(
    feature: &Feature,
    strand: Strand,
    g_start: i64,
    g_stop: i64,
    sliced: &GapPositions,
) -> Vec<(i64, i64)> {
    let max = sliced.seq_length();
    let mut out = Vec::new();
    for &(begin, end) in &feature.spans {
        let (b, e) = match strand {
            Strand::Plus => (begin - g_start, end - g_start),
            Strand::Minus => (g_stop - end, g_stop - begin),
        };
        let (b, e) = (b.clamp(0, max), e.clamp(0, max));
        if e <= b {
            continue;
        }
        if let (Ok(aln_b), Ok(aln_e)) = (
            sliced.from_seq_to_align_index(b),
            sliced.from_seq_to_align_index(e),
        ) {
            out.push((aln_b, aln_e));
        }
    }
    out
}

fn mask_residues(seq: &mut [u8], begin: i64, end: i64) {
    let begin = (begin.max(0) as usize).min(seq.len());
    let end = (end.max(0) as usize).min(seq.len());
    for byte in &mut seq[begin..end] {
        if *byte != GAP {
            *byte = MASK;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::testdata::{
        expected_slice, make_genomes, make_records, make_sample, seqid_namer,
    };

    fn db_with(records: Vec<AlignRecord>) -> AlignDb {
        let mut db = AlignDb::open_in_memory().unwrap();
        db.add_records(&records).unwrap();
        db
    }

    #[test]
    fn test_building_alignment() {
        let db = db_with(make_records(1, 5, "0"));
        let genomes = make_genomes(false, false);
        let got: Vec<_> = get_alignment(&db, &genomes, "mouse", "s2", None, None, seqid_namer, None)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].to_map(), expected_slice(1, 5));
    }

    #[test]
    fn test_unknown_ref_species() {
        let db = db_with(make_records(1, 5, "0"));
        let genomes = make_genomes(false, false);
        assert!(matches!(
            get_alignment(&db, &genomes, "dodo", "s2", None, None, seqid_namer, None),
            Err(AlignError::UnknownSpecies(_))
        ));
    }

    #[test]
    fn test_select_alignment_plus_strand() {
        // sample block covers columns [1, 12); one genome is stored in
        // reverse complement, which must not affect the result
        let windows: [(Option<i64>, Option<i64>); 5] = [
            (None, None),
            (None, Some(11)),
            (Some(3), None),
            (Some(3), Some(9)),
            (Some(3), Some(13)),
        ];
        for (species, seqid) in [("human", "s1"), ("dog", "s3")] {
            for (start, end) in windows {
                let (genomes, db) = make_sample(false);
                let got: Vec<_> =
                    get_alignment(&db, &genomes, species, seqid, start, end, seqid_namer, None)
                        .unwrap()
                        .collect::<Result<_, _>>()
                        .unwrap();
                assert_eq!(got.len(), 1, "{species}/{seqid} ({start:?}, {end:?})");
                let expect_start = start.unwrap_or(1).max(1) as usize;
                let expect_end = (end.unwrap_or(12).min(12)) as usize;
                assert_eq!(
                    got[0].to_map(),
                    expected_slice(expect_start, expect_end),
                    "{species}/{seqid} ({start:?}, {end:?})"
                );
            }
        }
    }

    #[test]
    fn test_select_alignment_minus_strand() {
        // the mouse genome is stored reverse-complemented, so query
        // coordinates are in the stored orientation; expectations are
        // alignment columns of the original
        let cases: [(Option<i64>, Option<i64>, usize, usize); 4] = [
            (None, None, 1, 12),
            (Some(19), None, 1, 11),
            (None, Some(22), 2, 12),
            (Some(17), Some(22), 2, 12),
        ];
        for (start, end, expect_start, expect_end) in cases {
            let (genomes, db) = make_sample(false);
            let got: Vec<_> =
                get_alignment(&db, &genomes, "mouse", "s2", start, end, seqid_namer, None)
                    .unwrap()
                    .collect::<Result<_, _>>()
                    .unwrap();
            assert_eq!(got.len(), 1, "({start:?}, {end:?})");
            assert_eq!(
                got[0].to_map(),
                expected_slice(expect_start, expect_end),
                "({start:?}, {end:?})"
            );
        }
    }

    #[test]
    fn test_alignment_features() {
        let windows: [(Option<i64>, Option<i64>); 4] = [
            (None, Some(11)),  // finish within
            (Some(3), None),   // start within
            (Some(3), Some(9)), // within
            (Some(3), Some(13)), // extends past
        ];
        for (start, end) in windows {
            let (genomes, db) = make_sample(false);
            let got: Vec<_> =
                get_alignment(&db, &genomes, "human", "s1", start, end, seqid_namer, None)
                    .unwrap()
                    .collect::<Result<_, _>>()
                    .unwrap();
            assert_eq!(got.len(), 1);
            // only the s1 feature lands inside the window on its genome
            assert_eq!(got[0].annotations.len(), 1, "({start:?}, {end:?})");
            let feature = got[0].annotations.iter().next().unwrap();
            assert_eq!(feature.name, "not-on-s2");
            assert_eq!(feature.seqid, "s1");
        }
    }

    #[test]
    fn test_alignment_masked_features() {
        let mask = vec!["gene".to_string()];
        let windows: [(Option<i64>, Option<i64>); 4] = [
            (None, Some(11)),
            (Some(3), None),
            (Some(3), Some(9)),
            (Some(3), Some(13)),
        ];
        for (start, end) in windows {
            let (genomes, db) = make_sample(false);
            let got: Vec<_> = get_alignment(
                &db,
                &genomes,
                "human",
                "s1",
                start,
                end,
                seqid_namer,
                Some(&mask),
            )
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].annotations.len(), 1);
            let map = got[0].to_map();
            assert!(map["s1"].contains('?'), "({start:?}, {end:?}): {map:?}");
        }

        // check the masked residues precisely for a fully-contained window
        let (genomes, db) = make_sample(false);
        let got: Vec<_> = get_alignment(
            &db,
            &genomes,
            "human",
            "s1",
            Some(3),
            Some(9),
            seqid_namer,
            Some(&mask),
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(got[0].to_map()["s1"], "G???TA");
    }

    #[test]
    fn test_two_blocks_in_order() {
        let (genomes, db) = make_sample(true);
        let got: Vec<_> =
            get_alignment(&db, &genomes, "human", "s1", None, None, seqid_namer, None)
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].block_id, "0");
        assert_eq!(got[1].block_id, "1");
        assert_eq!(got[0].to_map(), expected_slice(1, 12));
        assert_eq!(got[1].to_map(), expected_slice(22, 30));
        // block 1 picks up the dog feature and, because the mouse genome is
        // stored reverse-complemented, the mouse feature coordinates also
        // intersect its window there
        assert_eq!(got[1].annotations.len(), 2);
    }

    #[test]
    fn test_two_blocks_single_bound() {
        // with two stored blocks, a lone bound selects only the block
        // containing that position, never the other block in full
        let cases: [(Option<i64>, Option<i64>, &str, usize, usize); 3] = [
            (Some(3), None, "0", 3, 12),
            (None, Some(11), "0", 1, 11),
            (Some(25), None, "1", 25, 30),
        ];
        for (start, end, block_id, expect_start, expect_end) in cases {
            let (genomes, db) = make_sample(true);
            let got: Vec<_> =
                get_alignment(&db, &genomes, "human", "s1", start, end, seqid_namer, None)
                    .unwrap()
                    .collect::<Result<_, _>>()
                    .unwrap();
            assert_eq!(got.len(), 1, "({start:?}, {end:?})");
            assert_eq!(got[0].block_id, block_id);
            assert_eq!(
                got[0].to_map(),
                expected_slice(expect_start, expect_end),
                "({start:?}, {end:?})"
            );
        }
    }

    #[test]
    fn test_rows_sorted_by_species_then_seqid() {
        let (genomes, db) = make_sample(false);
        let got: Vec<_> =
            get_alignment(&db, &genomes, "human", "s1", None, None, seqid_namer, None)
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();
        let species: Vec<_> = got[0].seqs.iter().map(|s| s.species.as_str()).collect();
        assert_eq!(species, vec!["dog", "human", "mouse"]);
    }

    #[test]
    fn test_empty_result_without_overlap() {
        let (genomes, db) = make_sample(false);
        let got: Vec<_> =
            get_alignment(&db, &genomes, "human", "s1", Some(12), Some(20), seqid_namer, None)
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();
        assert!(got.is_empty());
    }
}
