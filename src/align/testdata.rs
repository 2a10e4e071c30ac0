//! Shared test fixtures: the canonical three-sequence sample alignment.

use std::collections::{BTreeMap, HashMap};

use crate::align::db::AlignDb;
use crate::align::gaps::gap_coords;
use crate::align::types::{AlignRecord, Strand};
use crate::genome::{Feature, FeatureDb, Genome, SequenceDb};

const S1: &str = "GTTGAAGTAGTAGAAGTTCCAAATAATGAA"; // human
const S2: &str = "GTG------GTAGAAGTTCCAAATAATGAA"; // mouse
const S3: &str = "GCTGAAGTAGTGGAAGTTGCAAAT---GAA"; // dog

fn rows() -> [(&'static str, &'static str, &'static str); 3] {
    [("s1", "human", S1), ("s2", "mouse", S2), ("s3", "dog", S3)]
}

/// Namer that labels rows with the bare seqid, so alignments compare directly
/// against slices of the master alignment.
pub fn seqid_namer(_: &str, seqid: &str, _: Strand, _: i64, _: i64) -> String {
    seqid.to_string()
}

fn ungapped(gapped: &str) -> Vec<u8> {
    gapped.bytes().filter(|b| *b != b'-').collect()
}

/// Records for the block covering master alignment columns `[start, stop)`.
pub fn make_records(start: usize, stop: usize, block_id: &str) -> Vec<AlignRecord> {
    rows()
        .iter()
        .map(|(seqid, species, gapped)| {
            let bytes = gapped.as_bytes();
            let (spans, seq) = gap_coords(&bytes[start..stop]);
            let seq_start = bytes[..start].iter().filter(|b| **b != b'-').count() as i64;
            AlignRecord {
                source: "blah".to_string(),
                block_id: block_id.to_string(),
                species: (*species).to_string(),
                seqid: (*seqid).to_string(),
                start: seq_start,
                stop: seq_start + seq.len() as i64,
                strand: Strand::Plus,
                gap_spans: spans,
            }
        })
        .collect()
}

fn master_features() -> FeatureDb {
    let mut db = FeatureDb::new();
    db.add_feature(Feature {
        seqid: "s1".to_string(),
        biotype: "gene".to_string(),
        name: "not-on-s2".to_string(),
        spans: vec![(4, 7)],
    });
    db.add_feature(Feature {
        seqid: "s2".to_string(),
        biotype: "gene".to_string(),
        name: "includes-s2-gap".to_string(),
        spans: vec![(2, 6)],
    });
    db.add_feature(Feature {
        seqid: "s3".to_string(),
        biotype: "gene".to_string(),
        name: "includes-s3-gap".to_string(),
        spans: vec![(22, 27)],
    });
    db
}

/// Genomes for the sample; the mouse genome is stored reverse-complemented
/// when `rc_s2` is set.
pub fn make_genomes(rc_s2: bool, with_annots: bool) -> HashMap<String, Genome> {
    let features = master_features();
    rows()
        .iter()
        .map(|(seqid, species, gapped)| {
            let mut stored = ungapped(gapped);
            if rc_s2 && *seqid == "s2" {
                stored = bio::alphabets::dna::revcomp(&stored);
            }
            let mut seqs = SequenceDb::open_in_memory(species).unwrap();
            seqs.add_records(&[((*seqid).to_string(), stored)]).unwrap();
            let annots = with_annots.then(|| features.subset(seqid));
            ((*species).to_string(), Genome::new(species, seqs, annots))
        })
        .collect()
}

/// Flip each s2 record onto the minus strand of the rc-stored genome.
fn rc_s2_records(records: &mut [AlignRecord]) {
    let length = ungapped(S2).len() as i64;
    for record in records {
        if record.seqid == "s2" {
            (record.start, record.stop) = (length - record.stop, length - record.start);
            record.strand = Strand::Minus;
        }
    }
}

/// The standard sample: block "0" over columns [1, 12) (plus block "1" over
/// [22, 30) when `two_aligns`), annotated genomes, mouse stored rc.
pub fn make_sample(two_aligns: bool) -> (HashMap<String, Genome>, AlignDb) {
    let mut records = make_records(1, 12, "0");
    if two_aligns {
        records.extend(make_records(22, 30, "1"));
    }
    rc_s2_records(&mut records);
    let mut db = AlignDb::open_in_memory().unwrap();
    db.add_records(&records).unwrap();
    (make_genomes(true, true), db)
}

/// Master alignment columns `[start, stop)` keyed by seqid.
pub fn expected_slice(start: usize, stop: usize) -> BTreeMap<String, String> {
    rows()
        .iter()
        .map(|(seqid, _, gapped)| ((*seqid).to_string(), gapped[start..stop].to_string()))
        .collect()
}
