//! Materialize alignments to per-block FASTA files.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;

use bio::io::fasta;
use log::{info, warn};

use crate::align::builder::{AlignError, default_namer, get_alignment};
use crate::align::db::AlignDb;
use crate::align::types::Alignment;
use crate::genome::Genome;

/// Options for [`write_alignments`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Maximum number of alignments to write.
    pub limit: Option<usize>,
    /// Biotypes to mask in the output.
    pub mask_features: Option<Vec<String>>,
    /// Stable feature names to restrict output to; resolved against the
    /// reference genome's annotations.
    pub stableids: Option<Vec<String>>,
    /// Log each file as it is written.
    pub show_progress: bool,
}

/// Write one FASTA file per alignment under `outdir`.
///
/// With `stableids`, only alignments overlapping the named features are
/// written; otherwise every block of `ref_species` in the database is.
/// File names derive from the block id and reference coordinates, so re-runs
/// overwrite their previous output. Returns the number written.
pub fn write_alignments(
    align_db: &AlignDb,
    genomes: &HashMap<String, Genome>,
    outdir: &Path,
    ref_species: &str,
    options: &WriteOptions,
) -> Result<usize, AlignError> {
    let genome = genomes
        .get(ref_species)
        .ok_or_else(|| AlignError::UnknownSpecies(ref_species.to_string()))?;
    fs::create_dir_all(outdir)?;

    let mut windows: Vec<(String, Option<i64>, Option<i64>)> = Vec::new();
    if let Some(stableids) = &options.stableids {
        for stableid in stableids {
            let feature = genome
                .annots
                .as_ref()
                .and_then(|db| db.find_by_name(stableid));
            match feature {
                Some(feature) => windows.push((
                    feature.seqid.clone(),
                    Some(feature.start()),
                    Some(feature.stop()),
                )),
                None => warn!("stableid {stableid:?} not found for {ref_species}; skipping"),
            }
        }
    } else {
        for seqid in align_db.get_distinct_seqids(ref_species)? {
            windows.push((seqid, None, None));
        }
    }

    let mask = options.mask_features.as_deref();
    let mut written = 0usize;
    'windows: for (seqid, start, stop) in windows {
        let alignments = get_alignment(
            align_db,
            genomes,
            ref_species,
            &seqid,
            start,
            stop,
            default_namer,
            mask,
        )?;
        for alignment in alignments {
            if options.limit.is_some_and(|limit| written >= limit) {
                break 'windows;
            }
            let alignment = alignment?;
            let path = outdir.join(filename(&alignment, ref_species));
            write_fasta(&alignment, &path)?;
            written += 1;
            if options.show_progress {
                info!("wrote {}", path.display());
            }
        }
    }
    Ok(written)
}

/// Deterministic output name from the block id and reference row coordinates.
fn filename(alignment: &Alignment, ref_species: &str) -> String {
    let block = sanitize(&alignment.block_id);
    match alignment.species_row(ref_species) {
        Some(row) => format!(
            "{block}-{}-{}-{}.fa",
            sanitize(&row.seqid),
            row.start,
            row.stop
        ),
        None => format!("{block}.fa"),
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn write_fasta(alignment: &Alignment, path: &Path) -> Result<(), AlignError> {
    let mut writer = fasta::Writer::new(File::create(path)?);
    for row in &alignment.seqs {
        writer.write(&row.name, None, &row.seq)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::testdata::make_sample;

    fn list_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn read_fasta(path: &Path) -> Vec<(String, String)> {
        let reader = fasta::Reader::new(File::open(path).unwrap());
        reader
            .records()
            .map(|record| {
                let record = record.unwrap();
                (
                    record.id().to_string(),
                    String::from_utf8_lossy(record.seq()).into_owned(),
                )
            })
            .collect()
    }

    #[test]
    fn test_write_alignments_stableids() {
        let (genomes, db) = make_sample(true);
        let outdir = tempfile::tempdir().unwrap();
        let written = write_alignments(
            &db,
            &genomes,
            outdir.path(),
            "human",
            &WriteOptions {
                stableids: Some(vec!["not-on-s2".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(written, 1);
        let files = list_files(outdir.path());
        assert_eq!(files, vec!["0-s1-4-7.fa"]);
        let records = read_fasta(&outdir.path().join(&files[0]));
        assert_eq!(records.len(), 3);
        // the feature window covers columns [4, 7) of the master alignment
        let seqs: Vec<&str> = records.iter().map(|(_, seq)| seq.as_str()).collect();
        assert!(seqs.contains(&"AAG"));
        assert!(seqs.contains(&"---"));
    }

    #[test]
    fn test_write_alignments_whole_db() {
        let (genomes, db) = make_sample(true);
        let outdir = tempfile::tempdir().unwrap();
        let options = WriteOptions::default();
        let written =
            write_alignments(&db, &genomes, outdir.path(), "human", &options).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            list_files(outdir.path()),
            vec!["0-s1-1-12.fa", "1-s1-22-30.fa"]
        );

        // re-runs overwrite rather than accumulate
        let written =
            write_alignments(&db, &genomes, outdir.path(), "human", &options).unwrap();
        assert_eq!(written, 2);
        assert_eq!(list_files(outdir.path()).len(), 2);
    }

    #[test]
    fn test_write_alignments_limit() {
        let (genomes, db) = make_sample(true);
        let outdir = tempfile::tempdir().unwrap();
        let written = write_alignments(
            &db,
            &genomes,
            outdir.path(),
            "human",
            &WriteOptions {
                limit: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(written, 1);
        assert_eq!(list_files(outdir.path()).len(), 1);
    }

    #[test]
    fn test_write_alignments_unknown_stableid() {
        let (genomes, db) = make_sample(false);
        let outdir = tempfile::tempdir().unwrap();
        let written = write_alignments(
            &db,
            &genomes,
            outdir.path(),
            "human",
            &WriteOptions {
                stableids: Some(vec!["no-such-gene".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(written, 0);
    }
}
