//! Compressed per-species genome sequence store.
//!
//! One row per seqid; the sequence is held as a zlib-deflated blob and only
//! decompressed when a query touches it.

use std::io::{Read, Write};
use std::path::Path;

use bio::alphabets::dna;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use crate::align::types::Strand;

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("unknown seqid {0:?}")]
    UnknownSeqid(String),
    #[error("coordinates [{start}, {stop}) outside {seqid:?} of length {length}")]
    OutOfRange {
        seqid: String,
        start: i64,
        stop: i64,
        length: i64,
    },
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("compressed record for {seqid:?} is corrupt: {source}")]
    Compression {
        seqid: String,
        source: std::io::Error,
    },
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS genome (
    seqid TEXT PRIMARY KEY,
    length INTEGER NOT NULL,
    seq BLOB NOT NULL
);
";

/// Read-mostly store of one species' plus-strand sequences.
#[derive(Debug)]
pub struct SequenceDb {
    conn: Connection,
    species: String,
}

impl SequenceDb {
    pub fn open(path: &Path, species: &str) -> Result<Self, SequenceError> {
        let conn = Connection::open(path)?;
        Self::init(conn, species)
    }

    /// Ephemeral store, used by ingestion tests and scratch pipelines.
    pub fn open_in_memory(species: &str) -> Result<Self, SequenceError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, species)
    }

    fn init(conn: Connection, species: &str) -> Result<Self, SequenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            species: species.to_string(),
        })
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    /// Bulk insert of (seqid, plus-strand residues); all-or-nothing.
    pub fn add_records(&mut self, records: &[(String, Vec<u8>)]) -> Result<(), SequenceError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO genome (seqid, length, seq) VALUES (?1, ?2, ?3)",
            )?;
            for (seqid, seq) in records {
                let blob = compress(seqid, seq)?;
                stmt.execute(params![seqid, seq.len() as i64, blob])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Exactly `stop - start` residues of `seqid`, reverse-complemented when
    /// `strand` is minus.
    pub fn get_substring(
        &self,
        seqid: &str,
        start: i64,
        stop: i64,
        strand: Strand,
    ) -> Result<Vec<u8>, SequenceError> {
        let (length, blob) = self.fetch(seqid)?;
        if start < 0 || stop < start || stop > length {
            return Err(SequenceError::OutOfRange {
                seqid: seqid.to_string(),
                start,
                stop,
                length,
            });
        }
        let seq = decompress(seqid, &blob, length as usize)?;
        let sub = &seq[start as usize..stop as usize];
        Ok(match strand {
            Strand::Plus => sub.to_vec(),
            Strand::Minus => dna::revcomp(sub),
        })
    }

    /// Ungapped length of `seqid`, without decompressing its record.
    pub fn seq_length(&self, seqid: &str) -> Result<i64, SequenceError> {
        self.conn
            .query_row(
                "SELECT length FROM genome WHERE seqid = ?1",
                params![seqid],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| SequenceError::UnknownSeqid(seqid.to_string()))
    }

    pub fn seqids(&self) -> Result<Vec<String>, SequenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT seqid FROM genome ORDER BY seqid")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn fetch(&self, seqid: &str) -> Result<(i64, Vec<u8>), SequenceError> {
        self.conn
            .query_row(
                "SELECT length, seq FROM genome WHERE seqid = ?1",
                params![seqid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| SequenceError::UnknownSeqid(seqid.to_string()))
    }
}

fn compress(seqid: &str, seq: &[u8]) -> Result<Vec<u8>, SequenceError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(seq)
        .and_then(|_| encoder.finish())
        .map_err(|source| SequenceError::Compression {
            seqid: seqid.to_string(),
            source,
        })
}

fn decompress(seqid: &str, blob: &[u8], length: usize) -> Result<Vec<u8>, SequenceError> {
    let mut out = Vec::with_capacity(length);
    ZlibDecoder::new(blob)
        .read_to_end(&mut out)
        .map_err(|source| SequenceError::Compression {
            seqid: seqid.to_string(),
            source,
        })?;
    Ok(out)
}
