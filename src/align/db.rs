//! Persistent, indexed store of alignment block records.

use std::collections::BTreeSet;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use thiserror::Error;

use crate::align::gaps::{GapBlobError, decode_gap_spans, encode_gap_spans};
use crate::align::types::{AlignRecord, Strand};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("at least one of species or seqid is required")]
    EmptyQuery,
    #[error(transparent)]
    BadGapBlob(#[from] GapBlobError),
    #[error("unknown strand symbol {0:?}")]
    BadStrand(String),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS align (
    source TEXT NOT NULL,
    block_id TEXT NOT NULL,
    species TEXT NOT NULL,
    seqid TEXT NOT NULL,
    start INTEGER NOT NULL,
    stop INTEGER NOT NULL,
    strand TEXT NOT NULL,
    gap_spans BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS align_species_seqid ON align (species, seqid);
CREATE INDEX IF NOT EXISTS align_block_id ON align (block_id);
";

const COLUMNS: &str = "source, block_id, species, seqid, start, stop, strand, gap_spans";

/// Filter for [`AlignDb::get_records_matching`]. `species` and `seqid` match
/// exactly; `start`/`stop` select records whose `[start, stop)` interval
/// overlaps the query interval. A lone bound acts as a point query at that
/// position.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub species: Option<String>,
    pub seqid: Option<String>,
    pub start: Option<i64>,
    pub stop: Option<i64>,
}

/// Indexed table of per-(species, seqid, strand) alignment block rows.
pub struct AlignDb {
    conn: Connection,
}

impl AlignDb {
    /// Open (creating the schema if needed) a database at `path`.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::init(Connection::open(path)?)
    }

    /// Ephemeral in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Bulk insert; all-or-nothing.
    pub fn add_records(&mut self, records: &[AlignRecord]) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO align ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ))?;
            for record in records {
                stmt.execute(params![
                    record.source,
                    record.block_id,
                    record.species,
                    record.seqid,
                    record.start,
                    record.stop,
                    record.strand.as_str(),
                    encode_gap_spans(&record.gap_spans),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Records satisfying every provided field of `query`. Ordering is not
    /// guaranteed.
    pub fn get_records_matching(&self, query: &RecordQuery) -> Result<Vec<AlignRecord>, DbError> {
        if query.species.is_none() && query.seqid.is_none() {
            return Err(DbError::EmptyQuery);
        }
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(species) = &query.species {
            clauses.push("species = ?");
            values.push(Value::Text(species.clone()));
        }
        if let Some(seqid) = &query.seqid {
            clauses.push("seqid = ?");
            values.push(Value::Text(seqid.clone()));
        }
        // a lone coordinate is a point query: the missing end collapses onto
        // the supplied value
        let (start, stop) = match (query.start, query.stop) {
            (Some(start), None) => (Some(start), Some(start)),
            (None, Some(stop)) => (Some(stop), Some(stop)),
            bounds => bounds,
        };
        if let Some(start) = start {
            clauses.push("stop > ?");
            values.push(Value::Integer(start));
        }
        if let Some(stop) = stop {
            clauses.push("start < ?");
            values.push(Value::Integer(stop));
        }
        let sql = format!(
            "SELECT {COLUMNS} FROM align WHERE {}",
            clauses.join(" AND ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), read_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(into_record(row?)?);
        }
        Ok(records)
    }

    /// All participating records of one block.
    pub fn get_records_for_block(&self, block_id: &str) -> Result<Vec<AlignRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COLUMNS} FROM align WHERE block_id = ?1"))?;
        let rows = stmt.query_map(params![block_id], read_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(into_record(row?)?);
        }
        Ok(records)
    }

    /// Distinct species currently stored.
    pub fn get_species_names(&self) -> Result<BTreeSet<String>, DbError> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT species FROM align")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Distinct seqids recorded for one species, sorted.
    pub fn get_distinct_seqids(&self, species: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT seqid FROM align WHERE species = ?1 ORDER BY seqid")?;
        let rows = stmt.query_map(params![species], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn num_records(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM align", [], |row| row.get(0))?)
    }
}

type RawRow = (String, String, String, String, i64, i64, String, Vec<u8>);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_record(raw: RawRow) -> Result<AlignRecord, DbError> {
    let (source, block_id, species, seqid, start, stop, strand, blob) = raw;
    let strand = Strand::from_symbol(&strand).ok_or(DbError::BadStrand(strand))?;
    Ok(AlignRecord {
        source,
        block_id,
        species,
        seqid,
        start,
        stop,
        strand,
        gap_spans: decode_gap_spans(&blob)?,
    })
}
