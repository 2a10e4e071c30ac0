//! GFF3-derived feature annotations.

use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed GFF3 line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// An annotated feature: one or more half-open spans on the plus strand of a
/// seqid.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub seqid: String,
    pub biotype: String,
    pub name: String,
    pub spans: Vec<(i64, i64)>,
}

impl Feature {
    /// Smallest span begin.
    pub fn start(&self) -> i64 {
        self.spans.iter().map(|s| s.0).min().unwrap_or(0)
    }

    /// Largest span end.
    pub fn stop(&self) -> i64 {
        self.spans.iter().map(|s| s.1).max().unwrap_or(0)
    }

    /// Does any span intersect `[start, stop)`? A missing bound is unbounded;
    /// an empty interval intersects nothing.
    pub fn overlaps(&self, start: Option<i64>, stop: Option<i64>) -> bool {
        if let (Some(s), Some(e)) = (start, stop)
            && e <= s
        {
            return false;
        }
        self.spans.iter().any(|&(begin, end)| {
            start.map_or(true, |s| end > s) && stop.map_or(true, |e| begin < e)
        })
    }
}

/// In-memory feature store. Query results and subsets are value copies, so a
/// store attached to an alignment never aliases the source.
#[derive(Debug, Clone, Default)]
pub struct FeatureDb {
    features: Vec<Feature>,
}

impl FeatureDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Features of `seqid` intersecting `[start, stop)`, optionally limited
    /// to the given biotypes.
    pub fn query<'a>(
        &'a self,
        seqid: &'a str,
        start: Option<i64>,
        stop: Option<i64>,
        biotypes: Option<&'a [String]>,
    ) -> impl Iterator<Item = &'a Feature> {
        self.features.iter().filter(move |f| {
            f.seqid == seqid
                && f.overlaps(start, stop)
                && biotypes.map_or(true, |bs| bs.iter().any(|b| *b == f.biotype))
        })
    }

    /// A new store holding only the features of `seqid`.
    pub fn subset(&self, seqid: &str) -> FeatureDb {
        FeatureDb {
            features: self
                .features
                .iter()
                .filter(|f| f.seqid == seqid)
                .cloned()
                .collect(),
        }
    }

    /// Look up a feature by its (stable) name.
    pub fn find_by_name(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    /// Load features from a GFF3 file. Coordinates are converted from
    /// 1-based inclusive to half-open 0-based; the `type` column becomes the
    /// biotype and the name is taken from the `Name` (falling back to `ID`)
    /// attribute.
    pub fn from_gff3(path: &Path) -> Result<FeatureDb, FeatureError> {
        let content = fs::read_to_string(path)?;
        let mut db = FeatureDb::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 9 {
                return Err(FeatureError::Malformed {
                    line: number + 1,
                    reason: format!("expected 9 columns, found {}", fields.len()),
                });
            }
            let begin: i64 = fields[3].parse().map_err(|_| FeatureError::Malformed {
                line: number + 1,
                reason: format!("bad start {:?}", fields[3]),
            })?;
            let end: i64 = fields[4].parse().map_err(|_| FeatureError::Malformed {
                line: number + 1,
                reason: format!("bad end {:?}", fields[4]),
            })?;
            let name = gff3_attribute(fields[8], "Name")
                .or_else(|| gff3_attribute(fields[8], "ID"))
                .unwrap_or_else(|| format!("{}:{}:{}", fields[2], fields[0], begin));
            db.add_feature(Feature {
                seqid: fields[0].to_string(),
                biotype: fields[2].to_string(),
                name,
                spans: vec![(begin - 1, end)],
            });
        }
        Ok(db)
    }
}

fn gff3_attribute(attributes: &str, key: &str) -> Option<String> {
    attributes.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == key).then(|| v.to_string())
    })
}
