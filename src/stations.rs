//! Station reference table.
//!
//! A read-only CSV mapping between the three station code systems
//! (`NAME, TIPLOC, TIPLOC2, CRS`). Codes are uppercased, names trimmed.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Station table missing column: {0}")]
    MissingColumn(&'static str),
}

#[derive(Debug, Clone)]
pub struct Station {
    pub name: String,
    pub tiploc: String,
    pub tiploc2: String,
    pub crs: String,
}

/// The loaded reference table, indexed by TIPLOC2 (first occurrence wins).
#[derive(Debug, Clone)]
pub struct StationTable {
    stations: Vec<Station>,
    by_tiploc2: HashMap<String, usize>,
}

impl StationTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StationError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StationError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();

        let idx_name = headers
            .iter()
            .position(|h| h == "NAME")
            .ok_or(StationError::MissingColumn("NAME"))?;
        let idx_tiploc = headers
            .iter()
            .position(|h| h == "TIPLOC")
            .ok_or(StationError::MissingColumn("TIPLOC"))?;
        let idx_tiploc2 = headers
            .iter()
            .position(|h| h == "TIPLOC2")
            .ok_or(StationError::MissingColumn("TIPLOC2"))?;
        let idx_crs = headers
            .iter()
            .position(|h| h == "CRS")
            .ok_or(StationError::MissingColumn("CRS"))?;

        let mut stations = Vec::new();
        let mut by_tiploc2 = HashMap::new();
        let mut skipped = 0usize;

        for result in rdr.records() {
            let record = result?;
            let tiploc2 = code(record.get(idx_tiploc2).unwrap_or(""));
            if tiploc2.is_empty() {
                skipped += 1;
                continue;
            }

            let station = Station {
                name: record.get(idx_name).unwrap_or("").trim().to_string(),
                tiploc: code(record.get(idx_tiploc).unwrap_or("")),
                tiploc2: tiploc2.clone(),
                crs: code(record.get(idx_crs).unwrap_or("")),
            };

            by_tiploc2.entry(tiploc2).or_insert(stations.len());
            stations.push(station);
        }

        if skipped > 0 {
            warn!(skipped, "Skipped station records with empty TIPLOC2");
        }

        Ok(Self { stations, by_tiploc2 })
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    fn get_by_tiploc2(&self, tiploc2: &str) -> Option<&Station> {
        let key = code(tiploc2);
        self.by_tiploc2.get(&key).map(|&i| &self.stations[i])
    }

    pub fn crs_by_tiploc2(&self, tiploc2: &str) -> Option<&str> {
        self.get_by_tiploc2(tiploc2)
            .map(|s| s.crs.as_str())
            .filter(|c| !c.is_empty())
    }

    pub fn name_by_tiploc2(&self, tiploc2: &str) -> Option<&str> {
        self.get_by_tiploc2(tiploc2)
            .map(|s| s.name.as_str())
            .filter(|n| !n.is_empty())
    }

    pub fn tiploc_by_tiploc2(&self, tiploc2: &str) -> Option<&str> {
        self.get_by_tiploc2(tiploc2)
            .map(|s| s.tiploc.as_str())
            .filter(|t| !t.is_empty())
    }
}

fn code(value: &str) -> String {
    value.trim().to_uppercase()
}
