//! The tracked route: ordered station-to-station segments for a single
//! journey direction (Weymouth towards London Waterloo).
//!
//! Codes are TIPLOC2 values. Reverse pairs are intentionally not included;
//! the direction filter relies on this asymmetry.

use std::collections::{HashMap, HashSet};

use crate::stations::StationTable;

/// Ordered pairs, in journey order. Do not reverse.
pub const STATION_PAIRS: [(&str, &str); 19] = [
    ("WEYMTH", "UPWEY"),
    ("UPWEY", "DRCHS"),
    ("DRCHS", "WOOL"),
    ("WOOL", "WARHAM"),
    ("WARHAM", "HMWTHY"),
    ("HMWTHY", "POOLE"),
    ("POOLE", "PSTONE"),
    ("PSTONE", "BRANKSM"),
    ("BRANKSM", "BOMO"),
    ("BOMO", "POKSDWN"),
    ("POKSDWN", "CHRISTC"),
    ("CHRISTC", "NMILTON"),
    ("NMILTON", "BKNHRST"),
    ("BKNHRST", "SOTON"),
    ("SOTON", "SOTPKWY"),
    ("SOTPKWY", "WNCHSTR"),
    ("WNCHSTR", "BSNGSTK"),
    ("BSNGSTK", "CLPHMJM"),
    ("CLPHMJM", "WATRLMN"),
];

/// Route data derived once at startup from the station pairs and the
/// reference table. Injected into every component that needs it; nothing
/// here does I/O after construction.
#[derive(Debug, Clone)]
pub struct Route {
    stations: Vec<&'static str>,
    pair_set: HashSet<(&'static str, &'static str)>,
    tiploc2_to_crs: HashMap<&'static str, String>,
    crs_to_tiploc2: HashMap<String, &'static str>,
    crs_set: HashSet<String>,
}

impl Route {
    /// Build the derived maps. CRS codes missing from the reference table
    /// simply do not appear in the maps; if a CRS occurs at more than one
    /// route station, the first occurrence in journey order wins.
    pub fn from_table(table: &StationTable) -> Self {
        let mut stations: Vec<&'static str> = vec![STATION_PAIRS[0].0];
        for (_, b) in STATION_PAIRS {
            stations.push(b);
        }

        let pair_set: HashSet<(&'static str, &'static str)> =
            STATION_PAIRS.iter().copied().collect();

        let mut tiploc2_to_crs = HashMap::new();
        let mut crs_to_tiploc2: HashMap<String, &'static str> = HashMap::new();
        let mut crs_set = HashSet::new();

        for &t2 in &stations {
            if let Some(crs) = table.crs_by_tiploc2(t2) {
                tiploc2_to_crs.insert(t2, crs.to_string());
                crs_to_tiploc2.entry(crs.to_string()).or_insert(t2);
                crs_set.insert(crs.to_string());
            }
        }

        Self {
            stations,
            pair_set,
            tiploc2_to_crs,
            crs_to_tiploc2,
            crs_set,
        }
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        STATION_PAIRS.iter().copied()
    }

    pub fn is_tracked_pair(&self, first: &str, second: &str) -> bool {
        self.pair_set.contains(&(first, second))
    }

    /// Stations in journey order (A of the first pair, then B of each pair).
    pub fn stations(&self) -> &[&'static str] {
        &self.stations
    }

    pub fn origin(&self) -> &'static str {
        self.stations[0]
    }

    pub fn destination(&self) -> &'static str {
        self.stations[self.stations.len() - 1]
    }

    pub fn crs_for(&self, tiploc2: &str) -> Option<&str> {
        self.tiploc2_to_crs.get(tiploc2).map(|s| s.as_str())
    }

    /// Route-canonical CRS -> TIPLOC2 mapping.
    pub fn tiploc2_for_crs(&self, crs: &str) -> Option<&'static str> {
        self.crs_to_tiploc2.get(crs).copied()
    }

    /// All CRS codes on the route, used for the main-journey test.
    pub fn crs_set(&self) -> &HashSet<String> {
        &self.crs_set
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// CRS codes for the route stations, for tests.
    pub const ROUTE_CRS: [(&str, &str); 20] = [
        ("WEYMTH", "WEY"),
        ("UPWEY", "UPW"),
        ("DRCHS", "DCH"),
        ("WOOL", "WOO"),
        ("WARHAM", "WRM"),
        ("HMWTHY", "HAM"),
        ("POOLE", "POO"),
        ("PSTONE", "PKS"),
        ("BRANKSM", "BSM"),
        ("BOMO", "BMH"),
        ("POKSDWN", "POK"),
        ("CHRISTC", "CHR"),
        ("NMILTON", "NWM"),
        ("BKNHRST", "BCU"),
        ("SOTON", "SOU"),
        ("SOTPKWY", "SOA"),
        ("WNCHSTR", "WIN"),
        ("BSNGSTK", "BSK"),
        ("CLPHMJM", "CLJ"),
        ("WATRLMN", "WAT"),
    ];

    pub fn route() -> Route {
        let mut csv = String::from("NAME,TIPLOC,TIPLOC2,CRS\n");
        for (t2, crs) in ROUTE_CRS {
            csv.push_str(&format!("{t2},{t2},{t2},{crs}\n"));
        }
        let table = StationTable::from_reader(csv.as_bytes()).unwrap();
        Route::from_table(&table)
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::route;
    use super::*;

    #[test]
    fn stations_follow_pair_order() {
        let r = route();
        assert_eq!(r.stations().len(), STATION_PAIRS.len() + 1);
        assert_eq!(r.origin(), "WEYMTH");
        assert_eq!(r.destination(), "WATRLMN");
        assert_eq!(r.stations()[1], "UPWEY");
    }

    #[test]
    fn tracked_pairs_are_directional() {
        let r = route();
        assert!(r.is_tracked_pair("SOTON", "SOTPKWY"));
        assert!(!r.is_tracked_pair("SOTPKWY", "SOTON"));
        assert!(!r.is_tracked_pair("WEYMTH", "DRCHS"));
    }

    #[test]
    fn crs_maps_are_route_canonical() {
        let r = route();
        assert_eq!(r.crs_for("UPWEY"), Some("UPW"));
        assert_eq!(r.tiploc2_for_crs("UPW"), Some("UPWEY"));
        assert_eq!(r.tiploc2_for_crs("ZZZ"), None);
        assert_eq!(r.crs_set().len(), 20);
    }

    #[test]
    fn missing_reference_rows_leave_gaps() {
        // A table that only knows two of the route stations.
        let csv = "NAME,TIPLOC,TIPLOC2,CRS\nWeymouth,WEYMTH,WEYMTH,WEY\nUpwey,UPWEY,UPWEY,UPW\n";
        let table = StationTable::from_reader(csv.as_bytes()).unwrap();
        let r = Route::from_table(&table);
        assert_eq!(r.crs_for("WEYMTH"), Some("WEY"));
        assert_eq!(r.crs_for("POOLE"), None);
        assert_eq!(r.crs_set().len(), 2);
    }
}
