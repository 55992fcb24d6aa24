//! Flatten an HSP service-details payload into Darwin-like location rows.
//!
//! HSP keys locations by CRS (`location`) and sends times as bare `HHMM`
//! strings; times are kept verbatim here and normalized at the matching
//! stage.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::route::Route;

/// One per-location row, plus the service-level fields every row carries.
#[derive(Debug, Clone, PartialEq)]
pub struct HspLocation {
    pub rid: String,
    pub ssd: Option<String>,
    pub toc_code: Option<String>,

    /// 1 iff the service calls at every CRS on the tracked route.
    pub is_main_journey: i64,
    /// Sorted unique comma-joined CRS list seen in this service.
    pub hsp_tpls: String,

    /// CRS code of this location.
    pub crs: String,
    /// Route TIPLOC2 when the CRS is route-canonical.
    pub tiploc2: Option<&'static str>,

    pub pta: Option<String>,
    pub ptd: Option<String>,
    pub ata: Option<String>,
    pub atd: Option<String>,
    pub late_canc_reason: Option<String>,
}

fn clean(value: Option<&Value>) -> Option<String> {
    let value = value?;
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parse `serviceAttributesDetails` into flat rows. A payload without the
/// details object, a rid, or a location list yields no rows.
pub fn extract_service_locations(payload: &Value, route: &Route) -> Vec<HspLocation> {
    let Some(sad) = payload.get("serviceAttributesDetails") else {
        return Vec::new();
    };

    let Some(rid) = clean(sad.get("rid")) else {
        return Vec::new();
    };
    let ssd = clean(sad.get("date_of_service"));
    let toc_code = clean(sad.get("toc_code"));

    let Some(locations) = sad.get("locations").and_then(Value::as_array) else {
        return Vec::new();
    };

    // Service-level coverage: which CRS codes appear at all.
    let mut seen_crs: BTreeSet<String> = BTreeSet::new();
    for loc in locations {
        if let Some(crs) = clean(loc.get("location")) {
            seen_crs.insert(crs);
        }
    }

    let route_crs = route.crs_set();
    let is_main_journey = (!route_crs.is_empty()
        && route_crs.iter().all(|crs| seen_crs.contains(crs))) as i64;
    let hsp_tpls = seen_crs.iter().cloned().collect::<Vec<_>>().join(",");

    let mut out = Vec::new();
    for loc in locations {
        let Some(crs) = clean(loc.get("location")) else {
            continue;
        };

        out.push(HspLocation {
            rid: rid.clone(),
            ssd: ssd.clone(),
            toc_code: toc_code.clone(),
            is_main_journey,
            hsp_tpls: hsp_tpls.clone(),
            tiploc2: route.tiploc2_for_crs(&crs),
            pta: clean(loc.get("gbtt_pta")),
            ptd: clean(loc.get("gbtt_ptd")),
            ata: clean(loc.get("actual_ta")),
            atd: clean(loc.get("actual_td")),
            late_canc_reason: clean(loc.get("late_canc_reason")),
            crs,
        });
    }

    out
}
