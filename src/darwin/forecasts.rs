//! Forecast view of a PushPort message: one record per `TS/Location`.

use std::collections::HashMap;

use roxmltree::Document;

use super::{NS_FORECASTS_V3, NS_V16};

/// A per-location forecast snapshot.
///
/// Times are optional strings exactly as transmitted. `pta/ptd/wta/wtd`
/// and `eta/etd/ata/atd` come from `Location` attributes; `arr_*`/`dep_*`
/// come from the attributes of empty `<arr>`/`<dep>` child elements.
/// Child elements with text (`plat`, `length`, reasons) land in `extra`;
/// an empty child also sets `state` to its tag name, which is how
/// cancellations and similar markers surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastLocation {
    pub rid: Option<String>,
    pub uid: Option<String>,
    pub ssd: Option<String>,
    pub update_origin: Option<String>,
    pub tpl: Option<String>,

    pub pta: Option<String>,
    pub ptd: Option<String>,
    pub wta: Option<String>,
    pub wtd: Option<String>,

    pub eta: Option<String>,
    pub etd: Option<String>,
    pub ata: Option<String>,
    pub atd: Option<String>,

    pub arr_at: Option<String>,
    pub arr_et: Option<String>,
    pub arr_wet: Option<String>,
    pub dep_at: Option<String>,
    pub dep_et: Option<String>,

    pub state: Option<String>,
    pub extra: HashMap<String, String>,
}

impl ForecastLocation {
    fn set(&mut self, key: &str, value: &str) {
        let value = value.to_string();
        match key {
            "tpl" => self.tpl = Some(value),
            "pta" => self.pta = Some(value),
            "ptd" => self.ptd = Some(value),
            "wta" => self.wta = Some(value),
            "wtd" => self.wtd = Some(value),
            "eta" => self.eta = Some(value),
            "etd" => self.etd = Some(value),
            "ata" => self.ata = Some(value),
            "atd" => self.atd = Some(value),
            "arr_at" => self.arr_at = Some(value),
            "arr_et" => self.arr_et = Some(value),
            "arr_wet" => self.arr_wet = Some(value),
            "dep_at" => self.dep_at = Some(value),
            "dep_et" => self.dep_et = Some(value),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
    }
}

/// Extract all `TS/Location` forecast records from a parsed message.
pub fn extract(doc: &Document) -> Vec<ForecastLocation> {
    let mut out = Vec::new();

    for ts in doc
        .descendants()
        .filter(|n| n.has_tag_name((NS_V16, "TS")))
    {
        let rid = ts.attribute("rid").map(str::to_string);
        let uid = ts.attribute("uid").map(str::to_string);
        let ssd = ts.attribute("ssd").map(str::to_string);
        let update_origin = ts.attribute("updateOrigin").map(str::to_string);

        for loc in ts
            .descendants()
            .filter(|n| n.has_tag_name((NS_FORECASTS_V3, "Location")))
        {
            let mut item = ForecastLocation {
                rid: rid.clone(),
                uid: uid.clone(),
                ssd: ssd.clone(),
                update_origin: update_origin.clone(),
                ..Default::default()
            };

            for attr in loc.attributes() {
                item.set(attr.name(), attr.value());
            }

            for child in loc.children().filter(|n| n.is_element()) {
                let tag = child.tag_name().name();
                match child.text().map(str::trim).filter(|t| !t.is_empty()) {
                    Some(text) => item.set(tag, text),
                    None => {
                        // Empty sub-element: its tag is a state marker and
                        // its attributes become "<tag>_<attr>" keys. This is
                        // where arr_et/arr_at/dep_et/dep_at come from.
                        item.state = Some(tag.to_string());
                        for attr in child.attributes() {
                            item.set(&format!("{}_{}", tag, attr.name()), attr.value());
                        }
                    }
                }
            }

            out.push(item);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<Pport xmlns="http://www.thalesgroup.com/rtti/PushPort/v16"
      xmlns:fc="http://www.thalesgroup.com/rtti/PushPort/Forecasts/v3"
      ts="2025-04-10T09:01:00.0000000+01:00" version="16.0">
  <uR updateOrigin="TD">
    <TS rid="202504107126273" uid="W12345" ssd="2025-04-10">
      <fc:Location tpl="SOTON" pta="08:59" ptd="09:00" wta="08:59:30" wtd="09:00">
        <fc:arr et="09:02" wet="09:01"/>
        <fc:dep et="09:03"/>
        <fc:plat>4</fc:plat>
      </fc:Location>
      <fc:Location tpl="SOTPKWY" pta="09:15" ptd="09:16"/>
    </TS>
  </uR>
</Pport>"#;

    #[test]
    fn extracts_locations_with_ts_attributes() {
        let doc = Document::parse(SAMPLE).unwrap();
        let locs = extract(&doc);
        assert_eq!(locs.len(), 2);

        let soton = &locs[0];
        assert_eq!(soton.rid.as_deref(), Some("202504107126273"));
        assert_eq!(soton.ssd.as_deref(), Some("2025-04-10"));
        assert_eq!(soton.update_origin.as_deref(), Some("TD"));
        assert_eq!(soton.tpl.as_deref(), Some("SOTON"));
        assert_eq!(soton.ptd.as_deref(), Some("09:00"));
        assert_eq!(soton.wta.as_deref(), Some("08:59:30"));
    }

    #[test]
    fn empty_children_become_state_and_prefixed_keys() {
        let doc = Document::parse(SAMPLE).unwrap();
        let locs = extract(&doc);

        let soton = &locs[0];
        assert_eq!(soton.arr_et.as_deref(), Some("09:02"));
        assert_eq!(soton.arr_wet.as_deref(), Some("09:01"));
        assert_eq!(soton.dep_et.as_deref(), Some("09:03"));
        assert_eq!(soton.arr_at, None);
        // Last empty child wins the state slot (dep after arr here).
        assert_eq!(soton.state.as_deref(), Some("dep"));
        // Text-bearing children land in the overflow map.
        assert_eq!(soton.extra.get("plat").map(String::as_str), Some("4"));
    }

    #[test]
    fn locations_without_children_have_no_state() {
        let doc = Document::parse(SAMPLE).unwrap();
        let locs = extract(&doc);
        let pkwy = &locs[1];
        assert_eq!(pkwy.tpl.as_deref(), Some("SOTPKWY"));
        assert_eq!(pkwy.state, None);
        assert!(pkwy.extra.is_empty());
    }

    #[test]
    fn no_ts_elements_yields_empty() {
        let doc = Document::parse(r#"<Pport xmlns="http://www.thalesgroup.com/rtti/PushPort/v16"/>"#)
            .unwrap();
        assert!(extract(&doc).is_empty());
    }
}
