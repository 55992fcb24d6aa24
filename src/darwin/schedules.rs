//! Schedule view of a PushPort message: origin and destination endpoints.

use roxmltree::Document;

use super::{NS_SCHEDULES_V3, NS_V16};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Origin,
    Destination,
}

/// One `schedule/OR` or `schedule/DT` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEndpoint {
    pub rid: Option<String>,
    pub uid: Option<String>,
    pub ssd: Option<String>,
    pub tpl: String,
    pub kind: EndpointKind,
}

/// Extract schedule endpoints from a parsed message. Entries without a
/// `tpl` attribute are dropped.
pub fn extract(doc: &Document) -> Vec<ScheduleEndpoint> {
    let mut out = Vec::new();

    for sched in doc
        .descendants()
        .filter(|n| n.has_tag_name((NS_V16, "schedule")))
    {
        let rid = sched.attribute("rid").map(str::to_string);
        let uid = sched.attribute("uid").map(str::to_string);
        let ssd = sched.attribute("ssd").map(str::to_string);

        for node in sched.descendants().filter(|n| n.is_element()) {
            let kind = if node.has_tag_name((NS_SCHEDULES_V3, "OR")) {
                EndpointKind::Origin
            } else if node.has_tag_name((NS_SCHEDULES_V3, "DT")) {
                EndpointKind::Destination
            } else {
                continue;
            };

            let Some(tpl) = node.attribute("tpl") else {
                continue;
            };

            out.push(ScheduleEndpoint {
                rid: rid.clone(),
                uid: uid.clone(),
                ssd: ssd.clone(),
                tpl: tpl.to_string(),
                kind,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<Pport xmlns="http://www.thalesgroup.com/rtti/PushPort/v16"
      xmlns:sc="http://www.thalesgroup.com/rtti/PushPort/Schedules/v3" version="16.0">
  <uR>
    <schedule rid="202504107126273" uid="W12345" ssd="2025-04-10" toc="SW">
      <sc:OR tpl="WEYMTH" wtd="08:00" ptd="08:00"/>
      <sc:IP tpl="POOLE" wta="08:30" wtd="08:31"/>
      <sc:DT tpl="WATRLMN" wta="10:40" pta="10:41"/>
    </schedule>
  </uR>
</Pport>"#;

    #[test]
    fn extracts_or_and_dt_only() {
        let doc = Document::parse(SAMPLE).unwrap();
        let endpoints = extract(&doc);
        assert_eq!(endpoints.len(), 2);

        assert_eq!(endpoints[0].tpl, "WEYMTH");
        assert_eq!(endpoints[0].kind, EndpointKind::Origin);
        assert_eq!(endpoints[0].rid.as_deref(), Some("202504107126273"));

        assert_eq!(endpoints[1].tpl, "WATRLMN");
        assert_eq!(endpoints[1].kind, EndpointKind::Destination);
    }

    #[test]
    fn message_without_schedules_yields_empty() {
        let doc = Document::parse(r#"<Pport xmlns="http://www.thalesgroup.com/rtti/PushPort/v16"/>"#)
            .unwrap();
        assert!(extract(&doc).is_empty());
    }
}
