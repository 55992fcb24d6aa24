//! Frame decoding: decompress a PushPort body and parse both XML views.

use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};
use roxmltree::Document;
use thiserror::Error;

use super::forecasts::{self, ForecastLocation};
use super::schedules::{self, ScheduleEndpoint};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Decompression error: {0}")]
    Decompress(#[from] std::io::Error),
    #[error("Frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Both views of one decoded frame.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub forecasts: Vec<ForecastLocation>,
    pub schedules: Vec<ScheduleEndpoint>,
}

/// Decompress a frame body. Darwin frames are zlib-deflated and sometimes
/// gzip-wrapped; the gzip magic bytes select the right decoder.
pub fn decompress_body(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    if body.starts_with(&[0x1f, 0x8b]) {
        GzDecoder::new(body).read_to_end(&mut out)?;
    } else {
        ZlibDecoder::new(body).read_to_end(&mut out)?;
    }
    Ok(out)
}

/// Decompress and parse one frame into forecast and schedule records.
pub fn decode_message(body: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let xml_bytes = decompress_body(body)?;
    let xml = std::str::from_utf8(&xml_bytes)?;
    let doc = Document::parse(xml)?;

    Ok(DecodedMessage {
        forecasts: forecasts::extract(&doc),
        schedules: schedules::extract(&doc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    const SAMPLE: &str = r#"<Pport xmlns="http://www.thalesgroup.com/rtti/PushPort/v16"
      xmlns:fc="http://www.thalesgroup.com/rtti/PushPort/Forecasts/v3"
      xmlns:sc="http://www.thalesgroup.com/rtti/PushPort/Schedules/v3" version="16.0">
  <uR>
    <schedule rid="X1" ssd="2025-04-10">
      <sc:OR tpl="WEYMTH"/>
      <sc:DT tpl="WATRLMN"/>
    </schedule>
    <TS rid="X1" ssd="2025-04-10">
      <fc:Location tpl="SOTON" ptd="09:00">
        <fc:dep et="09:03"/>
      </fc:Location>
    </TS>
  </uR>
</Pport>"#;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn decodes_zlib_frame() {
        let msg = decode_message(&zlib(SAMPLE.as_bytes())).unwrap();
        assert_eq!(msg.forecasts.len(), 1);
        assert_eq!(msg.schedules.len(), 2);
        assert_eq!(msg.forecasts[0].dep_et.as_deref(), Some("09:03"));
    }

    #[test]
    fn decodes_gzip_wrapped_frame() {
        let msg = decode_message(&gzip(SAMPLE.as_bytes())).unwrap();
        assert_eq!(msg.forecasts.len(), 1);
        assert_eq!(msg.schedules.len(), 2);
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(decode_message(b"definitely not compressed").is_err());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = decode_message(&zlib(b"<Pport><unclosed>")).unwrap_err();
        assert!(matches!(err, DecodeError::Xml(_)));
    }
}
