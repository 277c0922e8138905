use std::io::Cursor;

use log::{debug, warn};

use crate::CameraMetadata;

pub struct ExifExtractor;

impl ExifExtractor {
    /// Best-effort read of camera tags. Anything unparsable counts as absent.
    pub fn extract_from_bytes(bytes: &[u8]) -> CameraMetadata {
        let mut reader = Cursor::new(bytes);

        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif_data) => Self::parse_exif(&exif_data),
            Err(err) => {
                match err {
                    exif::Error::NotFound(_) => debug!("no EXIF data found"),
                    other => warn!("ignoring unreadable EXIF data: {other}"),
                }
                CameraMetadata::default()
            }
        }
    }

    fn parse_exif(exif: &exif::Exif) -> CameraMetadata {
        let field = |tag: exif::Tag| {
            exif.get_field(tag, exif::In::PRIMARY)
                .and_then(|f| Self::ascii_value(&f.value))
        };

        CameraMetadata {
            make: field(exif::Tag::Make),
            model: field(exif::Tag::Model),
            software: field(exif::Tag::Software),
        }
    }

    fn ascii_value(value: &exif::Value) -> Option<String> {
        let exif::Value::Ascii(parts) = value else {
            return None;
        };

        let text = parts
            .iter()
            .map(|part| String::from_utf8_lossy(part))
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());

        (!text.is_empty()).then(|| text.to_string())
    }
}
