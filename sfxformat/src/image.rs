//! Self-extracting image layout: stub, marker, command record, payload.

use std::io::Write;

use memchr::memmem;
use tracing::debug;

use crate::{
    config::{CommandConfig, CONFIG_SIZE},
    Error, Result,
};

/// Separates the stub executable from the embedded data. The terminating
/// NUL is part of the marker.
pub const MARKER: &[u8; 32] = b"ARCHIVE_DATA_START_MARKER_12345\0";
pub const MARKER_SIZE: usize = MARKER.len();
/// Bytes between the end of the stub and the start of the container.
pub const TRAILER_SIZE: usize = MARKER_SIZE + CONFIG_SIZE + 8;

/// Data found behind the marker of a self-extracting image.
#[derive(Debug)]
pub struct EmbeddedPayload<'a> {
    /// Offset of the marker, which is also the size of the stub.
    pub marker_offset: usize,
    pub config:        CommandConfig,
    /// The embedded container.
    pub payload:       &'a [u8],
}

/// Writes a complete self-extracting image and returns its size.
pub fn write_image<W: Write>(writer: &mut W, stub: &[u8], config: &CommandConfig, payload: &[u8]) -> Result<u64> {
    writer.write_all(stub)?;
    writer.write_all(MARKER)?;
    writer.write_all(&config.to_bytes())?;
    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(payload)?;
    Ok((stub.len() + TRAILER_SIZE + payload.len()) as u64)
}

/// Finds the embedded data in an image.
///
/// The image is searched backwards. A marker only counts when its declared
/// payload length ends exactly at the end of the image, so marker bytes
/// appearing inside the stub or the payload are passed over.
pub fn locate(image: &[u8]) -> Result<EmbeddedPayload<'_>> {
    let finder = memmem::FinderRev::new(MARKER);
    let mut end = image.len();
    while let Some(offset) = finder.rfind(&image[..end]) {
        if let Some(found) = parse_trailer(image, offset) {
            debug!(offset, payload = found.payload.len(), "found payload marker");
            return Ok(found);
        }
        debug!(offset, "skipping inconsistent payload marker");
        end = offset;
    }
    Err(Error::MissingMarker)
}

fn parse_trailer(image: &[u8], offset: usize) -> Option<EmbeddedPayload<'_>> {
    let config_start = offset + MARKER_SIZE;
    let length_start = config_start + CONFIG_SIZE;
    let payload_start = offset + TRAILER_SIZE;
    if payload_start > image.len() {
        return None;
    }
    let config: &[u8; CONFIG_SIZE] = image[config_start..length_start].try_into().ok()?;
    let length = u64::from_le_bytes(image[length_start..payload_start].try_into().ok()?);
    if length != (image.len() - payload_start) as u64 {
        return None;
    }
    Some(EmbeddedPayload {
        marker_offset: offset,
        config:        CommandConfig::from_bytes(config),
        payload:       &image[payload_start..],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(stub: &[u8], config: &CommandConfig, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let size = write_image(&mut out, stub, config, payload).unwrap();
        assert_eq!(size, out.len() as u64);
        out
    }

    #[test]
    fn test_layout() {
        assert_eq!(MARKER_SIZE, 32);
        assert_eq!(TRAILER_SIZE, 32 + 1282 + 8);

        let data = image(b"STUB", &CommandConfig::default(), b"payload");
        assert_eq!(&data[..4], b"STUB");
        assert_eq!(&data[4..36], MARKER);
        let length_at = 4 + 32 + 1282;
        assert_eq!(&data[length_at..length_at + 8], &7u64.to_le_bytes());
        assert_eq!(&data[length_at + 8..], b"payload");
    }

    #[test]
    fn test_locate() {
        let config = CommandConfig {
            command: "setup.exe".into(),
            arguments: "/quiet".into(),
            ..Default::default()
        };
        let data = image(b"\x7fELF stub bytes", &config, b"container bytes");
        let found = locate(&data).unwrap();
        assert_eq!(found.marker_offset, 15);
        assert_eq!(found.config, config);
        assert_eq!(found.payload, b"container bytes");
    }

    #[test]
    fn test_empty_command_and_payload() {
        let data = image(b"stub", &CommandConfig::default(), b"");
        let found = locate(&data).unwrap();
        assert!(!found.config.has_command());
        assert!(found.payload.is_empty());
    }

    #[test]
    fn test_marker_inside_stub() {
        // stubs carry the marker constant in their own data
        let mut stub = b"code".to_vec();
        stub.extend_from_slice(MARKER);
        stub.extend_from_slice(&[0u8; 100]);
        let data = image(&stub, &CommandConfig::default(), b"real payload");
        let found = locate(&data).unwrap();
        assert_eq!(found.marker_offset, stub.len());
        assert_eq!(found.payload, b"real payload");
    }

    #[test]
    fn test_marker_inside_payload() {
        let mut payload = b"head".to_vec();
        payload.extend_from_slice(MARKER);
        payload.extend_from_slice(b"tail");
        let data = image(b"stub", &CommandConfig::default(), &payload);
        let found = locate(&data).unwrap();
        assert_eq!(found.marker_offset, 4);
        assert_eq!(found.payload, payload.as_slice());
    }

    #[test]
    fn test_missing_marker() {
        assert!(matches!(locate(b"plain executable"), Err(Error::MissingMarker)));
        assert!(matches!(locate(b""), Err(Error::MissingMarker)));

        // marker present but the trailer is cut short
        let mut data = b"stub".to_vec();
        data.extend_from_slice(MARKER);
        data.extend_from_slice(&[0u8; 10]);
        assert!(matches!(locate(&data), Err(Error::MissingMarker)));
    }

    #[test]
    fn test_truncated_image() {
        let mut data = image(b"stub", &CommandConfig::default(), b"payload");
        data.pop();
        assert!(matches!(locate(&data), Err(Error::MissingMarker)));
    }
}
