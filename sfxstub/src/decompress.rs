use std::{io::Cursor, path::Path};

use sfxformat::{
    container::extract_stream,
    image::locate,
    CommandConfig, ExtractPolicy, ExtractSummary, Result,
};
use tracing::{debug, info};

/// What the stub found and wrote.
#[derive(Debug)]
pub struct Unpacked {
    pub config:  CommandConfig,
    pub summary: ExtractSummary,
}

/// Finds the container embedded in `image` and extracts it into
/// `output_dir`.
///
/// Entries that fail to extract are logged and skipped so one bad entry
/// does not cost the rest of the payload.
pub fn unpack(image: &[u8], output_dir: &Path) -> Result<Unpacked> {
    let embedded = locate(image)?;
    debug!(
        stub = embedded.marker_offset,
        payload = embedded.payload.len(),
        "located payload"
    );
    info!(output = %output_dir.display(), "extracting");
    let summary = extract_stream(&mut Cursor::new(embedded.payload), output_dir, ExtractPolicy::SkipEntry)?;
    info!(
        extracted = summary.extracted,
        failed = summary.failed,
        truncated = summary.truncated,
        "extraction finished"
    );
    Ok(Unpacked {
        config: embedded.config,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use sfxformat::{
        container::{write_files, write_preamble},
        image::write_image,
        CompressionLevel, Error,
    };

    use super::*;

    fn payload(files: &[PathBuf]) -> Vec<u8> {
        let mut payload = Vec::new();
        write_preamble(&mut payload).unwrap();
        write_files(&mut payload, files, CompressionLevel::Normal, |_| {}).unwrap();
        payload
    }

    fn image(config: &CommandConfig, payload: &[u8]) -> Vec<u8> {
        let mut image = Vec::new();
        write_image(&mut image, b"stub executable", config, payload).unwrap();
        image
    }

    #[test]
    fn test_unpack() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        fs::create_dir_all(input.join("data")).unwrap();
        let files = [input.join("setup.sh"), input.join("data").join("values.txt")];
        fs::write(&files[0], "#!/bin/sh\necho installed\n").unwrap();
        fs::write(&files[1], "1 2 3\n".repeat(40)).unwrap();

        let config = CommandConfig {
            command: "sh".into(),
            arguments: "setup.sh".into(),
            ..Default::default()
        };
        let output = dir.path().join("output");
        let unpacked = unpack(&image(&config, &payload(&files)), &output).unwrap();
        assert_eq!(unpacked.config, config);
        assert_eq!(unpacked.summary.extracted, 2);
        assert_eq!(unpacked.summary.failed, 0);
        assert_eq!(
            fs::read_to_string(output.join("setup.sh")).unwrap(),
            "#!/bin/sh\necho installed\n"
        );
        assert_eq!(
            fs::read_to_string(output.join("data").join("values.txt")).unwrap(),
            "1 2 3\n".repeat(40)
        );
    }

    #[test]
    fn test_skips_corrupt_entry() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        fs::write(&first, "first file ".repeat(100)).unwrap();
        fs::write(&second, "second file ".repeat(100)).unwrap();

        let mut payload = payload(&[first, second]);
        // header preamble, entry header and the 9 byte name precede the first payload
        let start = 40 + 40 + "first.txt".len();
        payload[start..start + 8].fill(0);

        let output = dir.path().join("output");
        let unpacked = unpack(&image(&CommandConfig::default(), &payload), &output).unwrap();
        assert_eq!(unpacked.summary.extracted, 1);
        assert_eq!(unpacked.summary.failed, 1);
        assert!(!output.join("first.txt").exists());
        assert_eq!(
            fs::read_to_string(output.join("second.txt")).unwrap(),
            "second file ".repeat(100)
        );
    }

    #[test]
    fn test_missing_payload() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            unpack(b"just a plain executable", dir.path()),
            Err(Error::MissingMarker)
        ));
    }
}
