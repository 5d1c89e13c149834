use std::{fs, io::Cursor};

use sfxarc::{
    sfxformat::{container::extract_stream, image::locate, CommandConfig, CompressionLevel, Error, ExtractPolicy},
    Packer, StubFile,
};

#[test]
fn packs_stub_config_and_payload() {
    let dir = tempfile::tempdir().unwrap();
    let stub = dir.path().join("stub.bin");
    fs::write(&stub, b"#!fake stub executable\n").unwrap();

    let input = dir.path().join("input");
    fs::create_dir_all(input.join("bin")).unwrap();
    fs::write(input.join("readme.txt"), "read me\n".repeat(50)).unwrap();
    fs::write(input.join("bin").join("tool"), b"\x00\x01\x02binary").unwrap();

    let config = CommandConfig {
        command: "bin/tool".into(),
        arguments: "--install".into(),
        silent: true,
        wait_for_completion: false,
        working_dir: String::new(),
    };
    let output = dir.path().join("installer");
    let info = Packer::new(vec![input.join("readme.txt"), input.join("bin").join("tool")])
        .with_level(CompressionLevel::Best)
        .with_config(config.clone())
        .pack(&StubFile(stub), &output)
        .unwrap();

    assert_eq!(info.entries.len(), 2);
    assert_eq!(info.stub_size, 23);
    let image = fs::read(&output).unwrap();
    assert_eq!(image.len() as u64, info.total_size);
    assert!(image.starts_with(b"#!fake stub executable\n"));

    let found = locate(&image).unwrap();
    assert_eq!(found.marker_offset, 23);
    assert_eq!(found.config, config);
    assert_eq!(found.payload.len() as u64, info.payload_size);

    let unpacked = dir.path().join("unpacked");
    let summary = extract_stream(&mut Cursor::new(found.payload), &unpacked, ExtractPolicy::SkipEntry).unwrap();
    assert_eq!(summary.extracted, 2);
    assert_eq!(fs::read_to_string(unpacked.join("readme.txt")).unwrap(), "read me\n".repeat(50));
    assert_eq!(fs::read(unpacked.join("bin").join("tool")).unwrap(), b"\x00\x01\x02binary");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o100, 0o100);
    }
}

#[test]
fn missing_stub_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("file.txt");
    fs::write(&input, "content").unwrap();
    let output = dir.path().join("installer");

    let result = Packer::new(vec![input]).pack(&StubFile(dir.path().join("no-stub")), &output);
    assert!(matches!(result, Err(Error::StubUnavailable(_))));
    assert!(!output.exists());
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let stub = dir.path().join("stub.bin");
    fs::write(&stub, b"stub").unwrap();
    let output = dir.path().join("installer");

    let result = Packer::new(vec![dir.path().join("absent.txt")]).pack(&StubFile(stub), &output);
    assert!(matches!(result, Err(Error::MissingInput(_))));
    assert!(!output.exists());
}

#[test]
fn no_inputs_fails() {
    let dir = tempfile::tempdir().unwrap();
    let stub = dir.path().join("stub.bin");
    fs::write(&stub, b"stub").unwrap();
    let output = dir.path().join("installer");

    let result = Packer::new(Vec::new()).pack(&StubFile(stub), &output);
    assert!(matches!(result, Err(Error::NoInputs)));
    assert!(!output.exists());
}
