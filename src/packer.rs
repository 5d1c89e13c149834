//! Builds self-extracting images from a stub and a set of files.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use sfxformat::{
    container::{write_files, write_preamble},
    image::write_image,
    ArchiveEntry, CommandConfig, CompressionLevel, Error, Result, WriteEvent,
};
use tracing::{info, warn};

use crate::{permissions::set_executable_permissions, stub::StubProvider};

/// Sizes of a written self-extracting image.
#[derive(Debug, Clone)]
pub struct PackedInfo {
    pub stub_size:    u64,
    pub payload_size: u64,
    pub total_size:   u64,
    pub entries:      Vec<ArchiveEntry>,
}

/// Packages files into a self-extracting executable.
#[derive(Debug, Clone)]
pub struct Packer {
    files:  Vec<PathBuf>,
    level:  CompressionLevel,
    config: CommandConfig,
}

impl Packer {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Packer {
            files,
            level: CompressionLevel::default(),
            config: CommandConfig::default(),
        }
    }

    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Command the stub runs after extracting.
    pub fn with_config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    pub fn files(&self) -> &[PathBuf] { &self.files }

    pub fn config(&self) -> &CommandConfig { &self.config }

    /// Writes the image to `output`.
    ///
    /// Fails with [`Error::NoInputs`] when there are no files to pack.
    /// The stub is loaded before anything else, so a missing stub leaves no
    /// output behind. The container is assembled in memory and written after
    /// the stub, marker, command record and payload length.
    pub fn pack(&self, stub: &dyn StubProvider, output: &Path) -> Result<PackedInfo> {
        self.pack_with(stub, output, |_| {})
    }

    /// [`Packer::pack`] reporting entry progress through `on_event`.
    pub fn pack_with<F>(&self, stub: &dyn StubProvider, output: &Path, on_event: F) -> Result<PackedInfo>
    where
        F: FnMut(WriteEvent<'_>),
    {
        if self.files.is_empty() {
            return Err(Error::NoInputs);
        }
        let stub_bytes = stub.load()?;

        let mut payload = Vec::new();
        write_preamble(&mut payload)?;
        let entries = write_files(&mut payload, &self.files, self.level, on_event)?;

        let file = File::create(output).map_err(Error::location("create", output))?;
        let mut writer = BufWriter::new(file);
        let total_size = write_image(&mut writer, &stub_bytes, &self.config, &payload)?;
        writer.flush().map_err(Error::location("write", output))?;
        drop(writer);

        if let Err(e) = set_executable_permissions(output) {
            warn!(path = %output.display(), error = %e, "couldn't set executable permissions");
        }

        info!(
            output = %output.display(),
            stub = stub_bytes.len(),
            payload = payload.len(),
            entries = entries.len(),
            "created self-extracting executable"
        );
        Ok(PackedInfo {
            stub_size: stub_bytes.len() as u64,
            payload_size: payload.len() as u64,
            total_size,
            entries,
        })
    }
}
