//! Container format shared by the `sfxarc` packer and its extractor stub.
//!
//! A container is a preamble [`FileHeader`] followed by a sequence of
//! entries, each made of a header, the entry name and the compressed bytes:
//!
//! ```text
//! [FileHeader: preamble, sizes zero]
//! [FileHeader][name: nameLength bytes][payload: compressedSize bytes]
//! [FileHeader][name: nameLength bytes][payload: compressedSize bytes]
//! ...
//! ```
//!
//! A self-extracting image appends a container to a stub executable:
//!
//! ```text
//! [stub executable][marker: 32 bytes][CommandConfig: 1282 bytes][payload length: u64 LE][container]
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub mod archive;
pub mod compress;
pub mod config;
pub mod container;
pub mod image;
pub mod types;

pub use archive::Archive;
pub use compress::CompressionLevel;
pub use config::CommandConfig;
pub use container::{ExtractPolicy, ExtractSummary, WriteEvent};
pub use image::EmbeddedPayload;
pub use types::{ArchiveEntry, FileHeader};

/// Errors raised by the container codec and the self-extracting image layout.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error without a known location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error on a specific location.
    #[error("couldn't {action} {}: {source}", .path.display())]
    Location {
        action: &'static str,
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing or mismatched signature.
    #[error("invalid archive format: {0}")]
    InvalidFormat(String),

    /// Codec failure while compressing.
    #[error("compression error: {0}")]
    Compression(String),

    /// Codec failure or size mismatch while decompressing.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// A requested input does not exist.
    #[error("file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// No inputs were given to an operation that needs at least one.
    #[error("no files specified")]
    NoInputs,

    /// An entry name would resolve outside the output directory.
    #[error("unsafe entry name: {0}")]
    UnsafeName(String),

    /// The image carries no payload marker.
    #[error("no payload found in executable image")]
    MissingMarker,

    /// No stub image could be obtained for packaging.
    #[error("no stub image available: {0}")]
    StubUnavailable(String),

    /// The post-extraction command could not be launched.
    #[error("couldn't launch {command}: {source}")]
    ProcessSpawn {
        command: String,
        #[source]
        source:  std::io::Error,
    },
}

impl Error {
    /// Wraps an I/O error with the failed action and its location.
    pub fn location(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Error::Location { action, path, source }
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;
