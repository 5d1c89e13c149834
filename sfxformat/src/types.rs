use zerocopy::{
    byteorder::little_endian::{I64, U16, U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

/// Container signature, "IVAN" when read little-endian.
pub const SIGNATURE: u32 = 0x4E41_5649;
/// Current container version (2.0).
pub const VERSION: u16 = 0x0200;
/// Size of an encoded [`FileHeader`].
pub const HEADER_SIZE: usize = std::mem::size_of::<FileHeader>();

/// Header written once as the container preamble and once before every entry.
///
/// The two padding fields keep the record at the 40 byte layout of the
/// original format and are always written as zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileHeader {
    pub signature:       U32,
    pub version:         U16,
    _padding0:           [u8; 2],
    pub name_length:     U32,
    _padding1:           [u8; 4],
    pub compressed_size: U64,
    pub original_size:   U64,
    pub timestamp:       I64,
}

impl FileHeader {
    /// Archive preamble: signature and version, everything else zero.
    pub fn preamble() -> Self { Self::for_entry(0, 0, 0, 0) }

    pub fn for_entry(name_length: u32, compressed_size: u64, original_size: u64, timestamp: i64) -> Self {
        FileHeader {
            signature:       U32::new(SIGNATURE),
            version:         U16::new(VERSION),
            _padding0:       [0; 2],
            name_length:     U32::new(name_length),
            _padding1:       [0; 4],
            compressed_size: U64::new(compressed_size),
            original_size:   U64::new(original_size),
            timestamp:       I64::new(timestamp),
        }
    }

    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        FileHeader::read_from_prefix(bytes).ok().map(|(header, _)| header)
    }

    /// Signature matches and the version is not newer than this reader.
    pub fn is_valid(&self) -> bool {
        self.signature.get() == SIGNATURE && self.version.get() <= VERSION
    }

    /// Entry payload is stored without compression.
    pub fn is_stored(&self) -> bool { self.compressed_size.get() == self.original_size.get() }

    pub fn to_entry(&self, name: String) -> ArchiveEntry {
        ArchiveEntry {
            name,
            compressed_size: self.compressed_size.get(),
            original_size: self.original_size.get(),
            timestamp: self.timestamp.get(),
        }
    }
}

/// Entry summary as recorded in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Relative path with forward slashes.
    pub name:            String,
    pub compressed_size: u64,
    pub original_size:   u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub timestamp:       i64,
}
