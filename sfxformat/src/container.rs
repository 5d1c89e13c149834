//! Stream-level reading and writing of the header-and-entries container.
//!
//! These functions work on any reader or writer so the same code backs
//! on-disk archives, the in-memory container built by the packer, and the
//! payload slice recovered by the extractor stub.

use std::{
    borrow::Cow,
    fs,
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Component, Path, PathBuf},
};

use filetime::{set_file_mtime, FileTime};
use path_slash::PathExt;
use tracing::{debug, warn};
use zerocopy::IntoBytes;

use crate::{
    compress::{compress, decompress, CompressionLevel},
    types::{ArchiveEntry, FileHeader, HEADER_SIZE, VERSION},
    Error, Result,
};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Progress notifications emitted while writing entries.
#[derive(Debug, Clone, Copy)]
pub enum WriteEvent<'a> {
    /// About to compress the file stored under this name.
    Compressing(&'a str),
    /// Entry has been written.
    Added(&'a ArchiveEntry),
    /// Input is not a regular file and was left out.
    Skipped(&'a Path),
}

/// What to do when a single entry fails to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractPolicy {
    /// Stop and return the error. Used by `extract` on archives.
    Abort,
    /// Log the error and continue with the next entry. Used by the stub.
    SkipEntry,
}

/// Outcome of an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub extracted: usize,
    pub failed:    usize,
    /// The stream ended inside an entry.
    pub truncated: bool,
}

/// Converts a modification time into the tick count stored in headers.
pub fn timestamp_ticks(time: FileTime) -> i64 {
    time.unix_seconds()
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(time.nanoseconds() as i64)
}

/// Converts a stored tick count back into a modification time.
pub fn ticks_time(ticks: i64) -> FileTime {
    FileTime::from_unix_time(
        ticks.div_euclid(NANOS_PER_SECOND),
        ticks.rem_euclid(NANOS_PER_SECOND) as u32,
    )
}

fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Lowest common ancestor directory of the inputs' parent directories.
///
/// Returns `None` for fewer than two inputs, in which case entries are
/// named by their base name, and when the inputs share no root.
pub fn common_base<P: AsRef<Path>>(files: &[P]) -> Option<PathBuf> {
    if files.len() < 2 {
        return None;
    }
    let parent_of = |file: &P| {
        let file = absolutize(file.as_ref());
        file.parent().map(Path::to_path_buf).unwrap_or(file)
    };
    let mut base = parent_of(&files[0]);
    for file in &files[1..] {
        let parent = parent_of(file);
        while !parent.starts_with(&base) {
            if !base.pop() {
                return None;
            }
        }
    }
    Some(base)
}

/// Name stored for `file`: relative to `base` when given, else the base name,
/// always with forward slashes.
pub fn archive_name(file: &Path, base: Option<&Path>) -> String {
    let relative = base.and_then(|base| {
        absolutize(file)
            .strip_prefix(base)
            .ok()
            .map(Path::to_path_buf)
    });
    let name = match relative {
        Some(relative) if !relative.as_os_str().is_empty() => relative,
        _ => file
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| file.to_path_buf()),
    };
    name.to_slash_lossy().into_owned()
}

/// Resolves a stored name to a path below the output directory.
pub fn entry_path(name: &str) -> Result<PathBuf> {
    if name.starts_with('/') {
        return Err(Error::UnsafeName(name.to_string()));
    }
    let mut path = PathBuf::new();
    for segment in name.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if !Path::new(segment)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(Error::UnsafeName(name.to_string()));
        }
        path.push(segment);
    }
    if path.as_os_str().is_empty() {
        return Err(Error::UnsafeName(name.to_string()));
    }
    Ok(path)
}

/// Writes the container preamble.
pub fn write_preamble<W: Write>(writer: &mut W) -> Result<()> {
    writer.write_all(FileHeader::preamble().as_bytes())?;
    Ok(())
}

/// Compresses one file and writes its header, name and payload.
///
/// Payloads that DEFLATE cannot shrink are stored raw, which readers
/// recognize by equal compressed and original sizes.
pub fn write_file<W: Write>(
    writer: &mut W, path: &Path, name: String, level: CompressionLevel,
) -> Result<ArchiveEntry> {
    let data = fs::read(path).map_err(Error::location("read", path))?;
    let metadata = fs::metadata(path).map_err(Error::location("read metadata of", path))?;
    let timestamp = timestamp_ticks(FileTime::from_last_modification_time(&metadata));

    let original_size = data.len() as u64;
    let compressed = compress(&data, level)?;
    let payload = if compressed.len() < data.len() {
        compressed
    } else {
        data
    };
    let name_length = u32::try_from(name.len())
        .map_err(|_| Error::InvalidFormat(format!("entry name too long: {}", name.len())))?;
    let header = FileHeader::for_entry(name_length, payload.len() as u64, original_size, timestamp);

    writer.write_all(header.as_bytes())?;
    writer.write_all(name.as_bytes())?;
    writer.write_all(&payload)?;

    debug!(
        name = %name,
        original = header.original_size.get(),
        compressed = header.compressed_size.get(),
        "wrote entry"
    );
    Ok(header.to_entry(name))
}

/// Writes every regular file in `files`, naming them relative to their
/// common base directory.
///
/// A missing input aborts with [`Error::MissingInput`]; entries written
/// before it stay in the stream. Inputs that are not regular files are
/// skipped with a warning.
pub fn write_files<W, P, F>(
    writer: &mut W, files: &[P], level: CompressionLevel, mut on_event: F,
) -> Result<Vec<ArchiveEntry>>
where
    W: Write,
    P: AsRef<Path>,
    F: FnMut(WriteEvent<'_>),
{
    let base = common_base(files);
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let file = file.as_ref();
        let metadata = match fs::metadata(file) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::MissingInput(file.to_path_buf()))
            }
            Err(e) => return Err(Error::location("read metadata of", file)(e)),
        };
        if !metadata.is_file() {
            warn!(path = %file.display(), "skipping non-regular file");
            on_event(WriteEvent::Skipped(file));
            continue;
        }
        let name = archive_name(file, base.as_deref());
        on_event(WriteEvent::Compressing(&name));
        let entry = write_file(writer, file, name, level)?;
        on_event(WriteEvent::Added(&entry));
        entries.push(entry);
    }
    Ok(entries)
}

fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<bool> {
    match reader.read_exact(buffer) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn read_header<R: Read>(reader: &mut R) -> Result<Option<FileHeader>> {
    let mut buffer = [0u8; HEADER_SIZE];
    if !read_full(reader, &mut buffer)? {
        return Ok(None);
    }
    Ok(FileHeader::parse(&buffer))
}

fn read_bytes<R: Read>(reader: &mut R, len: u64) -> Result<Option<Vec<u8>>> {
    let mut buffer = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut buffer)?;
    if (buffer.len() as u64) < len {
        return Ok(None);
    }
    Ok(Some(buffer))
}

fn read_name<R: Read>(reader: &mut R, header: &FileHeader) -> Result<Option<String>> {
    Ok(read_bytes(reader, header.name_length.get() as u64)?
        .map(|name| String::from_utf8_lossy(&name).into_owned()))
}

/// Reads and validates the container preamble.
pub fn read_preamble<R: Read>(reader: &mut R) -> Result<FileHeader> {
    let header = read_header(reader)?
        .ok_or_else(|| Error::InvalidFormat("missing container header".to_string()))?;
    if header.signature.get() != crate::types::SIGNATURE {
        return Err(Error::InvalidFormat(format!(
            "bad signature {:#010x}",
            header.signature.get()
        )));
    }
    if header.version.get() > VERSION {
        return Err(Error::InvalidFormat(format!(
            "unsupported version {:#06x}",
            header.version.get()
        )));
    }
    Ok(header)
}

/// Lists the entries of a container without reading their payloads.
///
/// The list ends at the first short read or invalid header.
pub fn scan_entries<R: Read + Seek>(reader: &mut R) -> Result<Vec<ArchiveEntry>> {
    read_preamble(reader)?;
    let mut entries = Vec::new();
    while let Some(header) = read_header(reader)? {
        if !header.is_valid() {
            break;
        }
        let Some(name) = read_name(reader, &header)? else {
            break;
        };
        let Ok(skip) = i64::try_from(header.compressed_size.get()) else {
            break;
        };
        entries.push(header.to_entry(name));
        reader.seek(SeekFrom::Current(skip))?;
    }
    Ok(entries)
}

fn extract_entry(header: &FileHeader, name: &str, payload: &[u8], output_dir: &Path) -> Result<()> {
    let target = output_dir.join(entry_path(name)?);
    let data = if header.is_stored() {
        Cow::Borrowed(payload)
    } else {
        let expected = usize::try_from(header.original_size.get())
            .map_err(|_| Error::Decompression(format!("{}: entry too large", name)))?;
        Cow::Owned(decompress(payload, expected).map_err(|e| match e {
            Error::Decompression(message) => Error::Decompression(format!("{}: {}", name, message)),
            e => e,
        })?)
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(Error::location("create directory", parent))?;
    }
    fs::write(&target, &data).map_err(Error::location("write", &target))?;
    set_file_mtime(&target, ticks_time(header.timestamp.get()))
        .map_err(Error::location("set modification time of", &target))?;
    debug!(name = %name, size = data.len(), "extracted entry");
    Ok(())
}

/// Extracts every entry of a container into `output_dir`.
///
/// A corrupt preamble is always an error. Per-entry failures follow
/// `policy`. A stream that ends inside an entry stops extraction with
/// `truncated` set in the summary.
pub fn extract_stream<R: Read>(
    reader: &mut R, output_dir: &Path, policy: ExtractPolicy,
) -> Result<ExtractSummary> {
    read_preamble(reader)?;
    fs::create_dir_all(output_dir).map_err(Error::location("create directory", output_dir))?;

    let mut summary = ExtractSummary::default();
    while let Some(header) = read_header(reader)? {
        if !header.is_valid() {
            break;
        }
        let Some(name) = read_name(reader, &header)? else {
            warn!("container ends inside an entry name");
            summary.truncated = true;
            break;
        };
        let Some(payload) = read_bytes(reader, header.compressed_size.get())? else {
            warn!(name = %name, "container ends inside entry data");
            summary.truncated = true;
            break;
        };
        match extract_entry(&header, &name, &payload, output_dir) {
            Ok(()) => summary.extracted += 1,
            Err(e) => match policy {
                ExtractPolicy::Abort => return Err(e),
                ExtractPolicy::SkipEntry => {
                    warn!(name = %name, error = %e, "skipping entry");
                    summary.failed += 1;
                }
            },
        }
    }
    Ok(summary)
}
