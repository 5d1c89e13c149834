//! On-disk container handle.

use std::{
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    compress::CompressionLevel,
    container::{extract_stream, scan_entries, write_files, write_preamble, ExtractPolicy, ExtractSummary, WriteEvent},
    types::ArchiveEntry,
    Error, Result,
};

/// A container file and the entries it held when last read or written.
///
/// The entry list is owned by the handle. Opening the same location again
/// reads a fresh, independent list.
#[derive(Debug)]
pub struct Archive {
    path:    PathBuf,
    entries: Vec<ArchiveEntry>,
}

impl Archive {
    /// Opens a container location.
    ///
    /// An existing file is scanned for its entries and must start with a
    /// valid preamble. A missing file yields an empty handle that `create`
    /// or `add` can initialize.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match File::open(&path) {
            Ok(file) => scan_entries(&mut BufReader::new(file))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::location("open archive", path)(e)),
        };
        Ok(Archive { path, entries })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn entries(&self) -> &[ArchiveEntry] { &self.entries }

    /// Copy of the current entry list.
    pub fn list(&self) -> Vec<ArchiveEntry> { self.entries.clone() }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Replaces the container with the given files.
    pub fn create<P: AsRef<Path>>(&mut self, files: &[P], level: CompressionLevel) -> Result<()> {
        self.create_with(files, level, |_| {})
    }

    /// [`Archive::create`] reporting progress through `on_event`.
    pub fn create_with<P, F>(&mut self, files: &[P], level: CompressionLevel, on_event: F) -> Result<()>
    where
        P: AsRef<Path>,
        F: FnMut(WriteEvent<'_>),
    {
        self.entries.clear();
        let file = File::create(&self.path).map_err(Error::location("create archive", &self.path))?;
        let mut writer = BufWriter::new(file);
        write_preamble(&mut writer)?;
        let written = write_files(&mut writer, files, level, on_event);
        writer.flush().map_err(Error::location("write archive", &self.path))?;
        self.entries = written?;
        info!(archive = %self.path.display(), entries = self.entries.len(), "created archive");
        Ok(())
    }

    /// Appends files to the container and returns how many were added.
    ///
    /// Names are computed against the common base of the new files only.
    /// The existing content is not validated. A missing container is
    /// initialized with a preamble first.
    pub fn add<P: AsRef<Path>>(&mut self, files: &[P], level: CompressionLevel) -> Result<usize> {
        self.add_with(files, level, |_| {})
    }

    /// [`Archive::add`] reporting progress through `on_event`.
    pub fn add_with<P, F>(&mut self, files: &[P], level: CompressionLevel, on_event: F) -> Result<usize>
    where
        P: AsRef<Path>,
        F: FnMut(WriteEvent<'_>),
    {
        if files.is_empty() {
            return Err(Error::NoInputs);
        }
        let exists = self.path.is_file();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(Error::location("open archive for appending", &self.path))?;
        let mut writer = BufWriter::new(file);
        if !exists {
            write_preamble(&mut writer)?;
        }
        let written = write_files(&mut writer, files, level, on_event);
        writer.flush().map_err(Error::location("write archive", &self.path))?;
        let added = written?;
        let count = added.len();
        self.entries.extend(added);
        info!(archive = %self.path.display(), added = count, "appended to archive");
        Ok(count)
    }

    /// Extracts every entry into `output_dir`, stopping at the first failure.
    pub fn extract(&self, output_dir: impl AsRef<Path>) -> Result<ExtractSummary> {
        let output_dir = output_dir.as_ref();
        let file = File::open(&self.path).map_err(Error::location("open archive", &self.path))?;
        let summary = extract_stream(&mut BufReader::new(file), output_dir, ExtractPolicy::Abort)?;
        info!(
            archive = %self.path.display(),
            output = %output_dir.display(),
            extracted = summary.extracted,
            "extracted archive"
        );
        Ok(summary)
    }
}
