//! Reading JAR archives and writing deterministic ones.
//!
//! Output entries carry no host-dependent metadata: every entry is stored
//! uncompressed with a fixed timestamp (2010-01-01 00:00:00), an explicit size
//! and a CRC-32 computed over its final bytes. Identical `(name, payload)`
//! sequences therefore serialise to identical archives.
//!
//! Transfers never copy `META-INF/MANIFEST.MF`: inputs are concatenated, and
//! a manifest describes only the archive it came from.

mod error;

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

pub use crate::error::ArchiveError;

pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

/// `(year, month, day, hour, minute, second)` stamped on every output entry.
pub const NORMALIZED_TIMESTAMP: (u16, u8, u8, u8, u8, u8) = (2010, 1, 1, 0, 0, 0);

pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// Upper bound on the buffer preallocated from a zip header's declared size.
const MAX_PREALLOCATION: u64 = 1 << 20;

/// A named payload read from, or destined for, an archive.
#[derive(Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn is_class(&self) -> bool {
        self.name.ends_with(".class")
    }

    pub fn crc32(&self) -> u32 {
        crc32fast::hash(&self.data)
    }
}

impl std::fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A JAR on disk.
#[derive(Clone, Debug)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of every entry, sorted ascending.
    pub fn entry_names(&self) -> Result<Vec<String>> {
        let zip = self.open()?;
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort_unstable();
        Ok(names)
    }

    /// Calls `f` with every entry in archive order.
    pub fn for_each_entry<E>(
        &self,
        mut f: impl FnMut(ArchiveEntry) -> Result<(), E>,
    ) -> Result<(), E>
    where
        E: From<ArchiveError>,
    {
        let mut zip = self.open()?;
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|err| ArchiveError::zip(&self.path, err))?;
            // The declared size is untrusted.
            let mut data = Vec::with_capacity(entry.size().min(MAX_PREALLOCATION) as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|err| ArchiveError::io(&self.path, err))?;
            let name = entry.name().to_string();
            drop(entry);
            f(ArchiveEntry::new(name, data))?;
        }
        Ok(())
    }

    fn open(&self) -> Result<ZipArchive<File>> {
        let file = File::open(&self.path).map_err(|err| ArchiveError::io(&self.path, err))?;
        ZipArchive::new(file).map_err(|err| ArchiveError::zip(&self.path, err))
    }
}

fn entry_options() -> SimpleFileOptions {
    let (year, month, day, hour, minute, second) = NORMALIZED_TIMESTAMP;
    let timestamp =
        DateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap_or_default();
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(timestamp)
        .unix_permissions(0o644)
}

/// Writes entries with normalized metadata.
pub struct DeterministicJarWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    path: PathBuf,
    directories: HashSet<String>,
    files: HashSet<String>,
    written: usize,
}

impl<W: Write + Seek> DeterministicJarWriter<W> {
    /// `path` only labels errors.
    pub fn new(inner: W, path: impl Into<PathBuf>) -> Self {
        Self {
            zip: ZipWriter::new(inner),
            path: path.into(),
            directories: HashSet::new(),
            files: HashSet::new(),
            written: 0,
        }
    }

    /// Writes one entry. A directory already written is skipped, so several
    /// inputs may share package directories; duplicate files are an error.
    pub fn write_entry(&mut self, entry: &ArchiveEntry) -> Result<()> {
        let options = entry_options();
        if entry.is_directory() {
            if !self.directories.insert(entry.name.clone()) {
                return Ok(());
            }
            self.zip
                .add_directory(entry.name.as_str(), options)
                .map_err(|err| ArchiveError::zip(&self.path, err))?;
        } else {
            if !self.files.insert(entry.name.clone()) {
                return Err(ArchiveError::DuplicateEntry {
                    path: self.path.clone(),
                    name: entry.name.clone(),
                });
            }
            self.zip
                .start_file(entry.name.as_str(), options)
                .map_err(|err| ArchiveError::zip(&self.path, err))?;
            self.zip
                .write_all(&entry.data)
                .map_err(|err| ArchiveError::io(&self.path, err))?;
        }
        tracing::trace!(
            target: "jarsmith.archive",
            entry = %entry.name,
            size = entry.data.len(),
            crc32 = entry.crc32(),
            "wrote entry"
        );
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(self) -> Result<W> {
        self.zip
            .finish()
            .map_err(|err| ArchiveError::zip(&self.path, err))
    }
}

/// Entry counts of a [`transfer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub entries_read: usize,
    pub entries_written: usize,
    pub classes_transformed: usize,
    /// Class entries for which the transform produced nothing.
    pub entries_dropped: usize,
}

/// Streams every entry of `inputs`, in order, into a new archive at `output`.
///
/// `.class` entries go through `transform`, which returns the entries to
/// write in their place (none to drop the class). Directory entries and other
/// resources are copied, except the manifest, which is dropped. The archive is
/// assembled in a temporary file next to `output` and only moved into place
/// once complete, so a failed transfer leaves no output behind.
pub fn transfer<E, F>(
    inputs: &[PathBuf],
    output: &Path,
    mut transform: F,
) -> Result<TransferStats, E>
where
    E: From<ArchiveError>,
    F: FnMut(ArchiveEntry) -> Result<Vec<ArchiveEntry>, E>,
{
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|err| ArchiveError::io(parent, err))?;
    let file = tmp
        .reopen()
        .map_err(|err| ArchiveError::io(tmp.path(), err))?;
    let mut writer = DeterministicJarWriter::new(file, output);
    let mut stats = TransferStats::default();

    for input in inputs {
        tracing::debug!(
            target: "jarsmith.archive",
            input = %input.display(),
            "reading archive"
        );
        Archive::new(input).for_each_entry(|entry| {
            stats.entries_read += 1;
            if entry.name == MANIFEST_NAME {
                return Ok(());
            }
            if !entry.is_class() {
                writer.write_entry(&entry)?;
                return Ok(());
            }
            let produced = transform(entry)?;
            stats.classes_transformed += 1;
            if produced.is_empty() {
                stats.entries_dropped += 1;
            }
            for entry in &produced {
                writer.write_entry(entry)?;
            }
            Ok::<_, E>(())
        })?;
    }

    stats.entries_written = writer.written();
    writer
        .finish()?
        .sync_all()
        .map_err(|err| ArchiveError::io(output, err))?;
    tmp.persist(output)
        .map_err(|err| ArchiveError::io(output, err.error))?;

    tracing::debug!(
        target: "jarsmith.archive",
        output = %output.display(),
        read = stats.entries_read,
        written = stats.entries_written,
        dropped = stats.entries_dropped,
        "archive written"
    );
    Ok(stats)
}
