use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// An entry as stored in an archive, with its raw zip metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub stored: bool,
    pub crc32: u32,
    /// `(year, month, day, hour, minute, second)` of the DOS timestamp.
    pub modified: Option<(u16, u8, u8, u8, u8, u8)>,
}

/// Writes a deflated jar. Names ending in `/` become directory entries.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create jar");
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).expect("add directory");
        } else {
            zip.start_file(*name, options).expect("start entry");
            zip.write_all(data).expect("write entry");
        }
    }
    zip.finish().expect("finish jar");
}

/// Reads every entry of a jar, in archive order.
pub fn read_jar(path: &Path) -> Vec<JarEntry> {
    let file = File::open(path).expect("open jar");
    let mut archive = ZipArchive::new(file).expect("read jar");
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).expect("read entry");
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("read entry data");
        let modified = entry.last_modified().map(|time| {
            (
                time.year(),
                time.month(),
                time.day(),
                time.hour(),
                time.minute(),
                time.second(),
            )
        });
        entries.push(JarEntry {
            name: entry.name().to_string(),
            stored: entry.compression() == zip::CompressionMethod::Stored,
            crc32: entry.crc32(),
            modified,
            data,
        });
    }
    entries
}
