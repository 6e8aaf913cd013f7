//! Zip packaging of converted files.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::converter::ConvertedFile;
use crate::metrics;

/// File name offered for the archive download.
pub const ARCHIVE_NAME: &str = "converted_files.zip";

/// MIME type of the archive.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Errors that can occur while packing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packs converted files into an in-memory zip archive.
///
/// One flat, deflated entry per file, in iteration order, named after the
/// file. Repeated names get ` (2)`, ` (3)`, ... inserted before the
/// extension. No files yields a valid empty archive.
pub fn pack_archive<'a, I>(files: I) -> Result<Vec<u8>, ArchiveError>
where
    I: IntoIterator<Item = &'a ConvertedFile>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used = HashSet::new();
    let mut entries = 0usize;
    for file in files {
        let name = unique_entry_name(&file.name, &mut used);
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&file.data)?;
        entries += 1;
    }

    let bytes = zip.finish()?.into_inner();

    debug!(entries, bytes = bytes.len(), "Packed archive");
    metrics::ARCHIVES_PACKED.inc();

    Ok(bytes)
}

/// Returns `name`, or `name` with a ` (n)` suffix before the extension if it
/// was already used, and records the result in `used`.
fn unique_entry_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    };

    let mut n = 2;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn converted(name: &str, data: &[u8]) -> ConvertedFile {
        ConvertedFile {
            name: name.to_string(),
            data: data.to_vec(),
        }
    }

    fn read_entries(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (entry.name().to_string(), data)
            })
            .collect()
    }

    #[test]
    fn test_two_entries() {
        let files = vec![
            converted("a_converted.mp3", b"first file"),
            converted("b_converted.mp3", &[0u8; 4096]),
        ];

        let entries = read_entries(pack_archive(&files).unwrap());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a_converted.mp3");
        assert_eq!(entries[0].1, b"first file");
        assert_eq!(entries[1].0, "b_converted.mp3");
        assert_eq!(entries[1].1, vec![0u8; 4096]);
    }

    #[test]
    fn test_entries_are_deflated() {
        let files = vec![converted("big_converted.wav", &[0u8; 64 * 1024])];
        let bytes = pack_archive(&files).unwrap();
        assert!(bytes.len() < 64 * 1024);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(
            archive.by_index(0).unwrap().compression(),
            CompressionMethod::Deflated
        );
    }

    #[test]
    fn test_duplicate_names_made_unique() {
        let files = vec![
            converted("clip_converted.mp4", b"1"),
            converted("clip_converted.mp4", b"2"),
            converted("clip_converted.mp4", b"3"),
        ];

        let names: Vec<String> = read_entries(pack_archive(&files).unwrap())
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        assert_eq!(
            names,
            vec![
                "clip_converted.mp4",
                "clip_converted (2).mp4",
                "clip_converted (3).mp4"
            ]
        );
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let bytes = pack_archive(&Vec::<ConvertedFile>::new()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_unique_entry_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_entry_name("x.mp3", &mut used), "x.mp3");
        assert_eq!(unique_entry_name("x.mp3", &mut used), "x (2).mp3");
        assert_eq!(unique_entry_name("noext", &mut used), "noext");
        assert_eq!(unique_entry_name("noext", &mut used), "noext (2)");
        assert_eq!(unique_entry_name(".hidden", &mut used), ".hidden");
        assert_eq!(unique_entry_name(".hidden", &mut used), ".hidden (2)");
    }

    #[test]
    fn test_suffix_does_not_collide_with_real_name() {
        let files = vec![
            converted("x (2).mp3", b"a"),
            converted("x.mp3", b"b"),
            converted("x.mp3", b"c"),
        ];
        let names: Vec<String> = read_entries(pack_archive(&files).unwrap())
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["x (2).mp3", "x.mp3", "x (3).mp3"]);
    }
}
