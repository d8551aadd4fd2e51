// src/archive/mod.rs

//! Archive entry sources and output sinks
//!
//! The pipeline never touches containers directly: inputs come from an
//! [`EntrySource`] and output goes to an [`OutputSink`]. Two
//! implementations ship with the crate: `DirArchive` (a directory tree,
//! one file per entry) and `MemoryArchive` (in-memory, used heavily in
//! tests).
//!
//! Sources must order each archive's entries so per-package metadata
//! units (`package-info.class`) come first, ties broken by name; package
//! exclusion propagation depends on it within one archive.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;

/// One named blob from an input archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Slash-separated path within the archive.
    pub name: String,
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Produces one archive's entries, ordered per the source contract.
pub trait EntrySource {
    fn entries(&self) -> Result<Vec<ArchiveEntry>>;
}

/// Receives output entries. `put` may be called once per path, except
/// for registry files which the pipeline synthesizes exactly once.
pub trait OutputSink {
    fn put(&mut self, path: &str, content: &[u8]) -> Result<()>;
}

/// Order entries package-info-first, then by name.
pub fn sort_entries(entries: &mut [ArchiveEntry]) {
    entries.sort_by_key(|e| (!is_package_info(&e.name), e.name.clone()));
}

fn is_package_info(name: &str) -> bool {
    name == "package-info.class" || name.ends_with("/package-info.class")
}

/// A directory tree acting as an archive: every file is an entry named
/// by its slash-separated relative path.
#[derive(Debug, Clone)]
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EntrySource for DirArchive {
    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        for item in WalkDir::new(&self.root).follow_links(false) {
            let item = item?;
            if !item.file_type().is_file() {
                continue;
            }
            let Ok(relative) = item.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(ArchiveEntry::new(name, fs::read(item.path())?));
        }
        sort_entries(&mut entries);
        debug!(root = %self.root.display(), entries = entries.len(), "scanned archive directory");
        Ok(entries)
    }
}

impl OutputSink for DirArchive {
    fn put(&mut self, path: &str, content: &[u8]) -> Result<()> {
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, content)?;
        Ok(())
    }
}

/// An in-memory archive, usable as source and sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Vec<ArchiveEntry>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry (builder style).
    pub fn with(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.add(name, content);
        self
    }

    pub fn add(&mut self, name: &str, content: impl Into<Vec<u8>>) {
        self.entries.push(ArchiveEntry::new(name, content));
    }

    /// First entry with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.content.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// How many entries share this name (the dedup invariant says at
    /// most one for anything the pipeline writes).
    pub fn count(&self, name: &str) -> usize {
        self.entries.iter().filter(|e| e.name == name).count()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EntrySource for MemoryArchive {
    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = self.entries.clone();
        sort_entries(&mut entries);
        Ok(entries)
    }
}

impl OutputSink for MemoryArchive {
    fn put(&mut self, path: &str, content: &[u8]) -> Result<()> {
        self.entries.push(ArchiveEntry::new(path, content));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_info_sorts_first_within_an_archive() {
        let mut entries = vec![
            ArchiveEntry::new("com/acme/Widget.class", b"" as &[u8]),
            ArchiveEntry::new("com/acme/package-info.class", b"" as &[u8]),
            ArchiveEntry::new("com/acme/Alpha.class", b"" as &[u8]),
        ];
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "com/acme/package-info.class",
                "com/acme/Alpha.class",
                "com/acme/Widget.class"
            ]
        );
    }

    #[test]
    fn memory_archive_reports_duplicate_counts() {
        let mut archive = MemoryArchive::new();
        archive.put("a.txt", b"one").unwrap();
        archive.put("a.txt", b"two").unwrap();
        assert_eq!(archive.count("a.txt"), 2);
        assert_eq!(archive.get("a.txt"), Some(b"one" as &[u8]));
    }

    #[test]
    fn dir_archive_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirArchive::new(dir.path());
        sink.put("com/acme/data.bin", b"payload").unwrap();
        sink.put("top.txt", b"hello").unwrap();

        let entries = DirArchive::new(dir.path()).entries().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["com/acme/data.bin", "top.txt"]);
        assert_eq!(entries[0].content, b"payload");
    }
}
