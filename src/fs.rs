//! Filesystem collaborator consumed by the parser.
//!
//! The parser only ever needs two read-only operations, so they are behind a
//! trait: header readers check declared asset files for existence and scan
//! the song directory for asset candidates. Tests substitute an in-memory
//! implementation.

use std::io;
use std::path::Path;

/// Read-only view of the filesystem around a chart file.
pub trait SongFs {
    fn exists(&self, path: &Path) -> bool;

    /// File names in `dir`, in the order the platform yields them.
    ///
    /// The order is deliberately left unspecified: asset guessing takes the
    /// first match from this listing, so the guess under multiple candidates
    /// is platform-dependent.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// [`SongFs`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

impl SongFs for NativeFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}
