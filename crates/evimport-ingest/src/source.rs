//! Line source backed by a zip archive
//!
//! The import reads the first entry of the archive as newline-delimited
//! JSON. The entry is decompressed as it is read; it is never loaded into
//! memory whole.

use evimport_common::{ImportError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::read::ZipFile;
use zip::ZipArchive;

/// Lines of the archive's first entry, in order
pub type EntryLines<'a> = Lines<BufReader<ZipFile<'a>>>;

/// An opened zip archive holding the event log
pub struct ArchiveSource {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl ArchiveSource {
    /// Open `path` and check that it holds at least one entry
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let archive = ZipArchive::new(BufReader::new(file))?;

        if archive.len() == 0 {
            return Err(ImportError::EmptyArchive(path.display().to_string()));
        }

        Ok(Self { path, archive })
    }

    /// Name of the entry that will be read
    pub fn entry_name(&mut self) -> Result<String> {
        Ok(self.archive.by_index(0)?.name().to_string())
    }

    /// Stream the first entry line by line
    pub fn lines(&mut self) -> Result<EntryLines<'_>> {
        let entry = self.archive.by_index(0)?;
        info!(
            archive = %self.path.display(),
            entry = entry.name(),
            size = entry.size(),
            "Reading events"
        );
        Ok(BufReader::new(entry).lines())
    }
}
