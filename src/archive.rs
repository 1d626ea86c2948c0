//! Native bundle archives.
//!
//! A native bundle is a zip whose entries are extracted one by one into a
//! version's natives directory. Parsing only reads the central directory;
//! entry bytes are inflated on demand in a blocking task.

use std::io::{Cursor, Read};

use bytes::Bytes;
use regex::Regex;
use tracing::debug;

use crate::error::ExtractError;

/// One entry of the central directory, in archive order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the archive
    pub index: usize,
    /// Entry name as stored; directories end with `/`
    pub name: String,
    /// True for directory entries
    pub is_dir: bool,
}

/// A parsed zip held in memory
#[derive(Clone, Debug)]
pub struct NativesArchive {
    data: Bytes,
    entries: Vec<ArchiveEntry>,
}

impl NativesArchive {
    /// Read the central directory of `data`
    pub fn parse(data: Bytes) -> Result<Self, ExtractError> {
        let mut archive = open(&data)?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| ExtractError::InvalidArchive {
                    reason: format!("failed to read entry {}: {}", index, e),
                })?;
            entries.push(ArchiveEntry {
                index,
                name: file.name().to_string(),
                is_dir: file.is_dir(),
            });
        }

        debug!(entries = entries.len(), "parsed natives archive");
        Ok(Self { data, entries })
    }

    /// Entries in archive order
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Inflate the entry at `index`.
    ///
    /// Runs on the blocking pool. Entries whose names would escape the
    /// extraction root are rejected.
    pub async fn extract(&self, index: usize) -> Result<Bytes, ExtractError> {
        let data = self.data.clone();
        tokio::task::spawn_blocking(move || extract_blocking(&data, index))
            .await
            .map_err(|e| ExtractError::TaskFailed {
                reason: e.to_string(),
            })?
    }
}

fn open(data: &Bytes) -> Result<zip::ZipArchive<Cursor<Bytes>>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(data.clone())).map_err(|e| ExtractError::InvalidArchive {
        reason: e.to_string(),
    })
}

fn extract_blocking(data: &Bytes, index: usize) -> Result<Bytes, ExtractError> {
    let mut archive = open(data)?;
    let mut file = archive.by_index(index).map_err(|e| ExtractError::Entry {
        name: format!("#{}", index),
        reason: e.to_string(),
    })?;

    let name = file.name().to_string();
    if file.enclosed_name().is_none() {
        return Err(ExtractError::UnsafePath { name });
    }

    let mut buf = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
    file.read_to_end(&mut buf)
        .map_err(|e| ExtractError::Entry {
            name,
            reason: e.to_string(),
        })?;
    Ok(Bytes::from(buf))
}

/// Entry-name prefixes excluded from extraction (`extract.exclude` in metadata)
#[derive(Clone, Debug, Default)]
pub struct ExcludeFilter {
    pattern: Option<Regex>,
}

impl ExcludeFilter {
    /// Build an anchored alternation of the literal `prefixes`
    pub fn new<I, S>(prefixes: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = prefixes
            .into_iter()
            .map(|p| regex::escape(p.as_ref()))
            .collect();
        if alternatives.is_empty() {
            return Ok(Self::default());
        }
        let pattern = Regex::new(&format!("^(?:{})", alternatives.join("|")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// True if `name` starts with an excluded prefix
    pub fn is_excluded(&self, name: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(name))
    }
}
