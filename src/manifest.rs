//! File manifest construction for deploys.
//!
//! A manifest maps every regular file under the publish directory to the
//! SHA-1 hex digest of its content. The deploy API content-addresses files
//! by this digest across all of a site's historical deploys, so the manifest
//! is what lets the remote side tell the client which files it already has.

use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::utils::errors::{DeployError, Result};

/// Hash input chunk size. Files are streamed, never fully buffered.
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// A single file in the manifest.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// SHA-1 hex digest of the file content
    pub hash: String,

    /// File size in bytes
    pub size: u64,

    /// Absolute path of the file on local disk
    pub source: PathBuf,
}

/// Snapshot of a directory tree to publish.
///
/// Keys are root-relative paths with a leading `/` and `/` separators
/// regardless of the host platform. Built fresh per deploy attempt and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Manifest {
    files: BTreeMap<String, FileEntry>,
}

impl Manifest {
    /// Build a manifest from a local directory.
    ///
    /// Every regular file below `root` gets exactly one entry; directories,
    /// symlinks, and special files are skipped. Fails with `NotFound` when
    /// `root` is missing or not a directory. Unreadable files propagate an
    /// I/O error rather than being dropped, so a successful build always
    /// describes the full tree.
    pub fn build(root: &Path) -> Result<Self> {
        if !root.exists() {
            return Err(DeployError::NotFound(format!(
                "publish directory does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(DeployError::NotFound(format!(
                "publish path is not a directory: {}",
                root.display()
            )));
        }

        let mut files = BTreeMap::new();

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;

            // Only regular files are published; symlinks and special files
            // are treated as not-a-file
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let (hash, size) = hash_file(path)?;

            files.insert(
                normalize_path(relative),
                FileEntry {
                    hash,
                    size,
                    source: path.to_path_buf(),
                },
            );
        }

        Ok(Manifest { files })
    }

    /// Number of files in the manifest.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of all file sizes in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|entry| entry.size).sum()
    }

    /// Look up a file by its manifest path.
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    /// Iterate over (path, entry) pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileEntry)> {
        self.files.iter().map(|(path, entry)| (path.as_str(), entry))
    }

    /// The wire form submitted during deploy negotiation: path -> hash.
    pub fn hashes(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|(path, entry)| (path.clone(), entry.hash.clone()))
            .collect()
    }
}

/// Convert a root-relative path to manifest form: a leading `/` and `/` as
/// the separator on every platform.
fn normalize_path(relative: &Path) -> String {
    let mut normalized = String::new();
    for component in relative.components() {
        normalized.push('/');
        normalized.push_str(&component.as_os_str().to_string_lossy());
    }
    normalized
}

/// Stream a file through SHA-1 in fixed-size chunks.
///
/// Returns the hex digest and the byte count. Reads within one file are
/// strictly sequential; the whole file is never held in memory.
fn hash_file(path: &Path) -> std::io::Result<(String, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];
    let mut size = 0u64;

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }

    Ok((format!("{:x}", hasher.finalize()), size))
}
