//! Playlist ingestion from list files, folders and single files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::model::MediaLocator;
use crate::error::{ClipMarkError, ClipMarkResult};
use crate::ports::PlaylistSource;

/// Extension of newline-delimited playlist files
pub const PLAYLIST_EXTENSION: &str = "mpl";

/// Reads `.mpl` files, folders (one level deep) and single media files
#[derive(Debug, Default)]
pub struct PlaylistFileReader {
    cache: Option<FolderCache>,
}

impl PlaylistFileReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse folder listings from `cache` when the folder has not changed
    pub fn with_cache(cache: FolderCache) -> Self {
        Self { cache: Some(cache) }
    }

    /// Persist the attached folder cache, if any
    pub fn save_cache(&mut self) -> ClipMarkResult<()> {
        match self.cache.as_mut() {
            Some(cache) => cache.save(),
            None => Ok(()),
        }
    }

    /// Read `source`, refreshing the folder cache when one is attached
    pub fn read_cached(&mut self, source: &Path) -> ClipMarkResult<Vec<MediaLocator>> {
        if source.is_dir() {
            if let Some(cache) = self.cache.as_mut() {
                return cache.listing(source);
            }
        }
        self.read(source)
    }
}

impl PlaylistSource for PlaylistFileReader {
    fn read(&self, source: &Path) -> ClipMarkResult<Vec<MediaLocator>> {
        if source.is_dir() {
            return scan_folder(source);
        }
        if !source.is_file() {
            return Err(ClipMarkError::PlaylistSource {
                path: source.display().to_string(),
                message: "no such file or directory".to_string(),
            });
        }

        let is_list = source
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(PLAYLIST_EXTENSION))
            .unwrap_or(false);
        if is_list {
            read_list_file(source)
        } else {
            Ok(vec![MediaLocator::from_path(source)])
        }
    }
}

/// Parse a playlist file: one path per line, optional surrounding quotes,
/// `#` comments and blank lines ignored. Relative entries are resolved
/// against the playlist's own folder.
pub fn read_list_file(path: &Path) -> ClipMarkResult<Vec<MediaLocator>> {
    let content = std::fs::read_to_string(path).map_err(|e| ClipMarkError::PlaylistSource {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let items = parse_list(&content, base);
    info!("Read {} entries from {}", items.len(), path.display());
    Ok(items)
}

pub fn parse_list(content: &str, base: &Path) -> Vec<MediaLocator> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_matches('"').trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if entry.contains("://") {
                return MediaLocator::new(entry);
            }
            let entry_path = Path::new(entry);
            if entry_path.is_absolute() {
                MediaLocator::from_path(entry_path)
            } else {
                MediaLocator::from_path(base.join(entry_path))
            }
        })
        .collect()
}

/// Regular files directly inside `folder`, sorted by name
pub fn scan_folder(folder: &Path) -> ClipMarkResult<Vec<MediaLocator>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) if e.depth() == 0 => {
                return Err(ClipMarkError::PlaylistSource {
                    path: folder.display().to_string(),
                    message: e.to_string(),
                })
            }
            Err(e) => warn!("Skipping unreadable entry in {}: {}", folder.display(), e),
        }
    }
    files.sort();
    debug!("Scanned {} files in {}", files.len(), folder.display());
    Ok(files.into_iter().map(MediaLocator::from_path).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedListing {
    pub timestamp: DateTime<Utc>,
    pub files: Vec<MediaLocator>,
}

/// Persistent folder listings, keyed by folder path
#[derive(Debug, Default)]
pub struct FolderCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CachedListing>,
    dirty: bool,
}

impl FolderCache {
    /// Cache kept in memory only
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file at `path`; a missing or unreadable file starts
    /// an empty cache
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring corrupt folder cache {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: Some(path),
            entries,
            dirty: false,
        }
    }

    pub fn get(&self, folder: &Path) -> Option<&CachedListing> {
        self.entries.get(&cache_key(folder))
    }

    /// Listing of `folder`, rescanned only if it was modified after the
    /// cached timestamp
    pub fn listing(&mut self, folder: &Path) -> ClipMarkResult<Vec<MediaLocator>> {
        let key = cache_key(folder);
        let modified: Option<DateTime<Utc>> = std::fs::metadata(folder)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        if let (Some(cached), Some(modified)) = (self.entries.get(&key), modified) {
            if modified <= cached.timestamp {
                debug!("Folder cache hit for {}", folder.display());
                return Ok(cached.files.clone());
            }
        }

        let files = scan_folder(folder)?;
        self.entries.insert(
            key,
            CachedListing {
                timestamp: Utc::now(),
                files: files.clone(),
            },
        );
        self.dirty = true;
        Ok(files)
    }

    /// Write the cache back to its file if anything changed
    pub fn save(&mut self) -> ClipMarkResult<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        self.dirty = false;
        Ok(())
    }
}

fn cache_key(folder: &Path) -> String {
    folder
        .canonicalize()
        .unwrap_or_else(|_| folder.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
