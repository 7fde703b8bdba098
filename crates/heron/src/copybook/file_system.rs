//
// copybook/file_system.rs
//
// File-system capability consumed by the file-backed copybook provider
//

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use lru::LruCache;
use url::Url;

/// Capability for reading auxiliary code (copybooks, implicit dialect code).
///
/// Implementations must be safe to share between concurrently analyzed
/// compilation units. Misses are reported as `None`, never as a panic.
pub trait FileSystemService: Send + Sync {
    /// Read the text addressed by `uri`, or `None` when it is absent or unreadable.
    fn read_implicit_code(&self, uri: &str) -> Option<String>;

    /// Whether `uri` names an existing file.
    fn file_exists(&self, uri: &str) -> bool;
}

impl<T: FileSystemService + ?Sized> FileSystemService for Arc<T> {
    fn read_implicit_code(&self, uri: &str) -> Option<String> {
        (**self).read_implicit_code(uri)
    }

    fn file_exists(&self, uri: &str) -> bool {
        (**self).file_exists(uri)
    }
}

/// Convert a `file://` URI or a plain path into a filesystem path.
/// Other URI schemes have no local path.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    if uri.starts_with("file:") {
        return Url::parse(uri).ok()?.to_file_path().ok();
    }
    if uri.contains("://") {
        return None;
    }
    Some(PathBuf::from(uri))
}

/// Convert a path into a `file://` URI string, falling back to the display
/// form for relative paths.
pub fn path_to_uri(path: &Path) -> String {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

/// Snapshot metadata used to decide whether cached content is still current
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub mtime: SystemTime,
    pub size: u64,
}

impl FileSnapshot {
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            mtime: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: metadata.len(),
        }
    }

    pub fn read(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        metadata.is_file().then(|| Self::from_metadata(&metadata))
    }
}

#[derive(Debug, Clone)]
struct CachedFile {
    snapshot: FileSnapshot,
    content: String,
}

const DEFAULT_FILE_CACHE_CAPACITY: usize = 512;

/// `FileSystemService` over the local disk.
///
/// Contents are kept in a bounded LRU and revalidated against the file's
/// mtime and size on every read, so a re-analysis sees edits made on disk.
pub struct LocalFileSystem {
    cache: RwLock<LruCache<PathBuf, CachedFile>>,
}

impl std::fmt::Debug for LocalFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileSystem").finish_non_exhaustive()
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FILE_CACHE_CAPACITY)
    }
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        let cap = NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(cap)),
        }
    }

    fn cached_if_fresh(&self, path: &Path, snapshot: &FileSnapshot) -> Option<String> {
        let guard = self.cache.read().ok()?;
        guard
            .peek(path)
            .filter(|cached| &cached.snapshot == snapshot)
            .map(|cached| cached.content.clone())
    }

    fn store(&self, path: PathBuf, snapshot: FileSnapshot, content: String) {
        if let Ok(mut guard) = self.cache.write() {
            guard.push(path, CachedFile { snapshot, content });
        }
    }

    /// Drop every cached file
    pub fn invalidate_all(&self) {
        if let Ok(mut guard) = self.cache.write() {
            guard.clear();
        }
    }
}

impl FileSystemService for LocalFileSystem {
    fn read_implicit_code(&self, uri: &str) -> Option<String> {
        let path = uri_to_path(uri)?;
        let snapshot = FileSnapshot::read(&path)?;

        if let Some(content) = self.cached_if_fresh(&path, &snapshot) {
            log::trace!("File cache hit for {}", path.display());
            return Some(content);
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                self.store(path, snapshot, content.clone());
                Some(content)
            }
            Err(e) => {
                log::debug!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn file_exists(&self, uri: &str) -> bool {
        uri_to_path(uri)
            .and_then(|p| FileSnapshot::read(&p))
            .is_some()
    }
}
