use crate::compress;
use crate::mime_types;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

/// Name of the directory, inside the served root, holding the gzip artifacts.
pub const CACHE_DIR: &str = ".cache";

pub const DEFAULT_THRESHOLD: u64 = 1024;

/// One servable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Extension without the dot, empty when the file has none.
    pub ext: String,
    pub path: PathBuf,
    /// The precomputed gzip artifact, when the file was worth compressing.
    pub gzip: Option<PathBuf>,
    pub compressed: bool,
    /// Size of the bytes that will be sent: the artifact's when compressed.
    pub size: u64,
    pub modified: SystemTime,
}

impl FileEntry {
    /// The file to stream for this entry.
    pub fn serve_path(&self) -> &Path {
        self.gzip.as_deref().unwrap_or(&self.path)
    }

    /// A weak validator built from size and modification time.
    pub fn etag(&self) -> String {
        let modified = self.modified.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        format!("W/\"{:x}-{:x}\"", self.size, modified)
    }
}

/// A snapshot of the served directory, keyed by url path (`/css/site.css`).
#[derive(Debug, Default)]
pub struct FileIndex {
    files: HashMap<String, FileEntry>,
}

impl FileIndex {
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

/// Walks a directory into a [`FileIndex`], writing or pruning gzip artifacts along the way.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    root: PathBuf,
    cache: PathBuf,
    threshold: u64,
}

impl IndexBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let cache = root.join(CACHE_DIR);
        Self { root, cache, threshold: DEFAULT_THRESHOLD }
    }

    /// Compressible files strictly larger than this get a gzip artifact.
    #[must_use]
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &Path {
        &self.cache
    }

    pub fn build(&self) -> io::Result<FileIndex> {
        fs::create_dir_all(&self.cache)?;

        let mut files = HashMap::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.root).map_err(io::Error::other)?;
            let metadata = entry.metadata()?;
            let ext = relative.extension().and_then(OsStr::to_str).unwrap_or_default().to_owned();

            let mut size = metadata.len();
            let mut gzip = None;

            if mime_types::is_compressible_extension(&ext) {
                let gzip_path = self.gzip_path(relative);
                if size > self.threshold {
                    let encoded = compress::gzip(&fs::read(entry.path())?)?;
                    if let Some(parent) = gzip_path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&gzip_path, &encoded)?;
                    trace!(file = %relative.display(), size, compressed = encoded.len(), "gzip artifact written");

                    size = encoded.len() as u64;
                    gzip = Some(gzip_path);
                } else if gzip_path.exists() {
                    // the file shrank below the threshold since the last build
                    fs::remove_file(&gzip_path)?;
                    trace!(file = %relative.display(), "stale gzip artifact removed");
                }
            }

            let file = FileEntry {
                ext,
                path: entry.path().to_path_buf(),
                compressed: gzip.is_some(),
                gzip,
                size,
                modified: metadata.modified()?,
            };
            files.insert(url_key(relative), file);
        }

        debug!(root = %self.root.display(), files = files.len(), "static index built");
        Ok(FileIndex { files })
    }

    fn gzip_path(&self, relative: &Path) -> PathBuf {
        let mut path = self.cache.join(relative).into_os_string();
        path.push(".gz");
        PathBuf::from(path)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

/// Returns true when a path below `root` goes through a hidden file or directory.
pub(crate) fn is_hidden_path(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root).is_ok_and(|relative| {
        relative.components().any(|component| match component {
            Component::Normal(name) => name.to_str().is_some_and(|name| name.starts_with('.')),
            _ => false,
        })
    })
}

fn url_key(relative: &Path) -> String {
    relative.components().fold(String::new(), |mut key, component| {
        key.push('/');
        key.push_str(&component.as_os_str().to_string_lossy());
        key
    })
}
