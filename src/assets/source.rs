use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::Engine as _;

use crate::foundation::error::{DyelotError, DyelotResult};

/// Byte-level access to layer resources.
///
/// Implementations must be shareable across the resolver's worker threads. A fetch either returns
/// the complete encoded resource or fails; decoding happens in the resolver.
pub trait AssetSource: Send + Sync {
    /// Fetch the raw bytes behind `uri`.
    fn fetch(&self, uri: &str) -> DyelotResult<Vec<u8>>;
}

impl<S: AssetSource + ?Sized> AssetSource for Arc<S> {
    fn fetch(&self, uri: &str) -> DyelotResult<Vec<u8>> {
        (**self).fetch(uri)
    }
}

impl<S: AssetSource + ?Sized> AssetSource for Box<S> {
    fn fetch(&self, uri: &str) -> DyelotResult<Vec<u8>> {
        (**self).fetch(uri)
    }
}

/// Normalize and validate root-relative asset paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> DyelotResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(DyelotError::validation("asset paths must be relative"));
    }
    if s.is_empty() {
        return Err(DyelotError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(DyelotError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(DyelotError::validation(
            "asset path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Decode the payload of a `data:` URI.
///
/// Supports `;base64` payloads (what browser uploads and canvas exports produce) and plain
/// payloads without percent-escapes.
pub fn decode_data_uri(uri: &str) -> DyelotResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| DyelotError::validation("data URI must start with 'data:'"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| DyelotError::validation("data URI is missing the ',' separator"))?;

    if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| DyelotError::validation(format!("data URI base64 payload: {e}")))
    } else if payload.contains('%') {
        Err(DyelotError::validation(
            "percent-encoded data URIs are not supported",
        ))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Filesystem-backed source rooted at a directory.
///
/// - `data:` URIs decode inline.
/// - `file://` URIs address absolute paths.
/// - Anything without a scheme is a path relative to the root.
#[derive(Clone, Debug)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    /// Source reading relative paths under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(path: &Path) -> DyelotResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            DyelotError::asset_load(format!("failed to read asset '{}': {e}", path.display()))
        })
    }
}

impl AssetSource for FsAssetSource {
    fn fetch(&self, uri: &str) -> DyelotResult<Vec<u8>> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri);
        }
        if let Some(abs) = uri.strip_prefix("file://") {
            return Self::read(Path::new(abs));
        }
        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(DyelotError::asset_load(format!(
                "unsupported asset scheme '{scheme}' in '{uri}'"
            )));
        }
        let norm = normalize_rel_path(uri)?;
        Self::read(&self.root.join(Path::new(&norm)))
    }
}

/// In-memory source keyed by exact URI.
///
/// Useful for hosts that already hold the layer bytes (for example a design picked from a local
/// upload) and for tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssetSource {
    entries: HashMap<String, Arc<Vec<u8>>>,
}

impl MemoryAssetSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `uri`, replacing any previous entry.
    pub fn insert(&mut self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(uri.into(), Arc::new(bytes));
    }

    /// Builder form of [`MemoryAssetSource::insert`].
    pub fn with(mut self, uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(uri, bytes);
        self
    }
}

impl AssetSource for MemoryAssetSource {
    fn fetch(&self, uri: &str) -> DyelotResult<Vec<u8>> {
        if uri.starts_with("data:") {
            return decode_data_uri(uri);
        }
        self.entries
            .get(uri)
            .map(|b| b.as_ref().clone())
            .ok_or_else(|| DyelotError::asset_load(format!("no in-memory asset for '{uri}'")))
    }
}

/// Memoizing wrapper around another source.
///
/// Bytes are kept per URI for the lifetime of the wrapper, so repeated renders that only change
/// the color do not re-read unchanged layers. Failures and `data:` URIs are never cached.
pub struct CachingSource<S> {
    inner: S,
    entries: Mutex<HashMap<String, Arc<Vec<u8>>>>,
    misses: Mutex<HashMap<String, u64>>,
}

impl<S: AssetSource> CachingSource<S> {
    /// Wrap `inner` with an empty cache.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
            misses: Mutex::new(HashMap::new()),
        }
    }

    /// How many times `uri` was fetched from the inner source.
    pub fn fetch_count(&self, uri: &str) -> u64 {
        self.misses
            .lock()
            .map(|m| m.get(uri).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn cached(&self, uri: &str) -> DyelotResult<Option<Arc<Vec<u8>>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| DyelotError::asset_load("asset cache lock poisoned"))?;
        Ok(entries.get(uri).cloned())
    }
}

impl<S: AssetSource> AssetSource for CachingSource<S> {
    fn fetch(&self, uri: &str) -> DyelotResult<Vec<u8>> {
        if uri.starts_with("data:") {
            return self.inner.fetch(uri);
        }
        if let Some(hit) = self.cached(uri)? {
            return Ok(hit.as_ref().clone());
        }

        let bytes = self.inner.fetch(uri)?;
        if let Ok(mut misses) = self.misses.lock() {
            *misses.entry(uri.to_string()).or_insert(0) += 1;
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DyelotError::asset_load("asset cache lock poisoned"))?;
        entries.insert(uri.to_string(), Arc::new(bytes.clone()));
        Ok(bytes)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
