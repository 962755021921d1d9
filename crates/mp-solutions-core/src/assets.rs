//! Resolution of graph descriptors and model files into a local cache.
//!
//! Assets are addressed by a logical path such as
//! `mediapipe/modules/audio_classification/yamnet.tflite`. The same relative
//! path locates the file under the cache root and under the remote origin.
//! A cached file is reused as long as it is non-empty; otherwise it is
//! fetched exactly once and moved into place only after the whole body has
//! been written.
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{Error, Result};

/// Remote origin the solution assets are published under.
pub const DEFAULT_BASE_URL: &str = "https://github.com/google/mediapipe/raw/master/";

const CACHE_DIR_NAME: &str = "mediapipe";
const FALLBACK_CACHE_DIR: &str = ".mediapipe-cache";

/// Where assets live locally and where they are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub cache_root: PathBuf,
    pub base_url: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let cache_root = dirs::cache_dir()
            .map(|dir| dir.join(CACHE_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_DIR));
        Self {
            cache_root,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// A required asset, located both locally and remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Normalised `/`-separated path relative to both roots.
    pub logical_path: String,
    pub local_path: PathBuf,
    pub remote_url: String,
}

/// Source of asset bytes on a cache miss.
pub trait AssetFetcher {
    /// Fetch the full body at `url`. Anything but a successful response is
    /// an [`Error::AssetUnavailable`].
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches assets over HTTP(S) with a blocking client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::unavailable(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::unavailable(url, format!("HTTP {status}")));
        }
        let body = response.bytes().map_err(|e| Error::unavailable(url, e))?;
        Ok(body.to_vec())
    }
}

/// Makes required assets available on the local filesystem.
pub struct AssetResolver<F: AssetFetcher = HttpFetcher> {
    cache_root: PathBuf,
    base_url: String,
    fetcher: F,
}

impl AssetResolver<HttpFetcher> {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_fetcher(config, HttpFetcher::new())
    }
}

impl<F: AssetFetcher> AssetResolver<F> {
    pub fn with_fetcher(config: ResolverConfig, fetcher: F) -> Self {
        Self {
            cache_root: config.cache_root,
            base_url: config.base_url,
            fetcher,
        }
    }

    /// Locate `logical_path` under the cache root and the remote origin.
    pub fn reference(&self, logical_path: &str) -> Result<AssetReference> {
        let segments = path_segments(logical_path)?;
        let local_path = segments
            .iter()
            .fold(self.cache_root.clone(), |path, segment| path.join(segment));
        let logical_path = segments.join("/");
        let remote_url = format!("{}/{}", self.base_url.trim_end_matches('/'), logical_path);
        Ok(AssetReference {
            logical_path,
            local_path,
            remote_url,
        })
    }

    /// Return the local path of `logical_path`, downloading it on a cache miss.
    ///
    /// Performs at most one network round trip. On failure nothing is left
    /// under the final cache path.
    pub fn ensure_local(&self, logical_path: &str) -> Result<PathBuf> {
        let asset = self.reference(logical_path)?;
        if is_populated(&asset.local_path) {
            debug!(path = %asset.local_path.display(), "asset cache hit");
            return Ok(asset.local_path);
        }

        info!(url = %asset.remote_url, "downloading asset");
        let body = self.fetcher.fetch(&asset.remote_url)?;
        if body.is_empty() {
            return Err(Error::unavailable(
                &asset.logical_path,
                "remote returned an empty body",
            ));
        }
        write_atomically(&asset, &body)?;

        if !is_populated(&asset.local_path) {
            return Err(Error::unavailable(
                &asset.logical_path,
                "cached file is empty or unreadable",
            ));
        }
        info!(
            path = %asset.local_path.display(),
            bytes = body.len(),
            "asset cached"
        );
        Ok(asset.local_path)
    }

    /// Resolve every path in order, stopping at the first failure.
    pub fn ensure_all<I, S>(&self, logical_paths: I) -> Result<Vec<PathBuf>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        logical_paths
            .into_iter()
            .map(|path| self.ensure_local(path.as_ref()))
            .collect()
    }
}

/// Split a logical path into segments, refusing anything that could land
/// outside the cache root.
fn path_segments(logical_path: &str) -> Result<Vec<&str>> {
    let invalid = || Error::InvalidAssetPath(logical_path.to_string());
    if logical_path.starts_with('/') || logical_path.contains('\\') {
        return Err(invalid());
    }
    let mut segments = Vec::new();
    for segment in logical_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid()),
            s if s.contains(':') => return Err(invalid()),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(invalid());
    }
    Ok(segments)
}

fn is_populated(path: &Path) -> bool {
    File::open(path)
        .and_then(|file| file.metadata())
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Stage `body` next to its destination and rename it into place.
fn write_atomically(asset: &AssetReference, body: &[u8]) -> Result<()> {
    let write_failed = |e: std::io::Error| {
        Error::unavailable(&asset.logical_path, format!("cannot write cache file: {e}"))
    };
    let dir = asset
        .local_path
        .parent()
        .ok_or_else(|| Error::InvalidAssetPath(asset.logical_path.clone()))?;
    fs::create_dir_all(dir).map_err(write_failed)?;

    let mut staged = NamedTempFile::new_in(dir).map_err(write_failed)?;
    staged.write_all(body).map_err(write_failed)?;
    staged.as_file().sync_all().map_err(write_failed)?;
    staged
        .persist(&asset.local_path)
        .map_err(|e| write_failed(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Serves canned bodies and records every URL it was asked for.
    struct FakeFetcher {
        body: Option<Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn serving(body: &[u8]) -> Self {
            Self {
                body: Some(body.to_vec()),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                body: None,
                requests: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl AssetFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.requests.borrow_mut().push(url.to_string());
            self.body
                .clone()
                .ok_or_else(|| Error::unavailable(url, "connection refused"))
        }
    }

    fn resolver(root: &Path, fetcher: FakeFetcher) -> AssetResolver<FakeFetcher> {
        let config = ResolverConfig {
            cache_root: root.to_path_buf(),
            base_url: "https://assets.example/raw/".to_string(),
        };
        AssetResolver::with_fetcher(config, fetcher)
    }

    #[test]
    fn test_reference_mirrors_logical_path() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), FakeFetcher::failing());

        let asset = resolver
            .reference("mediapipe/modules/audio_classification/yamnet.tflite")
            .unwrap();
        assert_eq!(
            asset.local_path,
            dir.path()
                .join("mediapipe")
                .join("modules")
                .join("audio_classification")
                .join("yamnet.tflite")
        );
        assert_eq!(
            asset.remote_url,
            "https://assets.example/raw/mediapipe/modules/audio_classification/yamnet.tflite"
        );

        let messy = resolver.reference("./a//b/./c.bin").unwrap();
        assert_eq!(messy.logical_path, "a/b/c.bin");
    }

    #[test]
    fn test_reference_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), FakeFetcher::failing());

        for bad in ["", "/etc/passwd", "a/../../b", "..", "./", "c:\\model", "a\\b"] {
            assert!(
                matches!(resolver.reference(bad), Err(Error::InvalidAssetPath(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_cache_hit_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("models").join("m.tflite");
        fs::create_dir_all(cached.parent().unwrap()).unwrap();
        fs::write(&cached, b"weights").unwrap();

        let resolver = resolver(dir.path(), FakeFetcher::failing());
        let path = resolver.ensure_local("models/m.tflite").unwrap();

        assert_eq!(path, cached);
        assert_eq!(resolver.fetcher.calls(), 0);
    }

    #[test]
    fn test_second_call_is_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), FakeFetcher::serving(b"graph bytes"));

        let first = resolver.ensure_local("graphs/g.binarypb").unwrap();
        let second = resolver.ensure_local("graphs/g.binarypb").unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.fetcher.calls(), 1);
        assert_eq!(fs::read(&first).unwrap(), b"graph bytes");
        assert_eq!(
            resolver.fetcher.requests.borrow()[0],
            "https://assets.example/raw/graphs/g.binarypb"
        );
    }

    #[test]
    fn test_empty_cached_file_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("m.bin"), b"").unwrap();

        let resolver = resolver(dir.path(), FakeFetcher::serving(b"fresh"));
        let path = resolver.ensure_local("m.bin").unwrap();

        assert_eq!(resolver.fetcher.calls(), 1);
        assert_eq!(fs::read(path).unwrap(), b"fresh");
    }

    #[test]
    fn test_failed_fetch_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), FakeFetcher::failing());

        let err = resolver.ensure_local("models/missing.tflite").unwrap_err();

        assert!(matches!(err, Error::AssetUnavailable { .. }));
        assert!(!dir.path().join("models").join("missing.tflite").exists());
    }

    #[test]
    fn test_empty_body_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = resolver(dir.path(), FakeFetcher::serving(b""));

        let err = resolver.ensure_local("models/empty.tflite").unwrap_err();

        assert!(matches!(err, Error::AssetUnavailable { .. }));
        assert!(!dir.path().join("models").join("empty.tflite").exists());
    }

    #[test]
    fn test_ensure_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("present.bin"), b"x").unwrap();
        let resolver = resolver(dir.path(), FakeFetcher::failing());

        let ok = resolver.ensure_all(["present.bin"]).unwrap();
        assert_eq!(ok, vec![dir.path().join("present.bin")]);

        let err = resolver
            .ensure_all(["present.bin", "absent.bin", "also-absent.bin"])
            .unwrap_err();
        assert!(matches!(err, Error::AssetUnavailable { .. }));
        assert_eq!(resolver.fetcher.calls(), 1);
    }
}
