//! Binary storage for sources and derived files.
//!
//! Everything is addressed by a `/`-separated key relative to a storage
//! root (see [`crate::naming`]). Two backends implement [`Storage`]:
//!
//! | Root | Backend | exists / read / write / delete |
//! |---|---|---|
//! | local directory | [`LocalStorage`] | `std::fs` |
//! | `http://` or `https://` base URL | [`HttpStorage`] | `HEAD` / `GET` / `PUT` / `DELETE` |
//!
//! [`storage_for`] picks the backend from the configured root.
//!
//! Writes are plain overwrites. Two writers racing on one key write the same
//! deterministic bytes, so the last one simply wins.

use crate::naming::join;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Narrow read/write/exists interface over a storage root.
pub trait Storage: Sync {
    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Fails with [`StorageError::NotFound`] when the key is absent.
    fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    fn write(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()>;

    /// Remove a key. Returns whether it existed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Human-readable location of a key, for logs and CLI output.
    fn locate(&self, key: &str) -> String;
}

/// Whether a storage root is a fetchable URL rather than a directory.
pub fn is_url(root: &str) -> bool {
    root.starts_with("http://") || root.starts_with("https://")
}

/// Select the backend for a storage root.
pub fn storage_for(root: &str, timeout: Duration) -> StorageResult<Box<dyn Storage>> {
    if is_url(root) {
        Ok(Box::new(HttpStorage::new(root, timeout)?))
    } else {
        Ok(Box::new(LocalStorage::new(root)))
    }
}

/// Reject keys that could escape the storage root.
fn check_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Create a directory, tolerating a concurrent creator.
///
/// Check, create, and on failure re-check: a directory that appeared in the
/// meantime is success.
fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

impl Storage for LocalStorage {
    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.key_to_path(key)?.is_file())
    }

    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(path.display().to_string()),
            _ => StorageError::Io(e),
        })
    }

    fn write(&self, key: &str, bytes: &[u8], _content_type: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn locate(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }
}

/// Storage behind an http(s) base URL.
///
/// Sources are fetched with `GET`; derived files are uploaded with `PUT`
/// carrying an explicit `Content-Type`, so the object store does not fall
/// back to `application/octet-stream`.
pub struct HttpStorage {
    base_url: String,
    client: Client,
}

impl HttpStorage {
    pub fn new(base_url: &str, timeout: Duration) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, key: &str) -> StorageResult<String> {
        check_key(key)?;
        Ok(join(&self.base_url, key))
    }
}

fn request_failed(url: &str, e: reqwest::Error) -> StorageError {
    StorageError::Http(format!("Request to {url} failed: {e}"))
}

fn unexpected_status(url: &str, status: StatusCode) -> StorageError {
    StorageError::Http(format!(
        "{url}: HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    ))
}

impl Storage for HttpStorage {
    fn exists(&self, key: &str) -> StorageResult<bool> {
        let url = self.url(key)?;
        let response = self
            .client
            .head(&url)
            .send()
            .map_err(|e| request_failed(&url, e))?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(unexpected_status(&url, s)),
        }
    }

    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let url = self.url(key)?;
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| request_failed(&url, e))?;
        match response.status() {
            s if s.is_success() => {
                let bytes = response
                    .bytes()
                    .map_err(|e| StorageError::Http(format!("Failed to read body: {e}")))?;
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(url)),
            s => Err(unexpected_status(&url, s)),
        }
    }

    fn write(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()> {
        let url = self.url(key)?;
        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .map_err(|e| request_failed(&url, e))?;
        if !response.status().is_success() {
            return Err(unexpected_status(&url, response.status()));
        }
        debug!(%url, bytes = bytes.len(), "uploaded file");
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let url = self.url(key)?;
        let response = self
            .client
            .delete(&url)
            .send()
            .map_err(|e| request_failed(&url, e))?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(unexpected_status(&url, s)),
        }
    }

    fn locate(&self, key: &str) -> String {
        join(&self.base_url, key)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory storage recording content types and write counts.
    #[derive(Default)]
    pub struct MemoryStorage {
        pub files: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
        pub writes: Mutex<Vec<String>>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(key: &str, bytes: &[u8]) -> Self {
            let storage = Self::new();
            storage
                .files
                .lock()
                .unwrap()
                .insert(key.to_string(), (bytes.to_vec(), String::new()));
            storage
        }

        pub fn keys(&self) -> Vec<String> {
            self.files.lock().unwrap().keys().cloned().collect()
        }

        pub fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(key).map(|(b, _)| b.clone())
        }

        pub fn content_type(&self, key: &str) -> Option<String> {
            self.files.lock().unwrap().get(key).map(|(_, c)| c.clone())
        }

        pub fn written(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl Storage for MemoryStorage {
        fn exists(&self, key: &str) -> StorageResult<bool> {
            Ok(self.files.lock().unwrap().contains_key(key))
        }

        fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.get(key)
                .ok_or_else(|| StorageError::NotFound(key.to_string()))
        }

        fn write(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()> {
            self.files
                .lock()
                .unwrap()
                .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
            self.writes.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            Ok(self.files.lock().unwrap().remove(key).is_some())
        }

        fn locate(&self, key: &str) -> String {
            format!("memory://{key}")
        }
    }

    // =========================================================================
    // LocalStorage
    // =========================================================================

    #[test]
    fn local_write_creates_folders() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage
            .write("2024/05/harbor/hero.jpg", b"jpeg", "image/jpeg")
            .unwrap();

        assert!(storage.exists("2024/05/harbor/hero.jpg").unwrap());
        assert_eq!(storage.read("2024/05/harbor/hero.jpg").unwrap(), b"jpeg");
    }

    #[test]
    fn local_write_overwrites() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write("a/b.jpg", b"one", "image/jpeg").unwrap();
        storage.write("a/b.jpg", b"two", "image/jpeg").unwrap();
        assert_eq!(storage.read("a/b.jpg").unwrap(), b"two");
    }

    #[test]
    fn local_read_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert!(matches!(
            storage.read("missing.jpg"),
            Err(StorageError::NotFound(_))
        ));
        assert!(!storage.exists("missing.jpg").unwrap());
    }

    #[test]
    fn local_delete_reports_presence() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write("x.jpg", b"x", "image/jpeg").unwrap();
        assert!(storage.delete("x.jpg").unwrap());
        assert!(!storage.delete("x.jpg").unwrap());
    }

    #[test]
    fn local_rejects_escaping_keys() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        for key in ["../etc/passwd", "/abs.jpg", "a/../../b.jpg", ""] {
            assert!(
                matches!(storage.read(key), Err(StorageError::InvalidKey(_))),
                "{key}"
            );
        }
    }

    #[test]
    fn ensure_dir_tolerates_existing_and_concurrent_creation() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/c");
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| ensure_dir(&dir).unwrap());
            }
        });
        assert!(dir.is_dir());
        ensure_dir(&dir).unwrap();
    }

    // =========================================================================
    // Backend selection
    // =========================================================================

    #[test]
    fn url_roots_are_detected() {
        assert!(is_url("https://cdn.example.com/media"));
        assert!(is_url("http://localhost:9000"));
        assert!(!is_url("media"));
        assert!(!is_url("/srv/http/media"));
    }

    #[test]
    fn storage_for_local_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_str().unwrap();
        let storage = storage_for(root, Duration::from_secs(5)).unwrap();
        storage.write("k.png", b"png", "image/png").unwrap();
        assert!(tmp.path().join("k.png").is_file());
    }

    // =========================================================================
    // HttpStorage (against a mock server)
    // =========================================================================

    fn http_storage(server: &mockito::Server) -> HttpStorage {
        HttpStorage::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn http_exists_maps_404_to_false() {
        let mut server = mockito::Server::new();
        let missing = server
            .mock("HEAD", "/2024/05/harbor/hero.jpg")
            .with_status(404)
            .create();
        let present = server
            .mock("HEAD", "/2024/05/harbor.jpg")
            .with_status(200)
            .create();
        let storage = http_storage(&server);

        assert!(!storage.exists("2024/05/harbor/hero.jpg").unwrap());
        assert!(storage.exists("2024/05/harbor.jpg").unwrap());
        missing.assert();
        present.assert();
    }

    #[test]
    fn http_read_returns_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/a.jpg")
            .with_status(200)
            .with_body("hello")
            .create();
        let storage = http_storage(&server);

        assert_eq!(storage.read("a.jpg").unwrap(), b"hello");
        mock.assert();
    }

    #[test]
    fn http_read_missing_is_not_found() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/a.jpg").with_status(404).create();
        let storage = http_storage(&server);

        assert!(matches!(
            storage.read("a.jpg"),
            Err(StorageError::NotFound(ref url)) if url.ends_with("/a.jpg")
        ));
    }

    #[test]
    fn http_server_error_is_reported() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/a.jpg").with_status(500).create();
        let storage = http_storage(&server);

        let err = storage.read("a.jpg").unwrap_err();
        assert!(matches!(err, StorageError::Http(ref m) if m.contains("500")), "{err}");
    }

    #[test]
    fn http_write_puts_body_with_content_type() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/2024/05/harbor/hero.png")
            .match_header("content-type", "image/png")
            .match_body("pixels")
            .with_status(201)
            .create();
        let storage = http_storage(&server);

        storage
            .write("2024/05/harbor/hero.png", b"pixels", "image/png")
            .unwrap();
        mock.assert();
    }

    #[test]
    fn http_write_rejected_upload_is_an_error() {
        let mut server = mockito::Server::new();
        server.mock("PUT", "/a.jpg").with_status(403).create();
        let storage = http_storage(&server);

        let err = storage.write("a.jpg", b"x", "image/jpeg").unwrap_err();
        assert!(matches!(err, StorageError::Http(ref m) if m.contains("403")), "{err}");
    }

    #[test]
    fn http_delete_maps_status() {
        let mut server = mockito::Server::new();
        let gone = server
            .mock("DELETE", "/2024/05/harbor/hero.jpg")
            .with_status(204)
            .create();
        let missing = server
            .mock("DELETE", "/2024/05/harbor/teaser.jpg")
            .with_status(404)
            .create();
        server.mock("DELETE", "/locked.jpg").with_status(500).create();
        let storage = http_storage(&server);

        assert!(storage.delete("2024/05/harbor/hero.jpg").unwrap());
        assert!(!storage.delete("2024/05/harbor/teaser.jpg").unwrap());
        assert!(storage.delete("locked.jpg").is_err());
        gone.assert();
        missing.assert();
    }

    #[test]
    fn http_urls_share_naming_join() {
        let storage = HttpStorage::new("https://cdn.example.com/media/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            storage.locate("2024/harbor/hero.jpg"),
            "https://cdn.example.com/media/2024/harbor/hero.jpg"
        );
    }
}
