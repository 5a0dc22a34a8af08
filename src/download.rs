//! Image download.
//!
//! One bounded GET per URL. A 2xx body is written to `<dest>.part` and then
//! renamed onto `dest`, so `dest` only ever holds a complete body; anything
//! else is a [`DownloadError`] for the caller to report. There are no retries.

use crate::config::DownloadConfig;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server answered {0}")]
    Status(u16),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches one URL into one file.
///
/// Implementations must be `Sync`: the pipeline calls them from rayon's
/// `par_iter` when more than one download worker is configured.
pub trait Downloader: Sync {
    /// Fetch `url` and write the body to `dest`, overwriting it. Returns the
    /// number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// Blocking `reqwest` client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new(config: &DownloadConfig) -> Result<Self, DownloadError> {
        Self::with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }
        let body = response.bytes()?;

        let part = part_path(dest);
        if let Err(e) = fs::write(&part, &body).and_then(|()| fs::rename(&part, dest)) {
            let _ = fs::remove_file(&part);
            return Err(e.into());
        }
        tracing::debug!(url, dest = %dest.display(), bytes = body.len(), "image saved");
        Ok(body.len() as u64)
    }
}

/// `<dest>.part`, next to `dest` so the rename stays on one filesystem.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::test_helpers::{Route, TestServer, refused_url};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Mock downloader that records calls instead of touching the network.
    ///
    /// URLs listed in `failures` answer with that status; all others succeed
    /// and write the URL itself as the file body.
    #[derive(Default)]
    pub struct MockDownloader {
        pub failures: HashMap<String, u16>,
        pub calls: Mutex<Vec<(String, PathBuf)>>,
    }

    impl MockDownloader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(urls: &[(&str, u16)]) -> Self {
            Self {
                failures: urls.iter().map(|(u, s)| (u.to_string(), *s)).collect(),
                ..Self::default()
            }
        }

        pub fn get_calls(&self) -> Vec<(String, PathBuf)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Downloader for MockDownloader {
        fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), dest.to_path_buf()));
            if let Some(&status) = self.failures.get(url) {
                return Err(DownloadError::Status(status));
            }
            fs::write(dest, url)?;
            Ok(url.len() as u64)
        }
    }

    fn downloader() -> HttpDownloader {
        HttpDownloader::with_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn ok_response_writes_body() {
        let server = TestServer::start(vec![Route::ok("/a.jpg", b"\xFF\xD8jpeg")]);
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("0000.jpg");

        let bytes = downloader().download(&server.url("/a.jpg"), &dest).unwrap();

        assert_eq!(bytes, 6);
        assert_eq!(fs::read(&dest).unwrap(), b"\xFF\xD8jpeg");
        assert!(!part_path(&dest).exists());
    }

    #[test]
    fn not_found_leaves_no_file() {
        let server = TestServer::start(vec![]);
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("0000.jpg");

        let result = downloader().download(&server.url("/missing.jpg"), &dest);

        assert!(matches!(result, Err(DownloadError::Status(404))));
        assert!(!dest.exists());
        assert_eq!(server.hits("/missing.jpg"), 1);
    }

    #[test]
    fn server_error_is_status_failure() {
        let server = TestServer::start(vec![Route::status("/busy.jpg", 503)]);
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("0000.jpg");

        let result = downloader().download(&server.url("/busy.jpg"), &dest);
        assert!(matches!(result, Err(DownloadError::Status(503))));
        assert!(!dest.exists());
    }

    #[test]
    fn existing_file_is_overwritten() {
        let server = TestServer::start(vec![Route::ok("/a.jpg", b"new")]);
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("0000.jpg");
        fs::write(&dest, b"old contents from a previous run").unwrap();

        downloader().download(&server.url("/a.jpg"), &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn failed_status_keeps_previous_file() {
        let server = TestServer::start(vec![Route::status("/gone.jpg", 404)]);
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("0000.jpg");
        fs::write(&dest, b"previous").unwrap();

        assert!(downloader().download(&server.url("/gone.jpg"), &dest).is_err());
        assert_eq!(fs::read(&dest).unwrap(), b"previous");
    }

    #[test]
    fn connection_refused_is_http_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("0000.jpg");

        let result = downloader().download(&refused_url(), &dest);
        assert!(matches!(result, Err(DownloadError::Http(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn slow_server_times_out() {
        let server = TestServer::start(vec![
            Route::ok("/slow.jpg", b"late").delayed(Duration::from_secs(3)),
        ]);
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("0000.jpg");

        let fast = HttpDownloader::with_timeout(Duration::from_millis(200)).unwrap();
        let result = fast.download(&server.url("/slow.jpg"), &dest);

        match result {
            Err(DownloadError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn unwritable_destination_is_io_error() {
        let server = TestServer::start(vec![Route::ok("/a.jpg", b"data")]);
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("no-such-dir").join("0000.jpg");

        let result = downloader().download(&server.url("/a.jpg"), &dest);
        assert!(matches!(result, Err(DownloadError::Io(_))));
    }

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("dataset/polar bear/0007.jpg")),
            PathBuf::from("dataset/polar bear/0007.jpg.part")
        );
    }

    #[test]
    fn new_uses_config_timeout() {
        assert!(HttpDownloader::new(&DownloadConfig::default()).is_ok());
    }
}
