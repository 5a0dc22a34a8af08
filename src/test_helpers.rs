//! Shared test utilities for the simple-harvest test suite.
//!
//! Provides an in-process HTTP server with canned routes, so download code
//! can be exercised against real sockets without network access.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let server = TestServer::start(vec![
//!     Route::ok("/a.jpg", b"jpeg bytes"),
//!     Route::status("/gone.jpg", 404),
//! ]);
//! let url = server.url("/a.jpg");
//! // ... download `url` ...
//! assert_eq!(server.hits("/a.jpg"), 1);
//! ```

use std::collections::HashMap;
use std::io::{Read as _, Write as _};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// =========================================================================
// Routes
// =========================================================================

/// A canned response for one request path.
#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    /// Sleep before answering; used to trigger client timeouts.
    pub delay: Duration,
}

impl Route {
    pub fn ok(path: &str, body: &[u8]) -> Self {
        Self {
            path: path.to_string(),
            status: 200,
            body: body.to_vec(),
            content_type: "image/jpeg",
            delay: Duration::ZERO,
        }
    }

    pub fn status(path: &str, status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            ..Self::ok(path, b"")
        }
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

// =========================================================================
// Server
// =========================================================================

/// Minimal HTTP/1.1 server on an ephemeral localhost port.
///
/// Unknown paths answer 404. The accept loop stops when the server is dropped.
pub struct TestServer {
    port: u16,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    _stop: Sender<()>,
}

impl TestServer {
    pub fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel::<()>();
        let routes: Arc<HashMap<String, Route>> =
            Arc::new(routes.into_iter().map(|r| (r.path.clone(), r)).collect());
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let server_hits = Arc::clone(&hits);
        thread::spawn(move || {
            listener.set_nonblocking(true).unwrap();
            loop {
                // Sender dropped with the server
                if !matches!(rx.try_recv(), Err(mpsc::TryRecvError::Empty)) {
                    break;
                }
                match listener.accept() {
                    Ok((stream, _)) => {
                        let routes = Arc::clone(&routes);
                        let hits = Arc::clone(&server_hits);
                        thread::spawn(move || serve_request(stream, &routes, &hits));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            port,
            hits,
            _stop: tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// How many requests reached `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

fn serve_request(
    mut stream: TcpStream,
    routes: &HashMap<String, Route>,
    hits: &Mutex<HashMap<String, usize>>,
) {
    // Accepted sockets inherit non-blocking mode on some platforms
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 4096];
    let n = match stream.read(&mut buf) {
        Ok(n) if n > 0 => n,
        _ => return,
    };
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
    *hits.lock().unwrap().entry(path.clone()).or_default() += 1;

    let (status, body, content_type) = match routes.get(&path) {
        Some(route) => {
            thread::sleep(route.delay);
            (route.status, route.body.clone(), route.content_type)
        }
        None => (404, b"Not Found".to_vec(), "text/plain"),
    };

    let header = format!(
        "HTTP/1.1 {status} {}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n",
        reason_phrase(status),
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
}

/// A localhost URL nothing is listening on.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/image.jpg")
}
