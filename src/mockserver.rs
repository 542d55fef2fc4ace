//! A tiny canned-response HTTP server for exercising the discovery code
//! without talking to a real platform.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

pub(crate) struct MockResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl MockResponse {
    pub fn new(status: u16, body: &str) -> MockResponse {
        MockResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn json(body: &str) -> MockResponse {
        MockResponse::new(200, body).with_header("Content-Type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> MockResponse {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

pub(crate) struct MockServer {
    base: String,
    hits: Arc<AtomicUsize>,
}

impl MockServer {
    /// Bind to an ephemeral port and serve the routes built by `routes`,
    /// which receives the server's base URL so responses can link back to
    /// it (pagination).
    pub fn start<F>(routes: F) -> MockServer
    where
        F: FnOnce(&str) -> Vec<(String, MockResponse)>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Couldn't bind the mock server");
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes = routes(&base);
        let hits = Arc::new(AtomicUsize::new(0));

        let handler_hits = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(_) => break,
                };
                handler_hits.fetch_add(1, Ordering::SeqCst);
                handle(&mut stream, &routes);
            }
        });

        MockServer { base, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// The total number of requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn handle(stream: &mut TcpStream, routes: &[(String, MockResponse)]) {
    let mut raw = Vec::new();
    let mut buf = [0_u8; 1024];

    // Read until the end of the request headers. GETs carry no body.
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
            Err(_) => return,
        }
    }

    let request = String::from_utf8_lossy(&raw);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let response = routes.iter().find(|(route, _)| route == path);

    let (status, headers, body) = match response {
        Some((_, r)) => (r.status, r.headers.as_slice(), r.body.as_str()),
        None => (404, &[] as &[(String, String)], "not found"),
    };

    let mut out = format!("HTTP/1.1 {} MOCK\r\n", status);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    ));

    let _ = stream.write_all(out.as_bytes());
    let _ = stream.flush();
}
