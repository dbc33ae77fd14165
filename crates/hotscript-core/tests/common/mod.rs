//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;

pub fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Serves one archive at `/scripts.tar.gz` until the test exits. The content
/// and its ETag can be swapped while it runs.
#[derive(Clone)]
pub struct ArchiveServer {
    current: Arc<Mutex<(Vec<u8>, String)>>,
    url: String,
}

impl ArchiveServer {
    pub fn start(body: Vec<u8>, etag: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/scripts.tar.gz", listener.local_addr().unwrap());
        let current = Arc::new(Mutex::new((body, etag.to_string())));

        let serving = current.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                let mut if_none_match = None;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line.trim().is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("if-none-match") {
                            if_none_match = Some(value.trim().to_string());
                        }
                    }
                }

                let (body, etag) = serving.lock().clone();
                let requested = request_line.split_whitespace().nth(1).unwrap_or("");
                let response = if requested != "/scripts.tar.gz" {
                    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
                } else if if_none_match.as_deref() == Some(etag.as_str()) {
                    b"HTTP/1.1 304 Not Modified\r\nConnection: close\r\n\r\n".to_vec()
                } else {
                    let mut response = format!(
                        "HTTP/1.1 200 OK\r\nETag: {etag}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    )
                    .into_bytes();
                    response.extend_from_slice(&body);
                    response
                };
                let _ = stream.write_all(&response);
            }
        });

        Self { current, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn replace(&self, body: Vec<u8>, etag: &str) {
        *self.current.lock() = (body, etag.to_string());
    }
}
