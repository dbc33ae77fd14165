//! Downloads remote script archives and unpacks them into a [`CodeFs`].
//!
//! Everything here blocks; async callers run it on the blocking pool.

use std::io::{Cursor, Read};
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::codefs::{join_path, CodeFs};


const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("requesting {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {url}: unexpected status {status}")]
    Status { url: String, status: u16 },

    #[error("{url}: unsupported archive type (expected .tar.gz, .tgz or .zip)")]
    UnsupportedArchive { url: String },

    #[error("{url}: corrupt archive while {stage}: {message}")]
    Corrupt {
        url: String,
        stage: &'static str,
        message: String,
    },
}

impl FetchError {
    fn corrupt(url: &str, stage: &'static str, err: impl std::fmt::Display) -> Self {
        FetchError::Corrupt {
            url: url.to_string(),
            stage,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    /// Picks the format from the file extension of the URL path.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if path.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }
}

/// What was fetched from a remote project, for change detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFingerprint {
    pub url: String,
    pub etag: Option<String>,
    /// Hex SHA-256 of the archive body
    pub digest: String,
}

pub struct ArchiveFetcher {
    client: Client,
}

impl ArchiveFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Download `url` and extract it below `mount_root`.
    pub fn fetch_into(&self, url: &str, fs: &CodeFs, mount_root: &str) -> Result<RemoteFingerprint, FetchError> {
        let kind = ArchiveKind::from_url(url).ok_or_else(|| FetchError::UnsupportedArchive {
            url: url.to_string(),
        })?;

        let (etag, body) = self.download(url)?;
        let digest = digest(&body);
        let count = extract(kind, &body, fs, mount_root, url)?;
        info!("fetched {} ({} bytes, {} files) into {}", url, body.len(), count, mount_root);

        Ok(RemoteFingerprint {
            url: url.to_string(),
            etag,
            digest,
        })
    }

    /// True when the remote content differs from `fingerprint`.
    pub fn probe(&self, fingerprint: &RemoteFingerprint) -> Result<bool, FetchError> {
        let url = &fingerprint.url;
        let mut request = self.client.get(url);
        if let Some(etag) = &fingerprint.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let response = request.send().map_err(|source| FetchError::Request {
            url: url.clone(),
            source,
        })?;

        match response.status() {
            StatusCode::NOT_MODIFIED => Ok(false),
            StatusCode::OK => {
                let body = response.bytes().map_err(|source| FetchError::Request {
                    url: url.clone(),
                    source,
                })?;
                let changed = digest(&body) != fingerprint.digest;
                debug!("probed {}: changed={}", url, changed);
                Ok(changed)
            }
            status => Err(FetchError::Status {
                url: url.clone(),
                status: status.as_u16(),
            }),
        }
    }

    fn download(&self, url: &str) -> Result<(Option<String>, Vec<u8>), FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(request_error)?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().map_err(request_error)?;
        Ok((etag, body.to_vec()))
    }
}

pub fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Unpack `data` below `mount_root`, returning the number of files written.
/// Entries that would escape the mount root are skipped.
pub fn extract(
    kind: ArchiveKind,
    data: &[u8],
    fs: &CodeFs,
    mount_root: &str,
    url: &str,
) -> Result<usize, FetchError> {
    match kind {
        ArchiveKind::TarGz => extract_tar_gz(data, fs, mount_root, url),
        ArchiveKind::Zip => extract_zip(data, fs, mount_root, url),
    }
}

fn extract_tar_gz(data: &[u8], fs: &CodeFs, mount_root: &str, url: &str) -> Result<usize, FetchError> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(data)));
    let entries = archive
        .entries()
        .map_err(|err| FetchError::corrupt(url, "reading entries", err))?;

    let mut count = 0;
    for entry in entries {
        let mut entry = entry.map_err(|err| FetchError::corrupt(url, "reading entry", err))?;
        let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let Some(relative) = entry_path(&raw) else {
            debug!("skipping archive entry {:?}", raw);
            continue;
        };
        let target = join_path(mount_root, &relative);

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs.create_fake_dir(&target);
        } else if kind.is_file() {
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|err| FetchError::corrupt(url, "reading file", err))?;
            fs.write_fake_file(&target, content);
            count += 1;
        }
    }
    Ok(count)
}

fn extract_zip(data: &[u8], fs: &CodeFs, mount_root: &str, url: &str) -> Result<usize, FetchError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|err| FetchError::corrupt(url, "opening zip", err))?;

    let mut count = 0;
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|err| FetchError::corrupt(url, "reading entry", err))?;
        let raw = file.name().to_string();
        let Some(relative) = entry_path(&raw) else {
            debug!("skipping archive entry {:?}", raw);
            continue;
        };
        let target = join_path(mount_root, &relative);

        if file.is_dir() {
            fs.create_fake_dir(&target);
        } else {
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(|err| FetchError::corrupt(url, "reading file", err))?;
            fs.write_fake_file(&target, content);
            count += 1;
        }
    }
    Ok(count)
}

/// Normalised relative path of an archive entry, or `None` when the entry
/// is empty or contains a `..` segment.
fn entry_path(raw: &str) -> Option<String> {
    let raw = raw.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => segments.push(other),
        }
    }
    (!segments.is_empty()).then(|| segments.join("/"))
}
