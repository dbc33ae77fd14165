//! Virtual code filesystem.
//!
//! Overlays an in-memory store of fake files on top of a list of logical
//! prefix -> physical directory mappings. The interpreter only ever sees
//! logical, slash-separated paths.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

#[cfg(test)]
mod tests;

/// Errors raised by [`CodeFs`]
#[derive(Error, Debug)]
pub enum FsError {
    #[error("open {path}: file does not exist")]
    NotFound { path: String },

    #[error("{path}: file already exists")]
    AlreadyExists { path: String },

    #[error("{path}: is a directory")]
    IsDirectory { path: String },

    #[error("read {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }

    fn not_found(path: &str) -> Self {
        FsError::NotFound {
            path: path.to_string(),
        }
    }
}

/// Metadata returned by [`CodeFs::stat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub len: u64,
    pub is_dir: bool,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// An opened file, either from the fake store or from disk
#[derive(Debug)]
pub enum CodeFile {
    Memory(Cursor<Arc<[u8]>>),
    Disk(File),
}

impl Read for CodeFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            CodeFile::Memory(cursor) => cursor.read(buf),
            CodeFile::Disk(file) => file.read(buf),
        }
    }
}

#[derive(Default)]
struct FakeStore {
    files: BTreeMap<String, Arc<[u8]>>,
    dirs: BTreeSet<String>,
}

impl FakeStore {
    fn create_dirs(&mut self, dir: &str) {
        let mut current = dir;
        while current != "." && current != "/" && !current.is_empty() {
            if !self.dirs.insert(current.to_string()) {
                break;
            }
            current = parent_of(current);
        }
    }

    fn children(&self, dir: &str) -> Vec<DirEntry> {
        let prefix = if dir == "." {
            String::new()
        } else {
            format!("{dir}/")
        };
        let direct = |name: &str| -> Option<String> {
            let rest = name.strip_prefix(prefix.as_str())?;
            (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
        };

        let mut entries: Vec<DirEntry> = self
            .dirs
            .iter()
            .filter_map(|d| direct(d))
            .map(|name| DirEntry { name, is_dir: true })
            .collect();
        entries.extend(
            self.files
                .keys()
                .filter_map(|f| direct(f))
                .map(|name| DirEntry {
                    name,
                    is_dir: false,
                }),
        );
        entries
    }
}

/// Overlay filesystem consumed by the interpreter.
///
/// Fake files always win over mapped directories; mappings are consulted
/// most recent first. Every miss reports the same [`FsError::NotFound`].
pub struct CodeFs {
    root: String,
    mappings: RwLock<Vec<(String, PathBuf)>>,
    fake: RwLock<FakeStore>,
}

impl std::fmt::Debug for CodeFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeFs")
            .field("root", &self.root)
            .field("mappings", &*self.mappings.read())
            .field("fake_files", &self.fake.read().files.len())
            .finish()
    }
}

impl CodeFs {
    /// Create a filesystem whose incoming names may carry `root` as a prefix,
    /// which is stripped before any lookup.
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let root = if root.is_empty() {
            root
        } else {
            clean_path(&root)
        };
        Self {
            root,
            mappings: RwLock::new(Vec::new()),
            fake: RwLock::new(FakeStore::default()),
        }
    }

    /// Mount `local` under the logical prefix `logical`.
    pub fn mapping(&self, logical: &str, local: impl AsRef<Path>) -> Result<(), FsError> {
        let logical = clean_path(logical);
        let local = std::path::absolute(local.as_ref()).map_err(|source| FsError::Io {
            path: local.as_ref().display().to_string(),
            source,
        })?;

        let mut mappings = self.mappings.write();
        if mappings.iter().any(|(prefix, _)| *prefix == logical) {
            return Err(FsError::AlreadyExists { path: logical });
        }
        tracing::debug!("mapping {} -> {}", logical, local.display());
        mappings.push((logical, local));
        Ok(())
    }

    /// Remove the mapping for `logical`, if any.
    pub fn unmapping(&self, logical: &str) {
        let logical = clean_path(logical);
        self.mappings.write().retain(|(prefix, _)| *prefix != logical);
    }

    pub fn is_mapped(&self, logical: &str) -> bool {
        let logical = clean_path(logical);
        self.mappings.read().iter().any(|(prefix, _)| *prefix == logical)
    }

    /// Add an in-memory file; fails if `name` already exists in the overlay.
    pub fn add_fake_file(&self, name: &str, data: impl Into<Arc<[u8]>>) -> Result<(), FsError> {
        let name = self.logical_name(name);
        if self.exists(&name) {
            return Err(FsError::AlreadyExists { path: name });
        }
        self.store_fake(name, data.into());
        Ok(())
    }

    /// Create or truncate an in-memory file.
    pub fn write_fake_file(&self, name: &str, data: impl Into<Arc<[u8]>>) {
        let name = self.logical_name(name);
        self.store_fake(name, data.into());
    }

    /// Create an in-memory directory and all of its parents.
    pub fn create_fake_dir(&self, name: &str) {
        let name = self.logical_name(name);
        self.fake.write().create_dirs(&name);
    }

    pub fn remove_fake_file(&self, name: &str) {
        let name = self.logical_name(name);
        self.fake.write().files.remove(&name);
    }

    /// Drop every fake file and directory at or below `name`.
    pub fn remove_fake_tree(&self, name: &str) {
        let name = self.logical_name(name);
        let mut fake = self.fake.write();
        fake.files.retain(|path, _| !has_path_prefix(path, &name));
        fake.dirs.retain(|path| !has_path_prefix(path, &name));
    }

    pub fn open(&self, name: &str) -> Result<CodeFile, FsError> {
        let name = self.logical_name(name);
        {
            let fake = self.fake.read();
            if let Some(data) = fake.files.get(&name) {
                return Ok(CodeFile::Memory(Cursor::new(data.clone())));
            }
            if fake.dirs.contains(&name) {
                return Err(FsError::IsDirectory { path: name });
            }
        }

        for local in self.candidates(&name) {
            match std::fs::metadata(&local) {
                Ok(meta) if meta.is_dir() => return Err(FsError::IsDirectory { path: name }),
                Ok(_) => {
                    if let Ok(file) = File::open(&local) {
                        return Ok(CodeFile::Disk(file));
                    }
                }
                Err(_) => continue,
            }
        }
        Err(FsError::not_found(&name))
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>, FsError> {
        let mut file = self.open(name)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).map_err(|source| FsError::Io {
            path: name.to_string(),
            source,
        })?;
        Ok(data)
    }

    pub fn stat(&self, name: &str) -> Result<FileStat, FsError> {
        let name = self.logical_name(name);
        let base = base_name(&name);
        {
            let fake = self.fake.read();
            if let Some(data) = fake.files.get(&name) {
                return Ok(FileStat {
                    name: base,
                    len: data.len() as u64,
                    is_dir: false,
                });
            }
            if fake.dirs.contains(&name) {
                return Ok(FileStat {
                    name: base,
                    len: 0,
                    is_dir: true,
                });
            }
        }

        self.candidates(&name)
            .into_iter()
            .find_map(|local| std::fs::metadata(local).ok())
            .map(|meta| FileStat {
                name: base,
                len: meta.len(),
                is_dir: meta.is_dir(),
            })
            .ok_or_else(|| FsError::not_found(&name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.stat(name).is_ok()
    }

    /// List a directory, merging fake entries over the first mapped physical
    /// directory that can be read. Entries are unique and sorted by name.
    ///
    /// An existing but empty directory lists as [`FsError::NotFound`], even
    /// though [`CodeFs::stat`] reports it as a directory.
    pub fn read_dir(&self, name: &str) -> Result<Vec<DirEntry>, FsError> {
        let name = self.logical_name(name);

        let mut entries: BTreeMap<String, DirEntry> = BTreeMap::new();
        for local in self.candidates(&name) {
            let Ok(listing) = std::fs::read_dir(&local) else {
                continue;
            };
            for entry in listing.flatten() {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                let entry_name = entry.file_name().to_string_lossy().into_owned();
                entries.insert(
                    entry_name.clone(),
                    DirEntry {
                        name: entry_name,
                        is_dir,
                    },
                );
            }
            break;
        }

        for entry in self.fake.read().children(&name) {
            entries.insert(entry.name.clone(), entry);
        }

        if entries.is_empty() {
            return Err(FsError::not_found(&name));
        }
        Ok(entries.into_values().collect())
    }

    /// All files below `dir`, depth first, as logical paths.
    pub fn walk(&self, dir: &str) -> Result<Vec<String>, FsError> {
        let dir = self.logical_name(dir);
        let mut files = Vec::new();
        let mut pending = vec![dir];
        while let Some(current) = pending.pop() {
            let entries = match self.read_dir(&current) {
                Ok(entries) => entries,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };
            for entry in entries.into_iter().rev() {
                let path = join_path(&current, &entry.name);
                if entry.is_dir {
                    pending.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn store_fake(&self, name: String, data: Arc<[u8]>) {
        let mut fake = self.fake.write();
        let parent = parent_of(&name).to_string();
        fake.create_dirs(&parent);
        fake.files.insert(name, data);
    }

    fn logical_name(&self, name: &str) -> String {
        let name = clean_path(name);
        if self.root.is_empty() {
            return name;
        }
        if name == self.root {
            return ".".to_string();
        }
        match name.strip_prefix(&format!("{}/", self.root)) {
            Some(rest) => rest.to_string(),
            None => name,
        }
    }

    /// Physical locations that may hold `name`, newest mapping first.
    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        self.mappings
            .read()
            .iter()
            .rev()
            .filter_map(|(prefix, local)| {
                if prefix == "." {
                    return Some(if name == "." {
                        local.clone()
                    } else {
                        local.join(name)
                    });
                }
                if name == prefix {
                    return Some(local.clone());
                }
                name.strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(|rest| local.join(rest))
            })
            .collect()
    }
}

/// Lexically normalise a slash-separated path: collapse repeated separators,
/// drop `.` segments and resolve `..` where possible. The empty path is `.`.
pub fn clean_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if !rooted => segments.push(".."),
                _ => {}
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join two logical paths.
pub fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() || base == "." {
        clean_path(name)
    } else {
        clean_path(&format!("{base}/{name}"))
    }
}

/// True when `path` equals `prefix` or lies below it.
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
    prefix == "."
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    }
}

fn base_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
