//! One generation of loaded scripts.
//!
//! A [`Solution`] owns its filesystem, interpreter and script library. It is
//! filled by [`Solution::load`] and never changed once published; a reload
//! builds a new one.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::codefs::{join_path, CodeFs, FsError};
use crate::evaluator::{EvaluatorError, Interpreter, ScriptInterpreter, SymbolTable, Value};
use crate::fetch::{ArchiveFetcher, FetchError, RemoteFingerprint};
use crate::script::{self, CompileError, DiscoveryError, ScriptBundle, ScriptLibrary};

#[derive(Error, Debug)]
pub enum SolutionError {
    #[error("script path {path} already exists")]
    Conflict { path: String },

    #[error("mounting {path}: {source}")]
    Mount {
        path: String,
        #[source]
        source: FsError,
    },

    #[error("local path {} is not a directory", path.display())]
    LocalPath { path: PathBuf },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("registering symbols: {0}")]
    Symbols(#[source] EvaluatorError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A unit of externally authored scripts to mount
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    /// Mounted at `<pkg_root>/<script_root>`
    pub script_root: String,
    pub local_path: Option<PathBuf>,
    pub remote_url: Option<String>,
    /// Host symbols made importable before the scripts load
    #[serde(skip)]
    pub symbols: Vec<SymbolTable>,
}

impl Project {
    pub fn new(script_root: impl Into<String>) -> Self {
        Self {
            script_root: script_root.into(),
            ..Self::default()
        }
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols.push(symbols);
        self
    }
}

pub struct Solution {
    pkg_root: String,
    code_fs: Arc<CodeFs>,
    interp: Box<dyn Interpreter>,
    library: ScriptLibrary,
    remotes: Vec<RemoteFingerprint>,
}

impl Solution {
    pub fn new(pkg_root: &str) -> Self {
        let code_fs = Arc::new(CodeFs::new(""));
        let interp = Box::new(ScriptInterpreter::new(code_fs.clone()));
        Self {
            pkg_root: pkg_root.to_string(),
            code_fs,
            interp,
            library: ScriptLibrary::new(),
            remotes: Vec::new(),
        }
    }

    /// Mount a project and compile its scripts. On failure the mount, any
    /// fetched files and the library are left as they were before the call.
    pub fn load(&mut self, project: &Project) -> Result<(), SolutionError> {
        let script_path = join_path(&self.pkg_root, &project.script_root);
        if self.code_fs.is_mapped(&script_path) || self.code_fs.exists(&script_path) {
            return Err(SolutionError::Conflict { path: script_path });
        }

        if let Some(local) = &project.local_path {
            if !local.is_dir() {
                return Err(SolutionError::LocalPath { path: local.clone() });
            }
            self.code_fs
                .mapping(&script_path, local)
                .map_err(|source| SolutionError::Mount {
                    path: script_path.clone(),
                    source,
                })?;
        }

        match self.load_mounted(project, &script_path) {
            Ok((library, remote)) => {
                self.library = library;
                self.remotes.extend(remote);
                info!("loaded project {}", script_path);
                Ok(())
            }
            Err(err) => {
                warn!("loading project {} failed, unmounting: {}", script_path, err);
                self.code_fs.unmapping(&script_path);
                self.code_fs.remove_fake_tree(&script_path);
                Err(err)
            }
        }
    }

    fn load_mounted(
        &self,
        project: &Project,
        script_path: &str,
    ) -> Result<(ScriptLibrary, Option<RemoteFingerprint>), SolutionError> {
        let remote = match &project.remote_url {
            Some(url) => Some(ArchiveFetcher::new()?.fetch_into(url, &self.code_fs, script_path)?),
            None => None,
        };

        for symbols in &project.symbols {
            self.use_symbols(symbols)?;
        }

        let mut library = self.library.clone();
        let mut packages = script::load(&self.code_fs, script_path, &mut library)?;
        // nested roots may reach packages an earlier project already compiled
        packages.retain(|path| self.library.package(path).is_none());
        script::compile(self.interp.as_ref(), &mut library, &packages)?;
        Ok((library, remote))
    }

    /// Handle of a free function in package `pkg`.
    pub fn method(&self, pkg: &str, name: &str) -> Option<&Value> {
        self.library.script(pkg, "")?.method(name)?.handle.as_ref()
    }

    /// The script override of `method` for the host object `this`, or `None`
    /// when the host should fall back to its own behaviour.
    pub fn bind_method(&self, this: &Value, pkg: &str, ident: &str, method: &str) -> Option<Value> {
        self.library.script(pkg, ident)?.resolve(this, method)
    }

    pub fn use_symbols(&self, symbols: &SymbolTable) -> Result<(), SolutionError> {
        self.interp.use_symbols(symbols).map_err(SolutionError::Symbols)
    }

    pub fn eval(&self, source: &str) -> Result<Value, EvaluatorError> {
        self.interp.eval(source)
    }

    pub fn package(&self, path: &str) -> Option<&ScriptBundle> {
        self.library.package(path)
    }

    /// Script package paths, sorted.
    pub fn packages(&self) -> Vec<String> {
        self.library.packages().map(|(path, _)| path.to_string()).collect()
    }

    pub fn library(&self) -> &ScriptLibrary {
        &self.library
    }

    pub fn code_fs(&self) -> &Arc<CodeFs> {
        &self.code_fs
    }

    pub fn pkg_root(&self) -> &str {
        &self.pkg_root
    }

    pub fn remotes(&self) -> &[RemoteFingerprint] {
        &self.remotes
    }

    /// Blocking. True when any remote project serves different content now.
    pub fn remote_changed(&self) -> Result<bool, FetchError> {
        if self.remotes.is_empty() {
            return Ok(false);
        }
        let fetcher = ArchiveFetcher::new()?;
        for remote in &self.remotes {
            if fetcher.probe(remote)? {
                info!("remote scripts changed: {}", remote.url);
                return Ok(true);
            }
        }
        Ok(false)
    }
}
