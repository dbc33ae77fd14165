//! The embedded HotScript interpreter.
//!
//! Sources are read through a [`CodeFs`], parsed into [`crate::ast`] trees and
//! executed by a tree walker. A package is built once per interpreter and never
//! changes afterwards, so handles resolved from it stay valid for as long as
//! the interpreter is alive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::ast::{ImportSpec, SnippetItem, Stmt};
use crate::codefs::{clean_path, join_path, CodeFs};
use crate::parser;

pub mod builtins;
pub mod errors;
pub(crate) mod exec;
pub(crate) mod package;
pub mod stdlib;
pub mod value;

pub use errors::EvaluatorError;
pub use exec::MAX_CALL_DEPTH;
pub use package::Package;
pub use value::{Closure, HostObject, Instance, NativeFn, SymbolTable, TypeRef, Value};

use exec::{ControlFlow, Frame};
use package::{ImportTarget, Imports, NativePackage, PackageBuilder};

#[cfg(test)]
mod tests;

/// The operations the script engine needs from an interpreter.
pub trait Interpreter: Send + Sync {
    /// Register host symbols as importable native packages.
    fn use_symbols(&self, symbols: &SymbolTable) -> Result<(), EvaluatorError>;

    /// Load the script package rooted at a logical directory.
    fn eval_path(&self, path: &str) -> Result<(), EvaluatorError>;

    /// Evaluate a package source or an interactive snippet.
    fn eval(&self, source: &str) -> Result<Value, EvaluatorError>;

    /// A loaded script package by import path.
    fn package(&self, path: &str) -> Option<Arc<Package>>;

    /// Import paths of every loaded script package, sorted.
    fn packages(&self) -> Vec<String>;
}

#[derive(Default)]
struct Session {
    imports: Imports,
    globals: HashMap<String, Value>,
}

/// Tree-walking interpreter reading its sources from a [`CodeFs`].
pub struct ScriptInterpreter {
    fs: Arc<CodeFs>,
    packages: DashMap<String, Arc<Package>>,
    natives: DashMap<String, Arc<NativePackage>>,
    loading: Mutex<HashSet<String>>,
    session: Mutex<Session>,
}

impl ScriptInterpreter {
    pub fn new(fs: Arc<CodeFs>) -> Self {
        Self {
            fs,
            packages: DashMap::new(),
            natives: DashMap::new(),
            loading: Mutex::new(HashSet::new()),
            session: Mutex::new(Session::default()),
        }
    }

    pub fn code_fs(&self) -> &Arc<CodeFs> {
        &self.fs
    }

    fn load_package(&self, path: &str) -> Result<Arc<Package>, EvaluatorError> {
        if let Some(package) = self.packages.get(path) {
            return Ok(package.clone());
        }
        if !self.loading.lock().insert(path.to_string()) {
            return Err(EvaluatorError::ImportCycle {
                path: path.to_string(),
            });
        }
        let built = self.build_package(path);
        self.loading.lock().remove(path);

        let package = built?;
        debug!(
            "loaded package {} ({} types, {} funcs)",
            path,
            package.types.len(),
            package.funcs.len()
        );
        self.packages.insert(path.to_string(), package.clone());
        Ok(package)
    }

    fn build_package(&self, path: &str) -> Result<Arc<Package>, EvaluatorError> {
        let not_found = || EvaluatorError::PackageNotFound {
            path: path.to_string(),
        };
        let entries = match self.fs.read_dir(path) {
            Ok(entries) => entries,
            Err(err) if err.is_not_found() => return Err(not_found()),
            Err(err) => return Err(err.into()),
        };

        let mut builder: Option<PackageBuilder> = None;
        for entry in entries {
            if entry.is_dir || !is_script_file(&entry.name) {
                continue;
            }
            let file_path = join_path(path, &entry.name);
            let source = String::from_utf8(self.fs.read_file(&file_path)?)
                .map_err(|_| EvaluatorError::invalid(format!("{file_path}: source is not UTF-8")))?;
            let file = parser::parse_file(&source, &file_path)?;

            let builder = builder.get_or_insert_with(|| PackageBuilder::new(path, &file.package));
            if builder.name() != file.package {
                return Err(EvaluatorError::PackageNameMismatch {
                    path: path.to_string(),
                    first: builder.name().to_string(),
                    second: file.package.clone(),
                });
            }
            let imports = self.resolve_imports(&file.imports)?;
            builder.add_file(file, imports)?;
        }

        builder.ok_or_else(not_found)?.finish()
    }

    fn resolve_imports(&self, specs: &[ImportSpec]) -> Result<Imports, EvaluatorError> {
        let mut imports = Imports::new();
        for spec in specs {
            let target = self.resolve_import(&spec.path)?;
            imports.insert(spec.name().to_string(), target);
        }
        Ok(imports)
    }

    fn resolve_import(&self, path: &str) -> Result<ImportTarget, EvaluatorError> {
        if let Some(native) = self.natives.get(path) {
            return Ok(ImportTarget::Native(native.clone()));
        }
        let path = clean_path(path);
        self.load_package(&path).map(ImportTarget::Script)
    }

    /// Build (or extend) the package named by the source's package clause and
    /// expose it to snippets under that name.
    fn define_package(&self, source: &str) -> Result<Value, EvaluatorError> {
        let file = parser::parse_file(source, "<eval>")?;
        let name = file.package.clone();
        let imports = self.resolve_imports(&file.imports)?;

        let existing = self.packages.get(&name).map(|entry| entry.clone());
        let mut builder = match &existing {
            Some(package) => PackageBuilder::extend(package),
            None => PackageBuilder::new(&name, &name),
        };
        builder.add_file(file, imports)?;
        let package = builder.finish()?;

        self.packages.insert(name.clone(), package.clone());
        self.session
            .lock()
            .imports
            .insert(name, ImportTarget::Script(package));
        Ok(Value::Nil)
    }

    fn run_snippet(&self, source: &str) -> Result<Value, EvaluatorError> {
        let items = parser::parse_snippet(source)?;
        let mut session = self.session.lock();

        let mut stmts = Vec::new();
        for item in items {
            match item {
                SnippetItem::Import(spec) => {
                    let target = self.resolve_import(&spec.path)?;
                    session.imports.insert(spec.name().to_string(), target);
                }
                SnippetItem::Stmt(stmt) => stmts.push(stmt),
            }
        }

        let package = Arc::new(Package::session(session.imports.clone()));
        let mut frame = Frame::with_globals(&package, std::mem::take(&mut session.globals));
        let result = run_stmts(&mut frame, &stmts);
        session.globals = frame.into_globals();
        result
    }
}

fn run_stmts(frame: &mut Frame<'_>, stmts: &[Stmt]) -> Result<Value, EvaluatorError> {
    let mut last = Value::Nil;
    for stmt in stmts {
        if let Stmt::Expr(expr) = stmt {
            last = frame.eval_expr(expr)?;
            continue;
        }
        last = Value::Nil;
        match frame.exec_stmt(stmt)? {
            ControlFlow::Normal => {}
            ControlFlow::Return(value) => return Ok(value),
            ControlFlow::Break | ControlFlow::Continue => {
                return Err(EvaluatorError::invalid("break or continue outside loop"))
            }
        }
    }
    Ok(last)
}

fn is_script_file(name: &str) -> bool {
    name.strip_suffix(crate::SOURCE_EXTENSION)
        .is_some_and(|stem| stem.ends_with('.') && stem.len() > 1)
}

impl Interpreter for ScriptInterpreter {
    fn use_symbols(&self, symbols: &SymbolTable) -> Result<(), EvaluatorError> {
        for (path, members) in symbols.iter() {
            if self.packages.contains_key(path) {
                return Err(EvaluatorError::PackageConflict { path: path.clone() });
            }
            let mut merged = self
                .natives
                .get(path)
                .map(|native| native.symbols.clone())
                .unwrap_or_default();
            merged.extend(members.iter().map(|(name, value)| (name.clone(), value.clone())));
            self.natives.insert(
                path.clone(),
                Arc::new(NativePackage {
                    path: path.clone(),
                    symbols: merged,
                }),
            );
        }
        Ok(())
    }

    fn eval_path(&self, path: &str) -> Result<(), EvaluatorError> {
        self.load_package(&clean_path(path)).map(|_| ())
    }

    fn eval(&self, source: &str) -> Result<Value, EvaluatorError> {
        if parser::is_source_file(source) {
            self.define_package(source)
        } else {
            self.run_snippet(source)
        }
    }

    fn package(&self, path: &str) -> Option<Arc<Package>> {
        self.packages.get(path).map(|entry| entry.clone())
    }

    fn packages(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.packages.iter().map(|entry| entry.key().clone()).collect();
        paths.sort();
        paths
    }
}
