//! Finds extension points by inspecting parsed sources.
//!
//! A struct whose first field is a pointer to an imported type extends that
//! type. A func type taking nothing and returning a pointer to an imported
//! type extends it in function style. Every other type is registered unbound,
//! and free functions land on the package's `""` script.

use thiserror::Error;
use tracing::{debug, warn};

use super::{Anchor, Extension, Script, ScriptLibrary};
use crate::ast::{SourceFile, TypeExpr, TypeSpec};
use crate::codefs::{CodeFs, FsError};
use crate::parser::{self, ParseError};

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: FsError,
    },

    #[error("{path}: source is not valid UTF-8")]
    Encoding { path: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("walking {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: FsError,
    },
}

struct ParsedFile {
    package_path: String,
    ast: SourceFile,
}

/// Parse every script under `script_path` and register what it declares.
/// Returns the package paths found, sorted.
pub fn load(fs: &CodeFs, script_path: &str, library: &mut ScriptLibrary) -> Result<Vec<String>, DiscoveryError> {
    let paths = fs.walk(script_path).map_err(|source| DiscoveryError::Walk {
        path: script_path.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for path in paths.into_iter().filter(|p| is_script_path(p)) {
        let data = fs.read_file(&path).map_err(|source| DiscoveryError::Read {
            path: path.clone(),
            source,
        })?;
        let source = String::from_utf8(data).map_err(|_| DiscoveryError::Encoding { path: path.clone() })?;
        let ast = parser::parse_file(&source, &path)?;
        files.push(ParsedFile {
            package_path: parent(&path).to_string(),
            ast,
        });
    }

    for file in &files {
        let package = &file.ast.package;
        // Repeated for every file of a package; only the first one sticks.
        library.push_ident(Script::new(package, &file.package_path, "", Extension::Unbound));

        for spec in file.ast.types() {
            let extension = classify(&file.ast, spec);
            debug!(
                "discovered {}.{} ({:?})",
                file.package_path,
                spec.name,
                extension.bind_mode()
            );
            let script = Script::new(package, &file.package_path, &spec.name, extension);
            if !library.push_ident(script) {
                warn!("duplicate script {}.{} ignored", file.package_path, spec.name);
            }
        }
    }

    for file in &files {
        for func in file.ast.funcs() {
            let ident = func
                .receiver
                .as_ref()
                .map(|receiver| receiver.type_name.as_str())
                .unwrap_or("");
            library.push_method(&file.package_path, ident, &func.name);
        }
    }

    let mut packages: Vec<String> = files.into_iter().map(|file| file.package_path).collect();
    packages.sort();
    packages.dedup();
    Ok(packages)
}

fn classify(file: &SourceFile, spec: &TypeSpec) -> Extension {
    match &spec.ty {
        TypeExpr::Struct(fields) => fields
            .first()
            .and_then(|field| imported_pointer(file, &field.ty))
            .map(Extension::Struct),
        TypeExpr::Func(signature) if signature.params.is_empty() && signature.results.len() == 1 => {
            signature.results[0]
                .ty
                .as_ref()
                .and_then(|ty| imported_pointer(file, ty))
                .map(Extension::Function)
        }
        _ => None,
    }
    .unwrap_or(Extension::Unbound)
}

/// `*alias.Name` where `alias` is imported by `file`.
fn imported_pointer(file: &SourceFile, ty: &TypeExpr) -> Option<Anchor> {
    let TypeExpr::Pointer(inner) = ty else {
        return None;
    };
    let TypeExpr::Named {
        package: Some(alias),
        name,
    } = inner.as_ref()
    else {
        return None;
    };
    let import = file.import(alias)?;
    Some(Anchor {
        name: name.clone(),
        package_name: alias.clone(),
        package_path: import.path.clone(),
    })
}

fn is_script_path(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .and_then(|name| name.strip_suffix(crate::SOURCE_EXTENSION))
        .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
}

fn parent(path: &str) -> &str {
    path.rfind('/').map(|index| &path[..index]).unwrap_or(".")
}
