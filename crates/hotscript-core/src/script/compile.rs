//! Turns discovered scripts into callable handles.
//!
//! Each extension script gets a generated `Bind_<Ident>` dispatcher that wraps
//! the host value in the script type and selects the requested method from it.

use thiserror::Error;
use tracing::{debug, info};

use super::{Anchor, Extension, MethodBinder, Script, ScriptLibrary};
use crate::evaluator::{EvaluatorError, Interpreter};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("loading package {package}: {source}")]
    Package {
        package: String,
        #[source]
        source: EvaluatorError,
    },

    #[error("compiling binder for {package}.{ident}: {source}")]
    Binder {
        package: String,
        ident: String,
        #[source]
        source: EvaluatorError,
    },

    #[error("{package}.{ident}: incorrect method binder type")]
    BinderType { package: String, ident: String },

    #[error("resolving {symbol}: {source}")]
    Method {
        symbol: String,
        #[source]
        source: EvaluatorError,
    },
}

/// Evaluate `packages` and resolve their binders and methods.
pub fn compile(
    interp: &dyn Interpreter,
    library: &mut ScriptLibrary,
    packages: &[String],
) -> Result<(), CompileError> {
    for path in packages {
        interp.eval_path(path).map_err(|source| CompileError::Package {
            package: path.clone(),
            source,
        })?;

        let Some(bundle) = library.package_mut(path) else {
            continue;
        };
        let mut imported = false;
        for script in bundle.scripts_mut() {
            if let Some(anchor) = script.extension.anchor().cloned() {
                compile_binder(interp, script, &anchor)?;
            }
            if !imported {
                let alias = script.unique_package_name();
                interp
                    .eval(&format!("import {alias} {:?}", script.package_path))
                    .map_err(|source| CompileError::Package {
                        package: path.clone(),
                        source,
                    })?;
                imported = true;
            }
            resolve_methods(interp, script)?;
        }
        info!("compiled script package {}", path);
    }
    Ok(())
}

fn compile_binder(interp: &dyn Interpreter, script: &mut Script, anchor: &Anchor) -> Result<(), CompileError> {
    let binder_error = |source| CompileError::Binder {
        package: script.package_path.clone(),
        ident: script.ident.clone(),
        source,
    };

    let source = render_binder(script, anchor);
    debug!("binder for {}.{}:\n{}", script.package_path, script.ident, source);
    interp.eval(&source).map_err(binder_error)?;

    let symbol = format!("{}_export.Bind_{}", script.unique_package_name(), script.ident);
    let binder = interp.eval(&symbol).map_err(binder_error)?;
    if binder.arity() != Some(2) {
        return Err(CompileError::BinderType {
            package: script.package_path.clone(),
            ident: script.ident.clone(),
        });
    }
    script.set_binder(MethodBinder::new(binder));
    Ok(())
}

/// Source of the dispatcher for one extension script.
fn render_binder(script: &Script, anchor: &Anchor) -> String {
    let wrap = match script.extension {
        Extension::Function(_) => format!(
            "script.{}(this.(func() *anchor.{}))",
            script.ident, anchor.name
        ),
        _ => format!("script.{}{{this.(*anchor.{})}}", script.ident, anchor.name),
    };

    let cases: String = script
        .methods()
        .iter()
        .map(|method| format!("    case {:?}:\n        return {wrap}.{}\n", method.name, method.name))
        .collect();

    format!(
        "package {unique}_export\n\n\
         import (\n    script {script_path:?}\n    anchor {anchor_path:?}\n)\n\n\
         func Bind_{ident}(this any, method string) any {{\n    switch method {{\n{cases}    }}\n    return nil\n}}\n",
        unique = script.unique_package_name(),
        script_path = script.package_path,
        anchor_path = anchor.package_path,
        ident = script.ident,
    )
}

fn resolve_methods(interp: &dyn Interpreter, script: &mut Script) -> Result<(), CompileError> {
    let alias = script.unique_package_name();
    let prefix = if script.ident.is_empty() {
        alias
    } else {
        format!("{alias}.{}", script.ident)
    };

    for method in script.methods_mut() {
        let symbol = format!("{prefix}.{}", method.name);
        let handle = interp
            .eval(&symbol)
            .map_err(|source| CompileError::Method {
                symbol: symbol.clone(),
                source,
            })?;
        method.handle = Some(handle);
    }
    Ok(())
}
