//! Registry of script extension points and their methods.

use std::collections::BTreeMap;

use tracing::warn;

use crate::evaluator::{EvaluatorError, Value};

pub mod compile;
pub mod discovery;

pub use compile::{compile, CompileError};
pub use discovery::{load, DiscoveryError};

#[cfg(test)]
mod tests;

/// How a script declaration relates to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    None,
    Func,
    Struct,
}

/// The host-defined type a script declaration extends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub name: String,
    /// Import name used for the anchor package in the declaring file
    pub package_name: String,
    pub package_path: String,
}

impl Anchor {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package_path, self.name)
    }
}

/// What kind of extension point a script is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    Unbound,
    Function(Anchor),
    Struct(Anchor),
}

impl Extension {
    pub fn bind_mode(&self) -> BindMode {
        match self {
            Extension::Unbound => BindMode::None,
            Extension::Function(_) => BindMode::Func,
            Extension::Struct(_) => BindMode::Struct,
        }
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        match self {
            Extension::Unbound => None,
            Extension::Function(anchor) | Extension::Struct(anchor) => Some(anchor),
        }
    }
}

#[derive(Clone)]
pub struct Method {
    pub name: String,
    /// Resolved by compilation; only valid for the interpreter it came from.
    pub handle: Option<Value>,
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("resolved", &self.handle.is_some())
            .finish()
    }
}

/// The compiled dispatcher `func(this any, method string) any`.
#[derive(Clone)]
pub struct MethodBinder(Value);

impl MethodBinder {
    pub(crate) fn new(func: Value) -> Self {
        Self(func)
    }

    /// `None` when the script has no such method.
    pub fn bind(&self, this: Value, method: &str) -> Result<Option<Value>, EvaluatorError> {
        let bound = self.0.call(&[this, Value::from(method)])?;
        Ok((!bound.is_nil()).then_some(bound))
    }
}

/// One extension point, or the free functions of a package when `ident` is empty.
#[derive(Clone)]
pub struct Script {
    pub package_name: String,
    pub package_path: String,
    pub ident: String,
    pub extension: Extension,
    methods: Vec<Method>,
    binder: Option<MethodBinder>,
}

impl Script {
    pub fn new(package_name: &str, package_path: &str, ident: &str, extension: Extension) -> Self {
        Self {
            package_name: package_name.to_string(),
            package_path: package_path.to_string(),
            ident: ident.to_string(),
            extension,
            methods: Vec::new(),
            binder: None,
        }
    }

    pub fn bind_mode(&self) -> BindMode {
        self.extension.bind_mode()
    }

    /// Methods sorted by name.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods
            .binary_search_by(|m| m.name.as_str().cmp(name))
            .ok()
            .map(|index| &self.methods[index])
    }

    pub fn binder(&self) -> Option<&MethodBinder> {
        self.binder.as_ref()
    }

    pub(crate) fn set_binder(&mut self, binder: MethodBinder) {
        self.binder = Some(binder);
    }

    pub(crate) fn methods_mut(&mut self) -> &mut [Method] {
        &mut self.methods
    }

    /// Adds `name` keeping the list sorted; false when it was already present.
    pub fn push_method(&mut self, name: &str) -> bool {
        match self.methods.binary_search_by(|m| m.name.as_str().cmp(name)) {
            Ok(_) => false,
            Err(index) => {
                self.methods.insert(
                    index,
                    Method {
                        name: name.to_string(),
                        handle: None,
                    },
                );
                true
            }
        }
    }

    /// Identifier-safe name for the package, unique per import path.
    pub fn unique_package_name(&self) -> String {
        self.package_path.replace(['/', '.', '-'], "_")
    }

    /// Resolve a callable for `method` on the host object `this`.
    ///
    /// `None` means the script does not override the method and the host
    /// should run its own behaviour.
    pub fn resolve(&self, this: &Value, method: &str) -> Option<Value> {
        let binder = self.binder.as_ref()?;
        let receiver = match &self.extension {
            Extension::Unbound => return None,
            Extension::Struct(_) => this.clone(),
            Extension::Function(_) => {
                let Value::Host(host) = this else {
                    return None;
                };
                let anchor = host.anchor()?;
                Value::native("anchor", move |_| Ok(anchor.clone()))
            }
        };

        match binder.bind(receiver, method) {
            Ok(bound) => bound,
            Err(err) => {
                warn!(
                    "binding {}.{}.{} failed: {}",
                    self.package_path, self.ident, method, err
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("package_path", &self.package_path)
            .field("ident", &self.ident)
            .field("extension", &self.extension)
            .field("methods", &self.methods)
            .field("bound", &self.binder.is_some())
            .finish()
    }
}

/// Scripts of one package, by identifier
#[derive(Debug, Clone, Default)]
pub struct ScriptBundle {
    scripts: BTreeMap<String, Script>,
}

impl ScriptBundle {
    pub fn ident(&self, ident: &str) -> Option<&Script> {
        self.scripts.get(ident)
    }

    pub fn scripts(&self) -> impl Iterator<Item = &Script> {
        self.scripts.values()
    }

    pub(crate) fn scripts_mut(&mut self) -> impl Iterator<Item = &mut Script> {
        self.scripts.values_mut()
    }
}

/// Scripts by package path. Built during load, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    packages: BTreeMap<String, ScriptBundle>,
}

impl ScriptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(&self, path: &str) -> Option<&ScriptBundle> {
        self.packages.get(path)
    }

    pub fn script(&self, path: &str, ident: &str) -> Option<&Script> {
        self.package(path)?.ident(ident)
    }

    pub fn packages(&self) -> impl Iterator<Item = (&str, &ScriptBundle)> {
        self.packages.iter().map(|(path, bundle)| (path.as_str(), bundle))
    }

    pub(crate) fn package_mut(&mut self, path: &str) -> Option<&mut ScriptBundle> {
        self.packages.get_mut(path)
    }

    /// Registers a script; false if `(package_path, ident)` is taken.
    pub fn push_ident(&mut self, script: Script) -> bool {
        let bundle = self.packages.entry(script.package_path.clone()).or_default();
        if bundle.scripts.contains_key(&script.ident) {
            return false;
        }
        bundle.scripts.insert(script.ident.clone(), script);
        true
    }

    /// Attach a method to an already registered script.
    pub fn push_method(&mut self, path: &str, ident: &str, method: &str) -> bool {
        self.packages
            .get_mut(path)
            .and_then(|bundle| bundle.scripts.get_mut(ident))
            .is_some_and(|script| script.push_method(method))
    }
}
