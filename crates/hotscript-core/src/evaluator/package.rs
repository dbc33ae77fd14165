use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::errors::EvaluatorError;
use super::exec::Frame;
use super::value::{BoundReceiver, Closure, TypeRef, Value};
use crate::ast::{Decl, Expr, FuncDecl, SourceFile, TypeExpr, TypeSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TypeKind {
    Struct,
    Func,
    Other,
}

/// A declared named type with its field layout precomputed
#[derive(Debug, Clone)]
pub(crate) struct TypeDef {
    pub(crate) kind: TypeKind,
    pub(crate) fields: Vec<String>,
    pub(crate) zeros: Vec<Value>,
    pub(crate) embedded: Vec<usize>,
}

impl TypeDef {
    fn new(spec: &TypeSpec) -> Self {
        match &spec.ty {
            TypeExpr::Struct(fields) => Self {
                kind: TypeKind::Struct,
                fields: fields.iter().map(|f| f.selector().to_string()).collect(),
                zeros: fields.iter().map(|f| zero_value(&f.ty)).collect(),
                embedded: fields
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.is_embedded())
                    .map(|(i, _)| i)
                    .collect(),
            },
            TypeExpr::Func(_) => Self {
                kind: TypeKind::Func,
                fields: Vec::new(),
                zeros: Vec::new(),
                embedded: Vec::new(),
            },
            _ => Self {
                kind: TypeKind::Other,
                fields: Vec::new(),
                zeros: Vec::new(),
                embedded: Vec::new(),
            },
        }
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FuncEntry {
    pub(crate) decl: Arc<FuncDecl>,
    pub(crate) file: usize,
}

/// What an import name resolves to
#[derive(Clone)]
pub(crate) enum ImportTarget {
    Script(Arc<Package>),
    Native(Arc<NativePackage>),
}

impl ImportTarget {
    pub(crate) fn path(&self) -> &str {
        match self {
            ImportTarget::Script(package) => &package.path,
            ImportTarget::Native(native) => &native.path,
        }
    }

    pub(crate) fn member(&self, name: &str) -> Option<Value> {
        match self {
            ImportTarget::Script(package) => package.member(name),
            ImportTarget::Native(native) => native.symbols.get(name).cloned(),
        }
    }
}

pub(crate) type Imports = HashMap<String, ImportTarget>;

/// Symbols registered by the host under one import path
pub(crate) struct NativePackage {
    pub(crate) path: String,
    pub(crate) symbols: HashMap<String, Value>,
}

/// An evaluated script package. Immutable once built, apart from the values
/// of package-level variables.
pub struct Package {
    pub path: String,
    pub name: String,
    pub(crate) types: HashMap<String, TypeDef>,
    pub(crate) funcs: HashMap<String, FuncEntry>,
    pub(crate) methods: HashMap<String, HashMap<String, FuncEntry>>,
    pub(crate) vars: HashMap<String, RwLock<Value>>,
    pub(crate) file_imports: Vec<Imports>,
}

impl Package {
    /// The anonymous package interactive snippets run in.
    pub(crate) fn session(imports: Imports) -> Self {
        Self {
            path: String::new(),
            name: "main".to_string(),
            types: HashMap::new(),
            funcs: HashMap::new(),
            methods: HashMap::new(),
            vars: HashMap::new(),
            file_imports: vec![imports],
        }
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn func_names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    pub(crate) fn has_member(&self, name: &str) -> bool {
        self.funcs.contains_key(name) || self.types.contains_key(name) || self.vars.contains_key(name)
    }

    /// Resolve a package-level function, type or variable.
    pub(crate) fn member(self: &Arc<Self>, name: &str) -> Option<Value> {
        if let Some(entry) = self.funcs.get(name) {
            return Some(Value::Func(Arc::new(Closure::new(
                entry,
                self.clone(),
                BoundReceiver::None,
            ))));
        }
        if self.types.contains_key(name) {
            return Some(Value::Type(TypeRef {
                package: self.clone(),
                name: name.to_string(),
            }));
        }
        self.vars.get(name).map(|v| v.read().clone())
    }

    pub(crate) fn method(&self, type_name: &str, method: &str) -> Option<&FuncEntry> {
        self.methods.get(type_name)?.get(method)
    }
}

struct PendingVar {
    name: String,
    file: usize,
    ty: Option<TypeExpr>,
    value: Option<Expr>,
}

/// Accumulates the files of a package, then builds it.
pub(crate) struct PackageBuilder {
    path: String,
    name: String,
    types: HashMap<String, TypeDef>,
    funcs: HashMap<String, FuncEntry>,
    methods: HashMap<String, HashMap<String, FuncEntry>>,
    file_imports: Vec<Imports>,
    existing_vars: HashMap<String, Value>,
    pending_vars: Vec<PendingVar>,
}

impl PackageBuilder {
    pub(crate) fn new(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            types: HashMap::new(),
            funcs: HashMap::new(),
            methods: HashMap::new(),
            file_imports: Vec::new(),
            existing_vars: HashMap::new(),
            pending_vars: Vec::new(),
        }
    }

    /// Start from an already built package, keeping its declarations.
    pub(crate) fn extend(package: &Package) -> Self {
        Self {
            path: package.path.clone(),
            name: package.name.clone(),
            types: package.types.clone(),
            funcs: package.funcs.clone(),
            methods: package.methods.clone(),
            file_imports: package.file_imports.clone(),
            existing_vars: package
                .vars
                .iter()
                .map(|(name, value)| (name.clone(), value.read().clone()))
                .collect(),
            pending_vars: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn add_file(&mut self, file: SourceFile, imports: Imports) -> Result<(), EvaluatorError> {
        let index = self.file_imports.len();
        self.file_imports.push(imports);

        for decl in file.decls {
            match decl {
                Decl::Type(spec) => {
                    if self.types.contains_key(&spec.name) || self.funcs.contains_key(&spec.name) {
                        return Err(self.redeclared(&spec.name));
                    }
                    self.types.insert(spec.name.clone(), TypeDef::new(&spec));
                }
                Decl::Func(decl) => {
                    let entry = FuncEntry {
                        decl: decl.clone(),
                        file: index,
                    };
                    match &decl.receiver {
                        None => {
                            if self.funcs.contains_key(&decl.name) || self.types.contains_key(&decl.name) {
                                return Err(self.redeclared(&decl.name));
                            }
                            self.funcs.insert(decl.name.clone(), entry);
                        }
                        Some(receiver) => {
                            let methods = self.methods.entry(receiver.type_name.clone()).or_default();
                            if methods.contains_key(&decl.name) {
                                let name = format!("{}.{}", receiver.type_name, decl.name);
                                return Err(self.redeclared(&name));
                            }
                            methods.insert(decl.name.clone(), entry);
                        }
                    }
                }
                Decl::Var(var) => {
                    if self.existing_vars.contains_key(&var.name)
                        || self.pending_vars.iter().any(|p| p.name == var.name)
                    {
                        return Err(self.redeclared(&var.name));
                    }
                    self.pending_vars.push(PendingVar {
                        name: var.name,
                        file: index,
                        ty: var.ty,
                        value: var.value,
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<Arc<Package>, EvaluatorError> {
        if let Some(missing) = self.methods.keys().find(|t| !self.types.contains_key(*t)) {
            return Err(EvaluatorError::undefined(format!("{}.{}", self.name, missing)));
        }

        let mut vars: HashMap<String, RwLock<Value>> = self
            .existing_vars
            .into_iter()
            .map(|(name, value)| (name, RwLock::new(value)))
            .collect();
        for pending in &self.pending_vars {
            let zero = pending.ty.as_ref().map(zero_value).unwrap_or(Value::Nil);
            vars.insert(pending.name.clone(), RwLock::new(zero));
        }

        let package = Arc::new(Package {
            path: self.path,
            name: self.name,
            types: self.types,
            funcs: self.funcs,
            methods: self.methods,
            vars,
            file_imports: self.file_imports,
        });

        for pending in self.pending_vars {
            let Some(init) = pending.value else { continue };
            let frame = Frame::new(&package, pending.file, 0);
            let value = frame.eval_expr(&init)?;
            if let Some(slot) = package.vars.get(&pending.name) {
                *slot.write() = value;
            }
        }
        Ok(package)
    }

    fn redeclared(&self, name: &str) -> EvaluatorError {
        EvaluatorError::Redeclared {
            package: self.path.clone(),
            name: name.to_string(),
        }
    }
}

/// Zero value for a declared type
pub(crate) fn zero_value(ty: &TypeExpr) -> Value {
    match ty {
        TypeExpr::Named { package: None, name } => match name.as_str() {
            "int" | "int64" | "int32" => Value::Int(0),
            "float64" | "float32" => Value::Float(0.0),
            "string" => Value::from(""),
            "bool" => Value::Bool(false),
            _ => Value::Nil,
        },
        TypeExpr::List(_) => Value::from(Vec::new()),
        _ => Value::Nil,
    }
}
