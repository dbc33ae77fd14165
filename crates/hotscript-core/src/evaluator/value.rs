use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::errors::EvaluatorError;
use super::exec;
use super::package::{FuncEntry, Package, TypeKind};
use crate::ast::FuncDecl;

/// Runtime values
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Func(Arc<Closure>),
    Native(NativeFn),
    Instance(Arc<Instance>),
    Host(Arc<dyn HostObject>),
    Type(TypeRef),
}

/// An object owned by the embedding application.
///
/// `type_name` must be the qualified `"<package path>.<Name>"` so that type
/// assertions in scripts (`x.(*host.Anchor)`) can match it.
pub trait HostObject: Send + Sync {
    fn type_name(&self) -> &str;

    fn get(&self, _field: &str) -> Option<Value> {
        None
    }

    fn set(&self, field: &str, _value: Value) -> Result<(), EvaluatorError> {
        Err(EvaluatorError::no_field(self.type_name(), field))
    }

    fn has_method(&self, _method: &str) -> bool {
        false
    }

    fn call(&self, method: &str, _args: &[Value]) -> Result<Value, EvaluatorError> {
        Err(EvaluatorError::no_field(self.type_name(), method))
    }

    /// The anchor value handed to function-style extensions.
    fn anchor(&self) -> Option<Value> {
        None
    }
}

type NativeImpl = dyn Fn(&[Value]) -> Result<Value, EvaluatorError> + Send + Sync;

/// A function implemented in Rust
#[derive(Clone)]
pub struct NativeFn {
    name: Arc<str>,
    func: Arc<NativeImpl>,
}

impl NativeFn {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvaluatorError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, EvaluatorError> {
        (self.func)(args)
    }
}

/// How a closure receives its method receiver
#[derive(Clone)]
pub(crate) enum BoundReceiver {
    None,
    Value(Value),
    /// Method expression: the receiver is the first argument.
    Leading,
}

/// A script function together with the package it was declared in
pub struct Closure {
    pub(crate) decl: Arc<FuncDecl>,
    pub(crate) package: Arc<Package>,
    pub(crate) file: usize,
    pub(crate) receiver: BoundReceiver,
    pub(crate) captured: Option<Arc<HashMap<String, Value>>>,
}

impl Closure {
    pub(crate) fn new(entry: &FuncEntry, package: Arc<Package>, receiver: BoundReceiver) -> Self {
        Self {
            decl: entry.decl.clone(),
            package,
            file: entry.file,
            receiver,
            captured: None,
        }
    }

    pub fn name(&self) -> String {
        match &self.decl.receiver {
            Some(receiver) => format!(
                "{}.{}.{}",
                self.package.name, receiver.type_name, self.decl.name
            ),
            None => format!("{}.{}", self.package.name, self.decl.name),
        }
    }

    /// Number of arguments a call must supply.
    pub fn arity(&self) -> usize {
        let params = self.decl.signature.params.len();
        match self.receiver {
            BoundReceiver::Leading => params + 1,
            _ => params,
        }
    }
}

/// A value of a script-declared named type
pub struct Instance {
    pub(crate) package: Arc<Package>,
    pub(crate) type_name: String,
    pub(crate) fields: RwLock<Vec<Value>>,
}

impl Instance {
    pub(crate) fn new(package: Arc<Package>, type_name: String, fields: Vec<Value>) -> Self {
        Self {
            package,
            type_name,
            fields: RwLock::new(fields),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package.path, self.type_name)
    }

    pub fn package_path(&self) -> &str {
        &self.package.path
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// A script-declared named type used as a value (conversions, method expressions)
#[derive(Clone)]
pub struct TypeRef {
    pub(crate) package: Arc<Package>,
    pub(crate) name: String,
}

impl TypeRef {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package.path, self.name)
    }

    pub(crate) fn kind(&self) -> TypeKind {
        self.package
            .types
            .get(&self.name)
            .map(|def| def.kind)
            .unwrap_or(TypeKind::Other)
    }
}

impl Value {
    pub fn native<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvaluatorError> + Send + Sync + 'static,
    {
        Value::Native(NativeFn::new(name, func))
    }

    pub fn host(object: impl HostObject + 'static) -> Self {
        Value::Host(Arc::new(object))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float64".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Func(_) | Value::Native(_) => "func".to_string(),
            Value::Instance(instance) => instance.qualified_name(),
            Value::Host(host) => host.type_name().to_string(),
            Value::Type(ty) => format!("type {}", ty.qualified_name()),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Value::Func(_) | Value::Native(_) => true,
            Value::Instance(instance) => instance
                .package
                .types
                .get(&instance.type_name)
                .is_some_and(|def| def.kind == TypeKind::Func),
            _ => false,
        }
    }

    /// Number of arguments the value expects when called, if known.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Value::Func(closure) => Some(closure.arity()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Call a function value.
    pub fn call(&self, args: &[Value]) -> Result<Value, EvaluatorError> {
        exec::call_value(self, args.to_vec(), 0)
    }

    /// Read a field or bound method, as `value.name` does in a script.
    pub fn select(&self, name: &str) -> Result<Value, EvaluatorError> {
        exec::select(self, name)
    }

    pub(crate) fn is_instance_of(&self, package_path: &str, name: &str) -> bool {
        match self {
            Value::Host(host) => host
                .type_name()
                .strip_prefix(package_path)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|rest| rest == name),
            Value::Instance(instance) => {
                instance.package.path == package_path && instance.type_name == name
            }
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(&a.func, &b.func),
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Value::Type(a), Value::Type(b)) => {
                Arc::ptr_eq(&a.package, &b.package) && a.name == b.name
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Func(closure) => write!(f, "func {}", closure.name()),
            Value::Native(native) => write!(f, "func {}", native.name()),
            Value::Instance(instance) => {
                write!(f, "{}{{", instance.type_name)?;
                for (i, field) in instance.fields.read().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
            Value::Host(host) => write!(f, "<{}>", host.type_name()),
            Value::Type(ty) => write!(f, "type {}", ty.qualified_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

/// Host-provided symbols, keyed by import path and then by name
#[derive(Clone, Default, Debug)]
pub struct SymbolTable {
    packages: BTreeMap<String, BTreeMap<String, Value>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `path` as an importable package, even if it has no symbols.
    pub fn package(&mut self, path: &str) -> &mut Self {
        self.packages.entry(path.to_string()).or_default();
        self
    }

    pub fn insert(&mut self, path: &str, name: &str, value: Value) -> &mut Self {
        self.packages
            .entry(path.to_string())
            .or_default()
            .insert(name.to_string(), value);
        self
    }

    pub fn get(&self, path: &str, name: &str) -> Option<&Value> {
        self.packages.get(path)?.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Value>)> {
        self.packages.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
