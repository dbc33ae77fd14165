//! Tree-walking execution of statements and expressions.

use std::collections::HashMap;
use std::sync::Arc;

use super::builtins;
use super::errors::EvaluatorError;
use super::package::{zero_value, Imports, Package, TypeKind};
use super::value::{BoundReceiver, Closure, Instance, TypeRef, Value};
use crate::ast::{BinaryOp, Expr, LValue, Stmt, TypeExpr, UnaryOp};

/// Nested script calls beyond this depth fail instead of exhausting the stack.
pub const MAX_CALL_DEPTH: usize = 100;

/// Control flow signal from statement execution
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

type Result<T> = std::result::Result<T, EvaluatorError>;

/// Execution state of one function activation.
pub(crate) struct Frame<'p> {
    package: &'p Arc<Package>,
    file: usize,
    scopes: Vec<HashMap<String, Value>>,
    depth: usize,
}

impl<'p> Frame<'p> {
    pub(crate) fn new(package: &'p Arc<Package>, file: usize, depth: usize) -> Self {
        Self {
            package,
            file,
            scopes: vec![HashMap::new()],
            depth,
        }
    }

    pub(crate) fn with_globals(
        package: &'p Arc<Package>,
        globals: HashMap<String, Value>,
    ) -> Self {
        Self {
            package,
            file: 0,
            scopes: vec![globals],
            depth: 0,
        }
    }

    pub(crate) fn into_globals(mut self) -> HashMap<String, Value> {
        self.scopes.truncate(1);
        self.scopes.pop().unwrap_or_default()
    }

    fn imports(&self) -> Option<&Imports> {
        self.package.file_imports.get(self.file)
    }

    fn lookup_local(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.lookup_local(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.package.member(name) {
            return Ok(value);
        }
        builtins::lookup(name).ok_or_else(|| EvaluatorError::undefined(name))
    }

    fn declare(&mut self, name: &str, value: Value) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn store(&mut self, name: &str, value: Value) -> Result<()> {
        if name == "_" {
            return Ok(());
        }
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        match self.package.vars.get(name) {
            Some(slot) => {
                *slot.write() = value;
                Ok(())
            }
            None => Err(EvaluatorError::undefined(name)),
        }
    }

    /// Execute statements in the current scope.
    pub(crate) fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<ControlFlow> {
        for stmt in stmts {
            let flow = self.exec_stmt(stmt)?;
            if flow != ControlFlow::Normal {
                return Ok(flow);
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<ControlFlow> {
        self.scopes.push(HashMap::new());
        let flow = self.exec_stmts(stmts);
        self.scopes.pop();
        flow
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Result<ControlFlow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
            }
            Stmt::Var(var) => {
                let value = match (&var.value, &var.ty) {
                    (Some(expr), _) => self.eval_expr(expr)?,
                    (None, Some(ty)) => zero_value(ty),
                    (None, None) => Value::Nil,
                };
                self.declare(&var.name, value);
            }
            Stmt::Define { name, value } => {
                let value = self.eval_expr(value)?;
                self.declare(name, value);
            }
            Stmt::Assign { target, op, value } => {
                let mut value = self.eval_expr(value)?;
                if let Some(op) = op {
                    let current = self.read_lvalue(target)?;
                    value = binary(*op, &current, &value)?;
                }
                self.write_lvalue(target, value)?;
            }
            Stmt::IncDec { target, delta } => {
                let current = self.read_lvalue(target)?;
                let value = binary(BinaryOp::Add, &current, &Value::Int(*delta))?;
                self.write_lvalue(target, value)?;
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Nil,
                };
                return Ok(ControlFlow::Return(value));
            }
            Stmt::If {
                init,
                cond,
                then,
                otherwise,
            } => {
                self.scopes.push(HashMap::new());
                let flow = self.exec_if(init.as_deref(), cond, then, otherwise.as_deref());
                self.scopes.pop();
                return flow;
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                self.scopes.push(HashMap::new());
                let flow = self.exec_for(init.as_deref(), cond.as_ref(), post.as_deref(), body);
                self.scopes.pop();
                return flow;
            }
            Stmt::ForRange {
                key,
                value,
                iterable,
                body,
            } => return self.exec_range(key, value.as_deref(), iterable, body),
            Stmt::Switch { tag, cases } => {
                let tag = match tag {
                    Some(expr) => Some(self.eval_expr(expr)?),
                    None => None,
                };
                let mut chosen = None;
                'cases: for case in cases {
                    let Some(labels) = &case.labels else { continue };
                    for label in labels {
                        let value = self.eval_expr(label)?;
                        let hit = match &tag {
                            Some(tag) => *tag == value,
                            None => self.truth(&value, "case")?,
                        };
                        if hit {
                            chosen = Some(&case.body);
                            break 'cases;
                        }
                    }
                }
                let chosen = chosen.or_else(|| {
                    cases
                        .iter()
                        .find(|case| case.labels.is_none())
                        .map(|case| &case.body)
                });
                if let Some(body) = chosen {
                    return match self.exec_block(body)? {
                        ControlFlow::Break => Ok(ControlFlow::Normal),
                        flow => Ok(flow),
                    };
                }
            }
            Stmt::Block(stmts) => return self.exec_block(stmts),
            Stmt::Break => return Ok(ControlFlow::Break),
            Stmt::Continue => return Ok(ControlFlow::Continue),
        }
        Ok(ControlFlow::Normal)
    }

    fn exec_if(
        &mut self,
        init: Option<&Stmt>,
        cond: &Expr,
        then: &[Stmt],
        otherwise: Option<&Stmt>,
    ) -> Result<ControlFlow> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        let cond = self.eval_expr(cond)?;
        if self.truth(&cond, "if")? {
            self.exec_block(then)
        } else if let Some(otherwise) = otherwise {
            self.exec_stmt(otherwise)
        } else {
            Ok(ControlFlow::Normal)
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &[Stmt],
    ) -> Result<ControlFlow> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        loop {
            if let Some(cond) = cond {
                let value = self.eval_expr(cond)?;
                if !self.truth(&value, "for")? {
                    break;
                }
            }
            match self.exec_block(body)? {
                ControlFlow::Break => break,
                ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                ControlFlow::Normal | ControlFlow::Continue => {}
            }
            if let Some(post) = post {
                self.exec_stmt(post)?;
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn exec_range(
        &mut self,
        key: &str,
        value: Option<&str>,
        iterable: &Expr,
        body: &[Stmt],
    ) -> Result<ControlFlow> {
        let items: Vec<(Value, Value)> = match self.eval_expr(iterable)? {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Int(i as i64), v.clone()))
                .collect(),
            Value::Int(n) => (0..n).map(|i| (Value::Int(i), Value::Int(i))).collect(),
            Value::Str(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (Value::Int(i as i64), Value::from(c.to_string())))
                .collect(),
            other => {
                return Err(EvaluatorError::type_error(
                    "range",
                    "list, int or string",
                    &other.type_name(),
                ))
            }
        };

        for (k, v) in items {
            self.scopes.push(HashMap::new());
            self.declare(key, k);
            if let Some(name) = value {
                self.declare(name, v);
            }
            let flow = self.exec_stmts(body);
            self.scopes.pop();
            match flow? {
                ControlFlow::Break => break,
                ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                ControlFlow::Normal | ControlFlow::Continue => {}
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn truth(&self, value: &Value, context: &str) -> Result<bool> {
        value
            .as_bool()
            .ok_or_else(|| EvaluatorError::type_error(context, "bool", &value.type_name()))
    }

    fn read_lvalue(&self, target: &LValue) -> Result<Value> {
        match target {
            LValue::Ident(name) => self.lookup(name),
            LValue::Field { object, field } => select(&self.eval_expr(object)?, field),
        }
    }

    fn write_lvalue(&mut self, target: &LValue, value: Value) -> Result<()> {
        match target {
            LValue::Ident(name) => self.store(name, value),
            LValue::Field { object, field } => {
                let object = self.eval_expr(object)?;
                assign_field(&object, field, value)
            }
        }
    }

    pub(crate) fn eval_expr(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(x) => Ok(Value::Float(*x)),
            Expr::Str(s) => Ok(Value::from(s.as_str())),
            Expr::Ident(name) => self.lookup(name),
            Expr::Selector { object, field } => {
                if let Expr::Ident(alias) = object.as_ref() {
                    if let Some(target) = self.import_target(alias) {
                        return target.member(field).ok_or_else(|| {
                            EvaluatorError::undefined(format!("{alias}.{field}"))
                        });
                    }
                }
                select(&self.eval_expr(object)?, field)
            }
            Expr::Call { callee, args } => {
                let callee = self.eval_expr(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval_expr(arg))
                    .collect::<Result<Vec<_>>>()?;
                call_value(&callee, args, self.depth)
            }
            Expr::Index { object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                index_value(&object, &index)
            }
            Expr::Assert { value, ty } => {
                let value = self.eval_expr(value)?;
                if self.matches_type(&value, ty)? {
                    Ok(value)
                } else {
                    Err(EvaluatorError::TypeAssertion {
                        expected: describe_type(ty),
                        actual: value.type_name(),
                    })
                }
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                match (op, value) {
                    (UnaryOp::Addr, value) => Ok(value),
                    (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
                    (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, other) => {
                        Err(EvaluatorError::type_error("negate", "number", &other.type_name()))
                    }
                    (UnaryOp::Not, other) => {
                        Err(EvaluatorError::type_error("not", "bool", &other.type_name()))
                    }
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval_expr(left)?;
                match op {
                    BinaryOp::And | BinaryOp::Or => {
                        let lhs = self.truth(&left, op.symbol())?;
                        if lhs == (*op == BinaryOp::Or) {
                            return Ok(Value::Bool(lhs));
                        }
                        let right = self.eval_expr(right)?;
                        Ok(Value::Bool(self.truth(&right, op.symbol())?))
                    }
                    _ => binary(*op, &left, &self.eval_expr(right)?),
                }
            }
            Expr::Composite {
                package,
                type_name,
                elements,
            } => {
                let ty = self.resolve_type(package.as_deref(), type_name)?;
                let def = ty
                    .package
                    .types
                    .get(&ty.name)
                    .filter(|def| def.kind == TypeKind::Struct)
                    .ok_or_else(|| {
                        EvaluatorError::invalid(format!(
                            "invalid composite literal type {type_name}"
                        ))
                    })?;
                let mut fields = def.zeros.clone();
                for (position, element) in elements.iter().enumerate() {
                    let index = match &element.key {
                        Some(key) => def
                            .field_index(key)
                            .ok_or_else(|| EvaluatorError::no_field(ty.qualified_name(), key))?,
                        None => position,
                    };
                    let slot = fields.get_mut(index).ok_or_else(|| {
                        EvaluatorError::invalid(format!("too many values in {type_name} literal"))
                    })?;
                    *slot = self.eval_expr(&element.value)?;
                }
                Ok(Value::Instance(Arc::new(Instance::new(
                    ty.package.clone(),
                    ty.name.clone(),
                    fields,
                ))))
            }
            Expr::List(items) => Ok(Value::from(
                items
                    .iter()
                    .map(|item| self.eval_expr(item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Expr::Func(decl) => {
                let mut captured = HashMap::new();
                for scope in &self.scopes {
                    captured.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                Ok(Value::Func(Arc::new(Closure {
                    decl: decl.clone(),
                    package: self.package.clone(),
                    file: self.file,
                    receiver: BoundReceiver::None,
                    captured: Some(Arc::new(captured)),
                })))
            }
        }
    }

    /// An identifier names an import only when nothing closer shadows it.
    fn import_target(&self, alias: &str) -> Option<&super::package::ImportTarget> {
        if self.lookup_local(alias).is_some() || self.package.has_member(alias) {
            return None;
        }
        self.imports()?.get(alias)
    }

    fn resolve_type(&self, package: Option<&str>, name: &str) -> Result<TypeRef> {
        let (owner, qualified) = match package {
            Some(alias) => match self.imports().and_then(|imports| imports.get(alias)) {
                Some(super::package::ImportTarget::Script(owner)) => {
                    (owner.clone(), format!("{alias}.{name}"))
                }
                _ => return Err(EvaluatorError::undefined(format!("{alias}.{name}"))),
            },
            None => (self.package.clone(), name.to_string()),
        };
        if owner.types.contains_key(name) {
            Ok(TypeRef {
                package: owner,
                name: name.to_string(),
            })
        } else {
            Err(EvaluatorError::undefined(qualified))
        }
    }

    fn matches_type(&self, value: &Value, ty: &TypeExpr) -> Result<bool> {
        Ok(match ty {
            TypeExpr::Pointer(inner) => self.matches_type(value, inner)?,
            TypeExpr::Func(_) => value.is_callable(),
            TypeExpr::List(_) => matches!(value, Value::List(_)),
            TypeExpr::Struct(_) => matches!(value, Value::Instance(_)),
            TypeExpr::Named {
                package: Some(alias),
                name,
            } => {
                let target = self
                    .imports()
                    .and_then(|imports| imports.get(alias))
                    .ok_or_else(|| EvaluatorError::undefined(alias.clone()))?;
                value.is_instance_of(target.path(), name)
            }
            TypeExpr::Named {
                package: None,
                name,
            } => match name.as_str() {
                "any" => true,
                "int" | "int64" => matches!(value, Value::Int(_)),
                "float64" => matches!(value, Value::Float(_)),
                "string" => matches!(value, Value::Str(_)),
                "bool" => matches!(value, Value::Bool(_)),
                _ => value.is_instance_of(&self.package.path, name),
            },
        })
    }
}

fn describe_type(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Named {
            package: Some(package),
            name,
        } => format!("{package}.{name}"),
        TypeExpr::Named { package: None, name } => name.clone(),
        TypeExpr::Pointer(inner) => format!("*{}", describe_type(inner)),
        TypeExpr::List(inner) => format!("[]{}", describe_type(inner)),
        TypeExpr::Struct(_) => "struct".to_string(),
        TypeExpr::Func(_) => "func".to_string(),
    }
}

/// Call any callable value.
pub(crate) fn call_value(callee: &Value, args: Vec<Value>, depth: usize) -> Result<Value> {
    match callee {
        Value::Func(closure) => invoke(closure, args, depth),
        Value::Native(native) => native.call(&args),
        Value::Type(ty) => convert(ty, args),
        Value::Instance(instance) if callee.is_callable() => {
            let inner = instance.fields.read().first().cloned().unwrap_or(Value::Nil);
            call_value(&inner, args, depth)
        }
        other => Err(EvaluatorError::NotCallable {
            type_name: other.type_name(),
        }),
    }
}

fn invoke(closure: &Closure, mut args: Vec<Value>, depth: usize) -> Result<Value> {
    if depth >= MAX_CALL_DEPTH {
        return Err(EvaluatorError::CallDepth {
            limit: MAX_CALL_DEPTH,
        });
    }
    if args.len() != closure.arity() {
        return Err(EvaluatorError::ArgumentCount {
            name: closure.name(),
            expected: closure.arity(),
            actual: args.len(),
        });
    }

    let receiver = match &closure.receiver {
        BoundReceiver::None => None,
        BoundReceiver::Value(value) => Some(value.clone()),
        BoundReceiver::Leading => Some(args.remove(0)),
    };

    let mut frame = Frame::new(&closure.package, closure.file, depth + 1);
    if let Some(captured) = &closure.captured {
        frame.scopes.insert(0, (**captured).clone());
    }
    if let (Some(decl), Some(value)) = (&closure.decl.receiver, receiver) {
        if let Some(name) = &decl.name {
            frame.declare(name, value);
        }
    }
    for (param, value) in closure.decl.signature.params.iter().zip(args) {
        if let Some(name) = &param.name {
            frame.declare(name, value);
        }
    }

    match frame.exec_stmts(&closure.decl.body)? {
        ControlFlow::Return(value) => Ok(value),
        ControlFlow::Normal => Ok(Value::Nil),
        ControlFlow::Break | ControlFlow::Continue => Err(EvaluatorError::invalid(format!(
            "break or continue outside loop in {}",
            closure.name()
        ))),
    }
}

/// Conversion `T(x)` to a non-struct named type.
fn convert(ty: &TypeRef, mut args: Vec<Value>) -> Result<Value> {
    if ty.kind() == TypeKind::Struct {
        return Err(EvaluatorError::invalid(format!(
            "cannot convert to struct type {}",
            ty.qualified_name()
        )));
    }
    if args.len() != 1 {
        return Err(EvaluatorError::ArgumentCount {
            name: ty.qualified_name(),
            expected: 1,
            actual: args.len(),
        });
    }
    let value = args.remove(0);
    Ok(Value::Instance(Arc::new(Instance::new(
        ty.package.clone(),
        ty.name.clone(),
        vec![value],
    ))))
}

/// Field or method selection, promoted through embedded fields.
pub(crate) fn select(value: &Value, name: &str) -> Result<Value> {
    match value {
        Value::Instance(instance) => {
            let package = &instance.package;
            let def = package.types.get(&instance.type_name);
            if let Some(index) = def.and_then(|def| def.field_index(name)) {
                if let Some(field) = instance.fields.read().get(index) {
                    return Ok(field.clone());
                }
            }
            if let Some(entry) = package.method(&instance.type_name, name) {
                return Ok(Value::Func(Arc::new(Closure::new(
                    entry,
                    package.clone(),
                    BoundReceiver::Value(value.clone()),
                ))));
            }
            for index in def.map(|def| def.embedded.as_slice()).unwrap_or_default() {
                let embedded = instance.fields.read().get(*index).cloned();
                if let Some(Ok(found)) = embedded.map(|inner| select(&inner, name)) {
                    return Ok(found);
                }
            }
            Err(EvaluatorError::no_field(instance.qualified_name(), name))
        }
        Value::Host(host) => {
            if let Some(field) = host.get(name) {
                return Ok(field);
            }
            if host.has_method(name) {
                let host = host.clone();
                let method = name.to_string();
                return Ok(Value::native(name, move |args| host.call(&method, args)));
            }
            Err(EvaluatorError::no_field(host.type_name(), name))
        }
        Value::Type(ty) => match ty.package.method(&ty.name, name) {
            Some(entry) => Ok(Value::Func(Arc::new(Closure::new(
                entry,
                ty.package.clone(),
                BoundReceiver::Leading,
            )))),
            None => Err(EvaluatorError::no_field(ty.qualified_name(), name)),
        },
        other => Err(EvaluatorError::no_field(other.type_name(), name)),
    }
}

fn assign_field(object: &Value, name: &str, value: Value) -> Result<()> {
    match object {
        Value::Instance(instance) => {
            let def = instance.package.types.get(&instance.type_name);
            if let Some(index) = def.and_then(|def| def.field_index(name)) {
                if let Some(slot) = instance.fields.write().get_mut(index) {
                    *slot = value;
                    return Ok(());
                }
            }
            for index in def.map(|def| def.embedded.as_slice()).unwrap_or_default() {
                let embedded = instance.fields.read().get(*index).cloned();
                if let Some(inner) = embedded {
                    if assign_field(&inner, name, value.clone()).is_ok() {
                        return Ok(());
                    }
                }
            }
            Err(EvaluatorError::no_field(instance.qualified_name(), name))
        }
        Value::Host(host) => host.set(name, value),
        other => Err(EvaluatorError::no_field(other.type_name(), name)),
    }
}

fn index_value(object: &Value, index: &Value) -> Result<Value> {
    let Value::Int(i) = index else {
        return Err(EvaluatorError::type_error("index", "int", &index.type_name()));
    };
    let out_of_range = |len| EvaluatorError::IndexOutOfRange { index: *i, len };
    match object {
        Value::List(items) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(|| out_of_range(items.len())),
        Value::Str(s) => usize::try_from(*i)
            .ok()
            .and_then(|i| s.as_bytes().get(i))
            .map(|b| Value::Int(i64::from(*b)))
            .ok_or_else(|| out_of_range(s.len())),
        other => Err(EvaluatorError::type_error("index", "list or string", &other.type_name())),
    }
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    use Value::{Float, Int, Str};

    let mismatch = || EvaluatorError::binary_type_error(op.symbol(), &left.type_name(), &right.type_name());

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::Ne => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    match (left, right) {
        (Int(a), Int(b)) => match op {
            BinaryOp::Add => Ok(Int(a.wrapping_add(*b))),
            BinaryOp::Sub => Ok(Int(a.wrapping_sub(*b))),
            BinaryOp::Mul => Ok(Int(a.wrapping_mul(*b))),
            BinaryOp::Div | BinaryOp::Rem if *b == 0 => Err(EvaluatorError::DivisionByZero),
            BinaryOp::Div => Ok(Int(a.wrapping_div(*b))),
            BinaryOp::Rem => Ok(Int(a.wrapping_rem(*b))),
            BinaryOp::Lt => Ok(Value::Bool(a < b)),
            BinaryOp::Le => Ok(Value::Bool(a <= b)),
            BinaryOp::Gt => Ok(Value::Bool(a > b)),
            BinaryOp::Ge => Ok(Value::Bool(a >= b)),
            _ => Err(mismatch()),
        },
        (Int(_) | Float(_), Int(_) | Float(_)) => {
            let a = as_f64(left);
            let b = as_f64(right);
            match op {
                BinaryOp::Add => Ok(Float(a + b)),
                BinaryOp::Sub => Ok(Float(a - b)),
                BinaryOp::Mul => Ok(Float(a * b)),
                BinaryOp::Div if b == 0.0 => Err(EvaluatorError::DivisionByZero),
                BinaryOp::Div => Ok(Float(a / b)),
                BinaryOp::Lt => Ok(Value::Bool(a < b)),
                BinaryOp::Le => Ok(Value::Bool(a <= b)),
                BinaryOp::Gt => Ok(Value::Bool(a > b)),
                BinaryOp::Ge => Ok(Value::Bool(a >= b)),
                _ => Err(mismatch()),
            }
        }
        (Str(a), Str(b)) => match op {
            BinaryOp::Add => Ok(Value::from(format!("{a}{b}"))),
            BinaryOp::Lt => Ok(Value::Bool(a < b)),
            BinaryOp::Le => Ok(Value::Bool(a <= b)),
            BinaryOp::Gt => Ok(Value::Bool(a > b)),
            BinaryOp::Ge => Ok(Value::Bool(a >= b)),
            _ => Err(mismatch()),
        },
        _ => Err(mismatch()),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(x) => *x,
        _ => 0.0,
    }
}
