//! Abstract syntax tree for HotScript sources.

use std::sync::Arc;

/// A parsed `.gs` file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub package: String,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

impl SourceFile {
    pub fn types(&self) -> impl Iterator<Item = &TypeSpec> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Type(spec) => Some(spec),
            _ => None,
        })
    }

    pub fn funcs(&self) -> impl Iterator<Item = &Arc<FuncDecl>> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Func(func) => Some(func),
            _ => None,
        })
    }

    /// The import bound to `name` in this file.
    pub fn import(&self, name: &str) -> Option<&ImportSpec> {
        self.imports.iter().find(|i| i.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
}

impl ImportSpec {
    /// Name the import is referenced by: the alias, else the last path segment.
    pub fn name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Type(TypeSpec),
    Func(Arc<FuncDecl>),
    Var(VarDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named {
        package: Option<String>,
        name: String,
    },
    Pointer(Box<TypeExpr>),
    List(Box<TypeExpr>),
    Struct(Vec<Field>),
    Func(Signature),
}

impl TypeExpr {
    pub fn named(name: &str) -> Self {
        TypeExpr::Named {
            package: None,
            name: name.to_string(),
        }
    }

    /// Name of the underlying named type, looking through pointers.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            TypeExpr::Named { name, .. } => Some(name),
            TypeExpr::Pointer(inner) => inner.base_name(),
            _ => None,
        }
    }
}

/// A struct field; `name` is `None` for embedded fields
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Option<String>,
    pub ty: TypeExpr,
}

impl Field {
    /// The name a field is selected by. Embedded fields use their type name.
    pub fn selector(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.ty.base_name().unwrap_or_default(),
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.name.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Option<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    pub name: Option<String>,
    pub type_name: String,
    pub pointer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Receiver>,
    pub signature: Signature,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Var(VarDecl),
    Define {
        name: String,
        value: Expr,
    },
    Assign {
        target: LValue,
        op: Option<BinaryOp>,
        value: Expr,
    },
    IncDec {
        target: LValue,
        delta: i64,
    },
    Return(Option<Expr>),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    ForRange {
        key: String,
        value: Option<String>,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Switch {
        tag: Option<Expr>,
        cases: Vec<SwitchCase>,
    },
    Block(Vec<Stmt>),
    Break,
    Continue,
}

/// A switch clause; `labels` is `None` for `default`
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub labels: Option<Vec<Expr>>,
    pub body: Vec<Stmt>,
}

/// Assignable location: a variable or a field chain rooted at a variable
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    Ident(String),
    Field { object: Expr, field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

/// Composite literal element, optionally keyed by field name
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub key: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Selector {
        object: Box<Expr>,
        field: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Assert {
        value: Box<Expr>,
        ty: TypeExpr,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Composite {
        package: Option<String>,
        type_name: String,
        elements: Vec<Element>,
    },
    List(Vec<Expr>),
    Func(Arc<FuncDecl>),
}

/// One item of an interactive snippet
#[derive(Debug, Clone, PartialEq)]
pub enum SnippetItem {
    Import(ImportSpec),
    Stmt(Stmt),
}
