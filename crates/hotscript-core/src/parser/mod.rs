//! HotScript parser.
//!
//! Sources go through [`insert_semicolons`] first, then through the pest
//! grammar in `hotscript.pest`; the resulting pairs are lowered into the
//! [`crate::ast`] types.

use std::sync::{Arc, LazyLock};

use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::ast::*;


#[derive(Parser)]
#[grammar = "parser/hotscript.pest"]
struct HotScriptGrammar;

/// A syntax error with its location
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{file}:{line}:{column}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::eq_op, Assoc::Left)
            | Op::infix(Rule::ne_op, Assoc::Left)
            | Op::infix(Rule::lt_op, Assoc::Left)
            | Op::infix(Rule::le_op, Assoc::Left)
            | Op::infix(Rule::gt_op, Assoc::Left)
            | Op::infix(Rule::ge_op, Assoc::Left))
        .op(Op::infix(Rule::add_op, Assoc::Left) | Op::infix(Rule::sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_op, Assoc::Left)
            | Op::infix(Rule::div_op, Assoc::Left)
            | Op::infix(Rule::rem_op, Assoc::Left))
        .op(Op::prefix(Rule::neg_op) | Op::prefix(Rule::not_op) | Op::prefix(Rule::addr_op))
        .op(Op::postfix(Rule::call_args)
            | Op::postfix(Rule::type_assert)
            | Op::postfix(Rule::selector)
            | Op::postfix(Rule::index_op))
});

/// Parse a complete source file.
pub fn parse_file(source: &str, file: &str) -> Result<SourceFile, ParseError> {
    let prepared = insert_semicolons(source);
    let builder = Builder { file };
    let root = HotScriptGrammar::parse(Rule::file, &prepared)
        .map_err(|e| builder.syntax_error(e))?
        .next()
        .ok_or_else(|| builder.error_at(1, 1, "empty input"))?;
    builder.file(root)
}

/// Parse an interactive snippet: imports and statements.
pub fn parse_snippet(source: &str) -> Result<Vec<SnippetItem>, ParseError> {
    let prepared = insert_semicolons(source);
    let builder = Builder { file: "<snippet>" };
    let root = HotScriptGrammar::parse(Rule::snippet, &prepared)
        .map_err(|e| builder.syntax_error(e))?
        .next()
        .ok_or_else(|| builder.error_at(1, 1, "empty input"))?;

    let mut items = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::EOI => {}
            Rule::import_decl => {
                for spec in builder.import_decl(pair)? {
                    items.push(SnippetItem::Import(spec));
                }
            }
            _ => items.push(SnippetItem::Stmt(builder.stmt(pair)?)),
        }
    }
    Ok(items)
}

/// True if `source` starts with a package clause.
pub fn is_source_file(source: &str) -> bool {
    let mut rest = source;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }
    rest.strip_prefix("package")
        .and_then(|tail| tail.chars().next())
        .is_some_and(char::is_whitespace)
}

/// Make statement terminators explicit: a `;` is inserted at the end of any
/// line whose final token is an identifier, a literal, one of the keywords
/// `break continue return nil true false`, a closing bracket, `++` or `--`.
/// Line structure is preserved so error positions still match the source.
pub fn insert_semicolons(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str,
        RawStr,
    }

    let mut out = String::with_capacity(source.len() + source.len() / 16);
    let mut state = State::Code;
    let mut pending = false;
    let mut word = String::new();
    let mut block_has_newline = false;
    let mut comment_start = 0;
    let mut chars = source.chars().peekable();

    let finish_word = |word: &mut String, pending: &mut bool| {
        if word.is_empty() {
            return;
        }
        *pending = match word.as_str() {
            "break" | "continue" | "return" | "nil" | "true" | "false" => true,
            "package" | "import" | "type" | "struct" | "func" | "if" | "else" | "for"
            | "switch" | "case" | "default" | "var" | "range" => false,
            _ => true,
        };
        word.clear();
    };

    while let Some(c) = chars.next() {
        match state {
            State::Code => {
                if c.is_alphanumeric() || c == '_' {
                    word.push(c);
                    out.push(c);
                    continue;
                }
                finish_word(&mut word, &mut pending);
                match c {
                    '\n' => {
                        if pending {
                            out.push(';');
                        }
                        pending = false;
                        out.push('\n');
                    }
                    '/' if chars.peek() == Some(&'/') => {
                        state = State::LineComment;
                        comment_start = out.trim_end_matches([' ', '\t']).len();
                        out.push(c);
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        state = State::BlockComment;
                        block_has_newline = false;
                        comment_start = out.trim_end_matches([' ', '\t']).len();
                        out.push(c);
                        if let Some(star) = chars.next() {
                            out.push(star);
                        }
                    }
                    '"' => {
                        state = State::Str;
                        out.push(c);
                    }
                    '`' => {
                        state = State::RawStr;
                        out.push(c);
                    }
                    ')' | ']' | '}' => {
                        pending = true;
                        out.push(c);
                    }
                    '+' | '-' if chars.peek() == Some(&c) => {
                        chars.next();
                        pending = true;
                        out.push(c);
                        out.push(c);
                    }
                    c if c.is_whitespace() => out.push(c),
                    _ => {
                        pending = false;
                        out.push(c);
                    }
                }
            }
            State::LineComment => {
                if c == '\n' {
                    if pending {
                        out.insert(comment_start, ';');
                    }
                    pending = false;
                    state = State::Code;
                }
                out.push(c);
            }
            State::BlockComment => {
                if c == '\n' && !block_has_newline {
                    block_has_newline = true;
                    if pending {
                        out.insert(comment_start, ';');
                    }
                    pending = false;
                }
                out.push(c);
                if c == '*' && chars.peek() == Some(&'/') {
                    if let Some(slash) = chars.next() {
                        out.push(slash);
                    }
                    state = State::Code;
                }
            }
            State::Str => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == '"' || c == '\n' {
                    state = State::Code;
                    pending = c == '"';
                }
            }
            State::RawStr => {
                out.push(c);
                if c == '`' {
                    state = State::Code;
                    pending = true;
                }
            }
        }
    }
    finish_word(&mut word, &mut pending);
    if pending && state == State::Code {
        out.push(';');
    }
    out
}

/// Lowers pest pairs into AST nodes.
struct Builder<'f> {
    file: &'f str,
}

impl<'f> Builder<'f> {
    fn error_at(&self, line: usize, column: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            file: self.file.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    fn error(&self, pair: &Pair<Rule>, message: impl Into<String>) -> ParseError {
        let (line, column) = pair.line_col();
        self.error_at(line, column, message)
    }

    fn syntax_error(&self, err: pest::error::Error<Rule>) -> ParseError {
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        self.error_at(line, column, err.variant.message().into_owned())
    }

    fn unexpected(&self, pair: &Pair<Rule>) -> ParseError {
        self.error(pair, format!("unexpected {:?}", pair.as_rule()))
    }

    fn first_inner<'i>(&self, pair: Pair<'i, Rule>) -> Result<Pair<'i, Rule>, ParseError> {
        let err = self.error(&pair, format!("empty {:?}", pair.as_rule()));
        pair.into_inner().next().ok_or(err)
    }

    fn file(&self, root: Pair<Rule>) -> Result<SourceFile, ParseError> {
        let mut file = SourceFile {
            package: String::new(),
            imports: Vec::new(),
            decls: Vec::new(),
        };
        for pair in root.into_inner() {
            match pair.as_rule() {
                Rule::package_clause => file.package = self.first_inner(pair)?.as_str().to_string(),
                Rule::import_decl => file.imports.extend(self.import_decl(pair)?),
                Rule::type_decl => {
                    for spec in pair.into_inner() {
                        file.decls.push(Decl::Type(self.type_spec(spec)?));
                    }
                }
                Rule::func_decl => file.decls.push(Decl::Func(Arc::new(self.func_decl(pair)?))),
                Rule::var_decl => file.decls.push(Decl::Var(self.var_decl(pair)?)),
                Rule::EOI => {}
                _ => return Err(self.unexpected(&pair)),
            }
        }
        Ok(file)
    }

    fn import_decl(&self, pair: Pair<Rule>) -> Result<Vec<ImportSpec>, ParseError> {
        pair.into_inner()
            .map(|spec| {
                let mut alias = None;
                let mut path = String::new();
                for part in spec.into_inner() {
                    match part.as_rule() {
                        Rule::ident => alias = Some(part.as_str().to_string()),
                        Rule::string_lit => path = self.string_lit(part)?,
                        _ => return Err(self.unexpected(&part)),
                    }
                }
                Ok(ImportSpec { alias, path })
            })
            .collect()
    }

    fn type_spec(&self, pair: Pair<Rule>) -> Result<TypeSpec, ParseError> {
        let mut inner = pair.into_inner();
        let (Some(name), Some(ty)) = (inner.next(), inner.next()) else {
            return Err(self.error_at(0, 0, "malformed type declaration"));
        };
        Ok(TypeSpec {
            name: name.as_str().to_string(),
            ty: self.type_expr(ty)?,
        })
    }

    fn type_expr(&self, pair: Pair<Rule>) -> Result<TypeExpr, ParseError> {
        match pair.as_rule() {
            Rule::pointer_type => Ok(TypeExpr::Pointer(Box::new(
                self.type_expr(self.first_inner(pair)?)?,
            ))),
            Rule::list_type => Ok(TypeExpr::List(Box::new(
                self.type_expr(self.first_inner(pair)?)?,
            ))),
            Rule::func_type => Ok(TypeExpr::Func(
                self.signature(self.first_inner(pair)?, false)?,
            )),
            Rule::struct_type => {
                let mut fields = Vec::new();
                for field in pair.into_inner() {
                    fields.extend(self.field_decl(field)?);
                }
                Ok(TypeExpr::Struct(fields))
            }
            Rule::named_type => self.named_type(self.first_inner(pair)?),
            _ => Err(self.unexpected(&pair)),
        }
    }

    fn named_type(&self, pair: Pair<Rule>) -> Result<TypeExpr, ParseError> {
        match pair.as_rule() {
            Rule::qualified_ident => {
                let (package, name) = self.qualified(pair)?;
                Ok(TypeExpr::Named {
                    package: Some(package),
                    name,
                })
            }
            Rule::ident => Ok(TypeExpr::named(pair.as_str())),
            _ => Err(self.unexpected(&pair)),
        }
    }

    fn qualified(&self, pair: Pair<Rule>) -> Result<(String, String), ParseError> {
        let err = self.error(&pair, "malformed qualified identifier");
        let mut inner = pair.into_inner();
        match (inner.next(), inner.next()) {
            (Some(package), Some(name)) => {
                Ok((package.as_str().to_string(), name.as_str().to_string()))
            }
            _ => Err(err),
        }
    }

    fn field_decl(&self, pair: Pair<Rule>) -> Result<Vec<Field>, ParseError> {
        let parts: Vec<Pair<Rule>> = pair.into_inner().collect();
        let Some((ty, names)) = parts.split_last() else {
            return Ok(Vec::new());
        };
        let ty = self.type_expr(ty.clone())?;
        if names.is_empty() {
            return Ok(vec![Field { name: None, ty }]);
        }
        Ok(names
            .iter()
            .map(|name| Field {
                name: Some(name.as_str().to_string()),
                ty: ty.clone(),
            })
            .collect())
    }

    /// `named_params` treats untyped identifiers as parameter names, which is
    /// what function declarations and literals want.
    fn signature(&self, pair: Pair<Rule>, named_params: bool) -> Result<Signature, ParseError> {
        let mut signature = Signature::default();
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::params => signature.params = self.params(part, named_params)?,
                Rule::result => {
                    let inner = self.first_inner(part)?;
                    signature.results = match inner.as_rule() {
                        Rule::params => self.params(inner, false)?,
                        _ => vec![Param {
                            name: None,
                            ty: Some(self.type_expr(inner)?),
                        }],
                    };
                }
                _ => return Err(self.unexpected(&part)),
            }
        }
        Ok(signature)
    }

    fn params(&self, pair: Pair<Rule>, named_params: bool) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        for param in pair.into_inner() {
            let parts: Vec<Pair<Rule>> = param.into_inner().collect();
            match parts.as_slice() {
                [name, ty] => params.push(Param {
                    name: Some(name.as_str().to_string()),
                    ty: Some(self.type_expr(ty.clone())?),
                }),
                [ty] => params.push(Param {
                    name: None,
                    ty: Some(self.type_expr(ty.clone())?),
                }),
                _ => return Err(self.error_at(0, 0, "malformed parameter")),
            }
        }

        // Go-style grouping: in `a, b int` the bare `a` is a name sharing the
        // type of the next typed parameter.
        let any_named = params.iter().any(|p| p.name.is_some());
        if any_named || named_params {
            let mut next_ty: Option<TypeExpr> = None;
            for param in params.iter_mut().rev() {
                if param.name.is_some() {
                    next_ty = param.ty.clone();
                    continue;
                }
                if let Some(TypeExpr::Named {
                    package: None,
                    name,
                }) = &param.ty
                {
                    param.name = Some(name.clone());
                    param.ty = if any_named { next_ty.clone() } else { None };
                }
            }
        }
        Ok(params)
    }

    fn func_decl(&self, pair: Pair<Rule>) -> Result<FuncDecl, ParseError> {
        let mut receiver = None;
        let mut name = String::new();
        let mut signature = Signature::default();
        let mut body = Vec::new();
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::receiver => receiver = Some(self.receiver(part)?),
                Rule::ident => name = part.as_str().to_string(),
                Rule::signature => signature = self.signature(part, true)?,
                Rule::block => body = self.block(part)?,
                _ => return Err(self.unexpected(&part)),
            }
        }
        Ok(FuncDecl {
            name,
            receiver,
            signature,
            body,
        })
    }

    fn receiver(&self, pair: Pair<Rule>) -> Result<Receiver, ParseError> {
        let mut receiver = Receiver {
            name: None,
            type_name: String::new(),
            pointer: false,
        };
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::ident => receiver.name = Some(part.as_str().to_string()),
                Rule::receiver_type => {
                    for piece in part.into_inner() {
                        match piece.as_rule() {
                            Rule::pointer_mark => receiver.pointer = true,
                            _ => receiver.type_name = piece.as_str().to_string(),
                        }
                    }
                }
                _ => return Err(self.unexpected(&part)),
            }
        }
        Ok(receiver)
    }

    fn var_decl(&self, pair: Pair<Rule>) -> Result<VarDecl, ParseError> {
        let mut decl = VarDecl {
            name: String::new(),
            ty: None,
            value: None,
        };
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::ident => decl.name = part.as_str().to_string(),
                Rule::expr => decl.value = Some(self.expr(part)?),
                _ => decl.ty = Some(self.type_expr(part)?),
            }
        }
        Ok(decl)
    }

    fn block(&self, pair: Pair<Rule>) -> Result<Vec<Stmt>, ParseError> {
        pair.into_inner().map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&self, pair: Pair<Rule>) -> Result<Stmt, ParseError> {
        match pair.as_rule() {
            Rule::expr_stmt => Ok(Stmt::Expr(self.expr(self.first_inner(pair)?)?)),
            Rule::var_decl => Ok(Stmt::Var(self.var_decl(pair)?)),
            Rule::define_stmt => {
                let mut inner = pair.into_inner();
                let (Some(name), Some(value)) = (inner.next(), inner.next()) else {
                    return Err(self.error_at(0, 0, "malformed short variable declaration"));
                };
                Ok(Stmt::Define {
                    name: name.as_str().to_string(),
                    value: self.expr(value)?,
                })
            }
            Rule::assign_stmt | Rule::assign_post => {
                let err = self.error(&pair, "malformed assignment");
                let mut inner = pair.into_inner();
                let (Some(target), Some(op), Some(value)) = (inner.next(), inner.next(), inner.next())
                else {
                    return Err(err);
                };
                let op = match op.as_str() {
                    "=" => None,
                    "+=" => Some(BinaryOp::Add),
                    "-=" => Some(BinaryOp::Sub),
                    "*=" => Some(BinaryOp::Mul),
                    "/=" => Some(BinaryOp::Div),
                    "%=" => Some(BinaryOp::Rem),
                    _ => return Err(self.unexpected(&op)),
                };
                Ok(Stmt::Assign {
                    target: self.lvalue(target)?,
                    op,
                    value: self.expr(value)?,
                })
            }
            Rule::incdec_stmt => {
                let err = self.error(&pair, "malformed increment");
                let mut inner = pair.into_inner();
                let (Some(target), Some(op)) = (inner.next(), inner.next()) else {
                    return Err(err);
                };
                Ok(Stmt::IncDec {
                    target: self.lvalue(target)?,
                    delta: if op.as_str() == "++" { 1 } else { -1 },
                })
            }
            Rule::return_stmt => Ok(Stmt::Return(
                pair.into_inner().next().map(|e| self.expr(e)).transpose()?,
            )),
            Rule::break_stmt => Ok(Stmt::Break),
            Rule::continue_stmt => Ok(Stmt::Continue),
            Rule::block => Ok(Stmt::Block(self.block(pair)?)),
            Rule::if_stmt => self.if_stmt(pair),
            Rule::for_stmt => self.for_stmt(pair),
            Rule::switch_stmt => self.switch_stmt(pair),
            Rule::for_init | Rule::for_post => self.stmt(self.first_inner(pair)?),
            _ => Err(self.unexpected(&pair)),
        }
    }

    fn lvalue(&self, pair: Pair<Rule>) -> Result<LValue, ParseError> {
        let names: Vec<String> = pair.into_inner().map(|p| p.as_str().to_string()).collect();
        let Some((last, path)) = names.split_last() else {
            return Err(self.error_at(0, 0, "empty assignment target"));
        };
        let Some((root, fields)) = path.split_first() else {
            return Ok(LValue::Ident(last.clone()));
        };
        let object = fields
            .iter()
            .fold(Expr::Ident(root.clone()), |object, field| Expr::Selector {
                object: Box::new(object),
                field: field.clone(),
            });
        Ok(LValue::Field {
            object,
            field: last.clone(),
        })
    }

    fn if_stmt(&self, pair: Pair<Rule>) -> Result<Stmt, ParseError> {
        let mut init = None;
        let mut cond = None;
        let mut then = Vec::new();
        let mut otherwise = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::cond_expr => cond = Some(self.expr(part)?),
                Rule::block => then = self.block(part)?,
                Rule::else_clause => {
                    let branch = self.first_inner(part)?;
                    otherwise = Some(Box::new(self.stmt(branch)?));
                }
                _ => init = Some(Box::new(self.stmt(part)?)),
            }
        }
        let cond = cond.ok_or_else(|| self.error_at(0, 0, "if without condition"))?;
        Ok(Stmt::If {
            init,
            cond,
            then,
            otherwise,
        })
    }

    fn for_stmt(&self, pair: Pair<Rule>) -> Result<Stmt, ParseError> {
        let mut init = None;
        let mut cond = None;
        let mut post = None;
        let mut body = Vec::new();
        let mut range: Option<(String, Option<String>, Expr)> = None;

        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::cond_expr => cond = Some(self.expr(part)?),
                Rule::block => body = self.block(part)?,
                Rule::for_range => {
                    let mut names = Vec::new();
                    let mut iterable = None;
                    for piece in part.into_inner() {
                        match piece.as_rule() {
                            Rule::ident => names.push(piece.as_str().to_string()),
                            _ => iterable = Some(self.expr(piece)?),
                        }
                    }
                    let iterable =
                        iterable.ok_or_else(|| self.error_at(0, 0, "range without operand"))?;
                    let mut names = names.into_iter();
                    let key = names.next().unwrap_or_else(|| "_".to_string());
                    range = Some((key, names.next(), iterable));
                }
                Rule::for_clause => {
                    for piece in part.into_inner() {
                        match piece.as_rule() {
                            Rule::for_init => init = Some(Box::new(self.stmt(piece)?)),
                            Rule::for_cond => cond = Some(self.expr(self.first_inner(piece)?)?),
                            Rule::for_post => post = Some(Box::new(self.stmt(piece)?)),
                            _ => return Err(self.unexpected(&piece)),
                        }
                    }
                }
                _ => return Err(self.unexpected(&part)),
            }
        }

        if let Some((key, value, iterable)) = range {
            return Ok(Stmt::ForRange {
                key,
                value,
                iterable,
                body,
            });
        }
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
        })
    }

    fn switch_stmt(&self, pair: Pair<Rule>) -> Result<Stmt, ParseError> {
        let mut tag = None;
        let mut cases = Vec::new();
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::cond_expr => tag = Some(self.expr(part)?),
                Rule::case_clause => {
                    let mut labels = None;
                    let mut body = Vec::new();
                    for piece in part.into_inner() {
                        match piece.as_rule() {
                            Rule::case_label => {
                                labels = Some(
                                    piece
                                        .into_inner()
                                        .map(|e| self.expr(e))
                                        .collect::<Result<Vec<_>, _>>()?,
                                );
                            }
                            Rule::default_label => labels = None,
                            _ => body.push(self.stmt(piece)?),
                        }
                    }
                    cases.push(SwitchCase { labels, body });
                }
                _ => return Err(self.unexpected(&part)),
            }
        }
        Ok(Stmt::Switch { tag, cases })
    }

    fn expr(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        PRATT
            .map_primary(|primary| self.primary(primary))
            .map_prefix(|op, operand| {
                let op = match op.as_rule() {
                    Rule::neg_op => UnaryOp::Neg,
                    Rule::not_op => UnaryOp::Not,
                    Rule::addr_op => UnaryOp::Addr,
                    _ => return Err(self.unexpected(&op)),
                };
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand?),
                })
            })
            .map_postfix(|object, op| {
                let object = Box::new(object?);
                match op.as_rule() {
                    Rule::call_args => Ok(Expr::Call {
                        callee: object,
                        args: op
                            .into_inner()
                            .map(|arg| self.expr(arg))
                            .collect::<Result<_, _>>()?,
                    }),
                    Rule::selector => Ok(Expr::Selector {
                        object,
                        field: self.first_inner(op)?.as_str().to_string(),
                    }),
                    Rule::type_assert => Ok(Expr::Assert {
                        value: object,
                        ty: self.type_expr(self.first_inner(op)?)?,
                    }),
                    Rule::index_op => Ok(Expr::Index {
                        object,
                        index: Box::new(self.expr(self.first_inner(op)?)?),
                    }),
                    _ => Err(self.unexpected(&op)),
                }
            })
            .map_infix(|left, op, right| {
                let op = match op.as_rule() {
                    Rule::or_op => BinaryOp::Or,
                    Rule::and_op => BinaryOp::And,
                    Rule::eq_op => BinaryOp::Eq,
                    Rule::ne_op => BinaryOp::Ne,
                    Rule::lt_op => BinaryOp::Lt,
                    Rule::le_op => BinaryOp::Le,
                    Rule::gt_op => BinaryOp::Gt,
                    Rule::ge_op => BinaryOp::Ge,
                    Rule::add_op => BinaryOp::Add,
                    Rule::sub_op => BinaryOp::Sub,
                    Rule::mul_op => BinaryOp::Mul,
                    Rule::div_op => BinaryOp::Div,
                    Rule::rem_op => BinaryOp::Rem,
                    _ => return Err(self.unexpected(&op)),
                };
                Ok(Expr::Binary {
                    op,
                    left: Box::new(left?),
                    right: Box::new(right?),
                })
            })
            .parse(pair.into_inner())
    }

    fn primary(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        match pair.as_rule() {
            Rule::int_lit => pair
                .as_str()
                .parse()
                .map(Expr::Int)
                .map_err(|_| self.error(&pair, "integer literal out of range")),
            Rule::float_lit => pair
                .as_str()
                .parse()
                .map(Expr::Float)
                .map_err(|_| self.error(&pair, "malformed float literal")),
            Rule::string_lit => Ok(Expr::Str(self.string_lit(pair)?)),
            Rule::raw_string_lit => Ok(Expr::Str(
                pair.into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
            )),
            Rule::nil_lit => Ok(Expr::Nil),
            Rule::true_lit => Ok(Expr::Bool(true)),
            Rule::false_lit => Ok(Expr::Bool(false)),
            Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
            Rule::paren_expr => self.expr(self.first_inner(pair)?),
            Rule::composite_lit => {
                let mut inner = pair.into_inner();
                let ty = inner
                    .next()
                    .ok_or_else(|| self.error_at(0, 0, "composite literal without type"))?;
                let (package, type_name) = match self.named_type(self.first_inner(ty)?)? {
                    TypeExpr::Named { package, name } => (package, name),
                    _ => return Err(self.error_at(0, 0, "composite literal of unnamed type")),
                };
                let elements = inner
                    .map(|element| {
                        let parts: Vec<Pair<Rule>> = element.into_inner().collect();
                        match parts.as_slice() {
                            [key, value] => Ok(Element {
                                key: Some(key.as_str().to_string()),
                                value: self.expr(value.clone())?,
                            }),
                            [value] => Ok(Element {
                                key: None,
                                value: self.expr(value.clone())?,
                            }),
                            _ => Err(self.error_at(0, 0, "malformed composite element")),
                        }
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Expr::Composite {
                    package,
                    type_name,
                    elements,
                })
            }
            Rule::list_lit => Ok(Expr::List(
                pair.into_inner()
                    .filter(|p| p.as_rule() == Rule::expr)
                    .map(|p| self.expr(p))
                    .collect::<Result<_, _>>()?,
            )),
            Rule::func_lit => {
                let mut signature = Signature::default();
                let mut body = Vec::new();
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::signature => signature = self.signature(part, true)?,
                        Rule::block => body = self.block(part)?,
                        _ => return Err(self.unexpected(&part)),
                    }
                }
                Ok(Expr::Func(Arc::new(FuncDecl {
                    name: "func".to_string(),
                    receiver: None,
                    signature,
                    body,
                })))
            }
            _ => Err(self.unexpected(&pair)),
        }
    }

    fn string_lit(&self, pair: Pair<Rule>) -> Result<String, ParseError> {
        let raw = pair
            .into_inner()
            .next()
            .map(|p| p.as_str())
            .unwrap_or_default();
        unescape(raw).ok_or_else(|| self.error_at(0, 0, format!("invalid escape in \"{raw}\"")))
    }
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            _ => return None,
        });
    }
    Some(out)
}
