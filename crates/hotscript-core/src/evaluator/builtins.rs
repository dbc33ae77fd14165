//! Predeclared functions available in every scope.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::errors::EvaluatorError;
use super::value::Value;

static BUILTINS: LazyLock<HashMap<&'static str, Value>> = LazyLock::new(|| {
    let mut builtins = HashMap::new();
    builtins.insert("len", Value::native("len", len));
    builtins.insert("append", Value::native("append", append));
    builtins.insert("println", Value::native("println", println));
    builtins.insert("string", Value::native("string", string));
    builtins.insert("panic", Value::native("panic", panic));
    builtins
});

/// Look up a predeclared function by name.
pub fn lookup(name: &str) -> Option<Value> {
    BUILTINS.get(name).cloned()
}

pub(crate) fn expect_args(name: &str, args: &[Value], expected: usize) -> Result<(), EvaluatorError> {
    if args.len() != expected {
        return Err(EvaluatorError::ArgumentCount {
            name: name.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn len(args: &[Value]) -> Result<Value, EvaluatorError> {
    expect_args("len", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.len() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Nil => Ok(Value::Int(0)),
        other => Err(EvaluatorError::type_error("len", "string or list", &other.type_name())),
    }
}

fn append(args: &[Value]) -> Result<Value, EvaluatorError> {
    let Some((first, rest)) = args.split_first() else {
        return Err(EvaluatorError::ArgumentCount {
            name: "append".to_string(),
            expected: 1,
            actual: 0,
        });
    };
    let mut items = match first {
        Value::List(items) => items.as_ref().clone(),
        Value::Nil => Vec::new(),
        other => return Err(EvaluatorError::type_error("append", "list", &other.type_name())),
    };
    items.extend(rest.iter().cloned());
    Ok(Value::from(items))
}

fn println(args: &[Value]) -> Result<Value, EvaluatorError> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!(target: "hotscript::script", "{}", line);
    Ok(Value::Nil)
}

fn string(args: &[Value]) -> Result<Value, EvaluatorError> {
    expect_args("string", args, 1)?;
    Ok(Value::from(args[0].to_string()))
}

fn panic(args: &[Value]) -> Result<Value, EvaluatorError> {
    expect_args("panic", args, 1)?;
    Err(EvaluatorError::Panic {
        message: args[0].to_string(),
    })
}
