//! Host-side implementations of the `fmt` and `strings` packages.

use super::builtins::expect_args;
use super::errors::EvaluatorError;
use super::value::{SymbolTable, Value};

/// Symbol table installed into every new interpreter by the script host.
pub fn symbols() -> SymbolTable {
    let mut table = SymbolTable::new();
    table
        .insert("fmt", "Sprint", Value::native("fmt.Sprint", |args| Ok(Value::from(sprint(args)))))
        .insert("fmt", "Sprintf", Value::native("fmt.Sprintf", sprintf))
        .insert(
            "fmt",
            "Println",
            Value::native("fmt.Println", |args| {
                let line = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
                tracing::info!(target: "hotscript::script", "{}", line);
                Ok(Value::Nil)
            }),
        );

    table
        .insert("strings", "ToUpper", unary_str("strings.ToUpper", |s| Value::from(s.to_uppercase())))
        .insert("strings", "ToLower", unary_str("strings.ToLower", |s| Value::from(s.to_lowercase())))
        .insert("strings", "TrimSpace", unary_str("strings.TrimSpace", |s| Value::from(s.trim())))
        .insert("strings", "Contains", binary_str("strings.Contains", |s, sub| Value::Bool(s.contains(sub))))
        .insert("strings", "HasPrefix", binary_str("strings.HasPrefix", |s, p| Value::Bool(s.starts_with(p))))
        .insert("strings", "HasSuffix", binary_str("strings.HasSuffix", |s, p| Value::Bool(s.ends_with(p))))
        .insert(
            "strings",
            "Split",
            binary_str("strings.Split", |s, sep| {
                Value::from(s.split(sep).map(Value::from).collect::<Vec<_>>())
            }),
        )
        .insert("strings", "Join", Value::native("strings.Join", join))
        .insert("strings", "Repeat", Value::native("strings.Repeat", repeat));
    table
}

fn str_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str, EvaluatorError> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(&**s),
        Some(other) => Err(EvaluatorError::type_error(name, "string", &other.type_name())),
        None => Err(EvaluatorError::type_error(name, "string", "nothing")),
    }
}

fn unary_str(name: &'static str, f: fn(&str) -> Value) -> Value {
    Value::native(name, move |args| {
        expect_args(name, args, 1)?;
        Ok(f(str_arg(name, args, 0)?))
    })
}

fn binary_str(name: &'static str, f: fn(&str, &str) -> Value) -> Value {
    Value::native(name, move |args| {
        expect_args(name, args, 2)?;
        Ok(f(str_arg(name, args, 0)?, str_arg(name, args, 1)?))
    })
}

/// Operands are separated by a space when neither side is a string.
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !matches!(arg, Value::Str(_)) && !matches!(args[i - 1], Value::Str(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

fn sprintf(args: &[Value]) -> Result<Value, EvaluatorError> {
    let format = str_arg("fmt.Sprintf", args, 0)?;
    let mut operands = args.iter().skip(1);
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(operand) = operands.next() else {
            out.push_str(&format!("%!{verb}(MISSING)"));
            continue;
        };
        match (verb, operand) {
            ('v' | 's', value) => out.push_str(&value.to_string()),
            ('d', Value::Int(i)) => out.push_str(&i.to_string()),
            ('q', Value::Str(s)) => out.push_str(&format!("{s:?}")),
            ('t', Value::Bool(b)) => out.push_str(&b.to_string()),
            (verb, value) => out.push_str(&format!("%!{verb}({}={value})", value.type_name())),
        }
    }
    Ok(Value::from(out))
}

fn join(args: &[Value]) -> Result<Value, EvaluatorError> {
    expect_args("strings.Join", args, 2)?;
    let Value::List(items) = &args[0] else {
        return Err(EvaluatorError::type_error("strings.Join", "list", &args[0].type_name()));
    };
    let sep = str_arg("strings.Join", args, 1)?;
    let parts = items.iter().map(ToString::to_string).collect::<Vec<_>>();
    Ok(Value::from(parts.join(sep)))
}

fn repeat(args: &[Value]) -> Result<Value, EvaluatorError> {
    expect_args("strings.Repeat", args, 2)?;
    let s = str_arg("strings.Repeat", args, 0)?;
    let count = args[1]
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| EvaluatorError::type_error("strings.Repeat", "non-negative int", &args[1].type_name()))?;
    Ok(Value::from(s.repeat(count)))
}
