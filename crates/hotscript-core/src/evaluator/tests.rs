use super::*;
use pretty_assertions::assert_eq;

struct Anchor {
    name: &'static str,
}

impl HostObject for Anchor {
    fn type_name(&self) -> &str {
        "host.Anchor"
    }

    fn get(&self, field: &str) -> Option<Value> {
        (field == "Name").then(|| Value::from(self.name))
    }

    fn has_method(&self, method: &str) -> bool {
        method == "Greet"
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, EvaluatorError> {
        match method {
            "Greet" => Ok(Value::from(format!("{} greets {}", self.name, args[0]))),
            _ => Err(EvaluatorError::no_field(self.type_name(), method)),
        }
    }
}

fn interpreter(files: &[(&str, &str)]) -> ScriptInterpreter {
    let fs = Arc::new(CodeFs::new(""));
    for (name, source) in files {
        fs.add_fake_file(name, source.as_bytes()).unwrap();
    }
    let interp = ScriptInterpreter::new(fs);
    interp.use_symbols(&stdlib::symbols()).unwrap();
    let mut host = SymbolTable::new();
    host.package("host");
    interp.use_symbols(&host).unwrap();
    interp
}

fn eval(interp: &ScriptInterpreter, source: &str) -> Value {
    interp.eval(source).unwrap()
}

#[test]
fn test_snippet_arithmetic_and_session_scope() {
    let interp = interpreter(&[]);
    assert_eq!(eval(&interp, "1 + 2 * 3"), Value::Int(7));
    assert_eq!(eval(&interp, "7 / 2.0"), Value::Float(3.5));
    eval(&interp, "x := 40");
    assert_eq!(eval(&interp, "x += 2\nx"), Value::Int(42));
    assert_eq!(eval(&interp, "\"a\" + \"b\" == \"ab\""), Value::Bool(true));
}

#[test]
fn test_control_flow() {
    let interp = interpreter(&[]);
    let source = r#"
sum := 0
for i := 0; i < 10; i++ {
    if i == 3 {
        continue
    }
    if i == 6 {
        break
    }
    sum += i
}
sum
"#;
    // 0 + 1 + 2 + 4 + 5
    assert_eq!(eval(&interp, source), Value::Int(12));

    let source = r#"
total := 0
for _, v := range []int{1, 2, 3} {
    switch v {
    case 1:
        total += 10
    case 2, 3:
        total += v
    default:
        total = -1
    }
}
total
"#;
    assert_eq!(eval(&interp, source), Value::Int(15));
}

#[test]
fn test_closures_capture_by_value() {
    let interp = interpreter(&[]);
    let source = r#"
base := 10
add := func(n int) int { return base + n }
base = 100
add(5)
"#;
    assert_eq!(eval(&interp, source), Value::Int(15));
}

#[test]
fn test_eval_path_loads_package_and_imports() {
    let interp = interpreter(&[
        (
            "lib/util/util.gs",
            "package util\n\nfunc Double(n int) int { return n * 2 }\n",
        ),
        (
            "lib/app/app.gs",
            "package app\n\nimport \"lib/util\"\n\nvar Base = util.Double(21)\n",
        ),
        (
            "lib/app/more.gs",
            "package app\n\nimport \"strings\"\n\nfunc Shout(s string) string { return strings.ToUpper(s) }\n",
        ),
    ]);
    interp.eval_path("lib/app").unwrap();
    assert_eq!(interp.packages(), vec!["lib/app", "lib/util"]);

    let value = eval(&interp, "import \"lib/app\"\napp.Base");
    assert_eq!(value, Value::Int(42));
    assert_eq!(eval(&interp, "app.Shout(\"hi\")"), Value::from("HI"));
}

#[test]
fn test_struct_methods_and_promotion_to_host() {
    let interp = interpreter(&[(
        "ext/s1/bar.gs",
        r#"package s1

import "host"

type Bar struct {
    *host.Anchor
    count int
}

func (b *Bar) Hello() string {
    b.count++
    return "hello " + b.Name
}

func (b *Bar) Count() int { return b.count }
"#,
    )]);
    interp.eval_path("ext/s1").unwrap();
    interp.eval("import \"ext/s1\"").unwrap();

    let mut symbols = SymbolTable::new();
    symbols.insert("main_host", "anchor", Value::host(Anchor { name: "bob" }));
    interp.use_symbols(&symbols).unwrap();

    let source = r#"
import "main_host"
bar := s1.Bar{main_host.anchor}
bar.Hello()
"#;
    assert_eq!(eval(&interp, source), Value::from("hello bob"));
    assert_eq!(eval(&interp, "bar.Count()"), Value::Int(1));
    assert_eq!(eval(&interp, "bar.Greet(\"amy\")"), Value::from("bob greets amy"));

    // method expression takes the receiver first
    let hello = eval(&interp, "s1.Bar.Hello");
    assert_eq!(hello.arity(), Some(1));
    let bar = eval(&interp, "bar");
    assert_eq!(hello.call(&[bar]).unwrap(), Value::from("hello bob"));
    assert_eq!(eval(&interp, "bar.Count()"), Value::Int(2));
}

#[test]
fn test_type_assertions() {
    let interp = interpreter(&[]);
    let mut symbols = SymbolTable::new();
    symbols.insert("host", "anchor", Value::host(Anchor { name: "x" }));
    interp.use_symbols(&symbols).unwrap();

    eval(&interp, "import \"host\"");
    let ok = eval(&interp, "host.anchor.(*host.Anchor)");
    assert_eq!(ok.type_name(), "host.Anchor");
    assert_eq!(eval(&interp, "f := func() int { return 1 }\nf.(func() int)()"), Value::Int(1));

    let err = interp.eval("1.(string)").unwrap_err();
    assert!(matches!(err, EvaluatorError::TypeAssertion { .. }), "{err}");
}

#[test]
fn test_define_package_from_source() {
    let interp = interpreter(&[]);
    let misplaced = "package greet\n\nfunc Hi() string { return \"\" }\n\nimport \"fmt\"\n";
    // imports must precede declarations
    assert!(matches!(interp.eval(misplaced).unwrap_err(), EvaluatorError::Parse(_)));
    assert!(interp.package("greet").is_none());

    eval(
        &interp,
        "package greet\n\nimport \"fmt\"\n\nfunc Hi(name string) string { return fmt.Sprintf(\"hi %s\", name) }\n",
    );
    assert_eq!(eval(&interp, "greet.Hi(\"al\")"), Value::from("hi al"));

    // a second source merges into the same package
    eval(&interp, "package greet\n\nfunc Bye() string { return \"bye\" }\n");
    assert_eq!(eval(&interp, "greet.Bye()"), Value::from("bye"));
    assert_eq!(eval(&interp, "greet.Hi(\"al\")"), Value::from("hi al"));
}

#[test]
fn test_errors() {
    let interp = interpreter(&[
        ("cyc/a/a.gs", "package a\n\nimport \"cyc/b\"\n"),
        ("cyc/b/b.gs", "package b\n\nimport \"cyc/a\"\n"),
        ("mixed/x.gs", "package x\n"),
        ("mixed/y.gs", "package y\n"),
    ]);

    assert!(matches!(
        interp.eval_path("cyc/a").unwrap_err(),
        EvaluatorError::ImportCycle { .. }
    ));
    assert!(matches!(
        interp.eval_path("missing").unwrap_err(),
        EvaluatorError::PackageNotFound { .. }
    ));
    assert!(matches!(
        interp.eval_path("mixed").unwrap_err(),
        EvaluatorError::PackageNameMismatch { .. }
    ));
    assert!(matches!(interp.eval("nope").unwrap_err(), EvaluatorError::Undefined { .. }));
    assert!(matches!(interp.eval("1 / 0").unwrap_err(), EvaluatorError::DivisionByZero));
    assert!(matches!(
        interp.eval("panic(\"boom\")").unwrap_err(),
        EvaluatorError::Panic { message } if message == "boom"
    ));
    assert!(matches!(
        interp.eval("f := func(a int) int { return a }\nf()").unwrap_err(),
        EvaluatorError::ArgumentCount { expected: 1, actual: 0, .. }
    ));
}

#[test]
fn test_call_depth_limit() {
    let interp = interpreter(&[(
        "rec/r.gs",
        "package rec\n\nfunc Forever(n int) int { return Forever(n + 1) }\n",
    )]);
    interp.eval_path("rec").unwrap();
    // deep script recursion needs more than the default test thread stack
    let err = std::thread::Builder::new()
        .stack_size(16 * 1024 * 1024)
        .spawn(move || interp.eval("import \"rec\"\nrec.Forever(0)").unwrap_err())
        .unwrap()
        .join()
        .unwrap();
    assert!(matches!(err, EvaluatorError::CallDepth { limit } if limit == MAX_CALL_DEPTH));
}

#[test]
fn test_symbols_conflict_with_script_package() {
    let interp = interpreter(&[("p/p.gs", "package p\n")]);
    interp.eval_path("p").unwrap();
    let mut symbols = SymbolTable::new();
    symbols.insert("p", "X", Value::Int(1));
    assert!(matches!(
        interp.use_symbols(&symbols).unwrap_err(),
        EvaluatorError::PackageConflict { .. }
    ));
}

#[test]
fn test_stdlib() {
    let interp = interpreter(&[]);
    eval(&interp, "import (\n    \"fmt\"\n    \"strings\"\n)");
    assert_eq!(
        eval(&interp, "fmt.Sprintf(\"%s=%d %v%%\", \"n\", 3, true)"),
        Value::from("n=3 true%")
    );
    assert_eq!(eval(&interp, "fmt.Sprint(1, 2, \"x\", 3)"), Value::from("1 2x3"));
    assert_eq!(
        eval(&interp, "strings.Join(strings.Split(\"a,b,c\", \",\"), \"-\")"),
        Value::from("a-b-c")
    );
    assert_eq!(eval(&interp, "len(append([]int{1}, 2, 3))"), Value::Int(3));
    assert_eq!(eval(&interp, "strings.HasPrefix(\"hotscript\", \"hot\")"), Value::Bool(true));
}
