use std::sync::Arc;

use super::*;
use crate::codefs::CodeFs;
use crate::evaluator::{HostObject, Interpreter, ScriptInterpreter, SymbolTable};
use pretty_assertions::assert_eq;

const BAR: &str = r#"package s1

import "host"

type Bar struct {
    *host.Anchor
}

func (b *Bar) Hello() string { return "hello " + b.Name }
func (b *Bar) Bye() string { return "bye " + b.Name }
func Free(n int) int { return n + 1 }
"#;

const GREETER: &str = r#"package s1

import h "host"

type Greeter func() *h.Anchor

type Plain struct {
    name string
}

func (g Greeter) Hello() string { return "hi " + g().Name }
func (p Plain) Name() string { return p.name }
"#;

struct TestAnchor;

impl HostObject for TestAnchor {
    fn type_name(&self) -> &str {
        "host.Anchor"
    }

    fn get(&self, field: &str) -> Option<Value> {
        (field == "Name").then(|| Value::from("ann"))
    }
}

/// An entity that exposes its anchor, as function-style extensions need.
struct Entity;

impl HostObject for Entity {
    fn type_name(&self) -> &str {
        "host.Entity"
    }

    fn anchor(&self) -> Option<Value> {
        Some(Value::host(TestAnchor))
    }
}

fn script_fs() -> CodeFs {
    let fs = CodeFs::new("");
    fs.add_fake_file("root/ext/s1/bar.gs", BAR.as_bytes()).unwrap();
    fs.add_fake_file("root/ext/s1/greeter.gs", GREETER.as_bytes()).unwrap();
    fs.add_fake_file("root/ext/s1/notes.txt", &b"not a script"[..]).unwrap();
    fs
}

#[test]
fn test_push_method_keeps_sorted_and_idempotent() {
    let mut script = Script::new("p", "a/p", "T", Extension::Unbound);
    assert!(script.push_method("Zed"));
    assert!(script.push_method("Alpha"));
    assert!(script.push_method("Mid"));
    assert!(!script.push_method("Mid"));

    let names: Vec<_> = script.methods().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Mid", "Zed"]);
    assert!(script.method("Mid").is_some());
    assert!(script.method("Nope").is_none());
}

#[test]
fn test_push_ident_rejects_duplicates() {
    let mut library = ScriptLibrary::new();
    assert!(library.push_ident(Script::new("p", "a/p", "T", Extension::Unbound)));
    assert!(!library.push_ident(Script::new("p", "a/p", "T", Extension::Unbound)));
    assert!(library.push_ident(Script::new("q", "a/q", "T", Extension::Unbound)));
    assert!(library.push_method("a/p", "T", "M"));
    assert!(!library.push_method("a/p", "Missing", "M"));
}

#[test]
fn test_unique_package_name() {
    let script = Script::new("s1", "root/ext.v2/my-s1", "", Extension::Unbound);
    assert_eq!(script.unique_package_name(), "root_ext_v2_my_s1");
}

#[test]
fn test_discovery_classifies_types() {
    let fs = script_fs();
    let mut library = ScriptLibrary::new();
    load(&fs, "root/ext", &mut library).unwrap();

    let bundle = library.package("root/ext/s1").unwrap();
    let idents: Vec<_> = bundle.scripts().map(|s| s.ident.as_str()).collect();
    assert_eq!(idents, vec!["", "Bar", "Greeter", "Plain"]);

    let bar = bundle.ident("Bar").unwrap();
    assert_eq!(
        bar.extension,
        Extension::Struct(Anchor {
            name: "Anchor".into(),
            package_name: "host".into(),
            package_path: "host".into(),
        })
    );
    let names: Vec<_> = bar.methods().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Bye", "Hello"]);

    let greeter = bundle.ident("Greeter").unwrap();
    assert_eq!(greeter.bind_mode(), BindMode::Func);
    assert_eq!(greeter.extension.anchor().unwrap().package_name, "h");
    assert_eq!(bundle.ident("Plain").unwrap().bind_mode(), BindMode::None);
    assert_eq!(bundle.ident("").unwrap().methods()[0].name, "Free");
}

#[test]
fn test_discovery_reports_parse_errors() {
    let fs = CodeFs::new("");
    fs.add_fake_file("root/bad/x.gs", &b"package x\n\nfunc {"[..]).unwrap();
    let err = load(&fs, "root", &mut ScriptLibrary::new()).unwrap_err();
    match err {
        DiscoveryError::Parse(parse) => assert_eq!(parse.file, "root/bad/x.gs"),
        other => panic!("unexpected {other}"),
    }
}

#[test]
fn test_compile_binds_and_resolves() {
    let fs = Arc::new(script_fs());
    let mut library = ScriptLibrary::new();
    let packages = load(&fs, "root/ext", &mut library).unwrap();

    let interp = ScriptInterpreter::new(fs);
    let mut host = SymbolTable::new();
    host.package("host");
    interp.use_symbols(&host).unwrap();
    compile(&interp, &mut library, &packages).unwrap();

    for script in library.package("root/ext/s1").unwrap().scripts() {
        assert_eq!(script.binder().is_some(), script.bind_mode() != BindMode::None);
        assert!(script.methods().iter().all(|m| m.handle.is_some()));
    }

    let free = library.script("root/ext/s1", "").unwrap().method("Free").unwrap();
    let result = free.handle.as_ref().unwrap().call(&[Value::Int(41)]).unwrap();
    assert_eq!(result, Value::Int(42));

    let bar = library.script("root/ext/s1", "Bar").unwrap();
    let hello = bar.resolve(&Value::host(TestAnchor), "Hello").unwrap();
    assert_eq!(hello.call(&[]).unwrap(), Value::from("hello ann"));
    assert!(bar.resolve(&Value::host(TestAnchor), "Missing").is_none());
    // wrong host type fails the assertion inside the binder
    assert!(bar.resolve(&Value::host(Entity), "Hello").is_none());

    let greeter = library.script("root/ext/s1", "Greeter").unwrap();
    let hello = greeter.resolve(&Value::host(Entity), "Hello").unwrap();
    assert_eq!(hello.call(&[]).unwrap(), Value::from("hi ann"));
    // no anchor accessor means no override
    assert!(greeter.resolve(&Value::host(TestAnchor), "Hello").is_none());

    let plain = library.script("root/ext/s1", "Plain").unwrap();
    assert!(plain.resolve(&Value::host(TestAnchor), "Name").is_none());
}

#[test]
fn test_compile_fails_on_missing_import() {
    let fs = Arc::new(script_fs());
    let mut library = ScriptLibrary::new();
    let packages = load(&fs, "root/ext", &mut library).unwrap();

    // "host" was never registered
    let interp = ScriptInterpreter::new(fs);
    let err = compile(&interp, &mut library, &packages).unwrap_err();
    assert!(matches!(err, CompileError::Package { ref package, .. } if package == "root/ext/s1"), "{err}");
}

#[test]
fn test_discovery_returns_its_packages() {
    let fs = script_fs();
    fs.add_fake_file("root/ext/util/util.gs", &b"package util\n\nfunc Id(n int) int { return n }\n"[..])
        .unwrap();
    fs.add_fake_file("root/other/o.gs", &b"package other\n"[..]).unwrap();

    let mut library = ScriptLibrary::new();
    let packages = load(&fs, "root/ext", &mut library).unwrap();
    assert_eq!(packages, vec!["root/ext/s1", "root/ext/util"]);
}

#[test]
fn test_compile_leaves_unlisted_packages_alone() {
    let fs = Arc::new(script_fs());
    fs.add_fake_file("root/ext/util/util.gs", &b"package util\n\nfunc Id(n int) int { return n }\n"[..])
        .unwrap();
    let mut library = ScriptLibrary::new();
    load(&fs, "root/ext", &mut library).unwrap();

    // without "host", compiling s1 would fail
    let interp = ScriptInterpreter::new(fs);
    compile(&interp, &mut library, &["root/ext/util".to_string()]).unwrap();

    let id = library.script("root/ext/util", "").unwrap().method("Id").unwrap();
    assert!(id.handle.is_some());
    let bar = library.script("root/ext/s1", "Bar").unwrap();
    assert!(bar.binder().is_none());
    assert!(bar.methods().iter().all(|m| m.handle.is_none()));
}
