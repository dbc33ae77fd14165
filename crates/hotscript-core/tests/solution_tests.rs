mod common;

use std::fs;
use std::path::Path;

use hotscript_core::{
    HostObject, Project, ScriptRef, Solution, SolutionError, SymbolTable, Value,
};
use common::{tar_gz, ArchiveServer};
use pretty_assertions::assert_eq;

const BAR: &str = r#"package s1

import "host"
import "strings"

type Bar struct {
    *host.Anchor
    greeted int
}

func (b *Bar) Hello() string {
    b.greeted++
    return "hello " + b.Name
}

func (b *Bar) Shout() string { return strings.ToUpper(b.Hello()) }

func Free(n int) int { return n * 2 }
"#;

const MENU: &str = r#"package menu

import "host"

type Menu func() *host.Anchor

func (m Menu) Title() string { return "menu of " + m().Name }
"#;

struct Player {
    name: &'static str,
}

impl HostObject for Player {
    fn type_name(&self) -> &str {
        "host.Anchor"
    }

    fn get(&self, field: &str) -> Option<Value> {
        (field == "Name").then(|| Value::from(self.name))
    }
}

/// A host entity whose scripts extend it through an anchor accessor.
struct Npc;

impl HostObject for Npc {
    fn type_name(&self) -> &str {
        "host.Npc"
    }

    fn anchor(&self) -> Option<Value> {
        Some(Value::host(Player { name: "npc" }))
    }
}

fn host_symbols() -> SymbolTable {
    let mut symbols = SymbolTable::new();
    symbols.package("host");
    symbols
}

fn write(root: &Path, name: &str, source: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, source).unwrap();
}

fn solution_with(dir: &Path) -> Solution {
    let mut solution = Solution::new("pkgroot");
    solution.use_symbols(&hotscript_core::evaluator::stdlib::symbols()).unwrap();
    let project = Project::new("ext")
        .with_local_path(dir)
        .with_symbols(host_symbols());
    solution.load(&project).unwrap();
    solution
}

#[test]
fn test_local_project_binds_struct_extension() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "s1/bar.gs", BAR);
    let solution = solution_with(dir.path());

    assert_eq!(solution.packages(), vec!["pkgroot/ext/s1"]);
    let free = solution.method("pkgroot/ext/s1", "Free").unwrap();
    assert_eq!(free.call(&[Value::Int(21)]).unwrap(), Value::Int(42));
    assert!(solution.method("pkgroot/ext/s1", "Hello").is_none());

    let script = ScriptRef::new("pkgroot/ext/s1", "Bar");
    let player = Value::host(Player { name: "bob" });
    let result = script.invoke(&solution, &player, "Shout", &[]).unwrap().unwrap();
    assert_eq!(result, Value::from("HELLO BOB"));

    // unknown method or script: host default behaviour
    assert!(script.invoke(&solution, &player, "Dance", &[]).is_none());
    assert!(ScriptRef::new("pkgroot/ext/s1", "Nope")
        .bind(&solution, &player, "Hello")
        .is_none());
}

#[test]
fn test_local_project_binds_function_extension() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "menu/menu.gs", MENU);
    let solution = solution_with(dir.path());

    let script = ScriptRef::new("pkgroot/ext/menu", "Menu");
    let title = script.bind(&solution, &Value::host(Npc), "Title").unwrap();
    assert_eq!(title.call(&[]).unwrap(), Value::from("menu of npc"));
}

#[test]
fn test_eval_sees_script_packages() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "s1/bar.gs", BAR);
    let solution = solution_with(dir.path());

    let value = solution
        .eval("import \"pkgroot/ext/s1\"\ns1.Free(5) + 1")
        .unwrap();
    assert_eq!(value, Value::Int(11));
}

#[test]
fn test_conflicting_script_root() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "s1/bar.gs", BAR);
    let mut solution = solution_with(dir.path());

    let again = Project::new("ext").with_local_path(dir.path());
    let err = solution.load(&again).unwrap_err();
    assert!(matches!(err, SolutionError::Conflict { ref path } if path == "pkgroot/ext"), "{err}");
    assert_eq!(err.to_string(), "script path pkgroot/ext already exists");
    assert_eq!(solution.packages(), vec!["pkgroot/ext/s1"]);
}

#[test]
fn test_local_path_must_be_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain.txt");
    fs::write(&file, "x").unwrap();

    let mut solution = Solution::new("pkgroot");
    let err = solution
        .load(&Project::new("ext").with_local_path(&file))
        .unwrap_err();
    assert!(matches!(err, SolutionError::LocalPath { .. }), "{err}");
}

#[test]
fn test_failed_load_keeps_previous_library() {
    let good = tempfile::tempdir().unwrap();
    write(good.path(), "s1/bar.gs", BAR);
    let mut solution = solution_with(good.path());

    let bad = tempfile::tempdir().unwrap();
    write(bad.path(), "broken/x.gs", "package broken\n\nfunc Oops( {\n");
    let err = solution
        .load(&Project::new("other").with_local_path(bad.path()))
        .unwrap_err();
    assert!(matches!(err, SolutionError::Discovery(_)), "{err}");
    assert_eq!(solution.packages(), vec!["pkgroot/ext/s1"]);
}

#[test]
fn test_missing_host_symbols_fail_compile() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "s1/bar.gs", BAR);

    let mut solution = Solution::new("pkgroot");
    let err = solution
        .load(&Project::new("ext").with_local_path(dir.path()))
        .unwrap_err();
    assert!(matches!(err, SolutionError::Compile(_)), "{err}");
    assert!(solution.packages().is_empty());
}

#[test]
fn test_failed_load_can_be_retried() {
    let good = tempfile::tempdir().unwrap();
    write(good.path(), "s1/bar.gs", BAR);
    let mut solution = solution_with(good.path());

    let bad = tempfile::tempdir().unwrap();
    write(bad.path(), "broken/x.gs", "package broken\n\nfunc Oops( {\n");
    let project = Project::new("other").with_local_path(bad.path());
    assert!(solution.load(&project).is_err());
    assert!(!solution.code_fs().is_mapped("pkgroot/other"));

    write(bad.path(), "broken/x.gs", "package broken\n\nfunc Fine() int { return 1 }\n");
    solution.load(&project).unwrap();
    assert_eq!(solution.packages(), vec!["pkgroot/ext/s1", "pkgroot/other/broken"]);
}

#[test]
fn test_nested_script_root_loads_after_inner_project() {
    let inner = tempfile::tempdir().unwrap();
    write(inner.path(), "s1/bar.gs", BAR);
    let outer = tempfile::tempdir().unwrap();
    write(outer.path(), "util/util.gs", "package util\n\nfunc Twice(n int) int { return n * 2 }\n");

    let mut solution = Solution::new("pkgroot");
    solution.use_symbols(&hotscript_core::evaluator::stdlib::symbols()).unwrap();
    solution
        .load(
            &Project::new("ext/sub")
                .with_local_path(inner.path())
                .with_symbols(host_symbols()),
        )
        .unwrap();
    solution
        .load(&Project::new("ext").with_local_path(outer.path()))
        .unwrap();

    assert_eq!(solution.packages(), vec!["pkgroot/ext/sub/s1", "pkgroot/ext/util"]);
    let twice = solution.method("pkgroot/ext/util", "Twice").unwrap();
    assert_eq!(twice.call(&[Value::Int(4)]).unwrap(), Value::Int(8));
    let result = ScriptRef::new("pkgroot/ext/sub/s1", "Bar")
        .invoke(&solution, &Value::host(Player { name: "ann" }), "Hello", &[])
        .unwrap()
        .unwrap();
    assert_eq!(result, Value::from("hello ann"));
}

#[test]
fn test_remote_project_loads_from_archive() {
    let server = ArchiveServer::start(tar_gz(&[("s1/bar.gs", BAR)]), "\"v1\"");
    let mut solution = Solution::new("pkgroot");
    solution.use_symbols(&hotscript_core::evaluator::stdlib::symbols()).unwrap();
    let project = Project::new("remote")
        .with_remote_url(server.url())
        .with_symbols(host_symbols());
    solution.load(&project).unwrap();

    assert_eq!(solution.packages(), vec!["pkgroot/remote/s1"]);
    assert_eq!(solution.remotes().len(), 1);
    let result = ScriptRef::new("pkgroot/remote/s1", "Bar")
        .invoke(&solution, &Value::host(Player { name: "eve" }), "Shout", &[])
        .unwrap()
        .unwrap();
    assert_eq!(result, Value::from("HELLO EVE"));
    let free = solution.method("pkgroot/remote/s1", "Free").unwrap();
    assert_eq!(free.call(&[Value::Int(4)]).unwrap(), Value::Int(8));

    assert!(!solution.remote_changed().unwrap());
    server.replace(tar_gz(&[("s1/bar.gs", MENU)]), "\"v2\"");
    assert!(solution.remote_changed().unwrap());
}

#[test]
fn test_failed_remote_load_is_rolled_back() {
    let server = ArchiveServer::start(tar_gz(&[("s1/bar.gs", "package s1\n\nfunc (\n")]), "\"bad\"");
    let mut solution = Solution::new("pkgroot");
    solution.use_symbols(&hotscript_core::evaluator::stdlib::symbols()).unwrap();
    let project = Project::new("remote")
        .with_remote_url(server.url())
        .with_symbols(host_symbols());

    let err = solution.load(&project).unwrap_err();
    assert!(matches!(err, SolutionError::Discovery(_)), "{err}");
    assert!(solution.remotes().is_empty());
    assert!(!solution.code_fs().exists("pkgroot/remote"));

    server.replace(tar_gz(&[("s1/bar.gs", BAR)]), "\"good\"");
    solution.load(&project).unwrap();
    assert_eq!(solution.packages(), vec!["pkgroot/remote/s1"]);
    assert_eq!(solution.remotes().len(), 1);
}
