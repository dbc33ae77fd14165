use hotscript_core::{Project, ScriptOptions};
use hotscript_repl::repl::{Repl, ReplCommand};
use tempfile::TempDir;

const UTIL: &str = "package util\n\nimport \"strings\"\n\nfunc Loud(s string) string { return strings.ToUpper(s) + \"!\" }\n";

async fn repl_with_scripts(dir: &TempDir) -> Repl {
    let options = ScriptOptions {
        pkg_root: "game".to_string(),
        auto_hotfix: false,
        ..ScriptOptions::default()
    }
    .with_project(Project::new("main").with_local_path(dir.path()));
    Repl::start(options).await.unwrap()
}

fn write_util(dir: &TempDir, source: &str) {
    std::fs::create_dir_all(dir.path().join("util")).unwrap();
    std::fs::write(dir.path().join("util/util.gs"), source).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_basic_arithmetic() {
    let dir = TempDir::new().unwrap();
    let repl = repl_with_scripts(&dir).await;

    let (output, _duration) = repl.execute("1 + 2").unwrap();
    assert_eq!(output, "3");
    let (output, _duration) = repl.execute("\"a\" + \"b\"").unwrap();
    assert_eq!(output, "\"ab\"");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_calls_into_scripts() {
    let dir = TempDir::new().unwrap();
    write_util(&dir, UTIL);
    let repl = repl_with_scripts(&dir).await;

    let (output, _duration) = repl
        .execute("import \"game/main/util\"\nutil.Loud(\"hey\")")
        .unwrap();
    assert_eq!(output, "\"HEY!\"");
    assert!(repl.execute("util.Missing()").is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inspection_commands() {
    let dir = TempDir::new().unwrap();
    write_util(&dir, UTIL);
    let mut repl = repl_with_scripts(&dir).await;

    let packages = repl.handle_command(ReplCommand::Packages).await.unwrap();
    assert!(packages.contains("game/main/util"), "{packages}");

    let scripts = repl
        .handle_command(ReplCommand::Scripts("game/main/util".to_string()))
        .await
        .unwrap();
    assert!(scripts.contains("(functions): Loud"), "{scripts}");

    assert!(repl
        .handle_command(ReplCommand::Scripts("game/nope".to_string()))
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reload_and_quit() {
    let dir = TempDir::new().unwrap();
    write_util(&dir, UTIL);
    let mut repl = repl_with_scripts(&dir).await;
    assert_eq!(
        repl.handle_command(ReplCommand::Generation).await.unwrap(),
        "Generation 1"
    );

    write_util(&dir, "package util\n\nfunc Loud(s string) string { return s }\n");
    let output = repl.handle_command(ReplCommand::Reload).await.unwrap();
    assert_eq!(output, "Reloaded scripts, generation 2");
    let (output, _duration) = repl
        .execute("import \"game/main/util\"\nutil.Loud(\"hey\")")
        .unwrap();
    assert_eq!(output, "\"hey\"");

    repl.handle_command(ReplCommand::Quit).await.unwrap();
    assert!(!repl.is_running());
    assert!(repl.host().is_shut_down());
}
