use std::{
    fs,
    io::{self, IsTerminal},
};

use anyhow::Result;
use clap::{Arg, Command};
use hotscript_core::{init_tracing, Project, ScriptOptions};
use hotscript_repl::Repl;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let matches = Command::new("hotscript-repl")
        .version(hotscript_core::VERSION)
        .about("Interactive console for a hot-reloading HotScript solution")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("JSON script options file"),
        )
        .arg(
            Arg::new("scripts")
                .long("scripts")
                .value_name("DIR")
                .help("Local script directory mounted as project 'main'"),
        )
        .arg(
            Arg::new("remote")
                .long("remote")
                .value_name("URL")
                .help("Remote script archive mounted as project 'remote'"),
        )
        .arg(
            Arg::new("no-watch")
                .long("no-watch")
                .help("Disable automatic hot reload")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Execute REPL input from a file")
                .index(1),
        )
        .get_matches();

    let mut options = match matches.get_one::<String>("config") {
        Some(path) => ScriptOptions::from_json_file(path)?,
        None => ScriptOptions::default(),
    };
    if let Some(dir) = matches.get_one::<String>("scripts") {
        options = options.with_project(Project::new("main").with_local_path(dir));
    }
    if let Some(url) = matches.get_one::<String>("remote") {
        options = options.with_project(Project::new("remote").with_remote_url(url));
    }
    if matches.get_flag("no-watch") {
        options.auto_hotfix = false;
    }
    let input_file = matches.get_one::<String>("file").cloned();

    println!("HotScript REPL v{}", hotscript_core::VERSION);
    println!("Package root: {}", options.pkg_root);
    for project in &options.projects {
        let source = project
            .local_path
            .as_ref()
            .map(|path| path.display().to_string())
            .or_else(|| project.remote_url.clone())
            .unwrap_or_default();
        println!("Project {}: {}", project.script_root, source);
    }

    let mut repl = Repl::start(options).await?;

    println!("Type .help for help, .quit to exit");
    println!();

    run_repl(&mut repl, input_file).await
}

async fn run_repl(repl: &mut Repl, input_file: Option<String>) -> Result<()> {
    use rustyline::{error::ReadlineError, DefaultEditor};

    let mut rl = DefaultEditor::new()?;

    let file_lines: Option<Vec<String>> = match input_file {
        Some(filename) => {
            let content = fs::read_to_string(filename)?;
            Some(content.lines().map(|s| s.to_string()).collect())
        }
        None => None,
    };

    let is_interactive = file_lines.is_none() && io::stdin().is_terminal();
    let mut file_line_iter = file_lines.as_ref().map(|lines| lines.iter());
    let mut in_eval_mode = false;
    let mut eval_buffer = String::new();

    while repl.is_running() {
        let prompt = if in_eval_mode { ".. " } else { ">> " };

        // Get the next line from either file or interactive input
        let line_result = if let Some(ref mut iter) = file_line_iter {
            match iter.next() {
                Some(line) => Ok(line.clone()),
                None => break,
            }
        } else {
            rl.readline(prompt)
        };

        match line_result {
            Ok(line) => {
                if in_eval_mode {
                    // Accumulate until a single '.'
                    if line.trim() == "." {
                        rl.add_history_entry(&eval_buffer)?;
                        if !is_interactive {
                            println!(">> .eval");
                            for eval_line in eval_buffer.lines() {
                                println!(".. {eval_line}");
                            }
                            println!(".. .");
                        }
                        report(repl, &eval_buffer);
                        eval_buffer.clear();
                        in_eval_mode = false;
                    } else {
                        if !eval_buffer.is_empty() {
                            eval_buffer.push('\n');
                        }
                        eval_buffer.push_str(&line);
                    }
                    continue;
                }

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                if trimmed == ".eval" {
                    in_eval_mode = true;
                    println!("Entering eval mode. End with '.' on a line by itself.");
                    continue;
                }

                rl.add_history_entry(&line)?;
                if !is_interactive {
                    println!(">> {trimmed}");
                }

                if trimmed.starts_with('.') {
                    match repl.parse_input(trimmed) {
                        Ok(command) => match repl.handle_command(command).await {
                            Ok(output) => println!("{output}"),
                            Err(e) => eprintln!("Error: {e}"),
                        },
                        Err(e) => eprintln!("Error: {e}"),
                    }
                } else {
                    report(repl, trimmed);
                }
            }
            Err(ReadlineError::Interrupted) => {
                if in_eval_mode {
                    println!("^C");
                    eval_buffer.clear();
                    in_eval_mode = false;
                } else {
                    println!("Use .quit to exit");
                }
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    repl.show_exit_stats();
    repl.host().shutdown();

    Ok(())
}

fn report(repl: &Repl, code: &str) {
    match repl.execute(code) {
        Ok((output, duration)) => {
            if repl.is_quiet() {
                println!("{output}");
            } else {
                println!("=> {output} ({duration}ms)");
            }
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}
