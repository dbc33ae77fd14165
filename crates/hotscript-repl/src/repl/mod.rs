//! REPL functionality for a hot-reloading script solution
//!
//! Wraps a [`ScriptHost`] with dot-commands for inspecting and reloading the
//! published solution. Every other line is evaluated as a HotScript snippet
//! against whichever generation is current when the line runs.

use std::time::Instant;

use anyhow::{anyhow, Result};
use hotscript_core::script::BindMode;
use hotscript_core::{ScriptHost, ScriptOptions, Value};
use tracing::info;

pub mod commands;

pub use commands::ReplCommand;

/// Interactive console over a script host
pub struct Repl {
    host: ScriptHost,
    running: bool,
    /// Quiet mode (suppress timing info)
    quiet: bool,
}

impl Repl {
    pub fn new(host: ScriptHost) -> Self {
        Self {
            host,
            running: true,
            quiet: false,
        }
    }

    /// Start a host from `options` and wrap it.
    pub async fn start(options: ScriptOptions) -> Result<Self> {
        let host = ScriptHost::start(options).await?;
        Ok(Self::new(host))
    }

    pub fn host(&self) -> &ScriptHost {
        &self.host
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Parse REPL input into a command
    pub fn parse_input(&self, input: &str) -> Result<ReplCommand> {
        commands::parse_command(input)
    }

    /// Handle a REPL command
    pub async fn handle_command(&mut self, command: ReplCommand) -> Result<String> {
        match command {
            ReplCommand::Help => Ok(help_text().to_string()),
            ReplCommand::Quit => {
                self.running = false;
                self.host.shutdown();
                Ok("Goodbye!".to_string())
            }
            ReplCommand::Quiet => {
                self.quiet = !self.quiet;
                Ok(format!(
                    "Quiet mode: {}",
                    if self.quiet { "on" } else { "off" }
                ))
            }
            ReplCommand::Reload => {
                let generation = self.host.hotfix().await?;
                info!("manual reload published generation {}", generation);
                Ok(format!("Reloaded scripts, generation {generation}"))
            }
            ReplCommand::Packages => Ok(self.list_packages()),
            ReplCommand::Scripts(path) => self.list_scripts(&path),
            ReplCommand::Generation => Ok(format!("Generation {}", self.host.generation())),
        }
    }

    /// Evaluate a snippet and return the formatted result with timing
    pub fn execute(&self, code: &str) -> Result<(String, u64)> {
        let start = Instant::now();
        let value = self.host.solution().eval(code)?;
        let duration = start.elapsed().as_millis() as u64;
        Ok((format_value(&value), duration))
    }

    fn list_packages(&self) -> String {
        let packages = self.host.solution().packages();
        if packages.is_empty() {
            return "No script packages loaded.".to_string();
        }
        let lines: Vec<String> = packages.iter().map(|path| format!("  {path}")).collect();
        format!("Packages:\n{}", lines.join("\n"))
    }

    fn list_scripts(&self, path: &str) -> Result<String> {
        let solution = self.host.solution();
        let bundle = solution
            .package(path)
            .ok_or_else(|| anyhow!("No script package '{}'", path))?;

        let mut lines = Vec::new();
        for script in bundle.scripts() {
            let ident = if script.ident.is_empty() {
                "(functions)".to_string()
            } else {
                script.ident.clone()
            };
            let mode = match script.bind_mode() {
                BindMode::None => String::new(),
                BindMode::Func | BindMode::Struct => script
                    .extension
                    .anchor()
                    .map(|anchor| format!(" extends {}", anchor.qualified_name()))
                    .unwrap_or_default(),
            };
            let methods: Vec<&str> = script.methods().iter().map(|m| m.name.as_str()).collect();
            lines.push(format!("  {ident}{mode}: {}", methods.join(", ")));
        }
        Ok(format!("Scripts in {path}:\n{}", lines.join("\n")))
    }

    /// Show exit statistics
    pub fn show_exit_stats(&self) {
        if !self.quiet {
            println!("\nServed {} script generation(s).", self.host.generation());
        }
    }
}

/// Format a value for display
fn format_value(value: &Value) -> String {
    format!("{value:?}")
}

fn help_text() -> &'static str {
    r#"HotScript REPL Commands:
  .help             - Show this help message
  .quit             - Exit the REPL
  .quiet            - Toggle quiet mode (hide timing info)
  .eval             - Enter multi-line evaluation mode (end with '.')
  .reload           - Rebuild and publish the solution now
  .packages         - List loaded script packages
  .scripts <path>   - List the scripts and methods of a package
  .generation       - Show the published solution generation

Anything else is evaluated as HotScript, e.g.
  import "strings"
  strings.ToUpper("hi")"#
}
