//! REPL command parsing and definitions
//!
//! Handles parsing of dot-commands (.help, .reload, etc.).

use anyhow::{anyhow, Result};

/// Available REPL commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Show help information
    Help,
    /// Exit the REPL
    Quit,
    /// Toggle quiet mode
    Quiet,
    /// Rebuild the solution now
    Reload,
    /// List loaded script packages
    Packages,
    /// List the scripts of one package
    Scripts(String),
    /// Show the published generation
    Generation,
}

/// Parse a command string into a ReplCommand
pub fn parse_command(input: &str) -> Result<ReplCommand> {
    let trimmed = input.trim();

    let Some(body) = trimmed.strip_prefix('.') else {
        return Err(anyhow!("Commands must start with '.'"));
    };
    let parts: Vec<&str> = body.split_whitespace().collect();

    if parts.is_empty() {
        return Err(anyhow!("Empty command"));
    }

    match parts[0] {
        "help" | "h" => Ok(ReplCommand::Help),
        "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
        "quiet" => Ok(ReplCommand::Quiet),
        "reload" | "hotfix" => Ok(ReplCommand::Reload),
        "packages" | "pkgs" => Ok(ReplCommand::Packages),
        "scripts" => {
            if parts.len() != 2 {
                return Err(anyhow!("Usage: .scripts <package_path>"));
            }
            Ok(ReplCommand::Scripts(parts[1].to_string()))
        }
        "generation" | "gen" => Ok(ReplCommand::Generation),
        _ => Err(anyhow!("Unknown command: .{}", parts[0])),
    }
}
