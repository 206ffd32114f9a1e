//! # Completions Command Implementation
//!
//! Prints a `clap_complete` completion script for the chosen shell.
//!
//! ```bash
//! cfgweave completions bash > ~/.local/share/bash-completion/completions/cfgweave
//! cfgweave completions zsh > ~/.zfunc/_cfgweave
//! ```

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, CommandFactory, ValueEnum};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

fn write_completions(shell: CompletionShell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(Shell::from(shell), &mut cmd, "cfgweave", out);
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    write_completions(args.shell, &mut io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completions_mention_subcommands() {
        let mut buffer = Vec::new();
        write_completions(CompletionShell::Bash, &mut buffer);
        let script = String::from_utf8(buffer).unwrap();
        assert!(script.contains("cfgweave"));
        assert!(script.contains("generate"));
        assert!(script.contains("backups"));
    }
}
