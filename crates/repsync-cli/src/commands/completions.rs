use std::io;

use clap::CommandFactory;
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};

use crate::cli::{Cli, CompletionShell};

pub fn run_completions(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => print_completions(shells::Bash, &mut cmd),
        CompletionShell::Elvish => print_completions(shells::Elvish, &mut cmd),
        CompletionShell::Fish => print_completions(shells::Fish, &mut cmd),
        CompletionShell::Powershell => print_completions(shells::PowerShell, &mut cmd),
        CompletionShell::Zsh => print_completions(shells::Zsh, &mut cmd),
    }
}

fn print_completions<G: Generator>(generator: G, cmd: &mut clap::Command) {
    generate(generator, cmd, "repsync", &mut io::stdout());
}
