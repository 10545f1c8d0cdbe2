use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(version, about = "A tree-walking interpreter for Lox")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a source file
    Run {
        /// Path to the source file
        file: PathBuf,
    },

    /// Check a source file for lexical and syntax errors without running it
    Check {
        /// Path to the source file to check
        file: PathBuf,
    },

    /// Start an interactive REPL session
    Repl {
        /// Give every line a fresh global scope instead of keeping state
        #[arg(long)]
        isolated: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::parse_from(["treelox", "run", "script.lox"]);
        assert!(matches!(args.command, Commands::Run { file } if file == PathBuf::from("script.lox")));

        let args = Args::parse_from(["treelox", "repl", "--isolated"]);
        assert!(matches!(args.command, Commands::Repl { isolated: true }));

        let args = Args::parse_from(["treelox", "repl"]);
        assert!(matches!(args.command, Commands::Repl { isolated: false }));
    }
}
