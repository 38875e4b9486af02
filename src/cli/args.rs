//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::BuildMode;

/// weft: declarative asset transform & bundling engine
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: weft.toml)
    #[arg(short = 'C', long, global = true, default_value = "weft.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Bundle every entry into the output directory
    #[command(visible_alias = "b")]
    Build {
        /// Build mode
        #[arg(short, long, value_enum, default_value_t = BuildMode::Production)]
        mode: BuildMode,
    },

    /// Start development server with live reload
    #[command(visible_alias = "s")]
    Serve {
        /// Build mode
        #[arg(short, long, value_enum, default_value_t = BuildMode::Development)]
        mode: BuildMode,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable file watching for auto-rebuild
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },
}

impl Cli {
    pub const fn mode(&self) -> BuildMode {
        match self.command {
            Commands::Build { mode } | Commands::Serve { mode, .. } => mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_consistent() {
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["weft", "-v", "build"]);
        assert!(cli.verbose);
    }

    #[test]
    fn test_build_defaults_to_production() {
        let cli = Cli::parse_from(["weft", "build"]);
        assert_eq!(cli.mode(), BuildMode::Production);
        assert_eq!(cli.config, PathBuf::from("weft.toml"));
    }

    #[test]
    fn test_serve_options() {
        let cli = Cli::parse_from(["weft", "serve", "--port", "8080", "-w", "false", "--mode", "prod", "-v"]);
        let Commands::Serve { port, watch, mode, .. } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(port, Some(8080));
        assert_eq!(watch, Some(false));
        assert_eq!(mode, BuildMode::Production);
        assert!(cli.verbose);
    }
}
