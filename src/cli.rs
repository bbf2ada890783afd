use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hostbridge - drive a compositing host from a declarative project file
#[derive(Parser)]
#[command(name = "hostbridge")]
#[command(about = "Automate a compositing host through a filesystem command queue")]
#[command(version)]
pub struct Cli {
    /// Runtime settings file (JSON); HOSTBRIDGE_* variables override it
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the project described by a configuration file
    Run {
        /// Project configuration file
        config: PathBuf,

        /// Work against an already running host: no launch, save or render
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        /// Project configuration file
        config: PathBuf,
    },
    /// Print every scene's actions with templates expanded (JSON)
    Expand {
        /// Project configuration file
        config: PathBuf,
    },
    /// Wait for a running host to accept commands and report each stage
    Ready,
    /// Render a composition with the command-line render tool
    Render {
        /// Saved project file
        #[arg(short, long)]
        project: PathBuf,
        /// Composition to render
        #[arg(short, long)]
        comp: String,
        /// Output folder
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Output file name (defaults to <comp>.mp4)
        #[arg(long)]
        output_file: Option<String>,
    },
    /// Install the queue listener into the host's startup scripts folder
    InstallListener {
        /// Startup scripts folder (defaults to the configured one)
        #[arg(long)]
        startup_dir: Option<PathBuf>,
        /// Replace an existing listener
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["hostbridge"]).is_err());
    }

    #[test]
    fn test_cli_run_dry_run() {
        let cli = Cli::try_parse_from(["hostbridge", "run", "promo.json", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Run { config, dry_run } => {
                assert_eq!(config, PathBuf::from("promo.json"));
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hostbridge",
            "validate",
            "promo.json",
            "--settings",
            "studio.json",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.settings, Some(PathBuf::from("studio.json")));
    }

    #[test]
    fn test_cli_render() {
        let result = Cli::try_parse_from([
            "hostbridge",
            "render",
            "--project",
            "work.aep",
            "--comp",
            "Main",
            "--output-dir",
            "out",
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_cli_install_listener() {
        let cli = Cli::try_parse_from(["hostbridge", "install-listener", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::InstallListener { force: true, startup_dir: None }
        ));
    }
}
