use clap::Parser;
use std::path::PathBuf;

use bot_probe::config::SessionMode;

#[derive(clap::Parser, Debug)]
#[command(author, version, about = "Black-box verification of a web app's bot defenses", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Overrides applied on top of the config file and environment.
#[derive(clap::Args, Debug, Default)]
pub struct TargetArgs {
    /// Base URL of the application under test (e.g. http://localhost:5000)
    #[arg(short = 't', long)]
    pub target: Option<String>,

    /// JSON config file
    #[arg(short = 'C', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long)]
    pub out: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the full verification suite
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Parallel workers for the concurrency phase
        #[arg(short = 'w', long)]
        workers: Option<usize>,

        /// Login attempts in the rate-limit burst
        #[arg(short = 'n', long)]
        burst: Option<usize>,

        /// Cookie handling for pooled workers
        #[arg(long, value_enum)]
        session_mode: Option<SessionMode>,

        /// ZAP API base URL; enables the scanner phase
        #[arg(long)]
        zap: Option<String>,

        /// Also run an active scan after the spider
        #[arg(long, default_value_t = false)]
        active: bool,

        /// Route target traffic through the ZAP proxy
        #[arg(long, default_value_t = false)]
        proxy: bool,

        /// Do not submit metrics to the ingestion endpoint
        #[arg(long, default_value_t = false)]
        no_ingest: bool,
    },

    /// Run one behavior profile and print its verdicts
    Profile {
        /// Profile name (e.g. headless-agents, rapid-fire, mixed)
        name: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Run only the scanner phase (spider, optional active scan, alerts)
    Scan {
        #[command(flatten)]
        target: TargetArgs,

        /// ZAP API base URL
        #[arg(long)]
        zap: Option<String>,

        /// Also run an active scan after the spider
        #[arg(long, default_value_t = false)]
        active: bool,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from(["bot_probe", "--debug", "run", "-t", "http://x:1", "-n", "30", "--session-mode", "shared"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Run { target, burst, session_mode, .. } => {
                assert_eq!(target.target.as_deref(), Some("http://x:1"));
                assert_eq!(burst, Some(30));
                assert_eq!(session_mode, Some(SessionMode::Shared));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn profile_takes_a_name() {
        let cli = Cli::try_parse_from(["bot_probe", "profile", "rapid-fire"]).unwrap();
        assert!(matches!(cli.command, Commands::Profile { ref name, .. } if name == "rapid-fire"));
    }
}
