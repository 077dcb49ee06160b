//! CLI argument definitions using clap
//!
//! Commands:
//! - fleet-console init --config <path> --admin <user>
//! - fleet-console serve --config <path>
//! - fleet-console make-superadmin --config <path> --username <user>
//! - fleet-console set-hoster --config <path> --tenant <id>
//! - fleet-console issue-session --config <path> --username <user>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Fleet console: tenant-scoped administration and agent enrollment
#[derive(Parser, Debug)]
#[command(name = "fleet-console")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default configuration if missing and provision the hoster tenant
    Init {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// User made admin of the hoster tenant
        #[arg(long)]
        admin: String,
    },

    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Set the legacy global-admin flag on a user
    ///
    /// Only honoured while no hoster tenant is designated.
    MakeSuperadmin {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        #[arg(long)]
        username: String,
    },

    /// Move the hoster flag to another tenant
    SetHoster {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        #[arg(long)]
        tenant: i64,
    },

    /// Print a signed session token for a user
    IssueSession {
        /// Path to configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        #[arg(long)]
        username: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_init() {
        let cli = Cli::parse_from(["fleet-console", "init", "--admin", "root"]);
        match cli.command {
            Command::Init { config, admin } => {
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert_eq!(admin, "root");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_set_hoster() {
        let cli = Cli::parse_from([
            "fleet-console",
            "set-hoster",
            "--config",
            "/etc/fleet/console.json",
            "--tenant",
            "4",
        ]);
        assert!(matches!(cli.command, Command::SetHoster { tenant: 4, .. }));
    }

    #[test]
    fn test_parse_make_superadmin() {
        let cli = Cli::parse_from(["fleet-console", "make-superadmin", "--username", "ops"]);
        assert!(matches!(cli.command, Command::MakeSuperadmin { username, .. } if username == "ops"));
    }
}
