//! CLI argument definitions for the Mentor application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mentor - a study assistant that remembers you and reads your calendar.
#[derive(Parser, Debug)]
#[command(name = "mentor", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP chat API.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Chat interactively in the terminal.
    Chat {
        /// Student id; memories and history are kept per id.
        #[arg(short = 'u', long = "user")]
        user: String,
    },
    /// List, or clear, everything remembered about a student.
    Memories {
        #[arg(short = 'u', long = "user")]
        user: String,
        /// Delete every memory instead of listing them.
        #[arg(long = "clear")]
        clear: bool,
    },
    /// Connect a Google Calendar account.
    CalendarAuth,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > MENTOR_CONFIG env var > ~/.mentor/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MENTOR_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > MENTOR_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Command::Serve { port: Some(p) } = self.command {
            return p;
        }
        if let Ok(val) = std::env::var("MENTOR_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Resolve the log level. The flag wins over the config file.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".mentor").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".mentor").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_with_global_flags() {
        let args =
            CliArgs::try_parse_from(["mentor", "chat", "--user", "alice", "-l", "debug"]).unwrap();
        assert_eq!(
            args.command,
            Command::Chat {
                user: "alice".to_string()
            }
        );
        assert_eq!(args.resolve_log_level("info"), "debug");
    }

    #[test]
    fn test_config_flag_wins() {
        let args =
            CliArgs::try_parse_from(["mentor", "--config", "/tmp/m.toml", "calendar-auth"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/m.toml"));
        assert_eq!(args.command, Command::CalendarAuth);
    }

    #[test]
    fn test_port_flag_wins_over_config() {
        let args = CliArgs::try_parse_from(["mentor", "serve", "--port", "4000"]).unwrap();
        assert_eq!(args.resolve_port(3040), 4000);
    }

    #[test]
    fn test_memories_clear_flag() {
        let args =
            CliArgs::try_parse_from(["mentor", "memories", "-u", "bob", "--clear"]).unwrap();
        assert_eq!(
            args.command,
            Command::Memories {
                user: "bob".to_string(),
                clear: true
            }
        );
    }

    #[test]
    fn test_chat_requires_user() {
        assert!(CliArgs::try_parse_from(["mentor", "chat"]).is_err());
    }
}
