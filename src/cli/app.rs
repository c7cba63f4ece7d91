use crate::{GatewatchError, Result};
use clap::{ArgAction, Parser};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Gatewatch: code-signing drift detection for tracked application paths
#[derive(Parser, Debug)]
#[command(name = "gatewatch")]
#[command(version)]
#[command(about = "Tracks expected code-signing originators and detects drift")]
#[command(
    long_about = "Gatewatch records the code-signing originator the system assessment \
authority reports for each tracked path, and on later runs re-verifies that the \
current signature still matches what was recorded."
)]
pub struct Cli {
    /// Expectations store file
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Keep absolute store keys instead of substituting ~ for the home directory
    #[arg(long)]
    pub no_substitute_home: bool,

    /// Allow creating records for untracked targets
    #[arg(short, long)]
    pub add: bool,

    /// Allow overwriting a stored expectation when drift is observed
    #[arg(short, long)]
    pub freshen: bool,

    /// Shorthand for --add --freshen
    #[arg(short, long)]
    pub update: bool,

    /// Assessment binary to invoke
    #[arg(long, value_name = "PATH", default_value = "spctl")]
    pub spctl_path: PathBuf,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Paths to reconcile; empty means every tracked path
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,
}

impl Cli {
    pub fn allow_add(&self) -> bool {
        self.add || self.update
    }

    pub fn allow_freshen(&self) -> bool {
        self.freshen || self.update
    }

    pub fn substitute_home(&self) -> bool {
        !self.no_substitute_home
    }

    /// Filter directive for the log subscriber.
    pub fn log_directive(&self) -> &'static str {
        if self.quiet {
            return "gatewatch=warn";
        }
        match self.verbose {
            0 => "gatewatch=info",
            1 => "gatewatch=debug",
            _ => "gatewatch=trace",
        }
    }

    /// The store file to use: the override, or the platform config
    /// location.
    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store {
            return Ok(path.clone());
        }
        default_store_path()
    }
}

/// `<config_dir>/gatewatch/expectations.json` under the platform's
/// conventional configuration root.
pub fn default_store_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "gatewatch")
        .ok_or_else(|| GatewatchError::Path("Failed to determine project directories".to_string()))?;
    Ok(dirs.config_dir().join("expectations.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "gatewatch",
            "--store",
            "/tmp/expectations.json",
            "--add",
            "/Applications/Safari.app",
        ]);

        assert_eq!(cli.store, Some(PathBuf::from("/tmp/expectations.json")));
        assert!(cli.add);
        assert!(!cli.freshen);
        assert!(!cli.update);
        assert_eq!(cli.targets, vec!["/Applications/Safari.app".to_string()]);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["gatewatch"]);

        assert_eq!(cli.store, None);
        assert!(!cli.no_substitute_home);
        assert!(cli.substitute_home());
        assert!(!cli.allow_add());
        assert!(!cli.allow_freshen());
        assert_eq!(cli.spctl_path, PathBuf::from("spctl"));
        assert!(cli.targets.is_empty());
    }

    #[test]
    fn test_update_implies_add_and_freshen() {
        let cli = Cli::parse_from(["gatewatch", "--update", "/Applications/Safari.app"]);

        assert!(!cli.add);
        assert!(!cli.freshen);
        assert!(cli.allow_add());
        assert!(cli.allow_freshen());
    }

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(Cli::parse_from(["gatewatch"]).log_directive(), "gatewatch=info");
        assert_eq!(Cli::parse_from(["gatewatch", "-v"]).log_directive(), "gatewatch=debug");
        assert_eq!(Cli::parse_from(["gatewatch", "-vv"]).log_directive(), "gatewatch=trace");
        assert_eq!(Cli::parse_from(["gatewatch", "-q"]).log_directive(), "gatewatch=warn");
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["gatewatch", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_multiple_targets() {
        let cli = Cli::parse_from(["gatewatch", "/a/App.app", "~/b/App.app"]);
        assert_eq!(cli.targets.len(), 2);
    }
}
