//! Clap command definition.

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::format::OutputMode;

/// Build the demo's command line.
pub fn build_cli() -> Command {
    Command::new("recordlayer-demo")
        .about("Saves, loads and queries sample orders through the record layer")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Config file (written with defaults if missing)"),
        )
        .arg(
            Arg::new("explain")
                .long("explain")
                .help("Print the chosen query plan")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .conflicts_with("raw"),
        )
        .arg(
            Arg::new("raw")
                .long("raw")
                .help("Raw output mode (bare records, no labels)")
                .action(ArgAction::SetTrue),
        )
}

/// Parsed command line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub config: Option<PathBuf>,
    pub explain: bool,
    pub mode: OutputMode,
}

impl Options {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let mode = if matches.get_flag("json") {
            OutputMode::Json
        } else if matches.get_flag("raw") {
            OutputMode::Raw
        } else {
            OutputMode::Human
        };
        Self {
            config: matches.get_one::<String>("config").map(PathBuf::from),
            explain: matches.get_flag("explain"),
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Options {
        let matches = build_cli()
            .try_get_matches_from(std::iter::once("recordlayer-demo").chain(args.iter().copied()))
            .unwrap();
        Options::from_matches(&matches)
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&[]);
        assert_eq!(opts.config, None);
        assert!(!opts.explain);
        assert_eq!(opts.mode, OutputMode::Human);
    }

    #[test]
    fn test_flags() {
        let opts = parse(&["--config", "rl.toml", "--explain", "--json"]);
        assert_eq!(opts.config, Some(PathBuf::from("rl.toml")));
        assert!(opts.explain);
        assert_eq!(opts.mode, OutputMode::Json);
    }

    #[test]
    fn test_json_conflicts_with_raw() {
        assert!(build_cli()
            .try_get_matches_from(["recordlayer-demo", "--json", "--raw"])
            .is_err());
    }
}
