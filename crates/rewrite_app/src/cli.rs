use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::logging::LogDestination;

/// Rewrite text with a local Ollama model.
#[derive(Parser, Debug)]
#[command(name = "rewrite", version)]
pub struct Cli {
    /// Settings file [default: <config dir>/rewrite/settings.ron]
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Model server host for this run
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Model server port for this run
    #[arg(long, global = true)]
    pub port: Option<String>,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogTarget::File, global = true)]
    pub log: LogTarget,

    /// Log debug detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Check whether the model server is reachable
    Status,

    /// List the models installed on the server
    Models,

    /// Rewrite text following an instruction and print the result
    Rewrite {
        /// What to do with the text, e.g. "fix grammar"
        instruction: String,

        /// Text to rewrite; read from stdin when omitted
        #[arg(long)]
        text: Option<String>,

        /// Rewrite only this part of the text, as UTF-16 offsets `START..END`
        #[arg(long, value_parser = parse_span)]
        span: Option<(u32, u32)>,

        /// Model to use instead of the saved one
        #[arg(long)]
        model: Option<String>,

        /// Edit the text as rich content instead of a plain text area
        #[arg(long)]
        rich: bool,

        /// Page the text belongs to; checked against the blacklist
        #[arg(long)]
        url: Option<String>,
    },

    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the current settings
    Show,
    /// Set the model server address
    Server { host: String, port: String },
    /// Set the default model
    Model { name: String },
    /// Disable the rewrite action for a host or URL prefix
    Block { entry: String },
    /// Remove a blacklist entry
    Unblock { entry: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
    Off,
}

impl LogTarget {
    pub fn destination(self) -> Option<LogDestination> {
        match self {
            Self::File => Some(LogDestination::File),
            Self::Terminal => Some(LogDestination::Terminal),
            Self::Both => Some(LogDestination::Both),
            Self::Off => None,
        }
    }
}

fn parse_span(raw: &str) -> Result<(u32, u32), String> {
    let (start, end) = raw
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got {raw:?}"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|err| format!("{part:?}: {err}"))
    };
    let (start, end) = (parse(start)?, parse(end)?);
    if start > end {
        return Err(format!("span start {start} is after end {end}"));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rewrite_arguments_parse() {
        let cli = Cli::try_parse_from([
            "rewrite",
            "rewrite",
            "fix grammar",
            "--text",
            "this is bad grammar",
            "--span",
            "8..19",
            "--log",
            "off",
        ])
        .unwrap();

        assert_eq!(cli.log, LogTarget::Off);
        assert_eq!(
            cli.command,
            Command::Rewrite {
                instruction: "fix grammar".into(),
                text: Some("this is bad grammar".into()),
                span: Some((8, 19)),
                model: None,
                rich: false,
                url: None,
            }
        );
    }

    #[test]
    fn global_server_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["rewrite", "status", "--host", "gpu-box", "--port", "11500"])
            .unwrap();
        assert_eq!(cli.command, Command::Status);
        assert_eq!(cli.host.as_deref(), Some("gpu-box"));
        assert_eq!(cli.port.as_deref(), Some("11500"));
    }

    #[test]
    fn config_without_action_means_show() {
        let cli = Cli::try_parse_from(["rewrite", "config"]).unwrap();
        assert_eq!(cli.command, Command::Config { action: None });
    }

    #[test]
    fn spans_must_be_ordered_numbers() {
        assert_eq!(parse_span("6..11"), Ok((6, 11)));
        assert!(parse_span("11..6").is_err());
        assert!(parse_span("6-11").is_err());
        assert!(parse_span("a..b").is_err());
    }
}
