use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::{events, productinfo};

const SHORT_DESCRIPTION: &str = "Small job-control shell";

const LONG_DESCRIPTION: &str = r"
jobsh reads command lines and runs them as process groups, with pipes (|), conditionals
(&& and ||), sequencing (;), background jobs (&), and file redirections (<, >, 2>).

The only builtins are `cd` and `exit`.
";

const VERSION: &str = const_format::concatcp!(
    productinfo::PRODUCT_VERSION,
    " (",
    productinfo::PRODUCT_GIT_VERSION,
    ")"
);

/// Parsed command-line arguments for the jobsh shell.
#[derive(Parser)]
#[clap(name = productinfo::PRODUCT_NAME,
       version = VERSION,
       about = SHORT_DESCRIPTION,
       long_about = LONG_DESCRIPTION)]
#[allow(clippy::module_name_repetitions)]
pub struct CommandLineArgs {
    /// Execute the provided command line and then exit.
    #[arg(short = 'c', value_name = "COMMAND")]
    pub command: Option<String>,

    /// Quiet mode: do not print prompts.
    #[arg(short = 'q')]
    pub quiet: bool,

    /// Path to the configuration file to use, instead of the default one.
    #[arg(long = "config", value_name = "PATH", env = "JOBSH_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Do not load any configuration file; takes precedence over `--config`.
    #[arg(long = "no-config")]
    pub no_config: bool,

    /// Enable debug logging for classes of tracing events.
    #[arg(long = "debug", value_name = "EVENT")]
    pub enabled_debug_events: Vec<events::TraceEvent>,

    /// Path to a script whose lines are run instead of reading from standard input.
    pub script_path: Option<PathBuf>,
}

impl CommandLineArgs {
    /// Returns whether the shell is interactive: it reads commands from a terminal.
    pub fn is_interactive(&self) -> bool {
        if self.command.is_some() || self.script_path.is_some() {
            return false;
        }

        std::io::stdin().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_defaults() -> anyhow::Result<()> {
        let args = CommandLineArgs::try_parse_from(["jobsh"])?;

        assert!(!args.quiet);
        assert!(!args.no_config);
        assert!(args.command.is_none());
        assert!(args.script_path.is_none());
        assert!(args.enabled_debug_events.is_empty());
        Ok(())
    }

    #[test]
    fn parse_options() -> anyhow::Result<()> {
        let args = CommandLineArgs::try_parse_from([
            "jobsh", "-q", "--debug", "jobs", "--debug", "commands", "script.sh",
        ])?;

        assert!(args.quiet);
        assert_eq!(
            args.enabled_debug_events,
            vec![events::TraceEvent::Jobs, events::TraceEvent::Commands]
        );
        assert_eq!(args.script_path, Some(PathBuf::from("script.sh")));
        assert!(!args.is_interactive());
        Ok(())
    }

    #[test]
    fn command_string_is_not_interactive() -> anyhow::Result<()> {
        let args = CommandLineArgs::try_parse_from(["jobsh", "-c", "echo hi"])?;

        assert_eq!(args.command.as_deref(), Some("echo hi"));
        assert!(!args.is_interactive());
        Ok(())
    }

    #[test]
    fn parse_config_options() -> anyhow::Result<()> {
        let args = CommandLineArgs::try_parse_from(["jobsh", "--config", "a.toml", "--no-config"])?;

        assert_eq!(args.config_file, Some(PathBuf::from("a.toml")));
        assert!(args.no_config);
        Ok(())
    }
}
