//! ArgMatches → CliAction conversion.

use std::path::PathBuf;

use clap::ArgMatches;
use grantsync_executor::CONFIG_FILE_NAME;

/// The result of parsing the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    /// Check the contract, and `for_role` creators when connected
    Validate,
    /// Print the diff
    Plan,
    /// Apply the diff
    Apply { force: bool },
    /// List roles
    Roles { all: bool },
    /// Write the default config file
    InitConfig,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Config file path
    pub config: PathBuf,
    /// Connection string, from the flag or `$DATABASE_URL`
    pub database_url: Option<String>,
    /// Contract path given on the command line
    pub contract: Option<PathBuf>,
}

/// Read the global flags; `env_url` is the value of `$DATABASE_URL`.
pub fn global_args(matches: &ArgMatches, env_url: Option<String>) -> GlobalArgs {
    GlobalArgs {
        config: matches
            .get_one::<String>("config")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
        database_url: matches
            .get_one::<String>("database-url")
            .cloned()
            .or(env_url)
            .filter(|url| !url.trim().is_empty()),
        contract: matches.get_one::<String>("contract").map(PathBuf::from),
    }
}

/// Map the chosen subcommand to an action.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("validate", _)) => Ok(CliAction::Validate),
        Some(("plan", _)) => Ok(CliAction::Plan),
        Some(("apply", sub)) => Ok(CliAction::Apply {
            force: sub.get_flag("force"),
        }),
        Some(("roles", sub)) => Ok(CliAction::Roles {
            all: sub.get_flag("all"),
        }),
        Some(("init-config", _)) => Ok(CliAction::InitConfig),
        Some((other, _)) => Err(format!("unknown command '{}'", other)),
        None => Err("no command given".to_string()),
    }
}
