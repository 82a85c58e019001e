//! grantsync CLI: validate, preview and apply permission contracts.
//!
//! ```text
//! grantsync validate --contract contract.json
//! grantsync plan     --contract contract.json --database-url postgres://...
//! grantsync apply    --contract contract.json [--force]
//! grantsync roles    [--all]
//! grantsync init-config
//! ```
//!
//! Exit codes: 0 success, 1 error, 2 apply refused because the plan contains
//! WARN-DEPEND operations and `--force` was not given.

mod commands;
mod format;
mod parse;
mod pg;

use std::path::Path;
use std::process;

use anyhow::{anyhow, bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use grantsync_executor::{
    CatalogReader, ContractValidator, Executor, GrantsyncConfig, LoggingConfig, Operation,
    PermissionContract, PrincipalMatcher, Reconciler, StateReader, ValidatedContract,
};

use commands::build_cli;
use format::{format_error, format_plan, format_report, format_roles, format_validation, OutputMode};
use parse::{global_args, matches_to_action, CliAction, GlobalArgs};
use pg::SqlxSession;

/// Exit code when `apply` refuses a plan with dependency warnings
const EXIT_REFUSED: i32 = 2;

fn main() {
    let matches = build_cli().get_matches();

    let output_mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let args = global_args(&matches, std::env::var("DATABASE_URL").ok());

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    };

    // init-config runs before the config file is read
    if action == CliAction::InitConfig {
        process::exit(run_init_config(&args.config));
    }

    let config = match GrantsyncConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(1);
        }
    };
    init_logging(&config.logging);

    let code = match run(action, &args, &config, output_mode) {
        Ok(code) => code,
        Err(e) => {
            error!(target: "grantsync::cli", error = %format!("{:#}", e), "Run aborted");
            eprintln!("{}", format_error(&e, output_mode));
            1
        }
    };
    process::exit(code);
}

/// `RUST_LOG`, else the config file's filter, else `info`. Logs go to stderr.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(
    action: CliAction,
    args: &GlobalArgs,
    config: &GrantsyncConfig,
    mode: OutputMode,
) -> anyhow::Result<i32> {
    match action {
        CliAction::Validate => {
            let contract = load_contract(args, config)?;
            let validator = match &args.database_url {
                Some(url) => {
                    let mut session = SqlxSession::connect(url)?;
                    let matcher = contract_matcher(&contract)?;
                    let roles = StateReader::new(&mut session, matcher).all_roles()?;
                    session.close()?;
                    ContractValidator::new().with_live_roles(roles)
                }
                None => ContractValidator::new(),
            };
            let validated = validator.validate(&contract)?;
            println!("{}", format_validation(&validated, mode));
            Ok(0)
        }
        CliAction::Plan => {
            let contract = validate(args, config)?;
            let mut session = connect(args)?;
            let ops = Reconciler::new(&mut session).diff(&contract)?;
            session.close()?;
            println!("{}", format_plan(&ops, mode));
            Ok(0)
        }
        CliAction::Apply { force } => {
            let contract = validate(args, config)?;
            let mut session = connect(args)?;
            let ops = Reconciler::new(&mut session).diff(&contract)?;

            let flagged = flagged(&ops);
            if flagged > 0 && !force {
                eprintln!("{}", format_plan(&ops, mode));
                eprintln!(
                    "(refused) {} revoke(s) affect dependent objects; re-run with --force to apply",
                    flagged
                );
                session.close()?;
                return Ok(EXIT_REFUSED);
            }
            if flagged > 0 {
                warn!(target: "grantsync::cli", flagged, "Applying despite dependency warnings");
            }

            let report = Executor::from_config(&mut session, &config.executor).apply(&ops)?;
            session.close()?;
            info!(
                target: "grantsync::cli",
                run_id = %report.run_id,
                statements = report.statements.len(),
                "Apply finished"
            );
            println!("{}", format_report(&report, mode));
            Ok(0)
        }
        CliAction::Roles { all } => {
            let contract = match load_contract(args, config) {
                Ok(contract) => contract,
                Err(_) if all => PermissionContract::builtin_default(),
                Err(e) => return Err(e),
            };
            let mut session = connect(args)?;
            let mut reader = StateReader::new(&mut session, contract_matcher(&contract)?);
            let roles = if all {
                reader.all_roles()?
            } else {
                reader.list_roles()?
            };
            session.close()?;
            println!("{}", format_roles(&roles, mode));
            Ok(0)
        }
        CliAction::InitConfig => Ok(run_init_config(&args.config)),
    }
}

fn run_init_config(path: &Path) -> i32 {
    match GrantsyncConfig::write_default_if_missing(path) {
        Ok(true) => {
            println!("Wrote {}", path.display());
            0
        }
        Ok(false) => {
            println!("{} already exists", path.display());
            0
        }
        Err(e) => {
            eprintln!("(error) {}", e);
            1
        }
    }
}

fn load_contract(args: &GlobalArgs, config: &GrantsyncConfig) -> anyhow::Result<PermissionContract> {
    let path = args
        .contract
        .as_ref()
        .or(config.contract.as_ref())
        .ok_or_else(|| anyhow!("no contract given; use --contract or set `contract` in the config file"))?;
    PermissionContract::from_file(path)
        .with_context(|| format!("failed to load contract '{}'", path.display()))
}

fn validate(args: &GlobalArgs, config: &GrantsyncConfig) -> anyhow::Result<ValidatedContract> {
    let contract = load_contract(args, config)?;
    Ok(ContractValidator::new().validate(&contract)?)
}

fn contract_matcher(contract: &PermissionContract) -> anyhow::Result<PrincipalMatcher> {
    Ok(PrincipalMatcher::new(
        contract.managed_principals_mode,
        &contract.managed_principals,
    )?)
}

fn connect(args: &GlobalArgs) -> anyhow::Result<SqlxSession> {
    match &args.database_url {
        Some(url) => SqlxSession::connect(url),
        None => bail!("no database given; use --database-url or set DATABASE_URL"),
    }
}

fn flagged(ops: &[Operation]) -> usize {
    ops.iter().filter(|op| op.has_dependency_warning()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_config_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grantsync.toml");

        assert_eq!(run_init_config(&path), 0);
        let first = std::fs::read_to_string(&path).unwrap();
        assert!(GrantsyncConfig::from_file(&path).is_ok());

        std::fs::write(&path, "# edited\n").unwrap();
        assert_eq!(run_init_config(&path), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");
        assert_ne!(first, "# edited\n");
    }

    #[test]
    fn test_contract_path_falls_back_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.json");
        std::fs::write(&path, PermissionContract::builtin_default().to_json().unwrap()).unwrap();

        let args = GlobalArgs {
            config: dir.path().join("grantsync.toml"),
            database_url: None,
            contract: None,
        };
        assert!(load_contract(&args, &GrantsyncConfig::default()).is_err());

        let config = GrantsyncConfig {
            contract: Some(path),
            ..GrantsyncConfig::default()
        };
        assert!(load_contract(&args, &config).is_ok());
    }
}
