//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("grantsync")
        .about("Declarative PostgreSQL privilege reconciliation")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("Config file (default: grantsync.toml)")
                .global(true),
        )
        .arg(
            Arg::new("database-url")
                .long("database-url")
                .help("PostgreSQL connection string (default: $DATABASE_URL)")
                .global(true),
        )
        .arg(
            Arg::new("contract")
                .long("contract")
                .short('c')
                .help("Permission contract JSON (default: `contract` in the config file)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_validate())
        .subcommand(build_plan())
        .subcommand(build_apply())
        .subcommand(build_roles())
        .subcommand(build_init_config())
}

fn build_validate() -> Command {
    Command::new("validate").about(
        "Check a contract; with a database URL, also check that for_role creators exist",
    )
}

fn build_plan() -> Command {
    Command::new("plan").about("Show the operations that would bring the database in line")
}

fn build_apply() -> Command {
    Command::new("apply")
        .about("Apply the plan in a single transaction")
        .arg(
            Arg::new("force")
                .long("force")
                .help("Apply even when revokes affect dependent views")
                .action(ArgAction::SetTrue),
        )
}

fn build_roles() -> Command {
    Command::new("roles")
        .about("List roles the contract manages")
        .arg(
            Arg::new("all")
                .long("all")
                .help("List every role, managed or not")
                .action(ArgAction::SetTrue),
        )
}

fn build_init_config() -> Command {
    Command::new("init-config").about("Write a default grantsync.toml if none exists")
}
