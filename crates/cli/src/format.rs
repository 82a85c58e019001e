//! Plan/report → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): one line per operation with a badge, e.g.
//!   `[GRANT] USAGE ON SCHEMA public TO grp_geo`
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use grantsync_executor::{Action, ApplyReport, Operation, ValidatedContract};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format a plan.
pub fn format_plan(ops: &[Operation], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&ops),
        OutputMode::Human => {
            if ops.is_empty() {
                return "(no changes)".to_string();
            }
            ops.iter().map(format_operation).collect::<Vec<_>>().join("\n")
        }
    }
}

/// One human-readable line per operation.
pub fn format_operation(op: &Operation) -> String {
    let badge = match op.action {
        Action::Grant => "[GRANT]",
        Action::Revoke => "[REVOKE]",
    };
    let privileges = if op.privileges.is_empty() {
        "ALL PRIVILEGES".to_string()
    } else {
        op.privileges
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut line = format!(
        "{} {} ON {} {} {}",
        badge,
        privileges,
        op.describe_target(),
        op.action.preposition(),
        op.grantee
    );
    if op.has_dependency_warning() {
        let dependents: Vec<String> = op.dependencies.iter().map(|d| d.to_string()).collect();
        line.push_str(&format!(" [WARN-DEPEND] {}", dependents.join(", ")));
    }
    line
}

/// Format an apply report.
pub fn format_report(report: &ApplyReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(report),
        OutputMode::Human => {
            if report.statements.is_empty() {
                return "(no changes)".to_string();
            }
            let mut out: Vec<String> = report.statements.iter().map(|s| format!("{};", s)).collect();
            out.push(format!(
                "(committed) {} statement(s) in {} attempt(s), run {}",
                report.statements.len(),
                report.attempts,
                report.run_id
            ));
            out.join("\n")
        }
    }
}

/// Format the outcome of `validate`.
pub fn format_validation(contract: &ValidatedContract, mode: OutputMode) -> String {
    let schema_grants: usize = contract.schema_privileges().values().map(|s| s.len()).sum();
    let object_grants: usize = contract
        .object_privileges()
        .values()
        .flat_map(|by_schema| by_schema.values())
        .map(|by_object| by_object.len())
        .sum();
    let default_entries = contract.default_privileges().len();
    match mode {
        OutputMode::Json => to_json(&serde_json::json!({
            "valid": true,
            "mode": contract.matcher().mode(),
            "database_grants": contract.database_privileges().len(),
            "schema_grants": schema_grants,
            "object_grants": object_grants,
            "default_entries": default_entries,
        })),
        OutputMode::Human => format!(
            "OK: {} database, {} schema, {} object grant(s); {} default-privilege entr{}",
            contract.database_privileges().len(),
            schema_grants,
            object_grants,
            default_entries,
            if default_entries == 1 { "y" } else { "ies" }
        ),
    }
}

/// Format a role list.
pub fn format_roles(roles: &[String], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&roles),
        OutputMode::Human => {
            if roles.is_empty() {
                return "(empty list)".to_string();
            }
            roles
                .iter()
                .enumerate()
                .map(|(i, r)| format!("{}) {}", i + 1, r))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Format an error.
pub fn format_error(err: &anyhow::Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "error": format!("{:#}", err)
        }))
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err)),
        OutputMode::Human => format!("(error) {:#}", err),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
