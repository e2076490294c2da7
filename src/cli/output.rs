//! Output formatting for CLI commands.
//!
//! This module renders plans, sync reports and cache contents either as
//! colored text tables or as JSON documents for scripting.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::cache::RoleCache;
use crate::config::{ConfigHasher, RoleSpec, RoleSyncConfig, ValidationResult};
use crate::error::RoleSyncError;
use crate::planner::{ActionType, RolePlan};
use crate::sync::{SyncMode, SyncReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Role row for table display.
#[derive(Tabled)]
struct RoleRow {
    #[tabled(rename = "Role")]
    name: String,
    #[tabled(rename = "Type")]
    location_type: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Ref")]
    reference: String,
}

/// Machine-readable status line.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MachineOutput<'a, T: Serialize> {
    exit_code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_message: Option<&'a str>,
    #[serde(flatten)]
    body: Option<&'a T>,
}

/// Body of `cache show` in JSON mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheJson<'a> {
    cache_exists: bool,
    in_sync: bool,
    cached_hash: Option<String>,
    desired_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<&'a RoleCache>,
}

/// Body of `validate` in JSON mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationJson<'a> {
    roles: usize,
    roles_dir: &'a str,
    cache_file: &'a str,
    warnings: &'a [String],
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a role plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &RolePlan) -> String {
        match self.format {
            OutputFormat::Json => Self::machine(0, None, None, Some(plan)),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &RolePlan) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - roles are up to date.\n",
                "✓".green()
            );
        }

        let mut output = String::new();

        output.push_str("\nRole Plan\n");
        let _ = writeln!(output, "   Desired hash: {}", ConfigHasher::short_hash(&plan.desired_hash));
        if plan.bootstrap {
            let _ = writeln!(output, "   {}", "No role cache found, every role will be installed".yellow());
        }
        output.push('\n');

        let rows: Vec<PlanActionRow> = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| PlanActionRow {
                index: i + 1,
                action: Self::format_action_type(a.action_type),
                role: a.role.clone(),
                reason: Self::truncate(&a.reason, 50),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to add, {} to update, {} to re-add, {} to remove, {} unchanged\n",
            plan.count(ActionType::Add).to_string().green(),
            plan.count(ActionType::Update).to_string().yellow(),
            plan.count(ActionType::CleanReAdd).to_string().yellow(),
            plan.count(ActionType::Remove).to_string().red(),
            plan.unchanged.len()
        );

        output
    }

    /// Formats a sync report.
    #[must_use]
    pub fn format_report(&self, report: &SyncReport) -> String {
        match self.format {
            OutputFormat::Json => {
                let error = report.error().map(|e| e.to_string());
                Self::machine(report.exit_code(), error, None, Some(report))
            }
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &SyncReport) -> String {
        let mut output = String::new();

        let mode = match report.mode {
            Some(SyncMode::Bootstrap) => " (initial install)",
            _ => "",
        };

        if report.success {
            let _ = writeln!(output, "{} Role sync successful{mode}", "✓".green());
        } else {
            let _ = writeln!(output, "{} Role sync failed{mode}", "✗".red());
        }

        if !report.completed.is_empty() {
            output.push('\n');
            for done in &report.completed {
                let _ = writeln!(
                    output,
                    "   {} {}",
                    Self::format_action_type(done.action_type),
                    done.role
                );
            }
        }

        if let Some(plan) = &report.plan {
            let _ = write!(
                output,
                "\n   Applied: {}/{}   Unchanged: {}\n",
                report.completed.len(),
                plan.action_count(),
                plan.unchanged.len()
            );
        }

        if let Some(failure) = &report.failure {
            let _ = write!(output, "\n{} Failure:\n", "⚠".yellow());
            if let Some(role) = &failure.role {
                let _ = writeln!(output, "   Role:  {role}");
            }
            let _ = writeln!(output, "   Phase: {}", failure.phase);
            let _ = writeln!(output, "   Cause: {}", failure.cause);
            if failure.manual_intervention {
                let _ = writeln!(
                    output,
                    "   {}",
                    "The role directory changed but the cache was not updated; manual intervention needed"
                        .red()
                );
            }
        }

        output
    }

    /// Formats the result of `validate`.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &RoleSyncConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let body = ValidationJson {
                    roles: config.roles.len(),
                    roles_dir: &config.paths.roles_dir,
                    cache_file: &config.paths.cache_file,
                    warnings: &result.warnings,
                };
                Self::machine(0, None, Some("Configuration is valid"), Some(&body))
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());

                if show_warnings && !result.warnings.is_empty() {
                    output.push_str("\nWarnings:\n");
                    for warning in &result.warnings {
                        let _ = writeln!(output, "  - {warning}");
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "  Roles: {}", config.roles.len());
                let _ = writeln!(
                    output,
                    "  Git roles: {}",
                    config.roles.values().filter(|r| r.is_git()).count()
                );
                let _ = writeln!(
                    output,
                    "  Local roles: {}",
                    config.roles.values().filter(|r| r.is_local()).count()
                );
                let _ = writeln!(output, "  Roles dir: {}", config.paths.roles_dir);
                output
            }
        }
    }

    /// Formats the role cache and whether it matches the desired roles.
    #[must_use]
    pub fn format_cache(&self, cache: Option<&RoleCache>, desired_hash: &str) -> String {
        let hasher = ConfigHasher::new();
        let cached_hash = cache.map(|c| hasher.hash_roles(&c.roles));
        let in_sync = cached_hash.as_deref() == Some(desired_hash);

        match self.format {
            OutputFormat::Json => {
                let body = CacheJson {
                    cache_exists: cache.is_some(),
                    in_sync,
                    cached_hash,
                    desired_hash: desired_hash.to_string(),
                    cache,
                };
                Self::machine(0, None, None, Some(&body))
            }
            OutputFormat::Text => {
                let Some(cache) = cache else {
                    return format!("{} No role cache found.\n", "⚠".yellow());
                };

                let mut output = String::from("\nRole Cache\n");
                let _ = writeln!(output, "   Roles: {}", cache.len());
                let _ = writeln!(
                    output,
                    "   Cached hash: {}",
                    ConfigHasher::short_hash(cached_hash.as_deref().unwrap_or_default())
                );
                let _ = writeln!(output, "   Desired hash: {}", ConfigHasher::short_hash(desired_hash));
                let status = if in_sync {
                    "in sync".green().to_string()
                } else {
                    "out of sync".yellow().to_string()
                };
                let _ = write!(output, "   Status: {status}\n\n");

                if !cache.is_empty() {
                    let rows: Vec<RoleRow> = cache
                        .roles
                        .iter()
                        .map(|(name, spec)| Self::role_row(name, spec))
                        .collect();
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }
                output
            }
        }
    }

    fn role_row(name: &str, spec: &RoleSpec) -> RoleRow {
        RoleRow {
            name: name.to_string(),
            location_type: spec.location_type.to_string(),
            location: Self::truncate(&spec.location, 50),
            reference: match &spec.ref_type {
                Some(ref_type) if spec.is_git() => format!("{ref_type}:{}", spec.reference()),
                _ => String::from("-"),
            },
        }
    }

    /// Formats an action type with color.
    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Add => "+add".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::CleanReAdd => "±re-add".yellow().to_string(),
            ActionType::Remove => "-remove".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => Self::machine::<()>(0, None, Some(message), None),
            OutputFormat::Text => format!("{} {message}\n", "✓".green()),
        }
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => Self::machine::<()>(0, None, Some(message), None),
            OutputFormat::Text => format!("{} {message}\n", "⚠".yellow()),
        }
    }

    /// Formats an error together with the exit code it produces.
    #[must_use]
    pub fn error(&self, err: &RoleSyncError, exit_code: u8) -> String {
        match self.format {
            OutputFormat::Json => Self::machine::<()>(exit_code, Some(err.to_string()), None, None),
            OutputFormat::Text => format!("{} Error: {err}\n", "✗".red()),
        }
    }

    /// Returns true when output is machine readable.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    fn machine<T: Serialize>(
        exit_code: u8,
        error_message: Option<String>,
        status_message: Option<&str>,
        body: Option<&T>,
    ) -> String {
        let output = MachineOutput {
            exit_code,
            error_message,
            status_message,
            body,
        };
        serde_json::to_string_pretty(&output).map_or_else(
            |_| String::from("{\"exitCode\": 1, \"errorMessage\": \"Error serializing output\"}\n"),
            |mut json| {
                json.push('\n');
                json
            },
        )
    }
}
