use console::{style, Style};

use crate::core::{format_arguments, DeploymentRecord, OutcomeStatus, PendingDeployment, RunOutcome};
use crate::errors::ErrorInfo;
use crate::orchestrator::RunResult;
use crate::registry::Task;

/// Styled terminal output.
#[derive(Debug, Default)]
pub struct Display;

impl Display {
    /// Creates a display.
    pub fn new() -> Self {
        Self
    }

    /// Prints a section header.
    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
    }

    /// Prints every outcome of a run followed by the summary.
    pub fn print_run(&self, result: &RunResult) {
        let mode = if result.dry_run { " (dry run)" } else { "" };
        self.print_header(&format!("Deploying to {}{mode}", result.network));

        for (task, outcome) in &result.outcomes {
            let status = outcome.status();
            println!(
                "{} {}  {}",
                self.status_style(status).apply_to(self.status_icon(status)),
                style(task).bold(),
                describe_outcome(outcome)
            );
        }

        println!();
        let summary = format!("{} in {}ms", result.summary, result.duration_ms);
        if result.is_success() {
            self.print_success(&summary);
        } else {
            self.print_error(&summary);
        }
    }

    /// Prints one persisted deployment.
    pub fn print_record(&self, record: &DeploymentRecord) {
        println!(
            "{}  {} at {}",
            style(&record.task).bold(),
            record.contract,
            style(&record.address).green()
        );
        println!("    tx:   {}", style(&record.tx_hash).dim());
        println!("    args: {}", format_arguments(&record.args));
        if let Some(block) = record.block_number {
            println!("    block {block}, confirmed {}", record.confirmed_at.to_rfc3339());
        }
    }

    /// Prints a submitted but unrecorded deployment.
    pub fn print_pending(&self, pending: &PendingDeployment) {
        self.print_warning(&format!(
            "{} pending since {} (tx {})",
            pending.task,
            pending.submitted_at.to_rfc3339(),
            pending.tx_hash
        ));
    }

    /// Prints one task definition.
    pub fn print_task(&self, position: usize, task: &Task) {
        println!(
            "{:>3}. {}  {}",
            position,
            style(task.name()).bold(),
            style(task.contract()).dim()
        );
        if !task.tags().is_empty() {
            let tags: Vec<&str> = task.tags().iter().map(String::as_str).collect();
            println!("     tags: {}", tags.join(", "));
        }
        if !task.dependencies().is_empty() {
            println!("     after: {}", task.dependencies().join(", "));
        }
    }

    /// Prints the diagnostic block of a registry error.
    pub fn print_error_info(&self, info: &ErrorInfo) {
        eprintln!("  {} {}", style(&info.code).red(), info.summary);
        if let Some(hint) = &info.fix_hint {
            eprintln!("  {} {hint}", style("hint:").yellow());
        }
    }

    /// Prints a success line.
    pub fn print_success(&self, message: &str) {
        println!("{} {}", style("✓").green().bold(), message);
    }

    /// Prints an error line to stderr.
    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    /// Prints a warning line.
    pub fn print_warning(&self, message: &str) {
        println!("{} {}", style("!").yellow().bold(), message);
    }

    /// Prints an informational line.
    pub fn print_info(&self, message: &str) {
        println!("{} {}", style("→").cyan(), message);
    }

    fn status_icon(&self, status: OutcomeStatus) -> &'static str {
        match status {
            OutcomeStatus::Deployed => "✓",
            OutcomeStatus::Skipped => "=",
            OutcomeStatus::Planned => "○",
            OutcomeStatus::Failed => "✗",
            OutcomeStatus::Blocked => "⊘",
        }
    }

    fn status_style(&self, status: OutcomeStatus) -> Style {
        match status {
            OutcomeStatus::Deployed => Style::new().green().bold(),
            OutcomeStatus::Skipped => Style::new().dim(),
            OutcomeStatus::Planned => Style::new().cyan(),
            OutcomeStatus::Failed => Style::new().red().bold(),
            OutcomeStatus::Blocked => Style::new().yellow(),
        }
    }
}

/// One-line, unstyled description of an outcome.
#[must_use]
pub fn describe_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Deployed(record) => {
            format!("deployed at {} (tx {})", record.address, record.tx_hash)
        }
        RunOutcome::Skipped(record) => format!("already deployed at {}", record.address),
        RunOutcome::WouldDeploy(plan) => {
            let verb = if plan.redeploy { "would redeploy" } else { "would deploy" };
            let args = plan.args.as_deref().map_or_else(
                || "arguments pending on planned dependencies".to_string(),
                |args| format!("args {}", format_arguments(args)),
            );
            match &plan.pending_tx {
                Some(tx) => format!("would resume pending tx {tx}"),
                None => format!("{verb} {} with {args}", plan.contract),
            }
        }
        RunOutcome::Failed(err) => format!("failed [{}]: {err}", err.kind()),
        RunOutcome::Blocked(blocked) => blocked.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArgValue, PlannedDeployment, TransactionReceipt};

    fn record() -> DeploymentRecord {
        DeploymentRecord::new(
            "Auction",
            "localhost",
            "HVNFTDutchAuction",
            "0xdeployer",
            vec![ArgValue::from(1000_i64)],
            &TransactionReceipt {
                tx_hash: "0xtx".to_string(),
                contract_address: "0xaddr".to_string(),
                block_number: Some(7),
            },
        )
    }

    fn plan(args: Option<Vec<ArgValue>>, pending_tx: Option<&str>, redeploy: bool) -> PlannedDeployment {
        PlannedDeployment {
            task: "Auction".to_string(),
            network: "localhost".to_string(),
            contract: "HVNFTDutchAuction".to_string(),
            args,
            pending_tx: pending_tx.map(str::to_string),
            redeploy,
        }
    }

    #[test]
    fn test_describe_record_outcomes() {
        assert_eq!(
            describe_outcome(&RunOutcome::Deployed(record())),
            "deployed at 0xaddr (tx 0xtx)"
        );
        assert_eq!(
            describe_outcome(&RunOutcome::Skipped(record())),
            "already deployed at 0xaddr"
        );
    }

    #[test]
    fn test_describe_planned_outcomes() {
        let fresh = describe_outcome(&RunOutcome::WouldDeploy(plan(Some(vec![]), None, false)));
        assert!(fresh.starts_with("would deploy HVNFTDutchAuction with args"));

        let unresolved = describe_outcome(&RunOutcome::WouldDeploy(plan(None, None, false)));
        assert!(unresolved.ends_with("arguments pending on planned dependencies"));

        let redeploy = describe_outcome(&RunOutcome::WouldDeploy(plan(Some(vec![]), None, true)));
        assert!(redeploy.starts_with("would redeploy"));

        let resume = describe_outcome(&RunOutcome::WouldDeploy(plan(None, Some("0xabc"), false)));
        assert_eq!(resume, "would resume pending tx 0xabc");
    }
}
