use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use guardian::github::SnapshotFetcher;
use guardian::scan::{
    Notifier, NotifyError, ScanTarget, SecretScanner, new_repository_urls, scan_targets,
};
use guardian::store::ScanStore;
use guardian::sync::{FetchOptions, FetchOutcome, fetch_all, fetch_all_members};
use guardian::{ChangeSet, diff};

use crate::commands::build_client;
use crate::config::Config;
use crate::notify::LogNotifier;
use crate::progress::LoggingReporter;

/// Options for a scan run.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ScanArgs {
    /// Organization name(s) - defaults to [scan] organizations from config
    pub orgs: Vec<String>,

    /// Members fetched concurrently (default from config or 10)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Directory holding one subdirectory per run (default from config)
    #[arg(short = 'r', long)]
    pub results_dir: Option<PathBuf>,

    /// Dry run - fetch and diff without writing results
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the secret scanner; new repositories are still reported
    #[arg(long)]
    pub no_scan: bool,
}

/// Snapshot every member, diff against the previous run and hand off the delta.
///
/// `scanner` runs over the scan targets unless `--no-scan` is given.
pub(crate) async fn handle_scan(
    args: ScanArgs,
    config: &Config,
    scanner: Option<&dyn SecretScanner>,
) -> Result<(), Box<dyn std::error::Error>> {
    let started_at = Utc::now();

    let organizations = if args.orgs.is_empty() {
        config.scan.organizations.clone()
    } else {
        args.orgs
    };
    if organizations.is_empty() {
        return Err(
            "No organizations to scan. Pass them as arguments or set [scan] organizations".into(),
        );
    }

    let workers = args.workers.unwrap_or(config.scan.workers).max(1);
    let client = build_client(config, workers)?;
    let store = ScanStore::new(
        args.results_dir
            .unwrap_or_else(|| config.scan.results_dir.clone()),
    );

    // Fail before the expensive part if the previous run is unreadable.
    let previous = store.load_latest_snapshot()?.unwrap_or_default();

    let reporter = Arc::new(LoggingReporter::new());
    let on_progress = reporter.as_callback();

    let members = fetch_all_members(&client, &organizations, Some(&on_progress)).await;
    let outcome = fetch_all(
        &SnapshotFetcher::new(client),
        &members,
        &FetchOptions::default().with_workers(workers),
        Some(&on_progress),
    )
    .await;

    let changes = diff(&outcome.snapshot, &previous);
    let targets = scan_targets(&changes);

    let run_dir = if args.dry_run {
        tracing::info!("Dry run, results not written");
        None
    } else if outcome.snapshot.is_empty() {
        tracing::warn!(
            members = members.len(),
            "Acquisition produced an empty snapshot, results not written"
        );
        None
    } else {
        let run = store.create_run(started_at)?;
        run.write_snapshot(&outcome.snapshot)?;
        run.write_change_set(&changes)?;
        if config.scan.scan_targets {
            run.write_scan_targets(&targets)?;
        }
        tracing::info!(path = %run.path().display(), "Results written");
        Some(run.path().to_path_buf())
    };

    let scanner = if args.no_scan { None } else { scanner };
    let findings = hand_off(
        &targets,
        &new_repository_urls(&changes),
        scanner,
        &LogNotifier,
    )
    .await?;

    let summary = ScanSummary {
        organizations: organizations.len(),
        outcome: &outcome,
        changes: &changes,
        scan_targets: targets.len(),
        findings,
        run_dir,
    };
    let mut table = tabled::Table::new(summary.rows());
    table.with(tabled::settings::Style::rounded());
    println!("{}", table);

    Ok(())
}

/// Report new repositories, then scan the targets and report any findings.
///
/// Returns the number of findings, or `None` when nothing was scanned. A
/// failed scan is logged and does not stop the run.
async fn hand_off(
    targets: &[ScanTarget],
    new_repositories: &[String],
    scanner: Option<&dyn SecretScanner>,
    notifier: &dyn Notifier,
) -> Result<Option<usize>, NotifyError> {
    if !new_repositories.is_empty() {
        notifier.notify_new_repositories(new_repositories).await?;
    }

    let Some(scanner) = scanner else {
        tracing::info!(targets = targets.len(), "Secret scan skipped");
        return Ok(None);
    };
    if targets.is_empty() {
        return Ok(Some(0));
    }

    let findings = match scanner.scan(targets).await {
        Ok(findings) => findings,
        Err(e) => {
            tracing::error!(error = %e, targets = targets.len(), "Secret scan failed");
            return Ok(None);
        }
    };
    tracing::info!(
        targets = targets.len(),
        findings = findings.len(),
        "Secret scan complete"
    );
    if !findings.is_empty() {
        notifier.notify_findings(&findings).await?;
    }
    Ok(Some(findings.len()))
}

#[derive(Debug, Clone, PartialEq, Eq, tabled::Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

struct ScanSummary<'a> {
    organizations: usize,
    outcome: &'a FetchOutcome,
    changes: &'a ChangeSet,
    scan_targets: usize,
    findings: Option<usize>,
    run_dir: Option<PathBuf>,
}

impl ScanSummary<'_> {
    fn rows(&self) -> Vec<SummaryRow> {
        let snapshot = &self.outcome.snapshot;
        let summary = &self.outcome.summary;
        let row = |metric, value: usize| SummaryRow {
            metric,
            value: value.to_string(),
        };

        let mut rows = vec![
            row("Organizations", self.organizations),
            row("Members", summary.total),
            row("Members fetched", summary.succeeded),
            row("Members failed", summary.failed),
            row("Repositories", snapshot.repository_count()),
            row("Branches", snapshot.branch_count()),
            row("Updated commits", self.changes.updated_commits.len()),
            row("New repositories", new_repository_urls(self.changes).len()),
            row("New branches", self.changes.new_branches.len()),
            row("Scan targets", self.scan_targets),
        ];
        rows.push(SummaryRow {
            metric: "Findings",
            value: self
                .findings
                .map_or_else(|| "not scanned".to_string(), |n| n.to_string()),
        });
        rows.push(SummaryRow {
            metric: "Results",
            value: self
                .run_dir
                .as_ref()
                .map_or_else(|| "not written".to_string(), |p| p.display().to_string()),
        });
        rows
    }
}
