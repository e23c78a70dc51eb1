use std::path::Path;

use guardian::store::load_snapshot;
use guardian::{ChangeSet, diff};

use crate::commands::limits::OutputFormat;

/// Diff two persisted `commit_hash.json` files.
pub(crate) fn handle_diff(
    previous: &Path,
    current: &Path,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let previous = load_snapshot(previous)?;
    let current = load_snapshot(current)?;
    let changes = diff(&current, &previous);

    match output {
        OutputFormat::Table => {
            if changes.is_empty() {
                println!("No changes");
            } else {
                let mut table = tabled::Table::new(change_rows(&changes));
                table.with(tabled::settings::Style::rounded());
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&changes)?);
        }
    }
    Ok(())
}

/// One classified change for display.
#[derive(Debug, Clone, PartialEq, Eq, tabled::Tabled)]
pub(crate) struct ChangeRow {
    #[tabled(rename = "Change")]
    pub kind: &'static str,
    #[tabled(rename = "Member")]
    pub member: String,
    #[tabled(rename = "Repository")]
    pub repository: String,
    #[tabled(rename = "Branch")]
    pub branch: String,
    #[tabled(rename = "Previous")]
    pub previous: String,
    #[tabled(rename = "Current")]
    pub current: String,
}

/// Rows for every change, grouped by kind.
pub(crate) fn change_rows(changes: &ChangeSet) -> Vec<ChangeRow> {
    let updated = changes.updated_commits.iter().map(|(key, update)| ChangeRow {
        kind: "updated commit",
        member: key.member().to_string(),
        repository: key.repository().to_string(),
        branch: key.branch().to_string(),
        previous: short(update.previous.as_str()),
        current: short(update.current.as_str()),
    });

    let added = |kind: &'static str| {
        move |(key, hash): (&guardian::FlatKey, &guardian::CommitHash)| ChangeRow {
            kind,
            member: key.member().to_string(),
            repository: key.repository().to_string(),
            branch: key.branch().to_string(),
            previous: String::new(),
            current: short(hash.as_str()),
        }
    };

    updated
        .chain(changes.new_repositories.iter().map(added("new repository")))
        .chain(changes.new_branches.iter().map(added("new branch")))
        .collect()
}

/// Abbreviated commit hash, as git prints it.
fn short(hash: &str) -> String {
    hash.chars().take(12).collect()
}
