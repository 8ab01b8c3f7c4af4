use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use super::db::{MigrationLock, load_article_nodes, load_body_field, open_connection};
use super::fetch::HttpImageSource;
use super::layout::OutputLayout;
use super::markup::MarkupPatterns;
use super::node::NodeImporter;
use crate::cli::{ImportArgs, MissingBodyPolicy};
use crate::model::{ImportCounts, ImportPaths, ImportRunManifest, NodeReport};
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

#[derive(Debug, Default)]
pub(crate) struct MigrationOutcome {
    pub counts: ImportCounts,
    pub nodes: Vec<NodeReport>,
    pub warnings: Vec<String>,
}

pub fn run(args: ImportArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("import-{}", utc_compact_string(started_ts));

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        PathBuf::from("manifests")
            .join(format!("import_run_{}.json", utc_compact_string(started_ts)))
    });

    info!(
        db_path = %args.db_path.display(),
        files_root = %args.files_root.display(),
        run_id = %run_id,
        "starting import"
    );

    let layout = OutputLayout::new(&args.files_root);
    layout.ensure_dirs()?;

    info!("connecting to database");
    let mut connection =
        open_connection(&args.db_path, Duration::from_millis(args.busy_timeout_ms))?;

    let patterns = MarkupPatterns::new()?;
    let source = HttpImageSource::new(Duration::from_secs(args.http_timeout_secs))?;
    let importer = NodeImporter {
        patterns: &patterns,
        source: &source,
        layout: &layout,
    };

    let outcome = migrate(&mut connection, &importer, args.missing_body)?;

    let counts = outcome.counts.clone();
    let manifest = build_manifest(&args, run_id, started_at, &manifest_path, outcome);
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote import run manifest");
    info!(
        nodes = counts.nodes_total,
        rewritten = counts.nodes_rewritten,
        pictures = counts.pictures_saved,
        managed_files = counts.managed_files_inserted,
        failures = counts.decode_failures,
        "finished"
    );

    Ok(())
}

pub(crate) fn build_manifest(
    args: &ImportArgs,
    run_id: String,
    started_at: String,
    manifest_path: &Path,
    outcome: MigrationOutcome,
) -> ImportRunManifest {
    ImportRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at,
        finished_at: now_utc_string(),
        command: render_import_command(args),
        paths: ImportPaths {
            db_path: args.db_path.display().to_string(),
            files_root: args.files_root.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: outcome.counts,
        nodes: outcome.nodes,
        warnings: outcome.warnings,
    }
}

/// Runs every article node through `importer` under one exclusive transaction.
/// Any error rolls back all database writes; files already written stay on disk.
pub(crate) fn migrate(
    connection: &mut Connection,
    importer: &NodeImporter<'_>,
    missing_body: MissingBodyPolicy,
) -> Result<MigrationOutcome> {
    let lock = MigrationLock::acquire(connection)?;

    match migrate_nodes(&lock, importer, missing_body) {
        Ok(outcome) => {
            lock.commit()?;
            Ok(outcome)
        }
        Err(err) => Err(abandon(lock, err)),
    }
}

/// Rolls the run back and hands `err` back to the caller. A failing rollback is
/// only logged: SQLite may already have rolled back on its own after I/O errors.
pub(crate) fn abandon(lock: MigrationLock<'_>, err: anyhow::Error) -> anyhow::Error {
    if let Err(rollback_err) = lock.rollback() {
        warn!(error = %format!("{rollback_err:#}"), "explicit rollback failed");
    }
    err
}

fn migrate_nodes(
    connection: &Connection,
    importer: &NodeImporter<'_>,
    missing_body: MissingBodyPolicy,
) -> Result<MigrationOutcome> {
    let nodes = load_article_nodes(connection)?;
    let mut outcome = MigrationOutcome::default();
    outcome.counts.nodes_total = nodes.len();

    for node in &nodes {
        info!(nid = node.nid, "processing node");

        let Some(body) = load_body_field(connection, node.nid, &node.language)? else {
            match missing_body {
                MissingBodyPolicy::Abort => {
                    bail!(
                        "node {} has no body row for language '{}'",
                        node.nid,
                        node.language
                    );
                }
                MissingBodyPolicy::Skip => {
                    warn!(
                        nid = node.nid,
                        language = %node.language,
                        "skipping node without body"
                    );
                    outcome.warnings.push(format!(
                        "node {} skipped: no body row for language '{}'",
                        node.nid, node.language
                    ));
                    outcome.counts.nodes_skipped_missing_body += 1;
                    outcome.nodes.push(NodeReport {
                        nid: node.nid,
                        skipped_missing_body: true,
                        ..NodeReport::default()
                    });
                    continue;
                }
            }
        };

        let report = importer.import_node(connection, node, &body)?;

        outcome.counts.references_found += report.references_found;
        outcome.counts.pictures_saved += report.saved.len();
        outcome.counts.decode_failures += report.failed_urls.len();
        if report.primary.is_some() {
            outcome.counts.managed_files_inserted += 1;
        }
        if report.rewritten() {
            outcome.counts.nodes_rewritten += 1;
        }
        for url in &report.failed_urls {
            outcome
                .warnings
                .push(format!("node {}: image failed: {url}", node.nid));
        }
        outcome.nodes.push(report);
    }

    Ok(outcome)
}

fn render_import_command(args: &ImportArgs) -> String {
    let mut command = format!(
        "cms-image-import import --db-path {} --files-root {}",
        args.db_path.display(),
        args.files_root.display(),
    );
    command.push_str(&format!(
        " --http-timeout-secs {} --busy-timeout-ms {} --missing-body {}",
        args.http_timeout_secs,
        args.busy_timeout_ms,
        args.missing_body.as_str(),
    ));
    if let Some(path) = &args.manifest_path {
        command.push_str(&format!(" --manifest-path {}", path.display()));
    }
    command
}
