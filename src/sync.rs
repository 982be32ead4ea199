//! The end-to-end sync flow: optional git seeding, source permission
//! snapshot, flat notebook listing, export → import → permission replay per
//! notebook, target permission snapshot.
//!
//! Failure policy mirrors the platform tooling this replaces: only seeding
//! is fatal (provider resolution fails earlier, in the CLI). Every
//! per-notebook and per-grant failure is logged and the loop continues; no
//! aggregation, no final failure summary.

use std::path::Path;

use colored::Colorize;
use thiserror::Error;

use crate::acl::PermissionMap;
use crate::api::{ObjectType, WorkspaceApi, DEFAULT_LANGUAGE};
use crate::config::CloudProvider;
use crate::git::{self, SeedError};

/// Fatal sync errors. Everything else is best-effort.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Seed(#[from] SeedError),
}

/// One run's worth of user-supplied inputs. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub source: CloudProvider,
    pub target: CloudProvider,
    /// When present, cloned into the notebook directory before syncing.
    pub git_url: Option<String>,
    /// When present, every permission replay adds a cluster-attach grant.
    pub cluster_id: Option<String>,
}

/// Counters for the completion log line only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub notebooks_seen: usize,
    pub notebooks_imported: usize,
}

/// Drive the whole flow from `source` to `target` for the notebooks
/// directly under `notebook_dir`.
pub fn run_sync(
    source: &dyn WorkspaceApi,
    target: &dyn WorkspaceApi,
    notebook_dir: &str,
    request: &SyncRequest,
) -> Result<SyncOutcome, SyncError> {
    println!("Starting notebook synchronization and permission sync...");

    if let Some(git_url) = request.git_url.as_deref() {
        if let Err(err) = git::clone_repository(git_url, Path::new(notebook_dir)) {
            git::print_clone_hints(&err);
            return Err(err.into());
        }
    }

    let source_permissions = snapshot_permissions(source, request.source, notebook_dir);

    let objects = match source.list(notebook_dir) {
        Ok(objects) => objects,
        Err(err) => {
            tracing::warn!(dir = %notebook_dir, error = %err, "listing source notebooks failed");
            Vec::new()
        }
    };

    let mut outcome = SyncOutcome::default();
    for object in &objects {
        // Flat single-level sync: directories (and anything else that is
        // not a notebook) are skipped, never recursed into.
        if object.object_type != ObjectType::Notebook {
            tracing::debug!(
                path = %object.path,
                object_type = ?object.object_type,
                "skipping non-notebook object"
            );
            continue;
        }
        outcome.notebooks_seen += 1;

        let content = match source.export(&object.path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %object.path, error = %err, "export failed, skipping notebook");
                continue;
            }
        };

        // Import is fire-and-forget: a failure is logged, and permission
        // replay still runs for the path.
        match target.import(&object.path, &content, DEFAULT_LANGUAGE) {
            Ok(()) => {
                outcome.notebooks_imported += 1;
                println!(
                    "Notebook imported successfully to {} in {}",
                    object.path.bold(),
                    target.label()
                );
            }
            Err(err) => {
                tracing::warn!(path = %object.path, error = %err, "import failed");
            }
        }

        if let Some(permissions) = &source_permissions {
            for (principal, level) in permissions {
                match target.grant(&object.path, principal, level, request.cluster_id.as_deref()) {
                    Ok(()) => {
                        println!(
                            "Granted {} permissions to {} for {}",
                            level.bold(),
                            principal.bold(),
                            object.path
                        );
                        if let Some(cluster) = request.cluster_id.as_deref() {
                            println!(
                                "Granted CAN_ATTACH_TO permissions to {} for cluster {}",
                                principal.bold(),
                                cluster
                            );
                        }
                    }
                    Err(err) => {
                        tracing::warn!(
                            path = %object.path,
                            principal = %principal,
                            error = %err,
                            "grant failed"
                        );
                    }
                }
            }
        }
    }

    snapshot_permissions(target, request.target, notebook_dir);

    tracing::info!(
        seen = outcome.notebooks_seen,
        imported = outcome.notebooks_imported,
        "sync finished"
    );
    println!("Notebook synchronization and permission sync completed.");
    Ok(outcome)
}

/// Fetch and print a workspace's permissions for the directory. Diagnostic
/// only: a failure or an empty result prints "no permissions found" and the
/// run continues without a captured map.
fn snapshot_permissions(
    workspace: &dyn WorkspaceApi,
    provider: CloudProvider,
    notebook_dir: &str,
) -> Option<PermissionMap> {
    println!(
        "Listing permissions in {} workspace for directory: {}",
        provider, notebook_dir
    );
    match workspace.permissions(notebook_dir) {
        Ok(map) if !map.is_empty() => {
            println!("Permissions in {} workspace:", provider);
            for (user, level) in &map {
                println!("- {}: {}", user, level);
            }
            Some(map)
        }
        Ok(_) => {
            println!(
                "No permissions found in {} workspace for directory: {}",
                provider, notebook_dir
            );
            None
        }
        Err(err) => {
            tracing::warn!(dir = %notebook_dir, error = %err, "permission snapshot failed");
            println!(
                "No permissions found in {} workspace for directory: {}",
                provider, notebook_dir
            );
            None
        }
    }
}
