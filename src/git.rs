//! Git seeding step: clone a source repository into the local notebook
//! directory before the workspace sync begins.
//!
//! Authentication is the caller's responsibility (SSH agent or stored
//! HTTPS credentials); failures only surface remediation hints. The cloned
//! directory is scratch space within the current flow: export/import pull
//! from the live source workspace, not from disk.

use std::path::Path;
use std::process::Command;

use colored::Colorize;
use thiserror::Error;

/// Errors from the clone step. Any of these aborts the whole sync.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("git binary not found on PATH")]
    GitMissing,

    #[error("failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git clone exited with {status}: {stderr}")]
    CloneFailed { status: String, stderr: String },
}

/// Whether a git binary is available on PATH.
pub fn git_available() -> bool {
    which::which("git").is_ok()
}

/// Clone `git_url` into `target_dir`, blocking until git exits.
pub fn clone_repository(git_url: &str, target_dir: &Path) -> Result<(), SeedError> {
    if !git_available() {
        return Err(SeedError::GitMissing);
    }

    tracing::debug!(url = %git_url, dir = %target_dir.display(), "starting git clone");

    let output = Command::new("git")
        .arg("clone")
        .arg("--")
        .arg(git_url)
        .arg(target_dir)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(SeedError::CloneFailed {
            status: output.status.to_string(),
            stderr,
        });
    }

    println!("Notebooks pulled from Git repository: {}", git_url.bold());
    Ok(())
}

/// Print the remediation guidance for a failed clone.
pub fn print_clone_hints(err: &SeedError) {
    println!("{} {}", "Error pulling notebooks from Git:".red(), err);
    println!("Please ensure you have the correct access rights and the repository exists.");
    println!("If using SSH, ensure your SSH key is added to the SSH agent.");
    println!("If using HTTPS, ensure you have the correct credentials.");
}
