pub mod acl;
pub mod api;
pub mod cli;
pub mod config;
pub mod git;
pub mod sync;

use anyhow::Result;

/// Library entrypoint; the binary delegates here after logging init.
pub fn run() -> Result<()> {
    cli::run()
}
