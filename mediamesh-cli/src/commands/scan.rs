//! Scan command - run one sync cycle and print the result.

use std::path::PathBuf;

use mediamesh::app::NodeApp;
use mediamesh::sync::ScanStatus;

use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(config: Option<PathBuf>) -> Result<(), CliError> {
    let runner = CliRunner::new(config.as_deref())?;
    runner.log_startup("scan");

    let config = runner.node_config()?;
    let media_root = config.media_root.clone();

    let status = runner.runtime().block_on(async move {
        let app = NodeApp::new(config)?;
        app.sync_once().await
    })?;

    print_summary(&media_root, &status);
    Ok(())
}

fn print_summary(media_root: &std::path::Path, status: &ScanStatus) {
    println!("Scan of {}", media_root.display());
    println!("  Local files: {}", status.local_files);
    println!("  New files:   {}", status.new_local);
    for note in &status.remote_summary {
        println!("  Master:      {}", note);
    }
    if let Some(error) = &status.error {
        println!("  Error:       {}", error);
    }
}
