//! Serve command - run a node until Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;

use mediamesh::app::NodeApp;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub config: Option<PathBuf>,
    pub listen: Option<SocketAddr>,
}

pub fn run(args: ServeArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config.as_deref())?;
    runner.log_startup("serve");

    let mut config = runner.node_config()?;
    if let Some(listen) = args.listen {
        config = config.with_listen(listen);
    }

    println!("MediaMesh Node v{}", mediamesh::VERSION);
    println!("==================");
    println!();
    println!("Owner:      {}", config.owner);
    println!("Advertised: {}", config.advertised_url);
    println!("Listen:     {}", config.listen);
    match &config.master_url {
        Some(master) => println!("Role:       satellite of {}", master),
        None => println!("Role:       master"),
    }
    println!("Media root: {}", config.media_root.display());
    println!("Downloads:  {}", config.download_root.display());
    if config.sync_interval.is_zero() {
        println!("Sync:       manual only");
    } else {
        println!("Sync:       every {}s", config.sync_interval.as_secs());
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    runner.runtime().block_on(async move {
        let app = NodeApp::new(config)?;
        app.serve().await
    })?;

    println!("Node stopped.");
    Ok(())
}
