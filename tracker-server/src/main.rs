//! Tracker server binary.
//!
//! Reads `TRACKER_*` environment variables (see `ServerConfig::from_env`),
//! loads or initializes the data file, then serves WebSocket sessions until
//! Ctrl-C. Log verbosity follows `RUST_LOG`, defaulting to `info`.

use log::{error, info};
use tracker_collab::server::{ServerConfig, ServerError, SyncServer};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;
    info!(
        "Starting issue tracker (data file {}, history {:?})",
        config.data_file.display(),
        config.history
    );

    let server = SyncServer::open(config).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
