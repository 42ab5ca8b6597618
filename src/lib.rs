//! Docker State Exporter: polls a Docker engine (standalone or Swarm manager)
//! for the lifecycle state of its containers or services and exposes the most
//! recent observation in the Prometheus text format.
//!
//! One poller task rebuilds a [`snapshot::Snapshot`] every poll interval and
//! publishes it; the HTTP handlers only ever read the latest published one.
pub mod api;
pub mod config;
pub mod error;
pub mod filter;
pub mod poller;
pub mod render;
pub mod runtime;
pub mod snapshot;

use config::{Config, Mode};
use poller::Poller;
use runtime::DockerRuntime;
use snapshot::{ContainerSnapshotBuilder, ServiceSnapshotBuilder, SnapshotBuilder};

/// Runs the exporter.
///
/// Reads the [`Config`] from the environment, connects to the docker engine
/// and then serves the HTTP endpoints while polling in the background.
///
/// # Errors
///
/// Possible errors include:
/// - An environment variable with an invalid value.
/// - The docker engine staying unreachable after all connection retries.
/// - Failure to bind the listen address.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    log::info!(
        "Starting in {:?} mode (poll interval {:?}, static files from `{}`)",
        config.mode,
        config.poll_interval,
        config.static_dir.display()
    );

    let docker = DockerRuntime::connect(config.retry).await?;
    log::debug!("Connected to docker engine");

    match config.mode {
        Mode::Container => serve(ContainerSnapshotBuilder::new(docker), config).await,
        Mode::Service => serve(ServiceSnapshotBuilder::new(docker), config).await,
    }
}

/// Polls with `builder` and serves the published snapshots until either the
/// poller or the server stops.
async fn serve<B: SnapshotBuilder>(
    builder: B,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let (publisher, reader) = snapshot::channel();
    let poller = Poller::new(builder, publisher, config.poll_interval);
    let server = api::APIServer::new(reader, &config.static_dir);

    tokio::select! {
        result = poller.run() => result?,
        result = server.listen(config.listen_addr) => result?,
    }
    log::info!("Shutting down");
    Ok(())
}
