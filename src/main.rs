/// Entry point for the Docker State Exporter.
///
/// Logging is configured through `RUST_LOG`, everything else through the
/// environment variables documented in [`docker_state_exporter::config`].
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info EXPORTER_MODE=service LISTEN_ADDR=0.0.0.0:9100 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    docker_state_exporter::run().await
}
