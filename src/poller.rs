use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::runtime;
use crate::snapshot::{Snapshot, SnapshotBuilder, SnapshotPublisher};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("stopped polling {mode} snapshots: {source}")]
    Fatal {
        mode: &'static str,
        #[source]
        source: runtime::Error,
    },
}

/// Periodically rebuilds the snapshot and publishes it.
///
/// A failed poll leaves the previously published snapshot in place. Only a
/// fatal runtime error (the engine stayed unreachable after all retries) stops
/// the poller.
pub struct Poller<B: SnapshotBuilder> {
    builder: B,
    publisher: SnapshotPublisher<B::Entity>,
    interval: Duration,
    clock: fn() -> u64,
    last_observed_at: u64,
}

impl<B: SnapshotBuilder> Poller<B> {
    /// Creates a poller that sleeps `interval` between two polls.
    pub fn new(builder: B, publisher: SnapshotPublisher<B::Entity>, interval: Duration) -> Self {
        Self {
            builder,
            publisher,
            interval,
            clock: unix_now,
            last_observed_at: 0,
        }
    }

    /// Replaces the wall clock used to timestamp snapshots.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Builds and publishes one snapshot.
    ///
    /// # Returns
    ///
    /// The number of published entities.
    ///
    /// # Errors
    ///
    /// Returns the builder's error; nothing is published in that case.
    pub async fn poll_once(&mut self) -> runtime::Result<usize> {
        // never let a wall clock step backwards reorder snapshots
        let observed_at = (self.clock)().max(self.last_observed_at);
        let entities = self.builder.build(observed_at).await?;
        let count = entities.len();

        self.publisher.publish(Snapshot::new(observed_at, entities));
        self.last_observed_at = observed_at;

        Ok(count)
    }

    /// Polls until a fatal error occurs.
    pub async fn run(mut self) -> Result<(), Error> {
        log::info!(
            "Polling {} snapshots every {:?}",
            B::MODE,
            self.interval
        );
        loop {
            match self.poll_once().await {
                Ok(count) => log::debug!(
                    "Published {} snapshot with {} entities@{}",
                    B::MODE,
                    count,
                    self.last_observed_at
                ),
                Err(err) if err.is_fatal() => {
                    return Err(Error::Fatal {
                        mode: B::MODE,
                        source: err,
                    });
                }
                Err(err) => log::error!(
                    "failed to poll {} snapshot, keeping the previous one: {}",
                    B::MODE,
                    err
                ),
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::snapshot::{self, ContainerEntity, ContainerStatus};

    /// Replays a fixed sequence of build results, then keeps returning
    /// empty snapshots.
    struct ScriptedBuilder {
        results: Mutex<VecDeque<runtime::Result<Vec<ContainerEntity>>>>,
        calls: Arc<AtomicUsize>,
        seen_timestamps: Arc<Mutex<Vec<u64>>>,
    }

    impl ScriptedBuilder {
        fn new(results: Vec<runtime::Result<Vec<ContainerEntity>>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: Arc::default(),
                seen_timestamps: Arc::default(),
            }
        }
    }

    impl SnapshotBuilder for ScriptedBuilder {
        type Entity = ContainerEntity;

        const MODE: &'static str = "scripted";

        async fn build(&self, observed_at: u64) -> runtime::Result<Vec<ContainerEntity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_timestamps.lock().unwrap().push(observed_at);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn container(name: &str) -> ContainerEntity {
        ContainerEntity {
            name: name.to_owned(),
            image: "nginx:latest".to_owned(),
            status: ContainerStatus::Running,
            observed_at: 0,
        }
    }

    fn api_error() -> runtime::Error {
        runtime::Error::Api {
            operation: "list containers",
            source: bollard::errors::Error::DockerResponseServerError {
                status_code: 500,
                message: "boom".to_owned(),
            },
        }
    }

    fn unreachable() -> runtime::Error {
        runtime::Error::Unreachable {
            operation: "list containers",
            attempts: 5,
            source: bollard::errors::Error::IOError {
                err: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            },
        }
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_previous_snapshot() {
        let (publisher, reader) = snapshot::channel();
        let builder = ScriptedBuilder::new(vec![Ok(vec![container("web")]), Err(api_error())]);
        let mut poller =
            Poller::new(builder, publisher, Duration::from_secs(10)).with_clock(|| 1000);

        assert!(reader.current().is_none());
        assert_eq!(poller.poll_once().await.unwrap(), 1);
        let first = reader.current().unwrap();

        assert!(poller.poll_once().await.is_err());
        let current = reader.current().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(current.entities()[0].name, "web");
    }

    #[tokio::test]
    async fn test_failed_first_poll_stays_uninitialized() {
        let (publisher, reader) = snapshot::channel();
        let builder = ScriptedBuilder::new(vec![Err(api_error())]);
        let mut poller = Poller::new(builder, publisher, Duration::from_secs(10));

        assert!(poller.poll_once().await.is_err());
        assert!(reader.current().is_none());
    }

    #[tokio::test]
    async fn test_observed_at_never_decreases() {
        let (publisher, reader) = snapshot::channel();
        let builder = ScriptedBuilder::new(Vec::new());
        let seen = Arc::clone(&builder.seen_timestamps);
        let mut poller =
            Poller::new(builder, publisher, Duration::from_secs(10)).with_clock(|| 2000);
        poller.poll_once().await.unwrap();
        assert_eq!(reader.current().unwrap().observed_at(), 2000);

        // the wall clock jumps back
        poller = poller.with_clock(|| 1500);
        poller.poll_once().await.unwrap();
        assert_eq!(reader.current().unwrap().observed_at(), 2000);
        assert_eq!(*seen.lock().unwrap(), vec![2000, 2000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_polling_after_failures() {
        let (publisher, reader) = snapshot::channel();
        let builder = ScriptedBuilder::new(vec![
            Err(api_error()),
            Ok(vec![container("web")]),
            Ok(vec![container("web"), container("api")]),
        ]);
        let calls = Arc::clone(&builder.calls);
        let poller = Poller::new(builder, publisher, Duration::from_secs(10));

        let handle = tokio::spawn(poller.run());
        // polls happen at t=0s, t=10s and t=20s
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let current = reader.current().unwrap();
        let names: Vec<&str> = current.entities().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["web", "api"]);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_fatal_error() {
        let (publisher, reader) = snapshot::channel();
        let builder = ScriptedBuilder::new(vec![Ok(vec![container("web")]), Err(unreachable())]);
        let poller = Poller::new(builder, publisher, Duration::from_secs(10));

        let err = poller.run().await.unwrap_err();
        match err {
            Error::Fatal { mode, source } => {
                assert_eq!(mode, "scripted");
                assert!(source.is_fatal());
            }
        }
        // the last good snapshot is still served
        assert_eq!(reader.current().unwrap().len(), 1);
    }
}
