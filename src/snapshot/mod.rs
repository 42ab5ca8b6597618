//! Point-in-time captures of the container engine and their publication.
//!
//! A [`Snapshot`] is produced once per poll cycle and never modified after it
//! has been published. The poller owns the only [`SnapshotPublisher`]; HTTP
//! handlers hold cheap [`SnapshotReader`] clones and borrow the current
//! snapshot for the duration of one render.
//!
//! Publication replaces a single `Arc` inside a [`tokio::sync::watch`] channel,
//! so a reader either sees the previous snapshot or the new one, never a
//! partially built one.

pub mod builder;
mod error;
mod model;

use std::sync::Arc;

use tokio::sync::watch;

pub use builder::{ContainerSnapshotBuilder, ServiceSnapshotBuilder, SnapshotBuilder};
pub use error::{Error, RecordError, Result};
pub use model::{
    ContainerEntity, ContainerStatus, Entity, Replicas, ServiceEntity, Status, TaskEntity,
    TaskStatus,
};

/// The entities observed by one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<E> {
    /// Timestamp (in UNIX epoch seconds)
    observed_at: u64,
    entities: Vec<E>,
}

impl<E: Entity> Snapshot<E> {
    pub fn new(observed_at: u64, entities: Vec<E>) -> Self {
        Self {
            observed_at,
            entities,
        }
    }

    pub fn observed_at(&self) -> u64 {
        self.observed_at
    }

    pub fn entities(&self) -> &[E] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Creates a connected publisher/reader pair with no snapshot published yet.
pub fn channel<E: Entity>() -> (SnapshotPublisher<E>, SnapshotReader<E>) {
    let (tx, rx) = watch::channel(None);
    (SnapshotPublisher { tx }, SnapshotReader { rx })
}

/// Write side of the snapshot cell. Held by the poller.
#[derive(Debug)]
pub struct SnapshotPublisher<E> {
    tx: watch::Sender<Option<Arc<Snapshot<E>>>>,
}

impl<E: Entity> SnapshotPublisher<E> {
    /// Replaces the current snapshot.
    ///
    /// Readers that already hold the previous snapshot keep using it until
    /// they drop their reference.
    pub fn publish(&self, snapshot: Snapshot<E>) {
        self.tx.send_replace(Some(Arc::new(snapshot)));
    }

    /// Creates another reader for the same cell.
    pub fn subscribe(&self) -> SnapshotReader<E> {
        SnapshotReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of the snapshot cell.
#[derive(Debug)]
pub struct SnapshotReader<E> {
    rx: watch::Receiver<Option<Arc<Snapshot<E>>>>,
}

// not derived: cloning a reader must not require `E: Clone`
impl<E> Clone for SnapshotReader<E> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<E: Entity> SnapshotReader<E> {
    /// Returns the most recently published snapshot, or `None` before the
    /// first successful poll.
    pub fn current(&self) -> Option<Arc<Snapshot<E>>> {
        self.rx.borrow().clone()
    }
}
