use std::fmt;
use std::str::FromStr;

use super::{Error, Result};

/// A fixed, ordered set of lifecycle states.
///
/// The exporter always renders every value of [`Status::ALL`], whether or not
/// any entity is currently in that state.
pub trait Status: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every value of the vocabulary, in rendering order.
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;
}

/// Lifecycle state of a standalone container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    Created,
    Restarting,
    Running,
    Removing,
    Paused,
    Exited,
    Dead,
}

impl Status for ContainerStatus {
    const ALL: &'static [Self] = &[
        Self::Created,
        Self::Restarting,
        Self::Running,
        Self::Removing,
        Self::Paused,
        Self::Exited,
        Self::Dead,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Restarting => "restarting",
            Self::Running => "running",
            Self::Removing => "removing",
            Self::Paused => "paused",
            Self::Exited => "exited",
            Self::Dead => "dead",
        }
    }
}

impl FromStr for ContainerStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a swarm task, used both for its observed and its desired state.
///
/// The engine's `allocated` state (network resources reserved, not yet
/// scheduled) has no value of its own and parses as [`TaskStatus::Pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    New,
    Pending,
    Assigned,
    Accepted,
    Preparing,
    Ready,
    Starting,
    Running,
    Complete,
    Shutdown,
    Failed,
    Rejected,
    Remove,
    Orphaned,
}

impl Status for TaskStatus {
    const ALL: &'static [Self] = &[
        Self::New,
        Self::Pending,
        Self::Assigned,
        Self::Accepted,
        Self::Preparing,
        Self::Ready,
        Self::Starting,
        Self::Running,
        Self::Complete,
        Self::Shutdown,
        Self::Failed,
        Self::Rejected,
        Self::Remove,
        Self::Orphaned,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Shutdown => "shutdown",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::Remove => "remove",
            Self::Orphaned => "orphaned",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "allocated" {
            return Ok(Self::Pending);
        }
        Self::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A top-level record of a snapshot, addressable by name.
pub trait Entity: fmt::Debug + Send + Sync + 'static {
    type Status: Status;

    /// Name used by the probe filter. Unique within one snapshot.
    fn name(&self) -> &str;
}

/// A container as seen by a standalone engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntity {
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    /// Timestamp (in UNIX epoch seconds)
    pub observed_at: u64,
}

impl Entity for ContainerEntity {
    type Status = ContainerStatus;

    fn name(&self) -> &str {
        &self.name
    }
}

/// Replica target of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replicas {
    /// Replicated service with a fixed number of replicas.
    Count(u64),
    /// Any non-replicated service (e.g. global mode), which has no fixed target.
    Unbounded,
}

/// A swarm service together with the tasks that are desired to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntity {
    pub name: String,
    pub image: String,
    pub replicas: Replicas,
    pub tasks: Vec<TaskEntity>,
    /// Timestamp (in UNIX epoch seconds)
    pub observed_at: u64,
}

impl Entity for ServiceEntity {
    type Status = TaskStatus;

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntity {
    pub id: String,
    pub desired_state: TaskStatus,
    pub status: TaskStatus,
}

impl ServiceEntity {
    /// Number of tasks currently in `status`.
    pub fn count_tasks(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|task| task.status == status).count()
    }
}

pub(crate) fn require(field: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::MissingField(field)),
    }
}
