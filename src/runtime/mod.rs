//! Access to the container engine.
//!
//! The snapshot builders only depend on the [`ContainerRuntime`] and
//! [`ServiceRuntime`] traits and the raw record types defined here.
//! [`DockerRuntime`] implements both against a local Docker engine.
mod docker;
mod error;
mod retry;
mod tasks;

use std::future::Future;

pub use docker::DockerRuntime;
pub use error::{Error, Result};
pub use retry::RetryPolicy;

/// A container as listed by the engine. Fields are optional because the
/// engine does not guarantee them for every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRecord {
    pub name: Option<String>,
    pub image: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    /// Replica target. Only set for services in replicated mode, where an
    /// unstated count is reported as the engine's default of one.
    pub replicas: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: Option<String>,
    pub desired_state: Option<String>,
    pub state: Option<String>,
}

/// Lists the containers of a standalone engine.
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Lists all containers, including stopped ones.
    fn list_containers(&self) -> impl Future<Output = Result<Vec<ContainerRecord>>> + Send;
}

/// Lists the services and tasks of a swarm.
pub trait ServiceRuntime: Send + Sync + 'static {
    fn list_services(&self) -> impl Future<Output = Result<Vec<ServiceRecord>>> + Send;

    /// Lists every task that belongs to the service with the given id.
    fn list_tasks(&self, service_id: &str)
    -> impl Future<Output = Result<Vec<TaskRecord>>> + Send;
}
