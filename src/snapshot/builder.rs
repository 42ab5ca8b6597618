//! Turns raw runtime records into snapshot entities.
//!
//! There is one builder per exporter mode. The mode is chosen once at startup
//! and the rest of the pipeline is generic over the builder's entity type.
//!
//! Records with missing or unknown fields are skipped and logged. A failing
//! listing call fails the whole build, so a poll never publishes a partial
//! result.

use std::future::Future;

use crate::error::ResultOkLogExt;
use crate::render::Exposition;
use crate::runtime::{
    self, ContainerRecord, ContainerRuntime, ServiceRecord, ServiceRuntime, TaskRecord,
};

use super::model::require;
use super::{
    ContainerEntity, RecordError, Replicas, ServiceEntity, Status, TaskEntity, TaskStatus,
};

/// Placeholder used in log messages for records without a usable identifier.
const UNNAMED: &str = "<unnamed>";

/// Produces the entities of one poll cycle.
pub trait SnapshotBuilder: Send + Sync + 'static {
    type Entity: Exposition;

    /// Short name of the exporter mode, used in log messages.
    const MODE: &'static str;

    /// Queries the runtime and returns the entities observed at `observed_at`.
    fn build(
        &self,
        observed_at: u64,
    ) -> impl Future<Output = runtime::Result<Vec<Self::Entity>>> + Send;
}

/// Builds container snapshots from a standalone engine.
#[derive(Debug)]
pub struct ContainerSnapshotBuilder<R> {
    runtime: R,
}

impl<R: ContainerRuntime> ContainerSnapshotBuilder<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }
}

impl<R: ContainerRuntime> SnapshotBuilder for ContainerSnapshotBuilder<R> {
    type Entity = ContainerEntity;

    const MODE: &'static str = "container";

    async fn build(&self, observed_at: u64) -> runtime::Result<Vec<ContainerEntity>> {
        let records = self.runtime.list_containers().await?;
        log::trace!("Listed {} containers", records.len());

        Ok(records
            .into_iter()
            .filter_map(|record| container_from_record(record, observed_at).ok_log())
            .collect())
    }
}

fn container_from_record(
    record: ContainerRecord,
    observed_at: u64,
) -> Result<ContainerEntity, RecordError> {
    let id = record.name.clone().unwrap_or_else(|| UNNAMED.to_owned());
    parse_container(record, observed_at).map_err(|source| RecordError {
        kind: "container",
        id,
        source,
    })
}

fn parse_container(record: ContainerRecord, observed_at: u64) -> super::Result<ContainerEntity> {
    Ok(ContainerEntity {
        name: require("name", record.name)?,
        image: require("image", record.image)?,
        status: require("state", record.state)?.parse()?,
        observed_at,
    })
}

/// Builds service snapshots from a swarm manager.
///
/// Tasks are queried per service and only tasks whose desired state is
/// `running` become part of the entity.
#[derive(Debug)]
pub struct ServiceSnapshotBuilder<R> {
    runtime: R,
}

impl<R: ServiceRuntime> ServiceSnapshotBuilder<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }
}

impl<R: ServiceRuntime> SnapshotBuilder for ServiceSnapshotBuilder<R> {
    type Entity = ServiceEntity;

    const MODE: &'static str = "service";

    async fn build(&self, observed_at: u64) -> runtime::Result<Vec<ServiceEntity>> {
        let records = self.runtime.list_services().await?;
        log::trace!("Listed {} services", records.len());

        let mut entities = Vec::with_capacity(records.len());
        for record in records {
            let Some(service) = service_from_record(record).ok_log() else {
                continue;
            };

            let tasks = self
                .runtime
                .list_tasks(&service.id)
                .await?
                .into_iter()
                .filter(|task| task.desired_state.as_deref() == Some(TaskStatus::Running.as_str()))
                .filter_map(|task| task_from_record(&service.name, task).ok_log())
                .collect();

            entities.push(ServiceEntity {
                name: service.name,
                image: service.image,
                replicas: service.replicas,
                tasks,
                observed_at,
            });
        }

        Ok(entities)
    }
}

/// The validated part of a service record, before its tasks are known.
struct PendingService {
    id: String,
    name: String,
    image: String,
    replicas: Replicas,
}

fn service_from_record(record: ServiceRecord) -> Result<PendingService, RecordError> {
    let id = record
        .name
        .clone()
        .or_else(|| record.id.clone())
        .unwrap_or_else(|| UNNAMED.to_owned());
    parse_service(record).map_err(|source| RecordError {
        kind: "service",
        id,
        source,
    })
}

fn parse_service(record: ServiceRecord) -> super::Result<PendingService> {
    Ok(PendingService {
        id: require("id", record.id)?,
        name: require("name", record.name)?,
        image: require("image", record.image)?,
        replicas: record.replicas.map_or(Replicas::Unbounded, Replicas::Count),
    })
}

fn task_from_record(service: &str, record: TaskRecord) -> Result<TaskEntity, RecordError> {
    let id = format!(
        "{}/{}",
        service,
        record.id.as_deref().unwrap_or(UNNAMED)
    );
    parse_task(record).map_err(|source| RecordError {
        kind: "task",
        id,
        source,
    })
}

fn parse_task(record: TaskRecord) -> super::Result<TaskEntity> {
    Ok(TaskEntity {
        id: require("id", record.id)?,
        desired_state: require("desired_state", record.desired_state)?.parse()?,
        status: require("state", record.state)?.parse()?,
    })
}
