use bollard::Docker;
use bollard::container::ListContainersOptions;
use bollard::models::{ContainerSummary, Service, Task};
use bollard::service::ListServicesOptions;

use super::tasks::TaskClient;

use super::{
    ContainerRecord, ContainerRuntime, Error, Result, RetryPolicy, ServiceRecord, ServiceRuntime,
    TaskRecord,
};

/// Runtime client for the local docker engine (`DOCKER_HOST` or the default
/// unix socket).
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
    tasks: TaskClient,
    retry: RetryPolicy,
}

impl DockerRuntime {
    /// Connects to the local docker engine and waits until it answers a ping.
    ///
    /// # Errors
    ///
    /// * [`Error::Client`] if the client cannot be configured from the environment.
    /// * [`Error::Unreachable`] if the engine did not answer within the retry budget.
    pub async fn connect(retry: RetryPolicy) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(Error::Client)?;
        let version = retry.run("ping", || docker.ping()).await?;
        log::debug!("Docker engine answered ping: {}", version);

        Ok(Self {
            docker,
            tasks: TaskClient::from_env(),
            retry,
        })
    }
}

impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        let containers = self
            .retry
            .run("list containers", || {
                self.docker
                    .list_containers(Some(ListContainersOptions::<String> {
                        all: true,
                        ..Default::default()
                    }))
            })
            .await?;

        Ok(containers.into_iter().map(ContainerRecord::from).collect())
    }
}

impl ServiceRuntime for DockerRuntime {
    async fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        let services = self
            .retry
            .run("list services", || {
                self.docker
                    .list_services(Some(ListServicesOptions::<String>::default()))
            })
            .await?;

        Ok(services.into_iter().map(ServiceRecord::from).collect())
    }

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<TaskRecord>> {
        let tasks = self
            .retry
            .run("list tasks", || self.tasks.list_tasks(service_id))
            .await?;

        Ok(tasks.into_iter().map(TaskRecord::from).collect())
    }
}

impl From<ContainerSummary> for ContainerRecord {
    fn from(value: ContainerSummary) -> Self {
        // The engine reports names with a leading slash, e.g. `/web`.
        let name = value
            .names
            .and_then(|names| names.into_iter().next())
            .map(|name| name.trim_start_matches('/').to_owned());

        Self {
            name,
            image: value.image,
            state: value.state,
        }
    }
}

impl From<Service> for ServiceRecord {
    fn from(value: Service) -> Self {
        let spec = value.spec.unwrap_or_default();
        let image = spec
            .task_template
            .and_then(|template| template.container_spec)
            .and_then(|container| container.image);
        // a replicated service without an explicit count runs one replica
        let replicas = spec
            .mode
            .and_then(|mode| mode.replicated)
            .map(|replicated| match replicated.replicas {
                Some(replicas) => u64::try_from(replicas).unwrap_or(0),
                None => DEFAULT_REPLICAS,
            });

        Self {
            id: value.id,
            name: spec.name,
            image,
            replicas,
        }
    }
}

impl From<Task> for TaskRecord {
    fn from(value: Task) -> Self {
        Self {
            id: value.id,
            desired_state: value.desired_state.map(|state| state.to_string()),
            state: value
                .status
                .and_then(|status| status.state)
                .map(|state| state.to_string()),
        }
    }
}

const DEFAULT_REPLICAS: u64 = 1;
