use std::path::Path;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::ToSocketAddrs;
use tower_http::services::ServeDir;

use crate::filter::NameFilter;
use crate::render::{self, CONTENT_TYPE, Exposition};
use crate::snapshot::{SnapshotReader, Status};

mod error;

pub use error::{Error, Result};

#[derive(Debug, Default, serde::Deserialize)]
pub struct ProbeParams {
    pub include: Option<String>,
    pub exclude: Option<String>,
}

/// Renders every entity of the current snapshot.
async fn metrics<E: Exposition>(State(reader): State<SnapshotReader<E>>) -> Response {
    let snapshot = reader.current();
    let entities: Vec<&E> = snapshot
        .as_deref()
        .map(|s| s.entities().iter().collect())
        .unwrap_or_default();
    exposition(render::render(&entities, E::Status::ALL))
}

/// Renders the entities of the current snapshot selected by the query's
/// `include`/`exclude` patterns.
async fn probe<E: Exposition>(
    State(reader): State<SnapshotReader<E>>,
    Query(params): Query<ProbeParams>,
) -> Result<Response> {
    let filter = NameFilter::new(params.include.as_deref(), params.exclude.as_deref())?;
    let snapshot = reader.current();
    let entities = snapshot
        .as_deref()
        .map(|s| filter.apply(s.entities()))
        .unwrap_or_default();
    Ok(exposition(render::render(&entities, E::Status::ALL)))
}

fn exposition(body: String) -> Response {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

/// Builds the exporter's routes. Paths other than `/metrics` and `/probe`
/// are served from `static_dir`.
pub fn router<E: Exposition>(reader: SnapshotReader<E>, static_dir: impl AsRef<Path>) -> axum::Router {
    axum::Router::new()
        .route("/metrics", get(metrics::<E>))
        .route("/probe", get(probe::<E>))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(reader)
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new<E: Exposition>(reader: SnapshotReader<E>, static_dir: impl AsRef<Path>) -> Self {
        Self {
            router: router(reader, static_dir),
        }
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if `addr` cannot be bound or the server stops.
    pub async fn listen(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router.into_make_service()).await
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::snapshot::{
        self, ContainerEntity, ContainerStatus, Replicas, ServiceEntity, Snapshot, TaskEntity,
        TaskStatus,
    };

    fn container(name: &str, status: ContainerStatus) -> ContainerEntity {
        ContainerEntity {
            name: name.to_owned(),
            image: "nginx:latest".to_owned(),
            status,
            observed_at: 1000,
        }
    }

    async fn get_body(router: axum::Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn samples<'a>(body: &'a str, family: &str) -> Vec<&'a str> {
        body.lines()
            .filter(|line| !line.starts_with('#'))
            .filter(|line| {
                line.strip_prefix(family)
                    .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_metrics_before_first_poll() {
        let static_dir = tempfile::tempdir().unwrap();
        let (_publisher, reader) = snapshot::channel::<ContainerEntity>();

        let (status, content_type, body) =
            get_body(router(reader, static_dir.path()), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(CONTENT_TYPE));
        assert!(samples(&body, "docker_container_status").is_empty());
        let totals = samples(&body, "docker_containers");
        assert_eq!(totals.len(), ContainerStatus::ALL.len());
        assert!(totals.iter().all(|line| line.ends_with(" 0")));
    }

    #[tokio::test]
    async fn test_metrics_renders_current_snapshot() {
        let static_dir = tempfile::tempdir().unwrap();
        let (publisher, reader) = snapshot::channel();
        publisher.publish(Snapshot::new(
            1000,
            vec![container("web", ContainerStatus::Running)],
        ));
        let router = router(reader, static_dir.path());

        let (status, _, first) = get_body(router.clone(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(first.contains(
            "docker_container_status{name=\"web\",image=\"nginx:latest\",status=\"running\"} 1\n"
        ));
        assert!(first.contains("docker_containers{status=\"running\"} 1\n"));

        // the snapshot did not change, neither does the output
        let (_, _, second) = get_body(router, "/metrics").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_probe_filters_by_name() {
        let static_dir = tempfile::tempdir().unwrap();
        let (publisher, reader) = snapshot::channel();
        publisher.publish(Snapshot::new(
            1000,
            vec![
                container("web-1", ContainerStatus::Running),
                container("web-test", ContainerStatus::Running),
                container("api", ContainerStatus::Exited),
            ],
        ));

        let (status, _, body) = get_body(
            router(reader, static_dir.path()),
            "/probe?include=web.*&exclude=web-test",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let lines = samples(&body, "docker_container_status");
        assert_eq!(lines.len(), ContainerStatus::ALL.len());
        assert!(lines.iter().all(|line| line.contains("name=\"web-1\"")));
        assert!(body.contains("docker_containers{status=\"running\"} 1\n"));
        assert!(body.contains("docker_containers{status=\"exited\"} 0\n"));
    }

    #[tokio::test]
    async fn test_probe_without_patterns_matches_metrics() {
        let static_dir = tempfile::tempdir().unwrap();
        let (publisher, reader) = snapshot::channel();
        publisher.publish(Snapshot::new(
            1000,
            vec![
                container("web", ContainerStatus::Running),
                container("db", ContainerStatus::Paused),
            ],
        ));
        let router = router(reader, static_dir.path());

        let (_, _, metrics) = get_body(router.clone(), "/metrics").await;
        let (_, _, probe) = get_body(router.clone(), "/probe").await;
        let (_, _, empty) = get_body(router, "/probe?include=&exclude=").await;
        assert_eq!(metrics, probe);
        assert_eq!(metrics, empty);
    }

    #[tokio::test]
    async fn test_probe_rejects_invalid_pattern() {
        let static_dir = tempfile::tempdir().unwrap();
        let (_publisher, reader) = snapshot::channel::<ContainerEntity>();

        let router = router(reader, static_dir.path());

        let (status, _, body) = get_body(router.clone(), "/probe?include=web%28").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("invalid include pattern"));

        // `web)|(?:.*` must not turn into a substring match
        let (status, _, _) =
            get_body(router, "/probe?include=web%29%7C%28%3F%3A.%2A").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_service_metrics() {
        let static_dir = tempfile::tempdir().unwrap();
        let (publisher, reader) = snapshot::channel();
        publisher.publish(Snapshot::new(
            1000,
            vec![ServiceEntity {
                name: "agent".to_owned(),
                image: "agent:1".to_owned(),
                replicas: Replicas::Unbounded,
                tasks: vec![TaskEntity {
                    id: "agent/t1".to_owned(),
                    desired_state: TaskStatus::Running,
                    status: TaskStatus::Running,
                }],
                observed_at: 1000,
            }],
        ));

        let (status, _, body) = get_body(router(reader, static_dir.path()), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("swarm_service_replicas{name=\"agent\",image=\"agent:1\"} +Inf\n"));
        assert_eq!(samples(&body, "swarm_tasks").len(), TaskStatus::ALL.len());
    }

    #[tokio::test]
    async fn test_filtered_services_keep_all_tasks() {
        let static_dir = tempfile::tempdir().unwrap();
        let (publisher, reader) = snapshot::channel();
        let service = |name: &str, task_ids: &[&str]| ServiceEntity {
            name: name.to_owned(),
            image: format!("{name}:1"),
            replicas: Replicas::Count(task_ids.len() as u64),
            tasks: task_ids
                .iter()
                .map(|id| TaskEntity {
                    id: (*id).to_owned(),
                    desired_state: TaskStatus::Running,
                    status: TaskStatus::Running,
                })
                .collect(),
            observed_at: 1000,
        };
        publisher.publish(Snapshot::new(
            1000,
            vec![
                service("api", &["agent/t1", "api/t2"]),
                service("agent", &["agent/t3"]),
            ],
        ));
        let router = router(reader, static_dir.path());

        // task ids never take part in name matching
        let (status, _, body) = get_body(router.clone(), "/probe?include=api").await;
        assert_eq!(status, StatusCode::OK);
        let tasks = samples(&body, "swarm_task_status");
        assert_eq!(tasks.len(), 2 * TaskStatus::ALL.len());
        assert!(tasks.iter().all(|line| line.contains("service=\"api\"")));
        assert!(tasks.iter().any(|line| line.contains("task_id=\"agent/t1\"")));
        assert!(body.contains("swarm_tasks{status=\"running\"} 2\n"));

        let (_, _, body) = get_body(router, "/probe?exclude=agent.*").await;
        assert_eq!(
            samples(&body, "swarm_task_status").len(),
            2 * TaskStatus::ALL.len()
        );
        assert!(body.contains("swarm_service_replicas{name=\"api\",image=\"api:1\"} 2\n"));
        assert!(!body.contains("name=\"agent\""));
    }

    #[tokio::test]
    async fn test_static_files_are_served() {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("index.html"), "<h1>exporter</h1>").unwrap();
        let (_publisher, reader) = snapshot::channel::<ContainerEntity>();
        let router = router(reader, static_dir.path());

        let (status, _, body) = get_body(router.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>exporter</h1>");

        let (status, _, _) = get_body(router, "/missing.css").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
