//! Prometheus text exposition of snapshot entities.
//!
//! Rendering is pure: the output only depends on the entities, in the order
//! given, and on the status vocabulary. Every status of the vocabulary is
//! emitted even when no entity is in it, so absent states show up as zero
//! valued samples instead of missing series.
//!
//! # Metric families
//!
//! Standalone containers:
//!
//! - `docker_container_status{name,image,status}`: 1 for the current status, else 0.
//! - `docker_container_observed_timestamp_seconds{name,image}`
//! - `docker_containers{status}`: number of containers per status.
//!
//! Swarm services:
//!
//! - `swarm_service_replicas{name,image}`: replica target, `+Inf` when unbounded.
//! - `swarm_service_tasks{name,image,status}`: number of tasks per status.
//! - `swarm_task_status{service,task_id,status}`: 1 for the current status, else 0.
//! - `swarm_service_observed_timestamp_seconds{name,image}`
//! - `swarm_tasks{status}`: number of tasks per status over all services.

use std::fmt::{self, Write};

use crate::snapshot::{ContainerEntity, Entity, Replicas, ServiceEntity, Status};

/// Content type of the rendered output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// An entity type that knows its metric families.
pub trait Exposition: Entity {
    fn write_metrics(entities: &[&Self], statuses: &[Self::Status], out: &mut MetricWriter<'_>);
}

/// Renders `entities` together with the full `statuses` vocabulary.
///
/// An empty entity list is valid input and still yields the per-status totals.
pub fn render<E: Exposition>(entities: &[&E], statuses: &[E::Status]) -> String {
    let mut out = String::with_capacity(256 + entities.len() * statuses.len() * 96);
    E::write_metrics(entities, statuses, &mut MetricWriter::new(&mut out));
    out
}

/// Appends metric families and samples to a string buffer.
pub struct MetricWriter<'a> {
    out: &'a mut String,
}

impl<'a> MetricWriter<'a> {
    pub fn new(out: &'a mut String) -> Self {
        Self { out }
    }

    /// Writes the `# HELP` and `# TYPE` header of a gauge family.
    pub fn gauge(&mut self, name: &str, help: &str) {
        self.out.push_str("# HELP ");
        self.out.push_str(name);
        self.out.push(' ');
        self.out.push_str(help);
        self.out.push_str("\n# TYPE ");
        self.out.push_str(name);
        self.out.push_str(" gauge\n");
    }

    pub fn sample(&mut self, name: &str, labels: &[(&str, &str)], value: impl fmt::Display) {
        self.out.push_str(name);
        if !labels.is_empty() {
            self.out.push('{');
            for (i, (key, val)) in labels.iter().enumerate() {
                if i > 0 {
                    self.out.push(',');
                }
                self.out.push_str(key);
                self.out.push_str("=\"");
                escape_label_value(val, self.out);
                self.out.push('"');
            }
            self.out.push('}');
        }
        // writing into a String cannot fail
        let _ = writeln!(self.out, " {value}");
    }
}

fn escape_label_value(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

impl fmt::Display for Replicas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replicas::Count(n) => write!(f, "{n}"),
            Replicas::Unbounded => f.write_str("+Inf"),
        }
    }
}

impl Exposition for ContainerEntity {
    fn write_metrics(entities: &[&Self], statuses: &[Self::Status], out: &mut MetricWriter<'_>) {
        const STATUS: &str = "docker_container_status";
        const OBSERVED: &str = "docker_container_observed_timestamp_seconds";
        const TOTAL: &str = "docker_containers";

        out.gauge(
            STATUS,
            "Lifecycle status of the container, 1 for the current status.",
        );
        for container in entities {
            for status in statuses {
                out.sample(
                    STATUS,
                    &[
                        ("name", container.name.as_str()),
                        ("image", container.image.as_str()),
                        ("status", status.as_str()),
                    ],
                    u8::from(container.status == *status),
                );
            }
        }

        out.gauge(OBSERVED, "Unix time the container was last observed.");
        for container in entities {
            out.sample(
                OBSERVED,
                &[("name", container.name.as_str()), ("image", container.image.as_str())],
                container.observed_at,
            );
        }

        out.gauge(TOTAL, "Number of containers per lifecycle status.");
        for status in statuses {
            let count = entities.iter().filter(|c| c.status == *status).count();
            out.sample(TOTAL, &[("status", status.as_str())], count);
        }
    }
}

impl Exposition for ServiceEntity {
    fn write_metrics(entities: &[&Self], statuses: &[Self::Status], out: &mut MetricWriter<'_>) {
        const REPLICAS: &str = "swarm_service_replicas";
        const SERVICE_TASKS: &str = "swarm_service_tasks";
        const TASK_STATUS: &str = "swarm_task_status";
        const OBSERVED: &str = "swarm_service_observed_timestamp_seconds";
        const TOTAL: &str = "swarm_tasks";

        out.gauge(
            REPLICAS,
            "Replica target of the service, +Inf for non-replicated services.",
        );
        for service in entities {
            out.sample(
                REPLICAS,
                &[("name", service.name.as_str()), ("image", service.image.as_str())],
                service.replicas,
            );
        }

        out.gauge(SERVICE_TASKS, "Number of running-desired tasks per status.");
        for service in entities {
            for status in statuses {
                out.sample(
                    SERVICE_TASKS,
                    &[
                        ("name", service.name.as_str()),
                        ("image", service.image.as_str()),
                        ("status", status.as_str()),
                    ],
                    service.count_tasks(*status),
                );
            }
        }

        out.gauge(
            TASK_STATUS,
            "Status of the task, 1 for the current status.",
        );
        for service in entities {
            for task in &service.tasks {
                for status in statuses {
                    out.sample(
                        TASK_STATUS,
                        &[
                            ("service", service.name.as_str()),
                            ("task_id", task.id.as_str()),
                            ("status", status.as_str()),
                        ],
                        u8::from(task.status == *status),
                    );
                }
            }
        }

        out.gauge(OBSERVED, "Unix time the service was last observed.");
        for service in entities {
            out.sample(
                OBSERVED,
                &[("name", service.name.as_str()), ("image", service.image.as_str())],
                service.observed_at,
            );
        }

        out.gauge(TOTAL, "Number of running-desired tasks per status.");
        for status in statuses {
            let count: usize = entities.iter().map(|s| s.count_tasks(*status)).sum();
            out.sample(TOTAL, &[("status", status.as_str())], count);
        }
    }
}
