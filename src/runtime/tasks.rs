//! Task listing against the engine's HTTP API.
//!
//! `GET /tasks` is issued directly over the engine socket and the response is
//! decoded into bollard's [`Task`] model, so the rest of the runtime treats
//! tasks exactly like the records bollard lists itself.

use std::collections::HashMap;
use std::path::PathBuf;

use bollard::errors::Error as Bollard;
use bollard::models::Task;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Request, StatusCode, header};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};

const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// Where the engine listens, as configured through `DOCKER_HOST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Parses a `DOCKER_HOST` value; unset or empty means the default socket.
    pub fn from_docker_host(host: Option<&str>) -> Self {
        let Some(host) = host.map(str::trim).filter(|host| !host.is_empty()) else {
            return Self::Unix(PathBuf::from(DEFAULT_SOCKET));
        };
        if let Some(path) = host.strip_prefix("unix://") {
            return Self::Unix(PathBuf::from(path));
        }
        let addr = host
            .strip_prefix("tcp://")
            .or_else(|| host.strip_prefix("http://"))
            .unwrap_or(host);
        Self::Tcp(addr.trim_end_matches('/').to_owned())
    }

    fn host(&self) -> &str {
        match self {
            Self::Unix(_) => "localhost",
            Self::Tcp(addr) => addr,
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Debug, Clone)]
pub struct TaskClient {
    endpoint: Endpoint,
}

impl TaskClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    pub fn from_env() -> Self {
        Self::new(Endpoint::from_docker_host(
            std::env::var("DOCKER_HOST").ok().as_deref(),
        ))
    }

    /// Lists the tasks of one service.
    ///
    /// Errors are reported with bollard's error type so they are classified
    /// and retried like every other engine call.
    pub async fn list_tasks(&self, service_id: &str) -> Result<Vec<Task>, Bollard> {
        let path = tasks_path(service_id)?;
        let (status, body) = match &self.endpoint {
            Endpoint::Unix(socket) => {
                let stream = UnixStream::connect(socket).await.map_err(io_error)?;
                get(stream, self.endpoint.host(), &path).await?
            }
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await.map_err(io_error)?;
                get(stream, self.endpoint.host(), &path).await?
            }
        };

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorMessage>(&body)
                .map(|err| err.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(Bollard::DockerResponseServerError {
                status_code: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|err| Bollard::JsonSerdeError { err })
    }
}

fn tasks_path(service_id: &str) -> Result<String, Bollard> {
    let filters = serde_json::to_string(&HashMap::from([("service", [service_id])]))
        .map_err(|err| Bollard::JsonSerdeError { err })?;
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("filters", &filters)
        .finish();
    Ok(format!("/tasks?{query}"))
}

async fn get<S>(stream: S, host: &str, path: &str) -> Result<(StatusCode, Bytes), Bollard>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) =
        hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(TokioIo::new(stream))
            .await
            .map_err(transport)?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            log::debug!("Engine connection closed: {}", err);
        }
    });

    let request = Request::get(path)
        .header(header::HOST, host)
        .body(Empty::<Bytes>::new())
        .map_err(transport)?;
    let response = sender.send_request(request).await.map_err(transport)?;
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(transport)?
        .to_bytes();

    Ok((status, body))
}

fn io_error(err: std::io::Error) -> Bollard {
    Bollard::IOError { err }
}

fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Bollard {
    io_error(std::io::Error::other(err))
}
