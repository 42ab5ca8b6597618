#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create docker client: {0}")]
    Client(#[source] bollard::errors::Error),
    #[error("docker engine rejected `{operation}`: {source}")]
    Api {
        operation: &'static str,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("failed to reach docker engine during `{operation}`: {source}")]
    Connection {
        operation: &'static str,
        #[source]
        source: bollard::errors::Error,
    },
    #[error("docker engine unreachable after {attempts} attempts during `{operation}`: {source}")]
    Unreachable {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: bollard::errors::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Sorts a client error into an engine-side rejection or a transport failure.
    pub fn classify(operation: &'static str, source: bollard::errors::Error) -> Self {
        use bollard::errors::Error as Bollard;

        match source {
            Bollard::DockerResponseServerError { .. }
            | Bollard::JsonDataError { .. }
            | Bollard::JsonSerdeError { .. } => Self::Api { operation, source },
            _ => Self::Connection { operation, source },
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Whether the process cannot make progress anymore and must be restarted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Client(_) | Self::Unreachable { .. })
    }
}
