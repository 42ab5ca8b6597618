/// Reasons a single runtime record cannot become an entity.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("unknown status `{0}`")]
    UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A record that was excluded from a snapshot.
#[derive(Debug, thiserror::Error)]
#[error("skipping {kind} `{id}`: {source}")]
pub struct RecordError {
    pub kind: &'static str,
    pub id: String,
    #[source]
    pub source: Error,
}
