use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::filter;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InvalidFilter(#[from] filter::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::InvalidFilter(_) => {
                log::debug!("Rejected probe request: {}", self);
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
        }
    }
}
