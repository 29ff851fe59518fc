use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use log::error;
use scylla::transport::errors::{NewSessionError, QueryError};
use serde_json::json;

use crate::handlers::INDEX_PATH;

/// Failures raised by a [`crate::store::TweetStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to connect to scylla: {0}")]
    Connect(#[from] NewSessionError),
    #[error("query failed: {0}")]
    Query(#[from] QueryError),
    #[error("malformed {table} row: {reason}")]
    Row { table: &'static str, reason: String },
}

impl StoreError {
    pub fn row(table: &'static str, reason: impl Into<String>) -> Self {
        Self::Row {
            table,
            reason: reason.into(),
        }
    }
}

/// Failures that abort a request.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The caller is not signed in; answered with a redirect to the feed.
    #[error("sign in required")]
    Unauthenticated,
    #[error("tweet not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type FeedResult<T> = Result<T, FeedError>;

impl ResponseError for FeedError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::FOUND,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Unauthenticated => HttpResponse::Found()
                .insert_header((header::LOCATION, INDEX_PATH))
                .finish(),
            Self::NotFound => HttpResponse::NotFound().json(json!({ "error": "not found" })),
            Self::Store(e) => {
                // Driver details stay in the log.
                error!("Store failure: {:?}", e);
                HttpResponse::InternalServerError()
                    .json(json!({ "error": "internal server error" }))
            }
        }
    }
}
