//! Error taxonomy for the CRUD engines and the HTTP boundary
//!
//! Every engine failure is a typed [`CrudError`] variant so callers branch on
//! the kind, never on the message. The [`IntoResponse`] impl at the bottom is
//! the single place where kinds are mapped to transport status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::model::{BodyValidation, Violation};

/// Opaque failure raised by a storage collaborator.
///
/// The engines never retry or inspect these; they abort the request and
/// surface as a 500.
#[derive(Debug, Error)]
#[error("storage failure: {0}")]
pub struct StoreError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Error)]
pub enum CrudError {
    /// Target record, or the root parent of a nested level, does not exist
    #[error("{} not found", .id.as_deref().unwrap_or("element"))]
    NotFound { id: Option<String> },

    /// Parent and child both may exist, but the child is not owned by that parent
    #[error("relationship not found")]
    RelationshipNotFound,

    #[error("identifier must be empty on create")]
    IdentifierAlreadySet,

    #[error("body id <{body}> and path id <{path}> are different")]
    IdentifierConflict { path: String, body: String },

    #[error("invalid page token <{0}>")]
    InvalidCursor(String),

    #[error("page size must be positive, got {0}")]
    InvalidPageSize(i64),

    #[error("payload has {} violation(s)", .0.len())]
    Validation(Vec<Violation>),

    #[error("<{0}> is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// Query string parameters of the wrong type, e.g. a non-numeric `size`
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The identifier chain does not match the engine's nesting depth
    #[error("identifier chain has {actual} element(s) but the engine expects {expected}")]
    ChainDepth { expected: usize, actual: usize },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CrudError {
    pub fn not_found(id: impl ToString) -> Self {
        CrudError::NotFound {
            id: Some(id.to_string()),
        }
    }

    /// Stable machine-readable code used in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            CrudError::NotFound { .. } => "not_found",
            CrudError::RelationshipNotFound => "relationship_not_found",
            CrudError::IdentifierAlreadySet => "identifier_already_set",
            CrudError::IdentifierConflict { .. } => "identifier_conflict",
            CrudError::InvalidCursor(_) => "invalid_cursor",
            CrudError::InvalidPageSize(_) => "invalid_page_size",
            CrudError::Validation(_) => "validation",
            CrudError::InvalidIdentifier(_) => "invalid_identifier",
            CrudError::MalformedBody(_) => "malformed_body",
            CrudError::InvalidQuery(_) => "invalid_query",
            CrudError::ChainDepth { .. } => "chain_depth",
            CrudError::Storage(_) => "storage",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CrudError::NotFound { .. } | CrudError::RelationshipNotFound => StatusCode::NOT_FOUND,
            CrudError::IdentifierAlreadySet
            | CrudError::IdentifierConflict { .. }
            | CrudError::InvalidCursor(_)
            | CrudError::InvalidPageSize(_)
            | CrudError::Validation(_)
            | CrudError::InvalidIdentifier(_)
            | CrudError::MalformedBody(_)
            | CrudError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            CrudError::ChainDepth { .. } | CrudError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request aborted");
        }

        match self {
            CrudError::Validation(violations) => {
                (status, Json(BodyValidation { violations })).into_response()
            }
            other => (
                status,
                Json(json!({
                    "error": other.to_string(),
                    "code": other.code()
                })),
            )
                .into_response(),
        }
    }
}

/// Failures while loading the endpoint tree or wiring it to engines.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read endpoint file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse endpoint file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid endpoint <{path}>: {reason}")]
    InvalidEndpoint { path: String, reason: String },

    #[error("no service registered for entity <{0}>")]
    UnknownEntity(String),

    #[error("service for <{entity}> expects {service} parent level(s) but endpoint <{path}> is nested {level} deep")]
    DepthMismatch {
        entity: String,
        path: String,
        level: usize,
        service: usize,
    },

    #[error("service for <{entity}> uses {service} identifiers but the configured id-type is {configured}")]
    IdKindMismatch {
        entity: String,
        configured: String,
        service: &'static str,
    },
}
