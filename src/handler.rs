//! HTTP request handlers for nested CRUD endpoints
//!
//! Every configured endpoint node gets the same five handlers, each bound to
//! an [`EndpointState`] that knows the node's engine, nesting level and page
//! defaults. The handlers only do marshaling:
//! - Extract the identifier chain from the request path
//! - Decode JSON bodies and page tokens
//! - Call the engine and wrap the result in the response envelope
//!
//! Engine errors are returned as [`CrudError`], which renders itself.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use crate::config::EndpointNode;
use crate::endpoint::EndpointService;
use crate::error::CrudError;
use crate::model::{Envelope, ListParams};
use crate::pagination::{self, PageRequest};

/// Header consulted for a page token when the query has none
pub const PAGE_HEADER: &str = "page";

/// Per-endpoint state shared by the handlers of one node
pub struct EndpointState {
    pub service: Arc<dyn EndpointService>,
    /// Number of ancestor ids in the path
    pub level: usize,
    pub page_size: u32,
    pub max_page_size: Option<u32>,
    /// Segments of the item route template, e.g. `["api", "products", "{id0}"]`
    template: Vec<String>,
}

impl EndpointState {
    pub fn new(
        service: Arc<dyn EndpointService>,
        node: &EndpointNode,
        max_page_size: Option<u32>,
    ) -> Self {
        Self {
            service,
            level: node.level,
            page_size: node.page_size,
            max_page_size,
            template: item_route(node)
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Identifier segments of `uri`, outermost first
    ///
    /// For a collection request this is the ancestor chain; for an item
    /// request the target id is appended.
    fn path_ids(&self, uri: &Uri) -> Vec<String> {
        self.template
            .iter()
            .zip(uri.path().split('/').filter(|s| !s.is_empty()))
            .filter(|(template, _)| template.starts_with('{'))
            .map(|(_, segment)| segment.to_string())
            .collect()
    }

    /// Splits an item request into its ancestor chain and target id
    fn item_ids(&self, uri: &Uri) -> Result<(Vec<String>, String), CrudError> {
        let mut ids = self.path_ids(uri);
        match ids.pop() {
            Some(id) if ids.len() == self.level => Ok((ids, id)),
            _ => Err(CrudError::ChainDepth {
                expected: self.level + 1,
                actual: ids.len(),
            }),
        }
    }

    fn page_request(
        &self,
        params: &ListParams,
        headers: &HeaderMap,
    ) -> Result<PageRequest, CrudError> {
        let token = params
            .page
            .as_deref()
            .or_else(|| headers.get(PAGE_HEADER).and_then(|v| v.to_str().ok()));

        Ok(pagination::decode(token, params.size, self.page_size)?.capped(self.max_page_size))
    }
}

/// Item route of a node: its collection route plus `/{id<level>}`
pub fn item_route(node: &EndpointNode) -> String {
    format!("{}/{{id{}}}", node.route, node.level)
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, CrudError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| CrudError::MalformedBody(rejection.body_text()))
}

fn list_params(params: Result<Query<ListParams>, QueryRejection>) -> Result<ListParams, CrudError> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| CrudError::InvalidQuery(rejection.body_text()))
}

/// Lists one page of the collection
///
/// # Query Parameters
///
/// - `page` (optional) - Token from a previous response (`F0S3`, `P2S3`); also
///   accepted as a `page` header
/// - `size` (optional) - Page size when no valid token is given
///
/// # Response
///
/// ```json
/// {
///   "data": [...],
///   "meta": { "first": "F0S3", "prev": "F0S3", "next": "P2S3" }
/// }
/// ```
///
/// Unknown or malformed tokens silently restart at the first page. A `size`
/// that is not an integer answers **400** `invalid_query`.
pub async fn list_records(
    State(endpoint): State<Arc<EndpointState>>,
    uri: Uri,
    params: Result<Query<ListParams>, QueryRejection>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, CrudError> {
    let params = list_params(params)?;
    let chain = endpoint.path_ids(&uri);

    // Token from the query, then the header, then size and node default
    let request = endpoint.page_request(&params, &headers)?;

    let page = endpoint.service.list(&chain, &request)?;

    // Tokens are derived from the page actually served
    let meta = pagination::encode(&page);

    Ok(Json(Envelope::with_meta(page.content, meta)))
}

/// Creates a record under the parents named in the path
///
/// # Response
///
/// - **201 Created** - `{ "data": <record> }` with a `Location` header
/// - **400 Bad Request** - Body carries an id, or fails validation
/// - **404 Not Found** - Direct parent does not exist, or an ancestor hop is broken
pub async fn create_record(
    State(endpoint): State<Arc<EndpointState>>,
    uri: Uri,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, CrudError> {
    let chain = endpoint.path_ids(&uri);
    let created = endpoint.service.create(&chain, json_body(body)?)?;

    // Location points at the new item under the same collection path
    let location = format!("{}/{}", uri.path().trim_end_matches('/'), created.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(Envelope::of(created.data)),
    ))
}

pub async fn get_record(
    State(endpoint): State<Arc<EndpointState>>,
    uri: Uri,
) -> Result<impl IntoResponse, CrudError> {
    let (chain, id) = endpoint.item_ids(&uri)?;

    Ok(Json(Envelope::of(endpoint.service.get(&chain, &id)?)))
}

/// Replaces the mutable values of a record
///
/// A body `id`, when present, must equal the path id.
pub async fn update_record(
    State(endpoint): State<Arc<EndpointState>>,
    uri: Uri,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, CrudError> {
    let (chain, id) = endpoint.item_ids(&uri)?;
    let updated = endpoint.service.update(&chain, &id, json_body(body)?)?;

    Ok(Json(Envelope::of(updated)))
}

/// Deletes a record, answering **204 No Content**
pub async fn delete_record(
    State(endpoint): State<Arc<EndpointState>>,
    uri: Uri,
) -> Result<impl IntoResponse, CrudError> {
    let (chain, id) = endpoint.item_ids(&uri)?;
    endpoint.service.delete(&chain, &id)?;

    Ok(StatusCode::NO_CONTENT)
}
