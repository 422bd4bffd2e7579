//! Route definitions for the configured endpoint tree
//!
//! Walks the [`CrudConfig`] tree once and registers, for a node nested
//! `level` deep:
//!
//! - `GET    <route>`            - list (verb `list`)
//! - `POST   <route>`            - create (verb `create`)
//! - `GET    <route>/{id<level>}` - get (verb `get`)
//! - `PUT    <route>/{id<level>}` - update (verb `update`)
//! - `DELETE <route>/{id<level>}` - delete (verb `delete`)
//!
//! where `<route>` is e.g. `/api/products/{id0}/details/{id1}/languages`.

use std::sync::Arc;

use axum::routing::{delete, get, post, put, MethodRouter};
use axum::Router;

use crate::config::{CrudConfig, EndpointNode, Verb};
use crate::endpoint::ServiceRegistry;
use crate::error::ConfigError;
use crate::handler::{
    create_record, delete_record, get_record, item_route, list_records, update_record,
    EndpointState,
};

/// Everything needed to build the router, assembled once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CrudConfig>,
    pub registry: ServiceRegistry,
}

/// Creates the router for every node of the endpoint tree
///
/// # Errors
///
/// Fails when a node references an entity with no registered engine, or when
/// the engine's nesting depth or identifier kind does not fit the node.
///
/// # Example Usage
///
/// ```no_run
/// # use std::sync::Arc;
/// # use nestcrud::{catalog, config::CrudConfig, database::init_db, route::{create_app, AppState}};
/// let db = Arc::new(init_db("data.db").unwrap());
/// let state = AppState {
///     config: Arc::new(CrudConfig::load("endpoints.yaml").unwrap()),
///     registry: catalog::registry(db).unwrap(),
/// };
/// let app = create_app(state).unwrap();
/// // axum::serve(listener, app).await.unwrap();
/// ```
pub fn create_app(state: AppState) -> Result<Router, ConfigError> {
    let mut app = Router::new();

    for node in state.config.nodes() {
        app = app.merge(endpoint_routes(&state, node)?);
    }

    Ok(app)
}

fn endpoint_routes(state: &AppState, node: &EndpointNode) -> Result<Router, ConfigError> {
    let service = state
        .registry
        .get(&node.entity)
        .ok_or_else(|| ConfigError::UnknownEntity(node.entity.clone()))?;

    if service.depth() != node.level {
        return Err(ConfigError::DepthMismatch {
            entity: node.entity.clone(),
            path: node.route.clone(),
            level: node.level,
            service: service.depth(),
        });
    }
    if service.id_kind() != state.config.id_type {
        return Err(ConfigError::IdKindMismatch {
            entity: node.entity.clone(),
            configured: state.config.id_type.clone(),
            service: service.id_kind(),
        });
    }

    let endpoint = Arc::new(EndpointState::new(
        service,
        node,
        state.config.max_page_size,
    ));

    let mut collection: Option<MethodRouter<Arc<EndpointState>>> = None;
    if node.allows(Verb::List) {
        collection = Some(get(list_records));
    }
    if node.allows(Verb::Create) {
        collection = Some(match collection {
            Some(methods) => methods.post(create_record),
            None => post(create_record),
        });
    }

    let mut item: Option<MethodRouter<Arc<EndpointState>>> = None;
    if node.allows(Verb::Get) {
        item = Some(get(get_record));
    }
    if node.allows(Verb::Update) {
        item = Some(match item {
            Some(methods) => methods.put(update_record),
            None => put(update_record),
        });
    }
    if node.allows(Verb::Delete) {
        item = Some(match item {
            Some(methods) => methods.delete(delete_record),
            None => delete(delete_record),
        });
    }

    let mut router = Router::new();
    if let Some(methods) = collection {
        router = router.route(&node.route, methods);
    }
    if let Some(methods) = item {
        router = router.route(&item_route(node), methods);
    }

    tracing::info!(
        verbs = ?node.verbs,
        parent = node.parent.as_deref().unwrap_or("-"),
        "crud endpoint {} was created",
        node.route
    );

    Ok(router.with_state(endpoint))
}
