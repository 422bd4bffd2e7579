//! JSON-facing adapter over typed engines
//!
//! Routes are built from a configuration tree at runtime, while engines are
//! generic over their record type. [`EndpointService`] bridges the two: it
//! takes raw path segments and JSON bodies, parses them into the engine's
//! identifier and record types, validates the payload, runs the engine and
//! renders the result back to JSON through the endpoint's [`DtoConverter`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::dto::{DtoConverter, DtoType, EntityAsDto};
use crate::error::CrudError;
use crate::identifier::{IdChain, Identifier};
use crate::model::Record;
use crate::pagination::{Page, PageRequest};
use crate::service::CrudService;

type IdOf<S> = <<S as CrudService>::Record as Record>::Id;

/// Answer of a create: the new record's id and its rendered body
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub id: String,
    pub data: Value,
}

pub trait EndpointService: Send + Sync {
    /// Number of ancestor ids the wrapped engine consumes
    fn depth(&self) -> usize;

    /// `Identifier::KIND` of the wrapped engine
    fn id_kind(&self) -> &'static str;

    fn create(&self, chain: &[String], body: Value) -> Result<Created, CrudError>;

    fn get(&self, chain: &[String], id: &str) -> Result<Value, CrudError>;

    fn update(&self, chain: &[String], id: &str, body: Value) -> Result<Value, CrudError>;

    fn delete(&self, chain: &[String], id: &str) -> Result<(), CrudError>;

    fn list(&self, chain: &[String], page: &PageRequest) -> Result<Page<Value>, CrudError>;
}

/// [`EndpointService`] for one typed engine
pub struct TypedEndpoint<S, C = EntityAsDto> {
    service: S,
    converter: C,
}

impl<S: CrudService> TypedEndpoint<S> {
    pub fn new(service: S) -> Self {
        Self::with_converter(service, EntityAsDto)
    }
}

impl<S, C> TypedEndpoint<S, C>
where
    S: CrudService,
    C: DtoConverter<S::Record>,
{
    pub fn with_converter(service: S, converter: C) -> Self {
        Self { service, converter }
    }

    fn chain(segments: &[String]) -> Result<IdChain<IdOf<S>>, CrudError> {
        IdChain::parse(segments)
    }

    /// Converts and validates a request body
    fn body(&self, dto: DtoType, body: Value) -> Result<S::Record, CrudError> {
        let record = self.converter.from_dto(dto, body)?;

        let violations = record.validate();
        if !violations.is_empty() {
            return Err(CrudError::Validation(violations));
        }
        Ok(record)
    }

    fn render(&self, dto: DtoType, record: &S::Record) -> Result<Value, CrudError> {
        self.converter.to_dto(dto, record)
    }
}

impl<S, C> EndpointService for TypedEndpoint<S, C>
where
    S: CrudService,
    C: DtoConverter<S::Record>,
{
    fn depth(&self) -> usize {
        self.service.depth()
    }

    fn id_kind(&self) -> &'static str {
        <IdOf<S> as Identifier>::KIND
    }

    fn create(&self, chain: &[String], body: Value) -> Result<Created, CrudError> {
        let mut chain = Self::chain(chain)?;
        let record = self.body(DtoType::Post, body)?;

        let created = self.service.create(&mut chain, record)?;
        let id = created.id().ok_or(CrudError::NotFound { id: None })?;

        Ok(Created {
            id: id.to_string(),
            data: self.render(DtoType::Result, &created)?,
        })
    }

    fn get(&self, chain: &[String], id: &str) -> Result<Value, CrudError> {
        let mut chain = Self::chain(chain)?;
        let id = <IdOf<S>>::parse_segment(id)?;

        self.render(DtoType::Get, &self.service.get(&mut chain, id)?)
    }

    fn update(&self, chain: &[String], id: &str, body: Value) -> Result<Value, CrudError> {
        let mut chain = Self::chain(chain)?;
        let id = <IdOf<S>>::parse_segment(id)?;
        let record = self.body(DtoType::Put, body)?;

        self.render(DtoType::Result, &self.service.update(&mut chain, id, record)?)
    }

    fn delete(&self, chain: &[String], id: &str) -> Result<(), CrudError> {
        let mut chain = Self::chain(chain)?;
        let id = <IdOf<S>>::parse_segment(id)?;

        self.service.delete_by_id(&mut chain, id)
    }

    fn list(&self, chain: &[String], page: &PageRequest) -> Result<Page<Value>, CrudError> {
        let mut chain = Self::chain(chain)?;

        self.service
            .list(&mut chain, page)?
            .try_map(|record| self.render(DtoType::List, &record))
    }
}

/// Engines by entity name, as referenced by the `entity` key of the
/// endpoint configuration
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn EndpointService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` under `entity`, replacing any previous engine.
    /// Bodies and answers are the record itself.
    pub fn register<S>(&mut self, entity: impl Into<String>, service: S) -> &mut Self
    where
        S: CrudService + 'static,
    {
        self.register_with(entity, service, EntityAsDto)
    }

    /// Registers `service` with its own body and answer shapes
    pub fn register_with<S, C>(
        &mut self,
        entity: impl Into<String>,
        service: S,
        converter: C,
    ) -> &mut Self
    where
        S: CrudService + 'static,
        C: DtoConverter<S::Record> + 'static,
    {
        self.services.insert(
            entity.into(),
            Arc::new(TypedEndpoint::with_converter(service, converter)),
        );
        self
    }

    pub fn get(&self, entity: &str) -> Option<Arc<dyn EndpointService>> {
        self.services.get(entity).cloned()
    }
}
