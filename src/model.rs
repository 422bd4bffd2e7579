//! Record contracts and the JSON shapes exchanged over HTTP
//!
//! This module defines what the engines need from an entity ([`Record`],
//! [`BelongsTo`]) and the envelopes the handlers render:
//!
//! - `{ "data": ... }` for singletons
//! - `{ "data": [...], "meta": { "first", "prev", "next" } }` for lists
//! - `{ "violations": [{ "field", "reason" }] }` for rejected payloads

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::identifier::Identifier;

/// Any entity the engines can store, keyed by an [`Identifier`]
///
/// The identifier is `None` until the first successful create and never
/// changes afterwards.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Id: Identifier;

    /// Entity name, also used as the storage table name
    const NAME: &'static str;

    fn id(&self) -> Option<Self::Id>;

    fn set_id(&mut self, id: Self::Id);

    /// Declared field constraints, checked at the boundary before any
    /// engine call. No constraints by default.
    fn validate(&self) -> Vec<Violation> {
        Vec::new()
    }
}

/// A record that lives under a parent record of type `P`
pub trait BelongsTo<P: Record>: Record<Id = P::Id> {
    fn parent_id(&self) -> Option<P::Id>;

    fn attach_parent(&mut self, parent: &P);
}

/// One failed field constraint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Body of a 400 response for a payload that fails validation
#[derive(Serialize, Deserialize, Debug)]
pub struct BodyValidation {
    pub violations: Vec<Violation>,
}

/// Response envelope
///
/// # Example
/// ```json
/// {
///   "data": [{ "id": 4, "name": "chair" }],
///   "meta": { "first": "F0S3", "prev": "F0S3", "next": "P2S3" }
/// }
/// ```
#[derive(Serialize, Debug)]
pub struct Envelope<T, M = ()> {
    pub data: T,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<M>,
}

impl<T> Envelope<T> {
    pub fn of(data: T) -> Self {
        Self { data, meta: None }
    }
}

impl<T, M> Envelope<T, M> {
    pub fn with_meta(data: T, meta: M) -> Self {
        Self {
            data,
            meta: Some(meta),
        }
    }
}

/// Query parameters accepted by list endpoints
///
/// # Example
/// Query string: `?page=P2S3` or `?size=50`
#[derive(Deserialize, Debug, Default)]
pub struct ListParams {
    /// Page token produced by a previous list response
    pub page: Option<String>,

    /// Explicit page size, used when no valid token is supplied
    pub size: Option<i64>,
}
