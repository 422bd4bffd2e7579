//! Request and response shapes per operation
//!
//! An endpoint reads its bodies into the record type and renders the record
//! back by default ([`EntityAsDto`]). Entities that expose a different shape
//! on the wire, such as a trimmed list view or an input without server-owned
//! fields, register a [`DtoConverter`] alongside their engine.
//!
//! The converter is told which operation it serves:
//!
//! | [`DtoType`] | direction | used by                        |
//! |-------------|-----------|--------------------------------|
//! | `Post`      | in        | create body                    |
//! | `Put`       | in        | update body                    |
//! | `Get`       | out       | get answer                     |
//! | `List`      | out       | each element of a list page    |
//! | `Result`    | out       | create and update answers      |
//!
//! Validation runs on the record produced by [`DtoConverter::from_dto`], so
//! a converter never bypasses the record's constraints.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{CrudError, StoreError};
use crate::model::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtoType {
    Post,
    Put,
    Get,
    List,
    Result,
}

pub trait DtoConverter<E: Record>: Send + Sync {
    /// Builds a record from a `Post` or `Put` body
    fn from_dto(&self, dto: DtoType, body: Value) -> Result<E, CrudError>;

    /// Renders a record for `Get`, `List` or `Result`
    fn to_dto(&self, dto: DtoType, record: &E) -> Result<Value, CrudError>;
}

/// Reads a body with serde, mapping failures to [`CrudError::MalformedBody`]
pub fn read_body<T: DeserializeOwned>(body: Value) -> Result<T, CrudError> {
    serde_json::from_value(body).map_err(|e| CrudError::MalformedBody(e.to_string()))
}

/// Serializes a response shape; a failure here is a server fault
pub fn write_body<T: Serialize>(value: &T) -> Result<Value, CrudError> {
    serde_json::to_value(value).map_err(|e| CrudError::Storage(StoreError::new(e)))
}

/// The record is its own body and response for every operation
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityAsDto;

impl<E: Record> DtoConverter<E> for EntityAsDto {
    fn from_dto(&self, _dto: DtoType, body: Value) -> Result<E, CrudError> {
        read_body(body)
    }

    fn to_dto(&self, _dto: DtoType, record: &E) -> Result<Value, CrudError> {
        write_body(record)
    }
}

/// Converter through two typed shapes: bodies read as `I` and convert into
/// the record, responses convert the record into `O`
///
/// ```
/// # use nestcrud::catalog::Product;
/// # use nestcrud::dto::{DtoConverter, DtoMapper, DtoType};
/// # use serde::{Deserialize, Serialize};
/// #[derive(Deserialize)]
/// struct NewProduct { title: String }
///
/// #[derive(Serialize)]
/// struct ProductView { title: String }
///
/// impl From<NewProduct> for Product {
///     fn from(dto: NewProduct) -> Self {
///         Product { id: None, name: dto.title, created_at: None }
///     }
/// }
///
/// impl From<&Product> for ProductView {
///     fn from(product: &Product) -> Self {
///         ProductView { title: product.name.clone() }
///     }
/// }
///
/// let converter = DtoMapper::<NewProduct, ProductView>::new();
/// let product: Product = converter
///     .from_dto(DtoType::Post, serde_json::json!({ "title": "chair" }))
///     .unwrap();
/// assert_eq!(product.name, "chair");
/// ```
pub struct DtoMapper<I, O> {
    _shapes: PhantomData<fn(I) -> O>,
}

impl<I, O> DtoMapper<I, O> {
    pub fn new() -> Self {
        Self {
            _shapes: PhantomData,
        }
    }
}

impl<I, O> Default for DtoMapper<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, I, O> DtoConverter<E> for DtoMapper<I, O>
where
    E: Record,
    I: DeserializeOwned + Into<E>,
    O: Serialize + for<'a> From<&'a E>,
{
    fn from_dto(&self, _dto: DtoType, body: Value) -> Result<E, CrudError> {
        read_body::<I>(body).map(Into::into)
    }

    fn to_dto(&self, _dto: DtoType, record: &E) -> Result<Value, CrudError> {
        write_body(&O::from(record))
    }
}
