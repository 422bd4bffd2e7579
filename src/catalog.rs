//! Product catalog wired to the nested CRUD engines
//!
//! Three levels, each owned by the one above:
//!
//! ```text
//! /products/{id0}/details/{id1}/languages/{id2}
//! ```
//!
//! This is the domain served by the binary with the bundled `endpoints.yaml`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::Database;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::{RedbParentChildResolver, RedbRepository};
use crate::dto::{read_body, write_body, DtoConverter, DtoType};
use crate::endpoint::ServiceRegistry;
use crate::error::{CrudError, StoreError};
use crate::model::{BelongsTo, Record, Violation};
use crate::resolver::BeforeSave;
use crate::service::{AncestorCrudService, NestedCrudService, SimpleCrudService};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Product {
    #[serde(default)]
    pub id: Option<i64>,

    pub name: String,

    /// Set on first save
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Product {
    type Id = i64;
    const NAME: &'static str = "product";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if self.name.trim().is_empty() {
            violations.push(Violation::new("name", "must not be blank"));
        }
        violations
    }
}

/// List view of a product
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub id: Option<i64>,
    pub name: String,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
        }
    }
}

/// Lists products as [`ProductSummary`]; every other operation reads and
/// answers the full record
pub struct ProductDto;

impl DtoConverter<Product> for ProductDto {
    fn from_dto(&self, _dto: DtoType, body: Value) -> Result<Product, CrudError> {
        read_body(body)
    }

    fn to_dto(&self, dto: DtoType, product: &Product) -> Result<Value, CrudError> {
        match dto {
            DtoType::List => write_body(&ProductSummary::from(product)),
            _ => write_body(product),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProductDetail {
    #[serde(default)]
    pub id: Option<i64>,

    pub detail: String,

    /// Owning product, attached from the request path
    #[serde(default)]
    pub product_id: Option<i64>,
}

impl Record for ProductDetail {
    type Id = i64;
    const NAME: &'static str = "product_detail";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

impl BelongsTo<Product> for ProductDetail {
    fn parent_id(&self) -> Option<i64> {
        self.product_id
    }

    fn attach_parent(&mut self, parent: &Product) {
        self.product_id = parent.id;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Language {
    #[serde(default)]
    pub id: Option<i64>,

    /// ISO 639-1 code, e.g. "en"
    pub code: String,

    pub text: String,

    #[serde(default)]
    pub detail_id: Option<i64>,
}

impl Record for Language {
    type Id = i64;
    const NAME: &'static str = "language";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if self.code.len() != 2 || !self.code.chars().all(|c| c.is_ascii_lowercase()) {
            violations.push(Violation::new("code", "must be two lowercase letters"));
        }
        if self.text.is_empty() {
            violations.push(Violation::new("text", "must not be empty"));
        }
        violations
    }
}

impl BelongsTo<ProductDetail> for Language {
    fn parent_id(&self) -> Option<i64> {
        self.detail_id
    }

    fn attach_parent(&mut self, parent: &ProductDetail) {
        self.detail_id = parent.id;
    }
}

/// Stamps `created_at` the first time a product is saved
pub struct StampCreatedAt;

impl BeforeSave<Product> for StampCreatedAt {
    fn execute(&self, product: &mut Product) -> Result<(), CrudError> {
        product.created_at.get_or_insert_with(Utc::now);
        Ok(())
    }
}

fn update_product(persisted: &mut Product, incoming: Product) {
    persisted.name = incoming.name;
}

// the owning parent never moves on update
fn update_detail(persisted: &mut ProductDetail, incoming: ProductDetail) {
    persisted.detail = incoming.detail;
}

fn update_language(persisted: &mut Language, incoming: Language) {
    persisted.code = incoming.code;
    persisted.text = incoming.text;
}

/// Opens the catalog tables and registers one engine per entity
///
/// | entity           | engine stack                                   |
/// |------------------|------------------------------------------------|
/// | `product`        | simple, listed through [`ProductDto`]          |
/// | `product_detail` | nested(product) > simple                       |
/// | `language`       | ancestor(product) > nested(detail) > simple    |
pub fn registry(db: Arc<Database>) -> Result<ServiceRegistry, StoreError> {
    let products = Arc::new(RedbRepository::<Product>::open(db.clone())?);
    let details = Arc::new(
        RedbRepository::<ProductDetail>::open(db.clone())?.indexed_by_parent::<Product>(),
    );
    let languages = Arc::new(
        RedbRepository::<Language>::open(db)?.indexed_by_parent::<ProductDetail>(),
    );

    let product_details = Arc::new(RedbParentChildResolver::new(
        products.clone(),
        details.clone(),
    ));
    let detail_languages = Arc::new(RedbParentChildResolver::new(
        details.clone(),
        languages.clone(),
    ));

    let mut registry = ServiceRegistry::new();
    registry
        .register_with(
            Product::NAME,
            SimpleCrudService::<Product, _>::new(products)
                .with_before_save(StampCreatedAt)
                .with_update_setter(update_product),
            ProductDto,
        )
        .register(
            ProductDetail::NAME,
            NestedCrudService::<Product, _, _>::new(
                product_details.clone(),
                SimpleCrudService::<ProductDetail, _>::new(details)
                    .with_update_setter(update_detail),
            ),
        )
        .register(
            Language::NAME,
            AncestorCrudService::new(
                product_details,
                NestedCrudService::<ProductDetail, _, _>::new(
                    detail_languages,
                    SimpleCrudService::<Language, _>::new(languages)
                        .with_update_setter(update_language),
                ),
            ),
        );

    Ok(registry)
}
