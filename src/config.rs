//! Endpoint tree configuration
//!
//! The tree of nested endpoints is read once at startup from YAML:
//!
//! ```yaml
//! base-path: /api
//! id-type: long
//! page-size: 20
//! endpoints:
//!   - path: /products
//!     entity: product
//!     page-size: 25
//!     endpoints:
//!       - path: /details
//!         entity: product_detail
//!         verbs: [get, list]
//! ```
//!
//! Unset node values are inherited: page size from the parent node (then the
//! global default), verbs from the global verb set. The resolved tree is
//! immutable and shared read-only by every request.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Operation an endpoint exposes
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    #[serde(alias = "post", alias = "POST")]
    Create,
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "put", alias = "PUT")]
    Update,
    #[serde(alias = "DELETE")]
    Delete,
    List,
}

impl Verb {
    pub const ALL: [Verb; 5] = [Verb::Create, Verb::Get, Verb::Update, Verb::Delete, Verb::List];
}

/// Endpoint file as written, before defaults are applied
#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct CrudProperties {
    #[serde(default)]
    base_path: String,
    #[serde(default = "default_id_type")]
    id_type: String,
    page_size: Option<u32>,
    max_page_size: Option<u32>,
    #[serde(default)]
    verbs: BTreeSet<Verb>,
    #[serde(default)]
    endpoints: Vec<EndpointProperties>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
struct EndpointProperties {
    path: String,
    entity: String,
    #[serde(default)]
    verbs: BTreeSet<Verb>,
    page_size: Option<u32>,
    #[serde(default)]
    endpoints: Vec<EndpointProperties>,
}

fn default_id_type() -> String {
    "long".to_string()
}

/// Resolved endpoint configuration
#[derive(Debug, Clone)]
pub struct CrudConfig {
    pub base_path: String,
    /// `Identifier::KIND` every registered engine must use
    pub id_type: String,
    pub page_size: u32,
    /// Upper bound applied to client supplied page sizes
    pub max_page_size: Option<u32>,
    pub endpoints: Vec<EndpointNode>,
}

/// One path segment of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointNode {
    /// Segment of this node alone, e.g. `/details`
    pub path: String,
    /// Full collection path template, e.g. `/api/products/{id0}/details`
    pub route: String,
    /// Route of the parent collection
    pub parent: Option<String>,
    pub entity: String,
    pub verbs: BTreeSet<Verb>,
    pub page_size: u32,
    /// Number of ancestors; also the length of this node's identifier chain
    pub level: usize,
    pub endpoints: Vec<EndpointNode>,
}

impl EndpointNode {
    pub fn allows(&self, verb: Verb) -> bool {
        self.verbs.contains(&verb)
    }

    /// Depth-first walk over this node and its descendants
    pub fn walk(&self) -> Vec<&EndpointNode> {
        let mut nodes = vec![self];
        for child in &self.endpoints {
            nodes.extend(child.walk());
        }
        nodes
    }
}

impl CrudConfig {
    /// Reads and resolves the endpoint file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!("loading endpoint file {}", path.display());

        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let properties: CrudProperties = serde_yaml::from_str(content)?;
        Self::resolve(properties)
    }

    fn resolve(properties: CrudProperties) -> Result<Self, ConfigError> {
        let base_path = properties.base_path.trim_end_matches('/').to_string();
        if !base_path.is_empty() && !base_path.starts_with('/') {
            return Err(ConfigError::InvalidEndpoint {
                path: base_path,
                reason: "base path must start with '/'".to_string(),
            });
        }

        let page_size = positive(properties.page_size, DEFAULT_PAGE_SIZE, "<root>")?;
        let max_page_size = match properties.max_page_size {
            Some(0) => {
                return Err(ConfigError::InvalidEndpoint {
                    path: "<root>".to_string(),
                    reason: "max-page-size must be positive".to_string(),
                })
            }
            other => other,
        };

        let verbs = if properties.verbs.is_empty() {
            Verb::ALL.into_iter().collect()
        } else {
            properties.verbs
        };

        let defaults = Defaults {
            verbs: &verbs,
            base_path: &base_path,
        };
        let endpoints = properties
            .endpoints
            .into_iter()
            .map(|endpoint| defaults.node(endpoint, None, page_size, 0))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            base_path,
            id_type: properties.id_type.to_lowercase(),
            page_size,
            max_page_size,
            endpoints,
        })
    }

    /// Every node of the tree, depth first
    pub fn nodes(&self) -> Vec<&EndpointNode> {
        self.endpoints.iter().flat_map(EndpointNode::walk).collect()
    }
}

struct Defaults<'a> {
    verbs: &'a BTreeSet<Verb>,
    base_path: &'a str,
}

impl Defaults<'_> {
    fn node(
        &self,
        properties: EndpointProperties,
        parent: Option<&str>,
        inherited_page_size: u32,
        level: usize,
    ) -> Result<EndpointNode, ConfigError> {
        let path = properties.path.trim_end_matches('/').to_string();
        if !path.starts_with('/') || path.len() < 2 || path[1..].contains(['/', '{', '}']) {
            return Err(ConfigError::InvalidEndpoint {
                path,
                reason: "path must be a single segment starting with '/'".to_string(),
            });
        }
        if properties.entity.trim().is_empty() {
            return Err(ConfigError::InvalidEndpoint {
                path,
                reason: "entity is required".to_string(),
            });
        }

        let page_size = positive(properties.page_size, inherited_page_size, &path)?;
        let verbs = if properties.verbs.is_empty() {
            self.verbs.clone()
        } else {
            properties.verbs
        };

        let template = match parent {
            Some(parent) => format!("{}/{{id{}}}{}", parent, level - 1, path),
            None => format!("{}{}", self.base_path, path),
        };

        let endpoints = properties
            .endpoints
            .into_iter()
            .map(|child| self.node(child, Some(&template), page_size, level + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EndpointNode {
            path,
            route: template,
            parent: parent.map(str::to_string),
            entity: properties.entity,
            verbs,
            page_size,
            level,
            endpoints,
        })
    }
}

fn positive(value: Option<u32>, fallback: u32, path: &str) -> Result<u32, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::InvalidEndpoint {
            path: path.to_string(),
            reason: "page-size must be positive".to_string(),
        }),
        Some(size) => Ok(size),
        None => Ok(fallback),
    }
}
