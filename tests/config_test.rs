//! Tests for loading and resolving the endpoint tree

use std::collections::BTreeSet;
use std::io::Write;

use tempfile::NamedTempFile;

use nestcrud::config::{CrudConfig, Verb, DEFAULT_PAGE_SIZE};
use nestcrud::error::ConfigError;

const CATALOG: &str = r#"
base-path: /api/
id-type: LONG
page-size: 15
max-page-size: 50
verbs: [get, list, post]

endpoints:
  - path: /products
    entity: product
    page-size: 30
    endpoints:
      - path: /details/
        entity: product_detail
        endpoints:
          - path: /languages
            entity: language
            verbs: [get, put, DELETE]
            page-size: 5
  - path: /tags
    entity: tag
"#;

#[test]
fn test_tree_is_resolved() {
    let config = CrudConfig::from_yaml(CATALOG).unwrap();

    assert_eq!(config.base_path, "/api");
    assert_eq!(config.id_type, "long");
    assert_eq!(config.page_size, 15);
    assert_eq!(config.max_page_size, Some(50));

    let nodes = config.nodes();
    let routes: Vec<_> = nodes.iter().map(|n| n.route.as_str()).collect();
    assert_eq!(
        routes,
        vec![
            "/api/products",
            "/api/products/{id0}/details",
            "/api/products/{id0}/details/{id1}/languages",
            "/api/tags",
        ]
    );

    let levels: Vec<_> = nodes.iter().map(|n| n.level).collect();
    assert_eq!(levels, vec![0, 1, 2, 0]);
}

#[test]
fn test_parent_routes() {
    let config = CrudConfig::from_yaml(CATALOG).unwrap();
    let nodes = config.nodes();

    assert_eq!(nodes[0].parent, None);
    assert_eq!(nodes[1].parent.as_deref(), Some("/api/products"));
    assert_eq!(nodes[2].parent.as_deref(), Some("/api/products/{id0}/details"));
    assert_eq!(nodes[2].path, "/languages");
}

#[test]
fn test_page_size_is_inherited() {
    let config = CrudConfig::from_yaml(CATALOG).unwrap();
    let sizes: Vec<_> = config.nodes().iter().map(|n| n.page_size).collect();

    // products overrides, details inherits from products, tags from the root
    assert_eq!(sizes, vec![30, 30, 5, 15]);
}

#[test]
fn test_verbs_default_to_global_set() {
    let config = CrudConfig::from_yaml(CATALOG).unwrap();
    let nodes = config.nodes();

    let global: BTreeSet<_> = [Verb::Get, Verb::List, Verb::Create].into_iter().collect();
    assert_eq!(nodes[0].verbs, global);
    assert_eq!(nodes[3].verbs, global);

    let languages = nodes[2];
    assert!(languages.allows(Verb::Update));
    assert!(languages.allows(Verb::Delete));
    assert!(!languages.allows(Verb::Create));
    assert!(!languages.allows(Verb::List));
}

#[test]
fn test_child_verbs_do_not_come_from_parent_node() {
    let config = CrudConfig::from_yaml(
        r#"
verbs: [get, list]
endpoints:
  - path: /products
    entity: product
    verbs: [delete]
    endpoints:
      - path: /details
        entity: product_detail
"#,
    )
    .unwrap();
    let nodes = config.nodes();

    assert_eq!(nodes[0].verbs, [Verb::Delete].into_iter().collect::<BTreeSet<_>>());
    assert_eq!(nodes[1].verbs, [Verb::Get, Verb::List].into_iter().collect::<BTreeSet<_>>());
}

#[test]
fn test_defaults() {
    let config = CrudConfig::from_yaml(
        r#"
endpoints:
  - path: /products
    entity: product
"#,
    )
    .unwrap();

    assert_eq!(config.base_path, "");
    assert_eq!(config.id_type, "long");
    assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(config.max_page_size, None);

    let node = &config.endpoints[0];
    assert_eq!(node.route, "/products");
    assert_eq!(node.verbs, Verb::ALL.into_iter().collect::<BTreeSet<_>>());
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CATALOG.as_bytes()).unwrap();

    let config = CrudConfig::load(file.path()).unwrap();

    assert_eq!(config.nodes().len(), 4);
}

#[test]
fn test_bundled_endpoint_file_is_valid() {
    let config = CrudConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/endpoints.yaml")).unwrap();

    let nodes = config.nodes();
    let entities: Vec<_> = nodes.iter().map(|n| n.entity.as_str()).collect();
    assert_eq!(entities, vec!["product", "product_detail", "language"]);
}

#[test]
fn test_missing_file_is_io_error() {
    let result = CrudConfig::load("/nonexistent/endpoints.yaml");

    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_unknown_verb_is_yaml_error() {
    let result = CrudConfig::from_yaml(
        r#"
endpoints:
  - path: /products
    entity: product
    verbs: [patch]
"#,
    );

    assert!(matches!(result, Err(ConfigError::Yaml(_))));
}

#[test]
fn test_invalid_paths() {
    for path in ["products", "/", "/a/b", "/{id}"] {
        let yaml = format!(
            "endpoints:\n  - path: \"{}\"\n    entity: product\n",
            path
        );
        let result = CrudConfig::from_yaml(&yaml);

        assert!(
            matches!(result, Err(ConfigError::InvalidEndpoint { .. })),
            "path {:?} was accepted",
            path
        );
    }
}

#[test]
fn test_blank_entity_is_rejected() {
    let result = CrudConfig::from_yaml(
        r#"
endpoints:
  - path: /products
    entity: " "
"#,
    );

    assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));
}

#[test]
fn test_zero_page_sizes_are_rejected() {
    let root = CrudConfig::from_yaml("page-size: 0\n");
    assert!(matches!(root, Err(ConfigError::InvalidEndpoint { .. })));

    let max = CrudConfig::from_yaml("max-page-size: 0\n");
    assert!(matches!(max, Err(ConfigError::InvalidEndpoint { .. })));

    let node = CrudConfig::from_yaml(
        r#"
endpoints:
  - path: /products
    entity: product
    page-size: 0
"#,
    );
    assert!(matches!(node, Err(ConfigError::InvalidEndpoint { .. })));
}

#[test]
fn test_relative_base_path_is_rejected() {
    let result = CrudConfig::from_yaml("base-path: api\n");

    assert!(matches!(result, Err(ConfigError::InvalidEndpoint { .. })));
}
