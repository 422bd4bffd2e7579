//! Tests for the redb repositories and the parent index

use std::sync::Arc;

use redb::Database;
use tempfile::NamedTempFile;

use nestcrud::catalog::{Product, ProductDetail};
use nestcrud::database::{init_db, RedbParentChildResolver, RedbRepository};
use nestcrud::pagination::PageRequest;
use nestcrud::resolver::{MembershipResolver, ParentChildResolver, RecordResolver};

fn setup_db() -> (Arc<Database>, NamedTempFile) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");

    (Arc::new(db), temp_db)
}

fn product(name: &str) -> Product {
    Product {
        id: None,
        name: name.to_string(),
        created_at: None,
    }
}

fn detail(product_id: i64, text: &str) -> ProductDetail {
    ProductDetail {
        id: None,
        detail: text.to_string(),
        product_id: Some(product_id),
    }
}

#[test]
fn test_save_assigns_increasing_ids() {
    let (db, _temp_db) = setup_db();
    let products = RedbRepository::<Product>::open(db).unwrap();

    let first = products.save(product("chair")).unwrap();
    let second = products.save(product("table")).unwrap();

    assert_eq!(first.id, Some(1));
    assert_eq!(second.id, Some(2));
    assert_eq!(products.find_by_id(&2).unwrap().unwrap().name, "table");
}

#[test]
fn test_save_with_id_overwrites() {
    let (db, _temp_db) = setup_db();
    let products = RedbRepository::<Product>::open(db).unwrap();

    let mut saved = products.save(product("chair")).unwrap();
    saved.name = "stool".to_string();
    products.save(saved).unwrap();

    let page = products.find_page(&PageRequest::first(10).unwrap()).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.content[0].name, "stool");
}

#[test]
fn test_exists_and_delete() {
    let (db, _temp_db) = setup_db();
    let products = RedbRepository::<Product>::open(db).unwrap();

    products.save(product("chair")).unwrap();
    assert!(products.exists_by_id(&1).unwrap());

    products.delete_by_id(&1).unwrap();
    assert!(!products.exists_by_id(&1).unwrap());
    assert!(products.find_by_id(&1).unwrap().is_none());

    // deleting twice is a no-op at this level
    products.delete_by_id(&1).unwrap();
}

#[test]
fn test_find_page_is_id_ascending() {
    let (db, _temp_db) = setup_db();
    let products = RedbRepository::<Product>::open(db).unwrap();

    for i in 1..=10 {
        products.save(product(&format!("p{}", i))).unwrap();
    }

    let page = products.find_page(&PageRequest::new(1, 3).unwrap()).unwrap();
    let ids: Vec<_> = page.content.iter().map(|p| p.id.unwrap()).collect();

    assert_eq!(ids, vec![4, 5, 6]);
    assert_eq!(page.total, 10);
    assert!(page.has_previous);
    assert!(page.has_next);

    let last = products.find_page(&PageRequest::new(3, 3).unwrap()).unwrap();
    assert_eq!(last.content.len(), 1);
    assert!(!last.has_next);
}

#[test]
fn test_ids_survive_reopen() {
    let (db, _temp_db) = setup_db();

    let products = RedbRepository::<Product>::open(db.clone()).unwrap();
    products.save(product("chair")).unwrap();
    drop(products);

    let products = RedbRepository::<Product>::open(db).unwrap();
    assert_eq!(products.save(product("table")).unwrap().id, Some(2));
}

#[test]
fn test_deleted_ids_are_not_reused() {
    let (db, _temp_db) = setup_db();
    let products = RedbRepository::<Product>::open(db.clone()).unwrap();

    products.save(product("chair")).unwrap();
    products.save(product("table")).unwrap();
    products.delete_by_id(&2).unwrap();
    products.delete_by_id(&1).unwrap();

    assert_eq!(products.save(product("stool")).unwrap().id, Some(3));

    // the sequence is stored, not kept in memory
    let products = RedbRepository::<Product>::open(db).unwrap();
    products.delete_by_id(&3).unwrap();
    assert_eq!(products.save(product("bench")).unwrap().id, Some(4));
}

#[test]
fn test_explicit_ids_move_the_sequence_forward() {
    let (db, _temp_db) = setup_db();
    let products = RedbRepository::<Product>::open(db).unwrap();

    products
        .save(Product {
            id: Some(10),
            ..product("imported")
        })
        .unwrap();

    assert_eq!(products.save(product("chair")).unwrap().id, Some(11));
}

#[test]
fn test_parent_index_pages_children() {
    let (db, _temp_db) = setup_db();
    let details = RedbRepository::<ProductDetail>::open(db)
        .unwrap()
        .indexed_by_parent::<Product>();

    for i in 0..5 {
        details.save(detail(1, &format!("a{}", i))).unwrap();
        details.save(detail(2, &format!("b{}", i))).unwrap();
    }

    let page = details
        .find_by_parent(&2, &PageRequest::new(0, 3).unwrap())
        .unwrap();

    assert_eq!(page.total, 5);
    assert!(page.has_next);
    assert!(page.content.iter().all(|d| d.product_id == Some(2)));
    let texts: Vec<_> = page.content.iter().map(|d| d.detail.as_str()).collect();
    assert_eq!(texts, vec!["b0", "b1", "b2"]);
}

#[test]
fn test_parent_index_follows_moves_and_deletes() {
    let (db, _temp_db) = setup_db();
    let details = RedbRepository::<ProductDetail>::open(db)
        .unwrap()
        .indexed_by_parent::<Product>();

    let mut saved = details.save(detail(1, "a")).unwrap();
    let id = saved.id.unwrap();
    assert!(details.is_child_of(&1, &id).unwrap());

    saved.product_id = Some(2);
    details.save(saved).unwrap();
    assert!(!details.is_child_of(&1, &id).unwrap());
    assert!(details.is_child_of(&2, &id).unwrap());

    details.delete_by_id(&id).unwrap();
    assert!(!details.is_child_of(&2, &id).unwrap());
    assert_eq!(
        details
            .find_by_parent(&2, &PageRequest::first(10).unwrap())
            .unwrap()
            .total,
        0
    );
}

#[test]
fn test_negative_parent_keys_do_not_collide() {
    let (db, _temp_db) = setup_db();
    let details = RedbRepository::<ProductDetail>::open(db)
        .unwrap()
        .indexed_by_parent::<Product>();

    details.save(detail(-1, "neg")).unwrap();
    details.save(detail(1, "pos")).unwrap();

    let page = details
        .find_by_parent(&-1, &PageRequest::first(10).unwrap())
        .unwrap();
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].detail, "neg");
}

#[test]
fn test_parent_child_resolver() {
    let (db, _temp_db) = setup_db();
    let products = Arc::new(RedbRepository::<Product>::open(db.clone()).unwrap());
    let details = Arc::new(
        RedbRepository::<ProductDetail>::open(db)
            .unwrap()
            .indexed_by_parent::<Product>(),
    );
    let resolver = RedbParentChildResolver::new(products.clone(), details.clone());

    let chair = products.save(product("chair")).unwrap();
    let table = products.save(product("table")).unwrap();
    let leg = details.save(detail(1, "leg")).unwrap();

    assert!(resolver.exists_parent(&1).unwrap());
    assert!(!resolver.exists_parent(&3).unwrap());
    assert!(resolver.exists_parent_and_child(&1, &leg.id.unwrap()).unwrap());
    assert!(!resolver.exists_parent_and_child(&2, &leg.id.unwrap()).unwrap());

    assert_eq!(resolver.find_parent_by_id(&2).unwrap(), Some(table.clone()));

    let mut top = ProductDetail {
        id: None,
        detail: "top".to_string(),
        product_id: None,
    };
    resolver.attach_parent(&chair, &mut top);
    assert_eq!(top.product_id, Some(1));

    let page = resolver
        .find_child_page(&2, &PageRequest::first(10).unwrap())
        .unwrap();
    assert!(page.content.is_empty());
}

#[test]
fn test_membership_requires_existing_parent() {
    let (db, _temp_db) = setup_db();
    let products = Arc::new(RedbRepository::<Product>::open(db.clone()).unwrap());
    let details = Arc::new(
        RedbRepository::<ProductDetail>::open(db)
            .unwrap()
            .indexed_by_parent::<Product>(),
    );
    let resolver = RedbParentChildResolver::new(products.clone(), details.clone());

    products.save(product("chair")).unwrap();
    let leg = details.save(detail(1, "leg")).unwrap().id.unwrap();
    assert!(resolver.exists_parent_and_child(&1, &leg).unwrap());

    products.delete_by_id(&1).unwrap();

    // the child row and its index entry outlive the parent
    assert!(details.is_child_of(&1, &leg).unwrap());
    assert!(!resolver.exists_parent_and_child(&1, &leg).unwrap());
    assert!(!resolver.exists_parent(&1).unwrap());
}
