//! Benchmark tests for critical operations
//!
//! Run with: cargo test --release bench -- --ignored --nocapture

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tempfile::NamedTempFile;

use nestcrud::catalog;
use nestcrud::database::init_db;
use nestcrud::endpoint::ServiceRegistry;
use nestcrud::pagination::PageRequest;

/// Benchmark helper to measure execution time
fn benchmark<F>(name: &str, iterations: usize, mut f: F)
where
    F: FnMut(usize),
{
    let start = Instant::now();

    for i in 0..iterations {
        f(i);
    }

    let duration = start.elapsed();
    let avg_ms = duration.as_millis() as f64 / iterations as f64;
    let ops_per_sec = (iterations as f64 / duration.as_secs_f64()) as u64;

    println!("  {} ({} iterations)", name, iterations);
    println!("    Total time: {:?}", duration);
    println!("    Avg time: {:.3}ms", avg_ms);
    println!("    Throughput: {} ops/sec\n", ops_per_sec);
}

fn setup_registry() -> (ServiceRegistry, NamedTempFile) {
    let temp_db = NamedTempFile::new().unwrap();
    let db = init_db(temp_db.path().to_str().unwrap()).unwrap();

    (catalog::registry(Arc::new(db)).unwrap(), temp_db)
}

fn chain(ids: &[i64]) -> Vec<String> {
    ids.iter().map(i64::to_string).collect()
}

#[test]
#[ignore] // Run explicitly with: cargo test bench --release -- --ignored --nocapture
fn bench_create_by_depth() {
    println!("\n=== Benchmark: Create by nesting depth ===\n");

    let (registry, _temp_db) = setup_registry();
    let products = registry.get("product").unwrap();
    let details = registry.get("product_detail").unwrap();
    let languages = registry.get("language").unwrap();

    let iterations = 1000;
    benchmark("Create product (depth 0)", iterations, |i| {
        products
            .create(&[], json!({ "name": format!("p{}", i) }))
            .unwrap();
    });

    benchmark("Create detail (depth 1)", iterations, |i| {
        details
            .create(&chain(&[1]), json!({ "detail": format!("d{}", i) }))
            .unwrap();
    });

    benchmark("Create language (depth 2)", iterations, |_| {
        languages
            .create(&chain(&[1, 1]), json!({ "code": "en", "text": "bench" }))
            .unwrap();
    });
}

#[test]
#[ignore]
fn bench_get_by_depth() {
    println!("\n=== Benchmark: Get by nesting depth ===\n");

    let (registry, _temp_db) = setup_registry();
    let products = registry.get("product").unwrap();
    let details = registry.get("product_detail").unwrap();
    let languages = registry.get("language").unwrap();

    products.create(&[], json!({ "name": "chair" })).unwrap();
    details.create(&chain(&[1]), json!({ "detail": "oak" })).unwrap();
    languages
        .create(&chain(&[1, 1]), json!({ "code": "en", "text": "Oak" }))
        .unwrap();

    let iterations = 5000;
    benchmark("Get product (no chain)", iterations, |_| {
        products.get(&[], "1").unwrap();
    });
    benchmark("Get language (two hops)", iterations, |_| {
        languages.get(&chain(&[1, 1]), "1").unwrap();
    });
}

#[test]
#[ignore]
fn bench_list_scaling() {
    println!("\n=== Benchmark: List scaling ===\n");

    let (registry, _temp_db) = setup_registry();
    let products = registry.get("product").unwrap();
    let details = registry.get("product_detail").unwrap();

    products.create(&[], json!({ "name": "busy" })).unwrap();
    products.create(&[], json!({ "name": "quiet" })).unwrap();

    let sizes = [100, 1000, 10000];
    let mut filled = 0;

    for &size in &sizes {
        println!("  Testing with {} details per parent...", size);

        let start = Instant::now();
        while filled < size {
            details
                .create(&chain(&[1]), json!({ "detail": "busy" }))
                .unwrap();
            details
                .create(&chain(&[2]), json!({ "detail": "quiet" }))
                .unwrap();
            filled += 1;
        }
        println!("    Fill time: {:?}", start.elapsed());

        // the parent index keeps the last page as cheap as the first
        let last = PageRequest::new((size / 10 - 1) as u32, 10).unwrap();
        let start = Instant::now();
        let page = details.list(&chain(&[2]), &last).unwrap();
        println!("    Last page query time: {:?}", start.elapsed());
        assert_eq!(page.content.len(), 10);
        println!();
    }
}

#[test]
#[ignore]
fn bench_concurrent_operations() {
    println!("\n=== Benchmark: Concurrent Operations ===\n");

    let (registry, _temp_db) = setup_registry();
    let products = registry.get("product").unwrap();
    products.create(&[], json!({ "name": "shared" })).unwrap();

    let num_threads = 8;
    let ops_per_thread = 100;

    println!(
        "  Running {} threads with {} ops each...",
        num_threads, ops_per_thread
    );

    let start = Instant::now();

    std::thread::scope(|scope| {
        for _ in 0..num_threads {
            let details = registry.get("product_detail").unwrap();
            scope.spawn(move || {
                for _ in 0..ops_per_thread {
                    details
                        .create(&chain(&[1]), json!({ "detail": "concurrent" }))
                        .unwrap();
                }
            });
        }
    });

    let duration = start.elapsed();
    let total_ops = num_threads * ops_per_thread;

    let all = registry
        .get("product_detail")
        .unwrap()
        .list(&chain(&[1]), &PageRequest::first(1).unwrap())
        .unwrap();
    assert_eq!(all.total, total_ops as u64);

    println!("  Total operations: {}", total_ops);
    println!("  Total time: {:?}", duration);
    println!(
        "  Throughput: {:.0} ops/sec\n",
        total_ops as f64 / duration.as_secs_f64()
    );
}
