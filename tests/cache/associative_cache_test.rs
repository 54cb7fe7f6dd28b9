// tests/cache/associative_cache_test.rs
use chronoql::cache::{fingerprint, AssociativeCache, CacheMetrics};
use chronoql::catalog::{ColumnType, MemoryCatalog, TableMetadata};
use chronoql::compiler::Compiler;
use chronoql::config::CacheSettings;
use prometheus::Registry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_random_keys_never_exceed_capacity() {
    let mut cache = AssociativeCache::new(4, 8).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    for i in 0..1000u32 {
        let key = fingerprint(&rng.random::<u64>().to_string());
        cache.put(key.clone(), i);
        assert!(cache.len() <= cache.capacity());
        assert_eq!(cache.peek(&key), Some(&i));
    }
    assert_eq!(cache.metrics().size.get(), cache.len() as i64);
}

#[test]
fn test_equivalent_statements_share_an_entry() {
    let catalog = MemoryCatalog::new();
    catalog.register(
        TableMetadata::new("tab")
            .col("x", ColumnType::Int)
            .col("y", ColumnType::Int),
    );
    let compiler = Compiler::new(&catalog);
    let first = compiler.compile("select x from tab where x > 1").unwrap();
    let second = compiler
        .compile("SELECT x FROM tab WHERE not (x <= 1)")
        .unwrap();
    assert_eq!(first.fingerprint(), second.fingerprint());

    let mut cache = AssociativeCache::from_settings(&CacheSettings::default()).unwrap();
    assert_eq!(cache.put(first.fingerprint(), first.to_string()), None);
    assert_eq!(
        cache.peek(&second.fingerprint()).map(String::as_str),
        Some("select-choose x from (tab where x > 1)")
    );
}

#[test]
fn test_metrics_under_custom_namespace() {
    let metrics = CacheMetrics::new("statements").unwrap();
    let registry = Registry::new();
    metrics.register(&registry).unwrap();

    let mut cache = AssociativeCache::with_metrics(2, 2, metrics).unwrap();
    cache.put("a", 1);
    cache.peek("a");
    cache.peek("b");

    let families = registry.gather();
    let value = |name: &str| {
        families
            .iter()
            .find(|f| f.get_name() == name)
            .map(|f| f.get_metric()[0].get_counter().get_value())
    };
    assert_eq!(value("statements_hits_total"), Some(1.0));
    assert_eq!(value("statements_misses_total"), Some(1.0));
}
