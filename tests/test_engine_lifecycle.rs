use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, StringArray};
use arrow::record_batch::RecordBatch;
use colstore::catalog::arrow_schema;
use colstore::{
    ColumnSchema, DataType, EngineConfig, Error, OptimizationRule, StorageEngine, TableState,
};
use std::sync::Arc;
use std::time::Duration;

fn employees_schema() -> Vec<ColumnSchema> {
    vec![
        ColumnSchema::new("id", DataType::Integer).nullable(false),
        ColumnSchema::new("name", DataType::Text),
        ColumnSchema::new("age", DataType::Integer),
        ColumnSchema::new("salary", DataType::Double),
    ]
}

fn employees(rows: &[(i32, &str, i32, f64)]) -> RecordBatch {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(
            rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        )),
        Arc::new(Int32Array::from(
            rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        )),
    ];
    RecordBatch::try_new(arrow_schema(&employees_schema()), columns).unwrap()
}

fn default_rows() -> RecordBatch {
    employees(&[
        (1, "Alice", 25, 50_000.0),
        (2, "Bob", 35, 65_000.0),
        (3, "Carol", 45, 80_000.0),
    ])
}

fn ids(batch: &RecordBatch) -> Vec<i32> {
    let column = batch
        .column_by_name("id")
        .unwrap()
        .as_any()
        .downcast_ref::<Int32Array>()
        .unwrap();
    column.values().to_vec()
}

fn table_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir.join("tables")).unwrap().count()
}

/// Enough rows for many row groups at a small row group size
fn many_rows(n: i32) -> RecordBatch {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from((0..n).collect::<Vec<_>>())),
        Arc::new(StringArray::from(
            (0..n).map(|i| format!("emp{}", i)).collect::<Vec<_>>(),
        )),
        Arc::new(Int32Array::from((0..n).map(|i| 20 + i % 40).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(
            (0..n).map(|i| 40_000.0 + i as f64).collect::<Vec<_>>(),
        )),
    ];
    RecordBatch::try_new(arrow_schema(&employees_schema()), columns).unwrap()
}

async fn open_with_employees(dir: &std::path::Path) -> StorageEngine {
    let engine = StorageEngine::open(EngineConfig::new(dir)).unwrap();
    engine
        .create_table("employees", &employees_schema(), &default_rows())
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn test_filter_query() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;

    let result = engine
        .query("SELECT * FROM employees WHERE age > 30", "employees")
        .await
        .unwrap();
    assert_eq!(ids(result.batch()), vec![2, 3]);

    let result = engine
        .query("SELECT * FROM employees WHERE name = 'Alice'", "employees")
        .await
        .unwrap();
    assert_eq!(ids(result.batch()), vec![1]);

    // No WHERE clause: every row, every column, stored order
    let result = engine
        .query("SELECT name FROM employees", "employees")
        .await
        .unwrap();
    assert_eq!(ids(result.batch()), vec![1, 2, 3]);
    assert_eq!(result.num_columns(), 4);
}

#[tokio::test]
async fn test_cached_result_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;
    let query = "SELECT * FROM employees WHERE salary >= 65000";

    let first = engine.query(query, "employees").await.unwrap();
    let before = engine.performance_stats().cache_stats;

    let second = engine.query(query, "employees").await.unwrap();
    let after = engine.performance_stats().cache_stats;

    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(after.hits, before.hits + 1);
    assert_eq!(after.misses, before.misses);

    // Only the miss is a latency sample
    let stats = engine.performance_stats();
    assert_eq!(stats.total_queries, 1);
    assert_eq!(stats.total_rows_returned, 2);
    assert!(stats.min_latency_ms <= stats.avg_latency_ms);
    assert!(stats.avg_latency_ms <= stats.max_latency_ms);
    assert!((0.0..=1.0).contains(&stats.cache_stats.hit_rate));
}

#[tokio::test]
async fn test_catalog_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;

    let table = engine.get_table("employees").unwrap();
    assert_eq!(table.row_count, 3);
    assert_eq!(table.column_count, 4);
    assert!(table.is_consistent());
    assert_eq!(
        table.total_size_bytes,
        table.columns.values().map(|c| c.size_bytes).sum::<usize>()
    );
    assert!(table.data_file.exists());

    let age = table.get_column("age").unwrap();
    assert_eq!(age.null_count, 0);
    assert_eq!(age.distinct_count, 3);
    assert_eq!(engine.list_tables(), vec!["employees".to_string()]);
}

#[tokio::test]
async fn test_unknown_table() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;

    let err = engine
        .query("SELECT * FROM ghost", "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TableNotFound(ref t) if t == "ghost"));
    assert!(engine.explain("SELECT * FROM ghost", "ghost").is_err());
    assert_eq!(engine.table_state("ghost"), TableState::Uncreated);
    assert_eq!(engine.table_state("employees"), TableState::Available);
}

#[tokio::test]
async fn test_recreate_invalidates_cache() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;
    let query = "SELECT * FROM employees";

    let before = engine.query(query, "employees").await.unwrap();
    assert_eq!(before.num_rows(), 3);
    let old_file = engine.get_table("employees").unwrap().data_file.clone();

    engine
        .create_table(
            "employees",
            &employees_schema(),
            &employees(&[(7, "Grace", 60, 99_000.0)]),
        )
        .await
        .unwrap();

    let after = engine.query(query, "employees").await.unwrap();
    assert_eq!(ids(after.batch()), vec![7]);

    let table = engine.get_table("employees").unwrap();
    assert_eq!(table.row_count, 1);
    assert_eq!(table.version, 2);
    assert!(table.data_file.exists());
    assert!(!old_file.exists());
    assert_eq!(table_files(dir.path()), 1);
}

#[tokio::test]
async fn test_catalog_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = open_with_employees(dir.path()).await;
        engine.shutdown().unwrap();
    }

    let engine = StorageEngine::open(EngineConfig::new(dir.path())).unwrap();
    assert_eq!(engine.list_tables(), vec!["employees".to_string()]);

    let result = engine
        .query("SELECT * FROM employees WHERE age < 40", "employees")
        .await
        .unwrap();
    assert_eq!(ids(result.batch()), vec![1, 2]);
}

#[tokio::test]
async fn test_lenient_and_strict_predicates() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;

    let result = engine
        .query(
            "SELECT * FROM employees WHERE age > 30 AND salary < 70000",
            "employees",
        )
        .await
        .unwrap();
    assert_eq!(result.num_rows(), 3);

    let result = engine
        .query("SELECT * FROM employees WHERE height > 2", "employees")
        .await
        .unwrap();
    assert_eq!(result.num_rows(), 3);

    let strict_dir = tempfile::tempdir().unwrap();
    let strict = StorageEngine::open(
        EngineConfig::new(strict_dir.path()).with_strict_predicates(true),
    )
    .unwrap();
    strict
        .create_table("employees", &employees_schema(), &default_rows())
        .await
        .unwrap();

    let err = strict
        .query(
            "SELECT * FROM employees WHERE age > 30 AND salary < 70000",
            "employees",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));

    let err = strict
        .query("SELECT * FROM employees WHERE height > 2", "employees")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}

#[tokio::test]
async fn test_type_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;

    let err = engine
        .query("SELECT * FROM employees WHERE age > 'old'", "employees")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_invalid_table_names() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open(EngineConfig::new(dir.path())).unwrap();

    for name in ["", "../escape", "has space"] {
        let err = engine
            .create_table(name, &employees_schema(), &default_rows())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTableName(_)));
    }
    assert!(engine.list_tables().is_empty());
}

#[tokio::test]
async fn test_schema_mismatch_leaves_catalog_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open(EngineConfig::new(dir.path())).unwrap();

    let schema = vec![ColumnSchema::new("id", DataType::BigInt)];
    let err = engine
        .create_table("employees", &schema, &default_rows())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch(_)));
    assert_eq!(engine.table_state("employees"), TableState::Uncreated);
}

#[tokio::test]
async fn test_query_with_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::new(dir.path()).with_query_timeout(Duration::from_secs(30));
    let engine = StorageEngine::open(config).unwrap();
    engine
        .create_table("employees", &employees_schema(), &default_rows())
        .await
        .unwrap();

    let result = engine
        .query("SELECT * FROM employees WHERE id = 2", "employees")
        .await
        .unwrap();
    assert_eq!(ids(result.batch()), vec![2]);
}

#[tokio::test]
async fn test_explain() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;

    let plan = engine
        .explain("SELECT name FROM employees WHERE age > 30", "employees")
        .unwrap();
    assert!(plan.fired(OptimizationRule::ColumnPruning));
    assert!(plan.fired(OptimizationRule::PredicatePushdown));
    assert!(plan.fired(OptimizationRule::ParallelExecution));
    assert!(!plan.fired(OptimizationRule::JoinOptimization));
    assert!(plan.optimized_query.contains("/* optimized:"));
    assert!(plan.estimated_improvement >= 1.0);
}

#[tokio::test]
async fn test_concurrent_queries() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(open_with_employees(dir.path()).await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let query = format!("SELECT * FROM employees WHERE age > {}", 20 + i * 5);
            engine.query(&query, "employees").await.unwrap().num_rows()
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    // thresholds 20..55: 3, 2, 2, 1, 1, 0, 0, 0
    assert_eq!(total, 9);
    assert_eq!(engine.performance_stats().total_queries, 8);
}

#[tokio::test]
async fn test_query_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::new(dir.path())
        .with_row_group_size(1_000)
        .with_query_timeout(Duration::from_millis(1));
    let engine = StorageEngine::open(config).unwrap();
    engine
        .create_table("employees", &employees_schema(), &many_rows(300_000))
        .await
        .unwrap();

    let err = engine
        .query("SELECT * FROM employees WHERE age > 30", "employees")
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::QueryTimeout { ref table, timeout_ms: 1 } if table == "employees"),
        "unexpected error: {:?}",
        err
    );
    assert_eq!(engine.performance_stats().total_queries, 0);
    assert_eq!(engine.cache().stats().l1_size, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recreate_during_queries() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(open_with_employees(dir.path()).await);
    let old_ids = vec![1, 2, 3];
    let new_ids = vec![10, 11, 12, 13];
    let replacement = employees(&[
        (10, "Dan", 30, 55_000.0),
        (11, "Erin", 41, 72_000.0),
        (12, "Frank", 52, 91_000.0),
        (13, "Gwen", 28, 48_000.0),
    ]);

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for round in 0..10 {
                let batch = if round % 2 == 0 {
                    replacement.clone()
                } else {
                    default_rows()
                };
                engine
                    .create_table("employees", &employees_schema(), &batch)
                    .await
                    .unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for reader in 0..4 {
        let engine = engine.clone();
        readers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            for i in 0..40 {
                let query = format!("SELECT * FROM employees WHERE id > -{}", reader * 40 + i);
                let result = engine.query(&query, "employees").await.unwrap();
                seen.push(ids(result.batch()));
            }
            seen
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        for result in reader.await.unwrap() {
            assert!(
                result == old_ids || result == new_ids,
                "mixed result: {:?}",
                result
            );
        }
    }

    // Ten re-creates, ending on the original rows
    let table = engine.get_table("employees").unwrap();
    assert_eq!(table.version, 11);
    assert_eq!(table_files(dir.path()), 1);
    let result = engine
        .query("SELECT * FROM employees", "employees")
        .await
        .unwrap();
    assert_eq!(ids(result.batch()), old_ids);
}

#[tokio::test]
async fn test_failed_catalog_write_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StorageEngine::open(EngineConfig::new(dir.path())).unwrap();
    std::fs::create_dir(engine.config().catalog_path()).unwrap();

    let err = engine
        .create_table("employees", &employees_schema(), &default_rows())
        .await
        .unwrap_err();
    assert!(err.is_persistence(), "unexpected error: {:?}", err);
    assert_eq!(engine.table_state("employees"), TableState::Uncreated);
    assert_eq!(table_files(dir.path()), 0);

    let err = engine
        .query("SELECT * FROM employees", "employees")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_failed_recreate_keeps_previous_version() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;
    let catalog_path = engine.config().catalog_path();
    std::fs::remove_file(&catalog_path).unwrap();
    std::fs::create_dir(&catalog_path).unwrap();

    let err = engine
        .create_table(
            "employees",
            &employees_schema(),
            &employees(&[(7, "Grace", 60, 99_000.0)]),
        )
        .await
        .unwrap_err();
    assert!(err.is_persistence());

    assert_eq!(engine.table_state("employees"), TableState::Available);
    let table = engine.get_table("employees").unwrap();
    assert_eq!(table.version, 1);
    assert!(table.data_file.exists());
    assert_eq!(table_files(dir.path()), 1);

    let result = engine
        .query("SELECT * FROM employees", "employees")
        .await
        .unwrap();
    assert_eq!(ids(result.batch()), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_unknown_tables_leave_no_locks() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_with_employees(dir.path()).await;

    for i in 0..1_000 {
        let table = format!("ghost_{}", i);
        let err = engine
            .query(&format!("SELECT * FROM {}", table), &table)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
    engine
        .query("SELECT * FROM employees", "employees")
        .await
        .unwrap();
    assert_eq!(engine.active_table_locks(), 0);
}

#[tokio::test]
async fn test_reopen_removes_orphaned_files() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = open_with_employees(dir.path()).await;
        engine.shutdown().unwrap();
    }
    // A file written by a create that never committed
    std::fs::write(dir.path().join("tables/employees.v2.parquet"), b"partial").unwrap();
    assert_eq!(table_files(dir.path()), 2);

    let engine = StorageEngine::open(EngineConfig::new(dir.path())).unwrap();
    assert_eq!(table_files(dir.path()), 1);
    let result = engine
        .query("SELECT * FROM employees", "employees")
        .await
        .unwrap();
    assert_eq!(ids(result.batch()), vec![1, 2, 3]);
}
