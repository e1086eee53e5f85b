//! colstore - Demo
//!
//! Loads a small employees table and runs queries against it.
//!
//! Usage: colstore-demo [--config <file>] [--data-dir <dir>] [QUERY...]

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int32Array, StringArray};
use arrow::record_batch::RecordBatch;
use colstore::catalog::arrow_schema;
use colstore::{ColumnSchema, DataType, EngineConfig, StorageEngine};
use tracing_subscriber::EnvFilter;

const TABLE: &str = "employees";

const DEFAULT_QUERIES: &[&str] = &[
    "SELECT * FROM employees",
    "SELECT name, salary FROM employees WHERE age > 30",
    "SELECT * FROM employees WHERE dept = 'engineering'",
    "SELECT dept, COUNT(*) FROM employees GROUP BY dept ORDER BY dept",
];

fn employees() -> anyhow::Result<(Vec<ColumnSchema>, RecordBatch)> {
    let schema = vec![
        ColumnSchema::new("id", DataType::Integer).nullable(false),
        ColumnSchema::new("name", DataType::Text),
        ColumnSchema::new("age", DataType::Integer),
        ColumnSchema::new("dept", DataType::Text),
        ColumnSchema::new("salary", DataType::Double),
        ColumnSchema::new("remote", DataType::Boolean),
    ];
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(vec![1, 2, 3, 4, 5, 6])),
        Arc::new(StringArray::from(vec![
            "Alice", "Bob", "Carol", "Dave", "Erin", "Frank",
        ])),
        Arc::new(Int32Array::from(vec![
            Some(29),
            Some(41),
            Some(35),
            None,
            Some(24),
            Some(52),
        ])),
        Arc::new(StringArray::from(vec![
            "engineering",
            "sales",
            "engineering",
            "support",
            "engineering",
            "sales",
        ])),
        Arc::new(Float64Array::from(vec![
            120_000.0, 95_000.0, 135_000.0, 70_000.0, 88_000.0, 150_000.0,
        ])),
        Arc::new(BooleanArray::from(vec![true, false, true, true, false, false])),
    ];
    let batch = RecordBatch::try_new(arrow_schema(&schema), columns)?;
    Ok((schema, batch))
}

fn parse_args() -> anyhow::Result<(EngineConfig, Vec<String>)> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut config = EngineConfig::default();
    let mut queries = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = args.get(i + 1).context("--config needs a file")?;
                config = EngineConfig::from_file(path)
                    .with_context(|| format!("loading config {}", path))?;
                i += 2;
            }
            "--data-dir" | "-d" => {
                let dir = args.get(i + 1).context("--data-dir needs a directory")?;
                config.data_dir = dir.into();
                i += 2;
            }
            "--help" | "-h" => {
                println!("Usage: colstore-demo [--config <file>] [--data-dir <dir>] [QUERY...]");
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("unknown option {}", flag),
            query => {
                queries.push(query.to_string());
                i += 1;
            }
        }
    }

    if queries.is_empty() {
        queries = DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect();
    }
    Ok((config, queries))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, queries) = parse_args()?;
    let engine = StorageEngine::open(config).context("opening storage engine")?;

    let (schema, batch) = employees()?;
    let metadata = engine.create_table(TABLE, &schema, &batch).await?;
    println!(
        "Created table '{}' ({} rows, {} columns)",
        metadata.name, metadata.row_count, metadata.column_count
    );
    println!("{}", serde_json::to_string_pretty(&*metadata)?);

    for query in &queries {
        println!("\n{}", query);
        let plan = engine.explain(query, TABLE)?;
        println!("  -> {}", plan.optimized_query);

        match engine.query(query, TABLE).await {
            Ok(result) => println!("{}", result.to_pretty_string()?),
            Err(err) => println!("Error: {}", err),
        }
    }

    // Second pass is served from the cache
    for query in &queries {
        let _ = engine.query(query, TABLE).await;
    }

    println!(
        "\n{}",
        serde_json::to_string_pretty(&engine.performance_stats())?
    );

    engine.shutdown()?;
    Ok(())
}
