use matrix_etl::utils::error::ErrorSeverity;
use matrix_etl::{
    build_converter, dispatch, resolve, ConversionStatus, EndpointKind, EtlEngine, EtlError,
    RunSettings,
};
use sqlx::sqlite::SqlitePool;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_json(dir: &Path, name: &str, value: serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    path
}

/// 2500 筆資料，第 1500 筆欄位數錯誤
fn write_people(dir: &Path, rows: usize, malformed_at: Option<usize>) -> PathBuf {
    let path = dir.join("people.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "id,name,date,amount,nickname").unwrap();
    for i in 1..=rows {
        if Some(i) == malformed_at {
            writeln!(file, "{},Person {}", i, i).unwrap();
        } else {
            writeln!(file, "{},Person {},2024-01-15,100.00,p{}", i, i, i).unwrap();
        }
    }
    path
}

fn settings(chunk_size: usize, output_dir: Option<&Path>) -> RunSettings {
    let mut settings = RunSettings::default();
    settings.pipeline.chunk_size = Some(chunk_size);
    settings.pipeline.workers = Some(4);
    settings.output.directory = output_dir.map(|dir| dir.display().to_string());
    settings
}

async fn run(
    source: (&Path, &str),
    target: (&Path, &str),
    settings: &RunSettings,
) -> matrix_etl::Result<matrix_etl::ConversionResult> {
    let source = resolve(source.0, source.1)?;
    let target = resolve(target.0, target.1)?;
    let handle = dispatch(source, target)?;
    EtlEngine::new(build_converter(handle, settings)).run().await
}

#[tokio::test]
async fn test_malformed_row_fails_only_its_chunk() {
    let dir = TempDir::new().unwrap();
    let people = write_people(dir.path(), 2500, Some(1500));
    let db_path = dir.path().join("warehouse.db");

    let sources = write_json(
        dir.path(),
        "sources.json",
        serde_json::json!({"people": {"file_name": people.display().to_string(), "delimiter": ","}}),
    );
    let targets = write_json(
        dir.path(),
        "targets.json",
        serde_json::json!({"warehouse": {
            "type": "sqlite",
            "url": format!("sqlite://{}", db_path.display()),
            "table": "processed_data"
        }}),
    );

    let result = run((&sources, "people"), (&targets, "warehouse"), &settings(1000, None))
        .await
        .unwrap();

    assert_eq!(result.status, ConversionStatus::Failure);
    assert_eq!(result.summary.total_chunks, 3);
    assert_eq!(result.summary.succeeded, 2);
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.rows_affected, 1500);
    assert_eq!(result.summary.failures[0].chunk_index, 1);

    let pool = SqlitePool::connect(&format!("sqlite://{}", db_path.display()))
        .await
        .unwrap();
    let (count, min_id, max_id): (i64, i64, i64) =
        sqlx::query_as("SELECT COUNT(*), MIN(id), MAX(id) FROM processed_data")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!((count, min_id, max_id), (1500, 1, 2500));

    let (gap,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM processed_data WHERE id BETWEEN 1001 AND 2000")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(gap, 0);

    let (amount, date): (String, String) =
        sqlx::query_as("SELECT amount, CAST(date AS TEXT) FROM processed_data WHERE id = 42")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(amount, "110.00");
    assert_eq!(date, "2024-01-15");
}

#[tokio::test]
async fn test_rerun_into_database_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let people = write_people(dir.path(), 120, None);
    let db_path = dir.path().join("warehouse.db");

    let sources = write_json(
        dir.path(),
        "sources.json",
        serde_json::json!({"people": {"file_name": people.display().to_string()}}),
    );
    let targets = write_json(
        dir.path(),
        "targets.json",
        serde_json::json!({"warehouse": {"type": "sqlite", "url": format!("sqlite://{}", db_path.display())}}),
    );

    let first = run((&sources, "people"), (&targets, "warehouse"), &settings(25, None))
        .await
        .unwrap();
    let second = run((&sources, "people"), (&targets, "warehouse"), &settings(7, None))
        .await
        .unwrap();

    assert!(first.is_success() && second.is_success());
    assert_eq!(second.rows_affected, 120);

    let pool = SqlitePool::connect(&format!("sqlite://{}", db_path.display()))
        .await
        .unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_data")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 120);
}

#[tokio::test]
async fn test_file_to_file_is_rejected_before_any_io() {
    let dir = TempDir::new().unwrap();
    let config = write_json(
        dir.path(),
        "files.json",
        serde_json::json!({
            "a": {"file_name": dir.path().join("missing-a.csv").display().to_string()},
            "b": {"file_name": dir.path().join("missing-b.csv").display().to_string()}
        }),
    );

    let err = run((&config, "a"), (&config, "b"), &settings(10, None))
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::IllegalConversionError { .. }));
    assert_eq!(err.severity(), ErrorSeverity::High);
}

#[tokio::test]
async fn test_file_to_output_writes_timestamped_json() {
    let dir = TempDir::new().unwrap();
    let out_dir = dir.path().join("out");
    let people = write_people(dir.path(), 5, None);

    let sources = write_json(
        dir.path(),
        "sources.json",
        serde_json::json!({"people": {"file_name": people.display().to_string()}}),
    );
    let targets = write_json(dir.path(), "targets.json", serde_json::json!({"report": "json"}));

    let result = run(
        (&sources, "people"),
        (&targets, "report"),
        &settings(2, Some(&out_dir)),
    )
    .await
    .unwrap();

    assert!(result.is_success());
    let artifact = PathBuf::from(result.artifact.unwrap());
    assert!(artifact.starts_with(&out_dir));
    let name = artifact.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("output_") && name.ends_with(".json"));

    let records: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["amount"], "110.00");
    // 未知欄位在轉換時被移除
    assert!(records[0].get("nickname").is_none());
}

#[tokio::test]
async fn test_legal_but_unimplemented_pair_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let config = write_json(
        dir.path(),
        "endpoints.json",
        serde_json::json!({"orders": "orders_api", "report": "csv"}),
    );

    let source = resolve(&config, "orders").unwrap();
    assert_eq!(source.kind(), EndpointKind::Api);

    let result = run((&config, "orders"), (&config, "report"), &settings(10, Some(dir.path())))
        .await
        .unwrap();

    assert_eq!(result.status, ConversionStatus::Success);
    assert_eq!(result.rows_affected, 0);
    assert!(result.artifact.is_none());
}

#[tokio::test]
async fn test_missing_source_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let sources = write_json(
        dir.path(),
        "sources.json",
        serde_json::json!({"people": {"file_name": dir.path().join("nope.csv").display().to_string()}}),
    );
    let targets = write_json(dir.path(), "targets.json", serde_json::json!({"report": "csv"}));

    let err = run((&sources, "people"), (&targets, "report"), &settings(10, Some(dir.path())))
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::SourceNotFoundError { .. }));
}

#[tokio::test]
async fn test_unknown_key_is_a_shape_error() {
    let dir = TempDir::new().unwrap();
    let config = write_json(dir.path(), "endpoints.json", serde_json::json!({"report": "csv"}));

    match resolve(&config, "nope") {
        Err(EtlError::ConfigShapeError {
            config_file, key, ..
        }) => {
            assert!(config_file.ends_with("endpoints.json"));
            assert_eq!(key, "nope");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
