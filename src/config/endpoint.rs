use crate::domain::model::{DatabaseParams, EndpointDescriptor};
use crate::utils::error::{EtlError, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_TABLE: &str = "processed_data";
pub const OUTPUT_FORMATS: &[&str] = &["csv", "txt", "json"];

/// 單一 key 底下的設定形狀
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EndpointConfig {
    Database(DatabaseConfig),
    File(FileConfig),
    Bare(String),
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseConfig {
    r#type: String,
    url: Option<String>,
    credentials: Option<String>,
    table: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileConfig {
    file_name: String,
    delimiter: Option<String>,
}

/// 讀取 JSON 設定檔並解析指定 key 的端點
pub fn resolve<P: AsRef<Path>>(config_file: P, key: &str) -> Result<EndpointDescriptor> {
    let config_file = config_file.as_ref();
    let display_name = config_file.display().to_string();

    let content = std::fs::read_to_string(config_file).map_err(|e| EtlError::ConfigError {
        message: format!("cannot read config file {}: {}", display_name, e),
    })?;

    let document: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| EtlError::ConfigShapeError {
            config_file: display_name.clone(),
            key: key.to_string(),
            reason: format!("not valid JSON: {}", e),
        })?;

    let descriptor = resolve_value(&document, key).map_err(|e| match e {
        EtlError::ConfigShapeError { key, reason, .. } => EtlError::ConfigShapeError {
            config_file: display_name.clone(),
            key,
            reason,
        },
        other => other,
    })?;

    tracing::debug!("Resolved {} key '{}' to {}", display_name, key, descriptor);
    Ok(descriptor)
}

/// 依設定形狀推斷端點類型
pub fn resolve_value(document: &serde_json::Value, key: &str) -> Result<EndpointDescriptor> {
    let shape_error = |reason: String| EtlError::ConfigShapeError {
        config_file: "<inline>".to_string(),
        key: key.to_string(),
        reason,
    };

    let entry = document
        .as_object()
        .ok_or_else(|| shape_error("top level must be a JSON object".to_string()))?
        .get(key)
        .ok_or_else(|| shape_error("key not found".to_string()))?;

    let config: EndpointConfig = serde_json::from_value(entry.clone()).map_err(|_| {
        shape_error(
            "expected a database config, a file config, an output format or an API name"
                .to_string(),
        )
    })?;

    match config {
        EndpointConfig::Database(db) => {
            if db.r#type.trim().is_empty() {
                return Err(shape_error("database type cannot be empty".to_string()));
            }
            let table = db.table.unwrap_or_else(|| DEFAULT_TABLE.to_string());
            Ok(EndpointDescriptor::database(
                table,
                DatabaseParams {
                    db_type: db.r#type,
                    url: db.url,
                    credentials: db.credentials,
                },
            ))
        }
        EndpointConfig::File(file) => {
            if file.file_name.trim().is_empty() {
                return Err(shape_error("file_name cannot be empty".to_string()));
            }
            Ok(EndpointDescriptor::file(file.file_name, file.delimiter))
        }
        EndpointConfig::Bare(value) => resolve_bare(value).ok_or_else(|| {
            shape_error("value cannot be an empty string".to_string())
        }),
    }
}

/// 字串形狀：輸出格式 > 舊式檔案路徑 > API 名稱
fn resolve_bare(value: String) -> Option<EndpointDescriptor> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if OUTPUT_FORMATS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return Some(EndpointDescriptor::output(trimmed));
    }

    if Path::new(trimmed).extension().is_some() {
        return Some(EndpointDescriptor::file(trimmed, None));
    }

    Some(EndpointDescriptor::api(trimmed))
}
