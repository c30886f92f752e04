use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_path, validate_positive_number, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHANNEL_BUFFER: usize = 2;
pub const DEFAULT_MAX_REPORTED_FAILURES: usize = 5;
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "./output";

/// 執行參數，可由 TOML 檔載入再由命令列覆蓋
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub pipeline: PipelineSettings,
    pub output: OutputSettings,
    pub summary: SummarySettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub chunk_size: Option<usize>,
    pub workers: Option<usize>,
    pub channel_buffer: Option<usize>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    pub max_reported_failures: Option<usize>,
}

impl RunSettings {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| EtlError::ConfigError {
            message: format!(
                "cannot read settings file {}: {}",
                path.as_ref().display(),
                e
            ),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${OUTPUT_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn chunk_size(&self) -> usize {
        self.pipeline.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// 預設為可用的平行度
    pub fn workers(&self) -> usize {
        self.pipeline.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn channel_buffer(&self) -> usize {
        self.pipeline.channel_buffer.unwrap_or(DEFAULT_CHANNEL_BUFFER)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.pipeline.timeout_seconds.map(Duration::from_secs)
    }

    pub fn output_directory(&self) -> &str {
        self.output
            .directory
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_DIRECTORY)
    }

    pub fn max_reported_failures(&self) -> usize {
        self.summary
            .max_reported_failures
            .unwrap_or(DEFAULT_MAX_REPORTED_FAILURES)
    }
}

impl Validate for RunSettings {
    fn validate(&self) -> Result<()> {
        validate_positive_number("pipeline.chunk_size", self.chunk_size(), 1)?;
        validate_positive_number("pipeline.workers", self.workers(), 1)?;
        validate_positive_number("pipeline.channel_buffer", self.channel_buffer(), 1)?;
        if let Some(timeout) = self.pipeline.timeout_seconds {
            validate_positive_number("pipeline.timeout_seconds", timeout as usize, 1)?;
        }
        validate_path("output.directory", self.output_directory())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_empty_document() {
        let settings = RunSettings::from_toml_str("").unwrap();

        assert_eq!(settings.chunk_size(), DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.channel_buffer(), DEFAULT_CHANNEL_BUFFER);
        assert!(settings.workers() >= 1);
        assert!(settings.timeout().is_none());
        assert_eq!(settings.output_directory(), DEFAULT_OUTPUT_DIRECTORY);
        assert_eq!(settings.max_reported_failures(), 5);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_full_settings() {
        let toml_content = r#"
[pipeline]
chunk_size = 250
workers = 3
channel_buffer = 4
timeout_seconds = 30

[output]
directory = "./exports"

[summary]
max_reported_failures = 2
"#;

        let settings = RunSettings::from_toml_str(toml_content).unwrap();
        assert_eq!(settings.chunk_size(), 250);
        assert_eq!(settings.workers(), 3);
        assert_eq!(settings.channel_buffer(), 4);
        assert_eq!(settings.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.output_directory(), "./exports");
        assert_eq!(settings.max_reported_failures(), 2);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MATRIX_ETL_TEST_OUTPUT_DIR", "/tmp/etl-out");

        let settings = RunSettings::from_toml_str(
            r#"
[output]
directory = "${MATRIX_ETL_TEST_OUTPUT_DIR}"
"#,
        )
        .unwrap();
        assert_eq!(settings.output_directory(), "/tmp/etl-out");

        std::env::remove_var("MATRIX_ETL_TEST_OUTPUT_DIR");
    }

    #[test]
    fn test_settings_validation() {
        let settings = RunSettings::from_toml_str(
            r#"
[pipeline]
chunk_size = 0
"#,
        )
        .unwrap();
        assert!(settings.validate().is_err());

        let settings = RunSettings::from_toml_str(
            r#"
[pipeline]
workers = 0
"#,
        )
        .unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            RunSettings::from_toml_str("[pipeline\nchunk_size = 1"),
            Err(EtlError::TomlError(_))
        ));
    }

    #[test]
    fn test_settings_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[pipeline]\nchunk_size = 10\n")
            .unwrap();

        let settings = RunSettings::from_file(temp_file.path()).unwrap();
        assert_eq!(settings.chunk_size(), 10);
    }
}
