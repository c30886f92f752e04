use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration shape error in {config_file} (key '{key}'): {reason}")]
    ConfigShapeError {
        config_file: String,
        key: String,
        reason: String,
    },

    #[error("Illegal conversion {source_kind} -> {target_kind}: {reason}")]
    IllegalConversionError {
        source_kind: String,
        target_kind: String,
        reason: String,
    },

    #[error("Source not found: {path}")]
    SourceNotFoundError { path: String },

    #[error("Malformed record in chunk {chunk_index} (record {record}): {reason}")]
    MalformedRecordError {
        chunk_index: usize,
        record: u64,
        reason: String,
    },

    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    DateFormatError { value: String },

    #[error("Invalid amount '{value}': not a decimal number")]
    AmountFormatError { value: String },

    #[error("Sink unavailable: {message}")]
    SinkUnavailableError { message: String },

    #[error("Sink write failed: {message}")]
    SinkWriteError { message: String },

    #[error("Worker failed on chunk {chunk_index}: {message}")]
    WorkerError { chunk_index: usize, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Source,
    Record,
    Sink,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigShapeError { .. }
            | EtlError::IllegalConversionError { .. }
            | EtlError::TomlError(_) => ErrorCategory::Configuration,
            EtlError::SourceNotFoundError { .. } => ErrorCategory::Source,
            EtlError::MalformedRecordError { .. }
            | EtlError::DateFormatError { .. }
            | EtlError::AmountFormatError { .. }
            | EtlError::CsvError(_) => ErrorCategory::Record,
            EtlError::SinkUnavailableError { .. } | EtlError::SinkWriteError { .. } => {
                ErrorCategory::Sink
            }
            EtlError::IoError(_)
            | EtlError::SerializationError(_)
            | EtlError::WorkerError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::MalformedRecordError { .. }
            | EtlError::DateFormatError { .. }
            | EtlError::AmountFormatError { .. }
            | EtlError::SinkWriteError { .. }
            | EtlError::WorkerError { .. }
            | EtlError::CsvError(_) => ErrorSeverity::Medium,
            EtlError::SinkUnavailableError { .. } | EtlError::IoError(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    /// 單一 chunk 失敗，不影響其他 chunk 與整體執行
    pub fn is_chunk_level(&self) -> bool {
        matches!(
            self,
            EtlError::MalformedRecordError { .. }
                | EtlError::DateFormatError { .. }
                | EtlError::AmountFormatError { .. }
                | EtlError::SinkWriteError { .. }
                | EtlError::WorkerError { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ConfigShapeError { .. } => {
                "Check that the key exists and matches a database, file, output or API config shape"
            }
            EtlError::IllegalConversionError { .. } => {
                "Pick a different source/target pair; equal kinds and DATABASE -> FILE are not supported"
            }
            EtlError::SourceNotFoundError { .. } => "Verify the source file path in the file config",
            EtlError::MalformedRecordError { .. } => {
                "Check the delimiter and that every row has as many columns as the header"
            }
            EtlError::DateFormatError { .. } => "Dates must be written as YYYY-MM-DD",
            EtlError::AmountFormatError { .. } => "Amounts must be plain decimal numbers",
            EtlError::SinkUnavailableError { .. } => {
                "Verify the database url/credentials or that the output directory is writable"
            }
            EtlError::SinkWriteError { .. } => {
                "Every record needs an integer id; check the failing chunk's rows"
            }
            EtlError::InvalidConfigValueError { .. } | EtlError::MissingConfigError { .. } => {
                "Fix the reported configuration value and retry"
            }
            EtlError::TomlError(_) | EtlError::ConfigError { .. } => {
                "Make sure the configuration file exists and is well formed"
            }
            EtlError::IoError(_) => "Check file permissions and available disk space",
            EtlError::WorkerError { .. } => "Re-run with --verbose to see the failing chunk",
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "Inspect the input data for encoding problems"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Source => format!("Cannot read source: {}", self),
            ErrorCategory::Record => format!("Bad input data: {}", self),
            ErrorCategory::Sink => format!("Cannot write target: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_level_errors_are_medium_severity() {
        let errors = [
            EtlError::DateFormatError {
                value: "2024/01/01".to_string(),
            },
            EtlError::MalformedRecordError {
                chunk_index: 1,
                record: 1501,
                reason: "found 2 fields, expected 4".to_string(),
            },
            EtlError::SinkWriteError {
                message: "missing id".to_string(),
            },
        ];

        for error in &errors {
            assert!(error.is_chunk_level());
            assert_eq!(error.severity(), ErrorSeverity::Medium);
        }
    }

    #[test]
    fn test_fatal_errors_are_not_chunk_level() {
        let shape = EtlError::ConfigShapeError {
            config_file: "cfg.json".to_string(),
            key: "1".to_string(),
            reason: "missing".to_string(),
        };
        let sink = EtlError::SinkUnavailableError {
            message: "connection refused".to_string(),
        };

        assert!(!shape.is_chunk_level());
        assert_eq!(shape.category(), ErrorCategory::Configuration);
        assert_eq!(shape.severity(), ErrorSeverity::High);
        assert!(!sink.is_chunk_level());
        assert_eq!(sink.severity(), ErrorSeverity::Critical);
        assert!(sink.user_friendly_message().starts_with("Cannot write target"));
    }
}
