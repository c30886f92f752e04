use crate::utils::error::{EtlError, Result};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

/// 轉換時保留的欄位，其餘欄位在 transform 時直接丟棄
pub const KNOWN_FIELDS: &[&str] = &[
    "name",
    "age",
    "date",
    "amount",
    "id",
    "author",
    "title",
    "genre",
    "price",
    "publish_date",
    "date_of_joining",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    File,
    Database,
    Output,
    Api,
}

impl EndpointKind {
    pub const ALL: [EndpointKind; 4] = [
        EndpointKind::File,
        EndpointKind::Database,
        EndpointKind::Output,
        EndpointKind::Api,
    ];

    /// 在轉換矩陣中的列/欄位置
    pub fn index(self) -> usize {
        match self {
            EndpointKind::File => 0,
            EndpointKind::Database => 1,
            EndpointKind::Output => 2,
            EndpointKind::Api => 3,
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndpointKind::File => "FILE",
            EndpointKind::Database => "DATABASE",
            EndpointKind::Output => "OUTPUT",
            EndpointKind::Api => "API",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseDriver {
    Sqlite,
    Postgres,
}

impl DatabaseDriver {
    pub fn parse(db_type: &str) -> Option<Self> {
        match db_type.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(DatabaseDriver::Sqlite),
            "postgres" | "postgresql" | "pg" => Some(DatabaseDriver::Postgres),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseDriver::Sqlite => f.write_str("sqlite"),
            DatabaseDriver::Postgres => f.write_str("postgres"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseParams {
    pub db_type: String,
    pub url: Option<String>,
    /// 存放連線字串的環境變數名稱
    pub credentials: Option<String>,
}

impl DatabaseParams {
    /// 連線字串：優先使用 url，其次讀取 credentials 指向的環境變數
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let var_name = self.credentials.as_deref().unwrap_or("DATABASE_URL");
        // 沒有任何連線字串屬於設定問題
        std::env::var(var_name).map_err(|_| EtlError::MissingConfigError {
            field: var_name.to_string(),
        })
    }
}

/// 解析完成後不可變的端點描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    kind: EndpointKind,
    identifier: String,
    delimiter: Option<String>,
    extension: String,
    database: Option<DatabaseParams>,
}

impl EndpointDescriptor {
    pub fn file(path: impl Into<String>, delimiter: Option<String>) -> Self {
        let identifier = path.into();
        let extension = std::path::Path::new(&identifier)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        Self {
            kind: EndpointKind::File,
            identifier,
            delimiter,
            extension,
            database: None,
        }
    }

    pub fn database(table: impl Into<String>, params: DatabaseParams) -> Self {
        Self {
            kind: EndpointKind::Database,
            identifier: table.into(),
            delimiter: None,
            extension: String::new(),
            database: Some(params),
        }
    }

    pub fn output(format: impl Into<String>) -> Self {
        let format = format.into().to_ascii_lowercase();
        Self {
            kind: EndpointKind::Output,
            extension: format.clone(),
            identifier: format,
            delimiter: None,
            database: None,
        }
    }

    pub fn api(name: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::Api,
            identifier: name.into(),
            delimiter: None,
            extension: String::new(),
            database: None,
        }
    }

    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn database_params(&self) -> Option<&DatabaseParams> {
        self.database.as_ref()
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.identifier)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Date(NaiveDate),
    Decimal(BigDecimal),
}

impl FieldValue {
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(raw.to_string())
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            FieldValue::Decimal(amount) => write!(f, "{}", amount),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Text(text) => serializer.serialize_str(text),
            // 日期與金額以字串輸出，保留精確位數
            FieldValue::Date(_) | FieldValue::Decimal(_) => serializer.collect_str(self),
        }
    }
}

/// 依來源欄位順序保存的記錄
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    /// 已存在的欄位就地覆寫，維持原本順序
    pub fn insert(&mut self, name: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<(String, FieldValue)> {
        self.fields
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(&name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// 一批按來源順序排列的記錄，index 為 chunk 在來源中的序號
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub records: Vec<Record>,
}

impl Chunk {
    pub fn new(index: usize, records: Vec<Record>) -> Self {
        Self { index, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversionStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_chunks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows_affected: u64,
    /// 只保留前 N 筆失敗原因
    pub failures: Vec<ChunkFailure>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn record_success(&mut self, rows: u64) {
        self.total_chunks += 1;
        self.succeeded += 1;
        self.rows_affected += rows;
    }

    pub fn record_failure(&mut self, chunk_index: usize, reason: String, max_reported: usize) {
        self.total_chunks += 1;
        self.failed += 1;
        if self.failures.len() < max_reported {
            self.failures.push(ChunkFailure {
                chunk_index,
                reason,
            });
        }
    }
}

/// 每次執行產生一次的結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    pub status: ConversionStatus,
    pub rows_affected: u64,
    pub error: Option<String>,
    pub summary: RunSummary,
    pub artifact: Option<String>,
}

impl ConversionResult {
    pub fn from_summary(summary: RunSummary, artifact: Option<String>) -> Self {
        let (status, error) = if summary.failed == 0 && !summary.cancelled {
            (ConversionStatus::Success, None)
        } else if summary.failed == 0 {
            (
                ConversionStatus::Failure,
                Some("run cancelled before all chunks were processed".to_string()),
            )
        } else {
            (
                ConversionStatus::Failure,
                Some(format!(
                    "{} of {} chunks failed",
                    summary.failed, summary.total_chunks
                )),
            )
        };

        Self {
            status,
            rows_affected: summary.rows_affected,
            error,
            summary,
            artifact,
        }
    }

    /// 沒有任何 I/O 的佔位轉換
    pub fn noop() -> Self {
        Self::from_summary(RunSummary::default(), None)
    }

    pub fn is_success(&self) -> bool {
        self.status == ConversionStatus::Success
    }
}
