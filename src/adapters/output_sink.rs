use crate::adapters::storage::LocalStorage;
use crate::core::pipeline::ChunkWriter;
use crate::domain::model::{Chunk, Record};
use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt;

pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Txt,
    Json,
}

impl OutputFormat {
    pub fn parse(format: &str) -> Result<Self> {
        match format.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "txt" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            other => Err(EtlError::InvalidConfigValueError {
                field: "output format".to_string(),
                value: other.to_string(),
                reason: "Supported output formats: csv, txt, json".to_string(),
            }),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 收集所有成功的 chunk，結束時依 chunk 順序一次寫出
///
/// 失敗的 chunk 不會出現在輸出中；chunk 完成順序不影響檔案內容。
pub struct OutputSink {
    format: OutputFormat,
    started_at: DateTime<Local>,
    chunks: BTreeMap<usize, Vec<Record>>,
}

impl OutputSink {
    pub fn new(format: OutputFormat, started_at: DateTime<Local>) -> Self {
        Self {
            format,
            started_at,
            chunks: BTreeMap::new(),
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "output_{}.{}",
            self.started_at.format(OUTPUT_TIMESTAMP_FORMAT),
            self.format.extension()
        )
    }

    pub fn accept(&mut self, chunk: Chunk) -> u64 {
        let rows = chunk.len() as u64;
        self.chunks.insert(chunk.index, chunk.records);
        rows
    }

    pub fn record_count(&self) -> usize {
        self.chunks.values().map(Vec::len).sum()
    }

    fn records(&self) -> impl Iterator<Item = &Record> {
        self.chunks.values().flatten()
    }

    /// 欄位順序取所有紀錄中第一次出現的順序
    fn header(&self) -> Vec<String> {
        let mut header: Vec<String> = Vec::new();
        for record in self.records() {
            for name in record.field_names() {
                if !header.iter().any(|existing| existing == name) {
                    header.push(name.to_string());
                }
            }
        }
        header
    }

    pub fn render(&self) -> Result<Vec<u8>> {
        match self.format {
            OutputFormat::Csv => self.render_delimited(b','),
            OutputFormat::Txt => self.render_delimited(b'\t'),
            OutputFormat::Json => {
                let records: Vec<&Record> = self.records().collect();
                Ok(serde_json::to_vec_pretty(&records)?)
            }
        }
    }

    fn render_delimited(&self, delimiter: u8) -> Result<Vec<u8>> {
        let header = self.header();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());

        if !header.is_empty() {
            writer.write_record(&header)?;
        }
        for record in self.records() {
            let row = header.iter().map(|name| {
                record
                    .get(name)
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            });
            writer.write_record(row)?;
        }

        writer.into_inner().map_err(|e| EtlError::SinkUnavailableError {
            message: format!("Failed to flush output buffer: {}", e),
        })
    }

    /// 寫出檔案並回傳完整路徑
    pub async fn finish(&self, storage: &LocalStorage) -> Result<String> {
        let data = self.render()?;
        let file_name = self.file_name();

        storage
            .write_file(&file_name, &data)
            .await
            .map_err(|e| EtlError::SinkUnavailableError {
                message: format!("Failed to write {}: {}", file_name, e),
            })?;

        let path = storage.full_path(&file_name);
        tracing::info!("💾 Wrote {} records to {}", self.record_count(), path);
        Ok(path)
    }
}

#[async_trait]
impl ChunkWriter for OutputSink {
    async fn write_chunk(&mut self, chunk: Chunk) -> Result<u64> {
        Ok(self.accept(chunk))
    }
}
